use doc_model::PageSize;
use std::collections::HashMap;

/// Native page sizes, filled the first time each page is measured.
///
/// Entries are write-once for the lifetime of a document; `invalidate`
/// is the only way to forget them.
#[derive(Debug, Clone, Default)]
pub struct PageDimensionCache {
    sizes: HashMap<u32, PageSize>,
}

impl PageDimensionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, page: u32) -> Option<PageSize> {
        self.sizes.get(&page).copied()
    }

    pub fn contains(&self, page: u32) -> bool {
        self.sizes.contains_key(&page)
    }

    /// Records the size of `page`. Returns `false` if it was already known,
    /// in which case the stored size is kept.
    pub fn insert(&mut self, page: u32, size: PageSize) -> bool {
        if self.sizes.contains_key(&page) {
            return false;
        }

        self.sizes.insert(page, size);
        true
    }

    pub fn invalidate(&mut self) {
        self.sizes.clear();
    }

    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_measurement_wins() {
        let mut cache = PageDimensionCache::new();

        assert!(cache.insert(1, PageSize::US_LETTER));
        assert!(!cache.insert(1, PageSize::new(10.0, 10.0)));
        assert_eq!(cache.get(1), Some(PageSize::US_LETTER));
        assert_eq!(cache.get(2), None);
    }

    #[test]
    fn invalidate_forgets_everything() {
        let mut cache = PageDimensionCache::new();
        cache.insert(1, PageSize::US_LETTER);
        cache.insert(2, PageSize::new(842.0, 595.0));

        cache.invalidate();
        assert!(cache.is_empty());
        assert!(!cache.contains(2));
    }
}
