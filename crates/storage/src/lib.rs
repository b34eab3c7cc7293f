use directories::ProjectDirs;
use doc_model::{SettingsError, Stamp, StampLibrary, ViewerSettings};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("unable to resolve local data directory")]
    NoDataDirectory,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("{file} has schema version {found}, newer than supported {}", SCHEMA_VERSION)]
    UnsupportedVersion { file: &'static str, found: u32 },
    #[error("invalid settings: {0}")]
    InvalidSettings(#[from] SettingsError),
}

/// Settings and saved stamps, as versioned JSON files under one root.
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

#[derive(Debug, Serialize, Deserialize)]
struct SettingsEnvelope {
    version: u32,
    settings: ViewerSettings,
}

#[derive(Debug, Serialize, Deserialize)]
struct StampsEnvelope {
    version: u32,
    stamps: StampLibrary,
}

trait Envelope: Serialize + DeserializeOwned {
    const FILE: &'static str;

    fn version(&self) -> u32;
}

impl Envelope for SettingsEnvelope {
    const FILE: &'static str = "settings.json";

    fn version(&self) -> u32 {
        self.version
    }
}

impl Envelope for StampsEnvelope {
    const FILE: &'static str = "stamps.json";

    fn version(&self) -> u32 {
        self.version
    }
}

impl Storage {
    pub fn from_default_project() -> Result<Self, StorageError> {
        let dirs = ProjectDirs::from("dev", "Dropshelf", "Dropshelf")
            .ok_or(StorageError::NoDataDirectory)?;

        Ok(Self { root: dirs.data_local_dir().to_path_buf() })
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn load_settings(&self) -> Result<ViewerSettings, StorageError> {
        let settings = self
            .read::<SettingsEnvelope>()?
            .map(|envelope| envelope.settings)
            .unwrap_or_default();
        settings.validate()?;
        Ok(settings)
    }

    pub fn save_settings(&self, settings: &ViewerSettings) -> Result<(), StorageError> {
        settings.validate()?;
        self.write(&SettingsEnvelope { version: SCHEMA_VERSION, settings: settings.clone() })
    }

    pub fn load_stamps(&self) -> Result<StampLibrary, StorageError> {
        Ok(self.read::<StampsEnvelope>()?.map(|envelope| envelope.stamps).unwrap_or_default())
    }

    pub fn save_stamps(&self, stamps: &StampLibrary) -> Result<(), StorageError> {
        self.write(&StampsEnvelope { version: SCHEMA_VERSION, stamps: stamps.clone() })
    }

    /// Adds `stamp` to the saved library and returns the updated library.
    pub fn append_stamp(&self, stamp: Stamp) -> Result<StampLibrary, StorageError> {
        let mut stamps = self.load_stamps()?;
        log::debug!("saving stamp {} ({})", stamp.id, stamp.label);
        stamps.push(stamp);
        self.save_stamps(&stamps)?;
        Ok(stamps)
    }

    fn read<E: Envelope>(&self) -> Result<Option<E>, StorageError> {
        let path = self.root.join(E::FILE);
        if !path.exists() {
            return Ok(None);
        }

        let bytes = fs::read(&path)?;
        let envelope: E = serde_json::from_slice(&bytes)?;
        // Older files load through serde defaults.
        if envelope.version() > SCHEMA_VERSION {
            return Err(StorageError::UnsupportedVersion { file: E::FILE, found: envelope.version() });
        }

        Ok(Some(envelope))
    }

    fn write<E: Envelope>(&self, envelope: &E) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root)?;

        let bytes = serde_json::to_vec_pretty(envelope)?;
        fs::write(self.root.join(E::FILE), bytes)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use doc_model::{ImageRef, Rgb, Size};

    #[test]
    fn settings_round_trip() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let store = Storage::with_root(temp.path());

        let settings = ViewerSettings {
            min_selection_size: 16.0,
            signature_size: Size::new(120.0, 40.0),
            highlight_color: Rgb::PINK,
            ..ViewerSettings::default()
        };

        store.save_settings(&settings).expect("save should succeed");
        let loaded = store.load_settings().expect("load should succeed");

        assert_eq!(loaded, settings);
    }

    #[test]
    fn load_defaults_when_files_absent() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let store = Storage::with_root(temp.path().join("not-created-yet"));

        assert_eq!(store.load_settings().expect("load settings"), ViewerSettings::default());
        assert!(store.load_stamps().expect("load stamps").is_empty());
    }

    #[test]
    fn partial_settings_fill_in_defaults() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        fs::write(
            temp.path().join("settings.json"),
            r#"{ "version": 1, "settings": { "device_pixel_ratio": 2.0 } }"#,
        )
        .expect("write settings");

        let loaded = Storage::with_root(temp.path()).load_settings().expect("load");
        assert_eq!(loaded.device_pixel_ratio, 2.0);
        assert_eq!(loaded.min_selection_size, 10.0);
    }

    #[test]
    fn unusable_settings_are_rejected_on_load_and_save() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        fs::write(
            temp.path().join("settings.json"),
            r#"{ "version": 1, "settings": { "min_selection_size": -5.0 } }"#,
        )
        .expect("write settings");

        let store = Storage::with_root(temp.path());
        let error = store.load_settings().expect_err("negative threshold should fail");
        assert!(matches!(
            error,
            StorageError::InvalidSettings(SettingsError::MinSelectionSize(_))
        ));

        let zero_dpr = ViewerSettings { device_pixel_ratio: 0.0, ..ViewerSettings::default() };
        assert!(matches!(
            store.save_settings(&zero_dpr),
            Err(StorageError::InvalidSettings(SettingsError::DevicePixelRatio(_)))
        ));
    }

    #[test]
    fn newer_schema_is_rejected() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        fs::write(temp.path().join("stamps.json"), r#"{ "version": 7, "stamps": [] }"#)
            .expect("write stamps");

        let error = Storage::with_root(temp.path()).load_stamps().expect_err("should fail");
        assert!(matches!(error, StorageError::UnsupportedVersion { found: 7, .. }));
    }

    #[test]
    fn older_schema_still_loads() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        fs::write(
            temp.path().join("settings.json"),
            r#"{ "version": 0, "settings": { "thumbnail_edge_px": 96 } }"#,
        )
        .expect("write settings");

        let loaded = Storage::with_root(temp.path()).load_settings().expect("load");
        assert_eq!(loaded.thumbnail_edge_px, 96);
        assert_eq!(loaded.min_selection_size, 10.0);
    }

    #[test]
    fn appended_stamps_accumulate_in_order() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let store = Storage::with_root(temp.path());

        let first = Stamp::new("Approved", ImageRef("stamps/approved.png".to_owned()));
        let second = Stamp::new("Initials", ImageRef("stamps/initials.png".to_owned()));

        store.append_stamp(first.clone()).expect("append first");
        let library = store.append_stamp(second.clone()).expect("append second");
        assert_eq!(library.len(), 2);

        let reloaded = store.load_stamps().expect("reload");
        let labels: Vec<_> = reloaded.iter().map(|stamp| stamp.label.as_str()).collect();
        assert_eq!(labels, ["Approved", "Initials"]);
        assert_eq!(reloaded.get(first.id), Some(&first));
    }
}
