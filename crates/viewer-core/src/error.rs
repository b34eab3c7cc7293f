use thiserror::Error;

#[derive(Debug, Error)]
pub enum ViewerError {
    #[error("failed to start render worker: {0}")]
    WorkerSpawn(#[source] std::io::Error),
    #[error("render worker is no longer running")]
    WorkerUnavailable,
    #[error("no document is open")]
    NoDocument,
}

pub type ViewerResult<T> = Result<T, ViewerError>;
