use kb_common::error::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("nothing to capture: {0}")]
    Extraction(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}
