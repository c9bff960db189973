use kb_common::error::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    View(#[from] ViewError),

    #[error("config error: {0}")]
    Config(String),
}

/// A transition the view state machine refused. State is left untouched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ViewError {
    #[error("entries have not been loaded yet")]
    NotLoaded,

    #[error("unknown category: {0}")]
    UnknownCategory(String),
}
