use std::path::PathBuf;

/// Result alias that carries the custom [`JawSyncError`] type.
pub type Result<T> = std::result::Result<T, JawSyncError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum JawSyncError {
    /// Free-form message for failures that do not warrant their own variant.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse configuration: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// The input device could not be acquired at startup.
    #[error("audio device unavailable: {0}")]
    AudioDevice(String),
    /// The input stream failed or stalled after startup. There is no
    /// fallback signal, so this is always fatal.
    #[error("audio stream failure: {0}")]
    AudioStream(String),
    #[error("failed to load sprite `{}`: {source}", .path.display())]
    Asset {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("sprite `{}` has no pixels", .path.display())]
    EmptyAsset { path: PathBuf },
    /// The rendering surface could not be created or presented.
    #[error("display failure: {0}")]
    Display(String),
}

impl JawSyncError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }
}

impl From<&str> for JawSyncError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for JawSyncError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
