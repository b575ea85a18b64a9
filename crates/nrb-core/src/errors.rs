/// Core error type for the relay bot.
///
/// Adapter crates map their specific errors into this type so the pipeline can
/// tell a generation failure from a publish failure, and the supervisor can tell
/// a transient network failure from everything else.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("generation failed: {0}")]
    Generation(String),

    #[error("publish failed: {0}")]
    Publish(String),

    #[error("transport error: {message}")]
    Transport { message: String, network: bool },

    #[error("external error: {0}")]
    External(String),
}

impl Error {
    /// Network/timeout class failures. These are the only errors the startup
    /// supervisor restarts on.
    pub fn is_network(&self) -> bool {
        matches!(self, Error::Transport { network: true, .. })
    }

    /// The underlying cause without the variant prefix, for operator-facing text.
    pub fn cause(&self) -> String {
        match self {
            Error::Config(s)
            | Error::Generation(s)
            | Error::Publish(s)
            | Error::External(s) => s.clone(),
            Error::Transport { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
