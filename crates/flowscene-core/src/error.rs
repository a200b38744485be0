pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The diagram text was absent or blank. Rejected before any extraction runs.
    #[error("No Mermaid code provided")]
    MalformedInput,

    #[error(transparent)]
    Render(#[from] RenderError),
}

impl Error {
    /// `true` when the failure was caused by the caller's input rather than the render step.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::MalformedInput)
    }
}

/// Failures of the single external render round trip.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("render engine did not produce the root svg element within {waited_ms}ms")]
    Timeout { waited_ms: u64 },

    #[error("failed to spawn render engine `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("render engine failed: {message}")]
    Engine { message: String },

    #[error("render engine produced unreadable output: {message}")]
    InvalidOutput { message: String },

    #[error("render engine I/O error: {0}")]
    Io(#[from] std::io::Error),
}
