/// Result alias that carries the custom [`WavecastError`] type.
pub type Result<T> = std::result::Result<T, WavecastError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum WavecastError {
    /// The audio input could not be decoded. The caller keeps whatever signal
    /// it had before.
    #[error("failed to decode audio: {0}")]
    Decode(String),
    /// A spectrum was requested before any analyzer exists. Render paths
    /// recover from this locally by skipping spectrum-driven drawing.
    #[error("no spectrum analyzer is available yet")]
    AnalyzerUnavailable,
    /// The encoder refused to start, failed while running or produced nothing.
    #[error(transparent)]
    Encode(#[from] EncodeError),
    /// An export was requested while another one is still running.
    #[error("invalid export state: {0}")]
    InvalidExportState(String),
    /// The export was cancelled before it produced an artifact.
    #[error("export was cancelled")]
    Cancelled,
    #[error("unknown colour preset `{0}`")]
    UnknownPreset(String),
    #[error("unknown render style `{0}`")]
    UnknownStyle(String),
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Message(String),
}

/// Failures reported by an [`EncoderSink`](crate::record::EncoderSink).
///
/// The variants keep "the encoder cannot do what was asked" apart from "the
/// encoder broke while doing it".
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    /// A transparent export was requested but no alpha-capable codec exists.
    #[error("transparent export needs an alpha-capable codec, none is available")]
    AlphaUnsupported,
    #[error("encoder rejected the request: {0}")]
    Rejected(String),
    #[error("encoder produced no output")]
    EmptyOutput,
    #[error("encoder process failed: {0}")]
    Process(String),
}

impl WavecastError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub fn decode<T: Into<String>>(msg: T) -> Self {
        Self::Decode(msg.into())
    }
}

impl From<&str> for WavecastError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for WavecastError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}

impl From<hound::Error> for WavecastError {
    fn from(value: hound::Error) -> Self {
        Self::Decode(value.to_string())
    }
}
