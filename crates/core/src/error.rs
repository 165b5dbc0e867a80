/// Result alias that carries the custom [`VisualiserError`] type.
pub type Result<T> = std::result::Result<T, VisualiserError>;

/// Common error type for the core crate.
///
/// Only [`VisualiserError::Disposed`] ever escapes a render call. Everything
/// else describes a per-frame condition that renderers log and degrade on.
#[derive(Debug, thiserror::Error)]
pub enum VisualiserError {
    /// Missing or malformed frame input (empty spectrum, zero-sized canvas,
    /// out-of-range configuration values).
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Failure while resampling or smoothing a spectrum, or a poisoned lock.
    #[error("spectrum processing failed: {0}")]
    Processing(String),
    /// An operation was attempted on a renderer after `dispose()`.
    #[error("`{style}` renderer used after dispose")]
    Disposed { style: &'static str },
    /// Configuration could not be parsed.
    #[error("{0}")]
    Config(#[from] serde_json::Error),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Free-form message for the application layer.
    #[error("{0}")]
    Message(String),
}

impl VisualiserError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub fn invalid<T: Into<String>>(msg: T) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn processing<T: Into<String>>(msg: T) -> Self {
        Self::Processing(msg.into())
    }

    /// True for the lifecycle misuse class that callers must treat as a bug.
    pub fn is_disposed(&self) -> bool {
        matches!(self, Self::Disposed { .. })
    }
}

impl From<&str> for VisualiserError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for VisualiserError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disposed_error_names_the_style() {
        let err = VisualiserError::Disposed { style: "bars" };
        assert!(err.is_disposed());
        assert!(format!("{err}").contains("bars"));
    }

    #[test]
    fn config_errors_convert_from_serde() {
        let parse: std::result::Result<u32, _> = serde_json::from_str("not json");
        let err: VisualiserError = parse.unwrap_err().into();
        assert!(matches!(err, VisualiserError::Config(_)));
        assert!(!err.is_disposed());
    }
}
