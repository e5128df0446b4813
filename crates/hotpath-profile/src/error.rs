//! Errors for profile construction and parsing

/// Errors produced while building a [`crate::PerformanceProfile`]
#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    /// Report text contained no overhead table at all
    #[error("report contains no recognizable overhead table")]
    NoOverheadTable,

    /// A hotspot row carried an out-of-range share
    #[error("share {value} out of range for symbol '{symbol}'")]
    ShareOutOfRange {
        /// Offending symbol name
        symbol: String,
        /// Parsed percentage value
        value: f64,
    },

    /// Profiler command string was empty
    #[error("profiler command must not be empty")]
    EmptyCommand,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ProfileError::ShareOutOfRange {
            symbol: "main".to_string(),
            value: 120.0,
        };
        assert!(err.to_string().contains("main"));
        assert!(err.to_string().contains("120"));
    }
}
