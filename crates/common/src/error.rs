//! Error types shared across QuoteMe crates.

use std::path::{Path, PathBuf};

/// Top-level error type for QuoteMe operations.
#[derive(Debug, thiserror::Error)]
pub enum QuotemeError {
    #[error("Resource error: {message}")]
    Resource { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type alias using QuotemeError.
pub type QuotemeResult<T> = Result<T, QuotemeError>;

impl QuotemeError {
    pub fn resource(msg: impl Into<String>) -> Self {
        Self::Resource {
            message: msg.into(),
        }
    }

    /// Error for a failed read of `path`.
    pub fn read(path: &Path, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            Self::FileNotFound {
                path: path.to_path_buf(),
            }
        } else {
            Self::resource(format!("{}: {err}", path.display()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_errors() {
        let missing = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = QuotemeError::read(Path::new("/tmp/missing.png"), missing);
        assert!(matches!(err, QuotemeError::FileNotFound { .. }));
        assert_eq!(err.to_string(), "File not found: /tmp/missing.png");

        let denied = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = QuotemeError::read(Path::new("/root/bg.png"), denied);
        assert_eq!(err.to_string(), "Resource error: /root/bg.png: denied");
    }

    #[test]
    fn test_io_conversion() {
        fn fails() -> QuotemeResult<()> {
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"))?;
            Ok(())
        }
        assert!(matches!(fails(), Err(QuotemeError::Io(_))));
    }
}
