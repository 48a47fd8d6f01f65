use std::fmt;

#[derive(Debug)]
pub enum TrimlineError {
    /// Rasterization could not produce an image: zero-dimension source,
    /// canvas allocation failure, or an undecodable embedded asset.
    Capture(String),
    /// Contract violation in configuration or planner inputs. Fail fast,
    /// never loop on degenerate geometry.
    InvalidConfiguration(String),
    /// A page slice failed to convert to an embeddable image. Aborts the
    /// remaining slices; no partial document is emitted.
    Compositing(String),
    Io(std::io::Error),
}

impl fmt::Display for TrimlineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrimlineError::Capture(message) => write!(f, "capture failed: {}", message),
            TrimlineError::InvalidConfiguration(message) => {
                write!(f, "invalid configuration: {}", message)
            }
            TrimlineError::Compositing(message) => {
                write!(f, "compositing failed: {}", message)
            }
            TrimlineError::Io(err) => write!(f, "io error: {}", err),
        }
    }
}

impl std::error::Error for TrimlineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TrimlineError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for TrimlineError {
    fn from(value: std::io::Error) -> Self {
        TrimlineError::Io(value)
    }
}
