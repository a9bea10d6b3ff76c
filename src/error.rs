use thiserror::Error;

#[derive(Error, Debug)]
pub enum AdbError {
    /// Could not reach the ADB server, or I/O failed mid-command.
    #[error("connection error: {0}")]
    Connection(#[from] std::io::Error),

    /// The server answered a request with FAIL.
    #[error("adb server returned FAIL: {0}")]
    Remote(String),

    /// Wire bytes did not match the protocol grammar.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Textual command output did not match the expected shape.
    #[error("parse error: {0}")]
    Parse(String),

    /// The command ran but the device reported an error.
    #[error("device error: {0}")]
    Device(String),

    /// The operation was cancelled by the caller.
    #[error("operation cancelled")]
    Cancelled,

    /// The device has not authorized this host for debugging.
    #[error("device unauthorized: {0}")]
    Unauthorized(String),
}

pub type AdbResult<T> = Result<T, AdbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AdbError::Remote("device not found".into());
        assert_eq!(err.to_string(), "adb server returned FAIL: device not found");

        let err = AdbError::Cancelled;
        assert_eq!(err.to_string(), "operation cancelled");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "broken");
        let adb_err: AdbError = io_err.into();
        assert!(matches!(adb_err, AdbError::Connection(_)));
        assert!(adb_err.to_string().contains("broken"));
    }
}
