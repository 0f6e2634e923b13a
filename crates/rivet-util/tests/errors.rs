use rivet_util::errors::RivetError;

#[test]
fn test_io_error_display() {
    let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
    let err = RivetError::from(io_err);
    assert!(err.to_string().contains("I/O error"), "got: {err}");
}

#[test]
fn test_manifest_error_display() {
    let err = RivetError::Manifest {
        message: "bad syntax".to_string(),
    };
    assert_eq!(err.to_string(), "Manifest error: bad syntax");
}

#[test]
fn test_request_error_display() {
    let err = RivetError::Request {
        message: "unknown framework 'foo1.0'".to_string(),
    };
    assert_eq!(
        err.to_string(),
        "Invalid restore request: unknown framework 'foo1.0'"
    );
}

#[test]
fn test_resolution_error_display() {
    let err = RivetError::Resolution {
        message: "1 target graph failed".to_string(),
    };
    assert_eq!(err.to_string(), "Restore failed: 1 target graph failed");
}

#[test]
fn test_version_error_display() {
    let err = RivetError::Version {
        message: "'1.x' is not a version".to_string(),
    };
    assert_eq!(err.to_string(), "Invalid version: '1.x' is not a version");
}

#[test]
fn test_cancelled_display() {
    assert_eq!(RivetError::Cancelled.to_string(), "Restore cancelled");
}

#[test]
fn test_generic_error_display() {
    let err = RivetError::Generic {
        message: "something broke".to_string(),
    };
    assert_eq!(err.to_string(), "something broke");
}

#[test]
fn test_io_error_from_conversion() {
    let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
    let err: RivetError = io_err.into();
    assert!(matches!(err, RivetError::Io(_)));
}
