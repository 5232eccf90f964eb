//! Startup requirement validation for process-stats-exporter.
//!
//! Validates that the exporter can read the proc filesystem before it starts
//! serving.

use nix::unistd::geteuid;
use std::fs;
use std::path::Path;
use tracing::{error, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Insufficient permissions: {0}")]
    InsufficientPermissions(String),

    #[error("proc filesystem not found at {0}")]
    ProcNotFound(String),
}

/// Validate all runtime requirements
pub fn validate_requirements(proc_root: &Path) -> Result<(), ValidationError> {
    info!("🔍 Validating runtime requirements...");

    check_user_privileges();
    check_proc_access(proc_root)?;

    info!("✅ All runtime requirements validated");
    Ok(())
}

/// Check if running with sufficient privileges
fn check_user_privileges() {
    if !geteuid().is_root() {
        warn!("⚠️  Not running as root - processes of other users may be unreadable");
    } else {
        info!("✅ Running as root (uid=0)");
    }
}

/// Check that `<proc_root>/1/status` is readable.
fn check_proc_access(proc_root: &Path) -> Result<(), ValidationError> {
    if !proc_root.is_dir() {
        error!("❌ {} is not a directory", proc_root.display());
        return Err(ValidationError::ProcNotFound(
            proc_root.display().to_string(),
        ));
    }

    let test_file = proc_root.join("1").join("status");
    match fs::read_to_string(&test_file) {
        Ok(_) => {
            info!("✅ proc access: can read {}", test_file.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            error!(
                "❌ Cannot read {} - insufficient permissions",
                test_file.display()
            );
            error!("   Processes owned by other users will report missing values");
            Err(ValidationError::InsufficientPermissions(e.to_string()))
        }
        Err(e) => {
            warn!("⚠️  Could not test proc access: {}", e);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_proc_root() {
        let err = validate_requirements(Path::new("/nonexistent/proc")).unwrap_err();
        assert!(matches!(err, ValidationError::ProcNotFound(_)));
    }

    #[test]
    fn test_readable_proc_root() {
        let dir = tempdir().unwrap();
        let pid_dir = dir.path().join("1");
        fs::create_dir(&pid_dir).unwrap();
        fs::write(pid_dir.join("status"), "Name:\tinit\n").unwrap();
        assert!(validate_requirements(dir.path()).is_ok());
    }

    #[test]
    fn test_absent_init_is_not_fatal() {
        let dir = tempdir().unwrap();
        assert!(validate_requirements(dir.path()).is_ok());
    }
}
