//! Process scanning utilities for discovering process entries under a proc root.

use std::fs;
use std::path::Path;
use tracing::warn;

/// Scans the proc root for directories with numeric names and returns their
/// pids in ascending order.
pub fn collect_pids(root: &Path) -> Vec<u32> {
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Failed to read {}: {}", root.display(), e);
            return Vec::new();
        }
    };

    let mut out: Vec<u32> = entries
        .flatten()
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| {
            let name = entry.file_name();
            let name = name.to_str()?;
            if !name.chars().all(|c| c.is_ascii_digit()) {
                return None;
            }
            name.parse().ok()
        })
        .collect();
    out.sort_unstable();
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_collect_pids_numeric_dirs_only() {
        let root = tempdir().unwrap();
        for name in ["300", "12", "self", "sys"] {
            fs::create_dir_all(root.path().join(name)).unwrap();
        }
        fs::write(root.path().join("42"), "not a dir").unwrap();

        assert_eq!(collect_pids(root.path()), vec![12, 300]);
    }

    #[test]
    fn test_collect_pids_missing_root() {
        let root = tempdir().unwrap();
        assert!(collect_pids(&root.path().join("nope")).is_empty());
    }
}
