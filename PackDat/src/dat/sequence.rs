//! Data file naming and discovery
//!
//! `textures_manifest.dat` owns `textures_000.dat`, `textures_001.dat`, ...
//! (three digits minimum, more once the sequence passes 999).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::{DAT_EXTENSION, MANIFEST_SUFFIX};
use crate::error::{Error, Result};

/// Split a manifest path into its directory and data file prefix.
///
/// `assets/textures_manifest.dat` -> (`assets`, `textures`)
pub fn data_file_prefix(manifest: &Path) -> Option<(PathBuf, String)> {
    let file_name = manifest.file_name()?.to_str()?;
    let lower = file_name.to_ascii_lowercase();
    if !lower.ends_with(MANIFEST_SUFFIX) {
        return None;
    }
    let prefix = &file_name[..file_name.len() - MANIFEST_SUFFIX.len()];
    let dir = manifest.parent().unwrap_or_else(|| Path::new("")).to_path_buf();
    Some((dir, prefix.to_string()))
}

/// Path of data file `index` belonging to `manifest`.
pub fn data_file_path(manifest: &Path, index: usize) -> Option<PathBuf> {
    let (dir, prefix) = data_file_prefix(manifest)?;
    Some(dir.join(format!("{prefix}_{index:03}.{DAT_EXTENSION}")))
}

/// Manifest path for a data file prefix in `dir`.
pub fn manifest_path_for(dir: &Path, prefix: &str) -> PathBuf {
    dir.join(format!("{prefix}{MANIFEST_SUFFIX}"))
}

/// Parse `{prefix}_NNN.dat` into `NNN`.
pub(crate) fn data_file_index(file_name: &str, prefix: &str) -> Option<usize> {
    let rest = file_name.strip_prefix(prefix)?.strip_prefix('_')?;
    let (digits, ext) = rest.rsplit_once('.')?;
    if !ext.eq_ignore_ascii_case(DAT_EXTENSION)
        || digits.len() < 3
        || !digits.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }
    digits.parse().ok()
}

/// Find the data files of `manifest`, in sequence order.
///
/// Only the unbroken run starting at `_000` is returned; files after a gap
/// cannot be addressed and are reported in the log.
pub fn discover_data_files(manifest: &Path) -> Result<Vec<PathBuf>> {
    let (dir, prefix) = data_file_prefix(manifest).ok_or_else(|| Error::UnknownContainer {
        path: manifest.to_path_buf(),
    })?;
    let search_dir = if dir.as_os_str().is_empty() {
        Path::new(".")
    } else {
        dir.as_path()
    };
    if !search_dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut found = BTreeMap::new();
    for entry in WalkDir::new(search_dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(std::result::Result::ok)
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str() else {
            continue;
        };
        if let Some(index) = data_file_index(name, &prefix) {
            found.insert(index, entry.path().to_path_buf());
        }
    }

    let mut files = Vec::with_capacity(found.len());
    for (expected, (index, path)) in found.into_iter().enumerate() {
        if index != expected {
            tracing::warn!(
                "Data file sequence for {} stops at {expected}; ignoring {}",
                manifest.display(),
                path.display()
            );
            break;
        }
        files.push(path);
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_prefix_and_paths() {
        let manifest = Path::new("assets/textures_manifest.dat");
        let (dir, prefix) = data_file_prefix(manifest).unwrap();
        assert_eq!(dir, PathBuf::from("assets"));
        assert_eq!(prefix, "textures");
        assert_eq!(
            data_file_path(manifest, 7).unwrap(),
            PathBuf::from("assets/textures_007.dat")
        );
        assert_eq!(
            data_file_path(manifest, 1234).unwrap(),
            PathBuf::from("assets/textures_1234.dat")
        );
        assert!(data_file_prefix(Path::new("textures_000.dat")).is_none());
    }

    #[test]
    fn test_data_file_index() {
        assert_eq!(data_file_index("audio_000.dat", "audio"), Some(0));
        assert_eq!(data_file_index("audio_012.DAT", "audio"), Some(12));
        assert_eq!(data_file_index("audio_12.dat", "audio"), None);
        assert_eq!(data_file_index("audio_manifest.dat", "audio"), None);
        assert_eq!(data_file_index("audio_001_000.dat", "audio"), None);
        assert_eq!(data_file_index("audiox_000.dat", "audio"), None);
    }

    #[test]
    fn test_discovery_stops_at_gap() {
        let dir = tempdir().unwrap();
        for name in [
            "ui_manifest.dat",
            "ui_000.dat",
            "ui_001.dat",
            "ui_003.dat",
            "other_000.dat",
        ] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        let files = discover_data_files(&dir.path().join("ui_manifest.dat")).unwrap();
        assert_eq!(
            files,
            vec![dir.path().join("ui_000.dat"), dir.path().join("ui_001.dat")]
        );
    }
}
