//! Path classification: which codec handles a file and which asset
//! category it belongs to

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::dat::{self, MANIFEST_SUFFIX, manifest_path_for};
use crate::error::{Error, Result};
use crate::pack::{PACK_SUFFIX, TEMP_SUFFIX};

/// On-disk encoding of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContainerFormat {
    Pack,
    Dat,
}

impl fmt::Display for ContainerFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pack => write!(f, "pack"),
            Self::Dat => write!(f, "dat"),
        }
    }
}

/// What the classifier knows about a container path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerTag {
    pub format: ContainerFormat,
    /// An interrupted pack write (`*.pack.temp`), pending recovery.
    pub temp: bool,
    /// Logical asset category, taken from the file name.
    pub category: String,
    /// The parent directory is named after the category.
    pub in_category_dir: bool,
    /// The file a codec opens: the pack itself or the dat manifest.
    pub primary: PathBuf,
}

impl ContainerTag {
    pub fn is_pack(&self) -> bool {
        self.format == ContainerFormat::Pack
    }

    pub fn is_dat(&self) -> bool {
        self.format == ContainerFormat::Dat
    }
}

/// Classify a container path by its suffix.
///
/// | file name | format | primary |
/// |---|---|---|
/// | `ui.pack` | pack | itself |
/// | `ui.pack.temp` | pack, temp | itself |
/// | `ui_manifest.dat` | dat | itself |
/// | `ui_003.dat` | dat | `ui_manifest.dat` |
///
/// # Errors
///
/// Returns [`Error::UnknownContainer`] for anything else.
pub fn classify(path: impl AsRef<Path>) -> Result<ContainerTag> {
    let path = path.as_ref();
    let unknown = || Error::UnknownContainer {
        path: path.to_path_buf(),
    };
    let file_name = path.file_name().and_then(|n| n.to_str()).ok_or_else(unknown)?;
    let lower = file_name.to_ascii_lowercase();
    let dir = path.parent().unwrap_or_else(|| Path::new(""));

    let (format, temp, category, primary) = if lower.ends_with(TEMP_SUFFIX) {
        let stem = &file_name[..file_name.len() - TEMP_SUFFIX.len()];
        (ContainerFormat::Pack, true, stem, path.to_path_buf())
    } else if lower.ends_with(PACK_SUFFIX) {
        let stem = &file_name[..file_name.len() - PACK_SUFFIX.len()];
        (ContainerFormat::Pack, false, stem, path.to_path_buf())
    } else if lower.ends_with(MANIFEST_SUFFIX) {
        let stem = &file_name[..file_name.len() - MANIFEST_SUFFIX.len()];
        (ContainerFormat::Dat, false, stem, path.to_path_buf())
    } else if let Some(stem) = data_file_stem(file_name) {
        (ContainerFormat::Dat, false, stem, manifest_path_for(dir, stem))
    } else {
        return Err(unknown());
    };

    if category.is_empty() {
        return Err(unknown());
    }

    let in_category_dir = dir
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|d| d.eq_ignore_ascii_case(category));

    Ok(ContainerTag {
        format,
        temp,
        category: category.to_string(),
        in_category_dir,
        primary,
    })
}

/// Ordered data files of a dat manifest.
pub fn data_files(manifest: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    dat::discover_data_files(manifest.as_ref())
}

/// `ui_003.dat` -> `ui`
fn data_file_stem(file_name: &str) -> Option<&str> {
    let (stem, _) = file_name.rsplit_once('_')?;
    dat::data_file_index(file_name, stem).map(|_| stem)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_and_temp() {
        let tag = classify("assets/textures/textures.pack").unwrap();
        assert_eq!(tag.format, ContainerFormat::Pack);
        assert!(!tag.temp);
        assert_eq!(tag.category, "textures");
        assert!(tag.in_category_dir);

        let tag = classify("audio.PACK.TEMP").unwrap();
        assert!(tag.is_pack());
        assert!(tag.temp);
        assert_eq!(tag.category, "audio");
        assert!(!tag.in_category_dir);
    }

    #[test]
    fn test_dat_manifest_and_data_file() {
        let tag = classify("data/ui_manifest.dat").unwrap();
        assert!(tag.is_dat());
        assert_eq!(tag.category, "ui");
        assert_eq!(tag.primary, PathBuf::from("data/ui_manifest.dat"));

        let tag = classify("data/ui_003.dat").unwrap();
        assert!(tag.is_dat());
        assert_eq!(tag.category, "ui");
        assert_eq!(tag.primary, PathBuf::from("data/ui_manifest.dat"));
    }

    #[test]
    fn test_unknown() {
        for path in ["notes.txt", "ui_3.dat", ".pack", "_manifest.dat"] {
            assert!(
                matches!(classify(path), Err(Error::UnknownContainer { .. })),
                "{path}"
            );
        }
    }
}
