//! The asset record shared by both container formats

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Longest asset name, in UTF-8 bytes.
pub const MAX_NAME_LEN: usize = 128;

/// Metadata for one named blob inside a container.
///
/// `offset` is an absolute file position for pack containers and a logical
/// position across the data file sequence for dat containers. Empty assets
/// conventionally carry offset 0.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Asset {
    pub name: String,
    pub offset: u64,
    pub size: u32,
    pub crc32: u32,
}

impl Asset {
    #[must_use]
    pub fn new(name: impl Into<String>, offset: u64, size: u32, crc32: u32) -> Self {
        Self {
            name: name.into(),
            offset,
            size,
            crc32,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// One past the last content byte.
    #[must_use]
    pub fn end(&self) -> u64 {
        self.offset + u64::from(self.size)
    }
}

/// Check a name against the index limits before anything is written.
pub(crate) fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::EmptyName);
    }
    if name.len() > MAX_NAME_LEN {
        return Err(Error::NameTooLong {
            name: name.to_string(),
            length: name.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_end() {
        let asset = Asset::new("a.txt", 8192, 5, 0x3610_A686);
        assert_eq!(asset.end(), 8197);
        assert!(!asset.is_empty());
    }

    #[test]
    fn test_name_limits_are_bytes_not_chars() {
        assert!(validate_name(&"é".repeat(64)).is_ok());
        assert!(matches!(
            validate_name(&"é".repeat(65)),
            Err(Error::NameTooLong { length: 130, .. })
        ));
        assert!(matches!(validate_name(""), Err(Error::EmptyName)));
    }
}
