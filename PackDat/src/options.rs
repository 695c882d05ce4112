//! Container configuration
//!
//! Format constants (chunk size, record size, name limit) are fixed by the
//! on-disk layout and live next to their codecs. The knobs here only change
//! how a session behaves.

use serde::{Deserialize, Serialize};

use crate::dat::DATA_FILE_CAP;

/// Default streaming block size: 64 KiB.
pub const DEFAULT_COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Options shared by every reader and writer session of a container.
///
/// # Example
///
/// ```
/// use packdat::ContainerOptions;
///
/// let options = ContainerOptions::new()
///     .with_data_file_cap(1024 * 1024)
///     .with_copy_buffer_size(16 * 1024);
/// assert_eq!(options.data_file_cap, 1024 * 1024);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerOptions {
    /// Size cap of each dat data file.
    ///
    /// Logical offsets are mapped with this value, so a container must be
    /// read back with the cap it was written with.
    pub data_file_cap: u64,

    /// Block size used when streaming content in and out.
    pub copy_buffer_size: usize,

    /// Delete dat data files past the last one a writer touched when it
    /// finishes.
    pub delete_unused_data_files: bool,
}

impl Default for ContainerOptions {
    fn default() -> Self {
        Self {
            data_file_cap: DATA_FILE_CAP,
            copy_buffer_size: DEFAULT_COPY_BUFFER_SIZE,
            delete_unused_data_files: true,
        }
    }
}

impl ContainerOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the dat data file cap. Zero is treated as 1.
    #[must_use]
    pub fn with_data_file_cap(mut self, cap: u64) -> Self {
        self.data_file_cap = cap.max(1);
        self
    }

    #[must_use]
    pub fn with_copy_buffer_size(mut self, size: usize) -> Self {
        self.copy_buffer_size = size.max(1);
        self
    }

    #[must_use]
    pub fn with_delete_unused_data_files(mut self, delete: bool) -> Self {
        self.delete_unused_data_files = delete;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_format() {
        let options = ContainerOptions::default();
        assert_eq!(options.data_file_cap, 209_715_200);
        assert_eq!(options.copy_buffer_size, 65536);
        assert!(options.delete_unused_data_files);
    }

    #[test]
    fn test_zero_values_clamped() {
        let options = ContainerOptions::new()
            .with_data_file_cap(0)
            .with_copy_buffer_size(0);
        assert_eq!(options.data_file_cap, 1);
        assert_eq!(options.copy_buffer_size, 1);
    }
}
