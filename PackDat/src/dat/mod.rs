//! `.dat` container reader/writer
//!
//! A dat container is a little-endian manifest of fixed 148-byte records
//! plus an ordered sequence of raw data files holding the content:
//!
//! ``` text
//!     {prefix}_manifest.dat
//!         for each asset
//!             +------------------+----------------+-----------------------------+
//!             |   name_len       |    4 bytes     |   1..=128 (signed)          |
//!             |   name           |    128 bytes   |   UTF-8, zero padded        |
//!             |   offset         |    8 bytes     |   logical, >= 0, 0 if empty |
//!             |   size           |    4 bytes     |   _                         |
//!             |   crc32          |    4 bytes     |   _                         |
//!             +------------------+----------------+-----------------------------+
//!
//!     {prefix}_000.dat, {prefix}_001.dat, ...
//!         raw content, no header, each at most 209,715,200 bytes
//! ```
//!
//! Logical offset `o` lives in data file `o / cap` at address `o % cap`.
//! Every data file but the last is exactly `cap` bytes long, so content
//! may run off the end of one file and continue at the start of the next.

mod manifest;
mod reader;
mod sequence;
mod writer;

pub use manifest::{read_manifest, record_bytes};
pub use reader::{DatReader, SpanningReader};
pub use sequence::{data_file_path, data_file_prefix, discover_data_files, manifest_path_for};
pub(crate) use sequence::data_file_index;
pub use writer::DatWriter;

/// Size of one manifest record.
pub const RECORD_SIZE: u64 = 148;

/// Width of the zero-padded name field.
pub const NAME_FIELD_SIZE: usize = 128;

/// Size cap of one data file: 200 MiB.
pub const DATA_FILE_CAP: u64 = 209_715_200;

/// Suffix that marks a manifest file.
pub const MANIFEST_SUFFIX: &str = "_manifest.dat";

/// Extension shared by manifests and data files.
pub const DAT_EXTENSION: &str = "dat";

/// Map a logical offset to `(data file index, address in that file)`.
#[must_use]
pub fn locate(offset: u64, cap: u64) -> (usize, u64) {
    ((offset / cap) as usize, offset % cap)
}
