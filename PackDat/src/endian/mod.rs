//! Byte-order aware primitive I/O
//!
//! Both container formats are built from the same handful of primitives:
//! fixed-width integers, length-prefixed UTF-8 names and raw byte runs.
//! Pack files store them big-endian, dat manifests little-endian, so the
//! order is fixed once per reader/writer and applied to every call.
//!
//! Short reads surface as [`Error::UnexpectedEof`] carrying the source name
//! and the byte position where the failed read started, which is what the
//! recovery scanner keys on.
//!
//! [`Error::UnexpectedEof`]: crate::Error::UnexpectedEof

mod decimal;
mod reader;
mod writer;

pub use decimal::Decimal128;
pub use reader::EndianReader;
pub use writer::EndianWriter;

use serde::{Deserialize, Serialize};

/// Label used in errors when a reader was not given a file name.
pub const UNNAMED_SOURCE: &str = "<stream>";

/// Byte order of every multi-byte field read or written by one instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ByteOrder {
    /// Least significant byte first (dat manifests).
    #[default]
    Little,
    /// Most significant byte first (pack files).
    Big,
}

impl ByteOrder {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ByteOrder::Little => "little-endian",
            ByteOrder::Big => "big-endian",
        }
    }
}

/// Reject integer widths `byteorder` cannot handle.
fn check_width(nbytes: usize) -> std::io::Result<()> {
    if (1..=8).contains(&nbytes) {
        Ok(())
    } else {
        Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("integer width must be 1-8 bytes, got {nbytes}"),
        ))
    }
}
