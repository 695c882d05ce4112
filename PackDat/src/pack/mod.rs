//! `.pack` container reader/writer
//!
//! A pack file is a single big-endian file whose index lives in a chain of
//! fixed 8192-byte chunks interleaved with content:
//!
//! ``` text
//!     Chunk (8192 bytes reserved, first one at offset 0)
//!         +----------------------+----------------+-----------------------------+
//!         |   next_chunk_offset  |    4 bytes     |   0 = last chunk            |
//!         |   num_assets         |    4 bytes     |   entries in this chunk     |
//!         +----------------------+----------------+-----------------------------+
//!         for 0 to num_assets
//!             +------------------+----------------+-----------------------------+
//!             |   name_len       |    4 bytes     |   1..=128 (signed)          |
//!             |   name           |    name_len    |   UTF-8, no terminator      |
//!             |   offset         |    4 bytes     |   absolute, 0 when empty    |
//!             |   size           |    4 bytes     |   _                         |
//!             |   crc32          |    4 bytes     |   _                         |
//!             +------------------+----------------+-----------------------------+
//!
//!     Content: raw asset bytes, appended after the chunk that indexes them.
//! ```
//!
//! Writers append content at end of file and splice each entry into the
//! current chunk; when an entry would not fit, the chunk header is sealed
//! with a pointer to a fresh chunk reserved at end of file.

mod reader;
mod types;
mod writer;

pub use reader::PackReader;
pub use types::PackChunk;
pub use writer::PackWriter;

pub(crate) use types::{ChunkHeader, read_entry};

/// File suffix of a complete pack.
pub const PACK_SUFFIX: &str = ".pack";

/// File suffix of a pack whose write was interrupted.
pub const TEMP_SUFFIX: &str = ".pack.temp";

/// Bytes reserved for every chunk.
pub const CHUNK_SIZE: u64 = 8192;

/// Chunk header: `next_chunk_offset` + `num_assets`.
pub const CHUNK_HEADER_SIZE: u64 = 8;

/// Fixed part of an index entry: `name_len`, `offset`, `size`, `crc32`.
pub const ENTRY_FIXED_SIZE: u64 = 16;

/// Offsets and sizes are 32-bit; nothing may end past this.
pub const PACK_LIMIT: u64 = u32::MAX as u64;

/// Encoded size of the index entry for `name`.
#[must_use]
pub fn entry_size(name: &str) -> u64 {
    ENTRY_FIXED_SIZE + name.len() as u64
}
