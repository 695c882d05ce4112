//! Chunk and index entry encoding for `.pack` files

use std::io::Read;

use super::{CHUNK_HEADER_SIZE, entry_size};
use crate::asset::{Asset, MAX_NAME_LEN};
use crate::endian::{ByteOrder, EndianReader, EndianWriter};
use crate::error::{Error, Result};

/// Header at the start of every chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct ChunkHeader {
    pub next_chunk_offset: u32,
    pub num_assets: u32,
}

impl ChunkHeader {
    pub fn read<R: Read>(reader: &mut EndianReader<R>) -> Result<Self> {
        let next_chunk_offset = reader.read_u32()?;
        let num_assets = reader.read_u32()?;
        Ok(Self {
            next_chunk_offset,
            num_assets,
        })
    }

    pub fn to_bytes(self) -> Result<Vec<u8>> {
        let mut writer = EndianWriter::new(Vec::with_capacity(8), ByteOrder::Big);
        writer.write_u32(self.next_chunk_offset)?;
        writer.write_u32(self.num_assets)?;
        Ok(writer.into_inner())
    }
}

/// Read one index entry, validating the name length.
pub(crate) fn read_entry<R: Read>(reader: &mut EndianReader<R>) -> Result<Asset> {
    let start = reader.position();
    let name_len = reader.read_i32()?;
    let name_len = usize::try_from(name_len)
        .ok()
        .filter(|len| (1..=MAX_NAME_LEN).contains(len))
        .ok_or_else(|| {
            Error::malformed(
                reader.source(),
                start,
                format!("name length {name_len} outside 1..={MAX_NAME_LEN}"),
            )
        })?;
    let name = reader.read_utf8(name_len)?;
    let offset = reader.read_u32()?;
    let size = reader.read_u32()?;
    let crc32 = reader.read_u32()?;
    Ok(Asset::new(name, u64::from(offset), size, crc32))
}

/// Encode one index entry. The caller has already checked that offset and
/// end both fit in 32 bits.
pub(crate) fn entry_bytes(asset: &Asset) -> Result<Vec<u8>> {
    let mut writer = EndianWriter::new(
        Vec::with_capacity(entry_size(&asset.name) as usize),
        ByteOrder::Big,
    );
    writer.write_prefixed_string(&asset.name, MAX_NAME_LEN)?;
    writer.write_u32(asset.offset as u32)?;
    writer.write_u32(asset.size)?;
    writer.write_u32(asset.crc32)?;
    Ok(writer.into_inner())
}

/// One decoded chunk of the index chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackChunk {
    /// Offset of the chunk header in the file.
    pub offset: u64,
    /// Offset of the next chunk, 0 for the tail.
    pub next_chunk_offset: u32,
    /// Entries in file order.
    pub assets: Vec<Asset>,
}

impl PackChunk {
    pub fn is_tail(&self) -> bool {
        self.next_chunk_offset == 0
    }

    /// Header plus every entry, in bytes.
    pub fn used_size(&self) -> u64 {
        CHUNK_HEADER_SIZE + self.assets.iter().map(|a| entry_size(&a.name)).sum::<u64>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_entry_layout() {
        let asset = Asset::new("a.txt", 8192, 5, 0x3610_A686);
        let bytes = entry_bytes(&asset).unwrap();
        assert_eq!(bytes.len(), 21);
        assert_eq!(&bytes[..4], &[0, 0, 0, 5]);
        assert_eq!(&bytes[4..9], b"a.txt");
        assert_eq!(&bytes[9..13], &[0, 0, 0x20, 0]);

        let mut reader = EndianReader::new(Cursor::new(&bytes), ByteOrder::Big);
        assert_eq!(read_entry(&mut reader).unwrap(), asset);
    }

    #[test]
    fn test_zero_name_length_rejected() {
        let bytes = [0u8; 16];
        let mut reader = EndianReader::new(Cursor::new(&bytes), ByteOrder::Big);
        assert!(matches!(
            read_entry(&mut reader),
            Err(Error::MalformedRecord { position: 0, .. })
        ));
    }

    #[test]
    fn test_used_size() {
        let chunk = PackChunk {
            offset: 0,
            next_chunk_offset: 0,
            assets: vec![Asset::new("ab", 0, 0, 0), Asset::new("cde", 0, 0, 0)],
        };
        assert_eq!(chunk.used_size(), 8 + 18 + 19);
        assert!(chunk.is_tail());
    }
}
