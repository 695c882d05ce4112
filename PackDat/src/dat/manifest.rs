//! Manifest record encoding for `.dat` containers

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use super::{NAME_FIELD_SIZE, RECORD_SIZE};
use crate::asset::{Asset, MAX_NAME_LEN};
use crate::cancel::CancellationToken;
use crate::endian::{ByteOrder, EndianReader, EndianWriter};
use crate::error::{Error, Result};

/// Decode every record of the manifest at `path`, in file order.
///
/// # Errors
///
/// Returns [`Error::MalformedManifest`] if the file length is not a whole
/// number of records, and [`Error::MalformedRecord`] for a name length
/// outside 1..=128 or a negative offset.
pub fn read_manifest(path: impl AsRef<Path>) -> Result<Vec<Asset>> {
    read_manifest_cancellable(path.as_ref(), &CancellationToken::new())
}

pub(crate) fn read_manifest_cancellable(
    path: &Path,
    cancel: &CancellationToken,
) -> Result<Vec<Asset>> {
    let file = File::open(path)?;
    let length = file.metadata()?.len();
    check_length(path, length)?;

    let count = length / RECORD_SIZE;
    let mut reader = EndianReader::new(BufReader::new(file), ByteOrder::Little)
        .with_source(path.display().to_string());
    let mut assets = Vec::with_capacity(count as usize);
    for _ in 0..count {
        cancel.check()?;
        assets.push(read_record(&mut reader)?);
    }

    tracing::debug!("Read {} records from {}", assets.len(), path.display());
    Ok(assets)
}

/// Fail with [`Error::MalformedManifest`] unless `length % 148 == 0`.
pub(crate) fn check_length(path: &Path, length: u64) -> Result<()> {
    if length % RECORD_SIZE != 0 {
        return Err(Error::MalformedManifest {
            path: path.to_path_buf(),
            length,
        });
    }
    Ok(())
}

/// Read one 148-byte record.
pub(crate) fn read_record<R: Read>(reader: &mut EndianReader<R>) -> Result<Asset> {
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
    reader.skip((NAME_FIELD_SIZE - name_len) as u64)?;

    let offset_position = reader.position();
    let offset = reader.read_i64()?;
    let offset = u64::try_from(offset).map_err(|_| {
        Error::malformed(
            reader.source(),
            offset_position,
            format!("negative offset {offset}"),
        )
    })?;
    let size = reader.read_u32()?;
    let crc32 = reader.read_u32()?;
    Ok(Asset::new(name, offset, size, crc32))
}

/// Encode `asset` as one 148-byte record.
pub fn record_bytes(asset: &Asset) -> Result<Vec<u8>> {
    let offset = i64::try_from(asset.offset).map_err(|_| Error::CapacityExceeded {
        name: asset.name.clone(),
        limit: i64::MAX as u64,
    })?;

    let mut writer = EndianWriter::new(
        Vec::with_capacity(RECORD_SIZE as usize),
        ByteOrder::Little,
    );
    writer.write_prefixed_string(&asset.name, MAX_NAME_LEN)?;
    writer.write_zeros((NAME_FIELD_SIZE - asset.name.len()) as u64)?;
    writer.write_i64(offset)?;
    writer.write_u32(asset.size)?;
    writer.write_u32(asset.crc32)?;
    Ok(writer.into_inner())
}
