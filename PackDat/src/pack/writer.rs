//! `.pack` writer: append-only content with an incrementally spliced index

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::types::entry_bytes;
use super::{CHUNK_HEADER_SIZE, CHUNK_SIZE, ChunkHeader, PACK_LIMIT, PackReader, entry_size};
use crate::asset::{Asset, validate_name};
use crate::checksum::copy_with_crc;
use crate::error::{Error, Result};
use crate::options::ContainerOptions;

/// Writer session over one pack file.
///
/// Content is always appended at end of file. Each entry is written into
/// the current chunk straight away; the chunk's header is only written when
/// the chunk is sealed (roll-over or [`PackWriter::finish`]). Dropping an
/// unfinished writer finishes it best-effort.
pub struct PackWriter {
    file: File,
    path: PathBuf,
    /// Offset of the chunk receiving entries.
    chunk_offset: u64,
    /// Header plus entries already in the current chunk.
    chunk_used: u64,
    /// Entries in the current chunk.
    chunk_assets: u32,
    /// Where the next content byte goes; always the logical end of file.
    content_end: u64,
    buffer_size: usize,
    assets_written: usize,
    finished: bool,
}

impl PackWriter {
    /// Create (or truncate) a pack file and reserve its first chunk.
    pub fn create(path: impl AsRef<Path>, options: &ContainerOptions) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        reserve_chunk(&mut file, 0)?;

        tracing::info!("Creating pack {}", path.display());

        Ok(Self {
            file,
            path: path.to_path_buf(),
            chunk_offset: 0,
            chunk_used: CHUNK_HEADER_SIZE,
            chunk_assets: 0,
            content_end: CHUNK_SIZE,
            buffer_size: options.copy_buffer_size,
            assets_written: 0,
            finished: false,
        })
    }

    /// Resume writing after the last asset of an existing pack.
    ///
    /// A missing or empty file is created instead.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedChunk`] if any existing chunk holds more
    /// entries than fit in 8192 bytes, plus anything the chain walk reports.
    pub fn append(path: impl AsRef<Path>, options: &ContainerOptions) -> Result<Self> {
        let path = path.as_ref();
        let len = match std::fs::metadata(path) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => 0,
            Err(e) => return Err(e.into()),
        };
        if len == 0 {
            return Self::create(path, options);
        }

        let chunks = PackReader::open(path)?.read_chunks()?;
        for chunk in &chunks {
            let used = chunk.used_size();
            if used > CHUNK_SIZE {
                return Err(Error::MalformedChunk {
                    path: path.to_path_buf(),
                    offset: chunk.offset,
                    reason: format!("{used} bytes of entries in an {CHUNK_SIZE} byte chunk"),
                });
            }
        }
        // read_chunks always yields at least the first chunk
        let Some(tail) = chunks.last() else {
            return Self::create(path, options);
        };

        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let content_end = len.max(tail.offset + CHUNK_SIZE);

        tracing::info!(
            "Appending to pack {} ({} chunks, tail at {} with {} assets)",
            path.display(),
            chunks.len(),
            tail.offset,
            tail.assets.len()
        );

        Ok(Self {
            file,
            path: path.to_path_buf(),
            chunk_offset: tail.offset,
            chunk_used: tail.used_size(),
            chunk_assets: tail.assets.len() as u32,
            content_end,
            buffer_size: options.copy_buffer_size,
            assets_written: 0,
            finished: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Assets written during this session.
    pub fn assets_written(&self) -> usize {
        self.assets_written
    }

    /// Append one asset, streaming its content from `content`.
    ///
    /// On error nothing from this call stays indexed and the writer can
    /// keep going with the next asset.
    pub fn write_asset<R: Read + ?Sized>(&mut self, name: &str, content: &mut R) -> Result<Asset> {
        validate_name(name)?;

        let entry_len = entry_size(name);
        if self.chunk_used + entry_len > CHUNK_SIZE {
            self.roll_over(name)?;
        }

        let start = self.content_end;
        let (crc32, size) = match self.write_content(start, content) {
            Ok(written) => written,
            Err(e) => {
                // Drop whatever part of the content made it to disk
                self.file.set_len(start)?;
                return Err(match e {
                    ContentError::Limit => Error::CapacityExceeded {
                        name: name.to_string(),
                        limit: PACK_LIMIT,
                    },
                    ContentError::Io(e) => Error::Io(e),
                });
            }
        };

        let offset = if size == 0 { 0 } else { start };
        let asset = Asset::new(name, offset, size as u32, crc32);

        let entry = entry_bytes(&asset)?;
        self.file
            .seek(SeekFrom::Start(self.chunk_offset + self.chunk_used))?;
        self.file.write_all(&entry)?;

        self.chunk_used += entry_len;
        self.chunk_assets += 1;
        self.content_end = start + size;
        self.assets_written += 1;

        tracing::debug!("Wrote {} ({} bytes at {})", asset.name, asset.size, asset.offset);
        Ok(asset)
    }

    /// Convenience for in-memory content.
    pub fn write_bytes(&mut self, name: &str, data: &[u8]) -> Result<Asset> {
        self.write_asset(name, &mut &data[..])
    }

    /// Seal the current chunk and start a new one at end of file.
    fn roll_over(&mut self, name: &str) -> Result<()> {
        let next = self.content_end;
        if next + CHUNK_SIZE > PACK_LIMIT {
            return Err(Error::CapacityExceeded {
                name: name.to_string(),
                limit: PACK_LIMIT,
            });
        }

        self.write_header(next as u32)?;
        reserve_chunk(&mut self.file, next)?;

        tracing::debug!(
            "Sealed chunk at {} with {} assets, next chunk at {next}",
            self.chunk_offset,
            self.chunk_assets
        );

        self.chunk_offset = next;
        self.chunk_used = CHUNK_HEADER_SIZE;
        self.chunk_assets = 0;
        self.content_end = next + CHUNK_SIZE;
        Ok(())
    }

    fn write_content<R: Read + ?Sized>(
        &mut self,
        start: u64,
        content: &mut R,
    ) -> std::result::Result<(u32, u64), ContentError> {
        self.file.seek(SeekFrom::Start(start))?;
        let mut bounded = BoundedWriter {
            inner: &mut self.file,
            remaining: PACK_LIMIT.saturating_sub(start),
            exceeded: false,
        };
        match copy_with_crc(content, &mut bounded, self.buffer_size) {
            Ok(written) => Ok(written),
            Err(_) if bounded.exceeded => Err(ContentError::Limit),
            Err(e) => Err(ContentError::Io(e)),
        }
    }

    fn write_header(&mut self, next_chunk_offset: u32) -> Result<()> {
        let header = ChunkHeader {
            next_chunk_offset,
            num_assets: self.chunk_assets,
        };
        self.file.seek(SeekFrom::Start(self.chunk_offset))?;
        self.file.write_all(&header.to_bytes()?)?;
        Ok(())
    }

    /// Terminate the chain and flush. Consumes the session.
    pub fn finish(mut self) -> Result<()> {
        self.finalize()
    }

    fn finalize(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;

        if self.chunk_assets > 0 {
            self.write_header(0)?;
        }
        self.file.flush()?;

        tracing::info!(
            "Finished pack {}: {} assets written",
            self.path.display(),
            self.assets_written
        );
        Ok(())
    }
}

impl Drop for PackWriter {
    fn drop(&mut self) {
        if let Err(e) = self.finalize() {
            tracing::warn!("Failed to finish pack {}: {}", self.path.display(), e);
        }
    }
}

/// Write a zeroed chunk reservation at `offset`.
fn reserve_chunk(file: &mut File, offset: u64) -> Result<()> {
    file.seek(SeekFrom::Start(offset))?;
    io::copy(&mut io::repeat(0).take(CHUNK_SIZE), file)?;
    Ok(())
}

enum ContentError {
    Limit,
    Io(io::Error),
}

impl From<io::Error> for ContentError {
    fn from(e: io::Error) -> Self {
        ContentError::Io(e)
    }
}

/// Refuses writes that would push content past the 32-bit limit.
struct BoundedWriter<'a, W: Write> {
    inner: &'a mut W,
    remaining: u64,
    exceeded: bool,
}

impl<W: Write> Write for BoundedWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.len() as u64 > self.remaining {
            self.exceeded = true;
            return Err(io::Error::other("pack offset limit reached"));
        }
        let written = self.inner.write(buf)?;
        self.remaining -= written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pack::PackReader;
    use tempfile::tempdir;

    #[test]
    fn test_hello_and_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.pack");

        let mut writer = PackWriter::create(&path, &ContainerOptions::default()).unwrap();
        let a = writer.write_bytes("a.txt", b"hello").unwrap();
        let b = writer.write_bytes("b.txt", b"").unwrap();
        writer.finish().unwrap();

        assert_eq!(a, Asset::new("a.txt", 8192, 5, crc32fast::hash(b"hello")));
        assert_eq!(b, Asset::new("b.txt", 0, 0, 0));

        let mut reader = PackReader::open(&path).unwrap();
        assert_eq!(reader.list_assets().unwrap(), vec![a.clone(), b]);
        assert_eq!(reader.read_asset(&a).unwrap(), b"hello");
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 8197);
    }

    #[test]
    fn test_name_errors_keep_writer_usable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("names.pack");

        let mut writer = PackWriter::create(&path, &ContainerOptions::default()).unwrap();
        let long = "n".repeat(129);
        assert!(matches!(
            writer.write_bytes(&long, b"x"),
            Err(Error::NameTooLong { .. })
        ));
        assert!(matches!(writer.write_bytes("", b"x"), Err(Error::EmptyName)));
        writer.write_bytes("ok", b"x").unwrap();
        writer.finish().unwrap();

        let assets = PackReader::open(&path).unwrap().list_assets().unwrap();
        assert_eq!(assets.len(), 1);
        assert_eq!(assets[0].offset, 8192);
    }

    #[test]
    fn test_failed_source_rolls_back_content() {
        struct Failing(usize);
        impl Read for Failing {
            fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
                if self.0 == 0 {
                    return Err(io::Error::other("source broke"));
                }
                let n = self.0.min(buf.len());
                buf[..n].fill(7);
                self.0 -= n;
                Ok(n)
            }
        }

        let dir = tempdir().unwrap();
        let path = dir.path().join("rollback.pack");
        let mut writer = PackWriter::create(&path, &ContainerOptions::default()).unwrap();
        assert!(matches!(
            writer.write_asset("broken", &mut Failing(100)),
            Err(Error::Io(_))
        ));
        let ok = writer.write_bytes("ok", b"abc").unwrap();
        writer.finish().unwrap();

        assert_eq!(ok.offset, 8192);
        let mut reader = PackReader::open(&path).unwrap();
        assert_eq!(reader.list_assets().unwrap(), vec![ok.clone()]);
        assert_eq!(reader.read_asset(&ok).unwrap(), b"abc");
    }

    #[test]
    fn test_capacity_exceeded_keeps_writer_usable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("full.pack");
        let options = ContainerOptions::default();
        PackWriter::create(&path, &options).unwrap().finish().unwrap();

        // Sparse: content ends 5 bytes short of the 32-bit limit
        let near_limit = PACK_LIMIT - 5;
        OpenOptions::new()
            .write(true)
            .open(&path)
            .unwrap()
            .set_len(near_limit)
            .unwrap();

        let mut writer = PackWriter::append(&path, &options).unwrap();
        assert!(matches!(
            writer.write_bytes("too_big", &[1u8; 10]),
            Err(Error::CapacityExceeded { name, limit: PACK_LIMIT }) if name == "too_big"
        ));
        assert_eq!(std::fs::metadata(&path).unwrap().len(), near_limit);

        let fits = writer.write_bytes("fits", &[2u8; 5]).unwrap();
        let empty = writer.write_bytes("empty", b"").unwrap();
        writer.finish().unwrap();

        assert_eq!(fits.offset, near_limit);
        assert_eq!(empty.offset, 0);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), PACK_LIMIT);

        let mut reader = PackReader::open(&path).unwrap();
        assert_eq!(reader.list_assets().unwrap(), vec![fits.clone(), empty]);
        assert_eq!(reader.read_asset(&fits).unwrap(), [2u8; 5]);
    }

    #[test]
    fn test_drop_finishes_chain() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("drop.pack");
        {
            let mut writer = PackWriter::create(&path, &ContainerOptions::default()).unwrap();
            writer.write_bytes("a", b"1").unwrap();
        }
        let assets = PackReader::open(&path).unwrap().list_assets().unwrap();
        assert_eq!(assets.len(), 1);
    }

    #[test]
    fn test_append_resumes_tail_chunk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("append.pack");
        let options = ContainerOptions::default();

        let mut writer = PackWriter::create(&path, &options).unwrap();
        writer.write_bytes("first", b"one").unwrap();
        writer.finish().unwrap();

        let mut writer = PackWriter::append(&path, &options).unwrap();
        let second = writer.write_bytes("second", b"two").unwrap();
        writer.finish().unwrap();

        assert_eq!(second.offset, 8192 + 3);
        let mut reader = PackReader::open(&path).unwrap();
        let chunks = reader.read_chunks().unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].assets.len(), 2);
        assert_eq!(reader.read_asset(&second).unwrap(), b"two");
    }

    #[test]
    fn test_append_rejects_overfull_chunk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("overfull.pack");

        // 400 entries of 16 + 8 bytes do not fit in one chunk
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&0u32.to_be_bytes());
        bytes.extend_from_slice(&400u32.to_be_bytes());
        for i in 0..400 {
            bytes.extend_from_slice(&8i32.to_be_bytes());
            bytes.extend_from_slice(format!("n{i:07}").as_bytes());
            bytes.extend_from_slice(&[0u8; 12]);
        }
        std::fs::write(&path, &bytes).unwrap();

        assert!(matches!(
            PackWriter::append(&path, &ContainerOptions::default()),
            Err(Error::MalformedChunk { offset: 0, .. })
        ));
    }
}
