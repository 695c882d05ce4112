//! `.pack` reader: chunk chain decoding and random access

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::{Path, PathBuf};

use super::{ChunkHeader, PackChunk, read_entry};
use crate::asset::Asset;
use crate::cancel::CancellationToken;
use crate::endian::{ByteOrder, EndianReader};
use crate::error::{Error, Result};
use crate::options::DEFAULT_COPY_BUFFER_SIZE;

/// Upper bound on entries that fit in one chunk; caps preallocation when
/// a header's count is garbage.
const MAX_ENTRIES_PER_CHUNK: usize = 482;

/// Reads the index and content of one pack file.
pub struct PackReader<R: Read + Seek> {
    reader: EndianReader<BufReader<R>>,
    path: PathBuf,
    assets: Option<Vec<Asset>>,
}

impl PackReader<File> {
    /// Open a pack file for reading.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        Ok(Self::with_path(File::open(path)?, path))
    }
}

impl<R: Read + Seek> PackReader<R> {
    /// Create a reader from any seekable source.
    pub fn new(inner: R) -> Self {
        Self::with_path(inner, "<stream>")
    }

    /// Create a reader that names `path` in its errors.
    pub fn with_path(inner: R, path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let reader = EndianReader::new(BufReader::new(inner), ByteOrder::Big)
            .with_source(path.display().to_string());
        Self {
            reader,
            path,
            assets: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Walk the chunk chain from offset 0.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnexpectedEof`] if a header or entry is cut short,
    /// [`Error::MalformedRecord`] for a bad name length and
    /// [`Error::MalformedChunk`] if the chain loops back on itself.
    pub fn read_chunks(&mut self) -> Result<Vec<PackChunk>> {
        self.read_chunks_cancellable(&CancellationToken::new())
    }

    /// [`PackReader::read_chunks`], checking `cancel` before each chunk.
    pub fn read_chunks_cancellable(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<Vec<PackChunk>> {
        let mut chunks = Vec::new();
        let mut visited = HashSet::new();
        let mut offset = 0u64;

        loop {
            cancel.check()?;
            if !visited.insert(offset) {
                return Err(self.loop_error(offset));
            }

            self.reader.seek_to(offset)?;
            let header = ChunkHeader::read(&mut self.reader)?;
            let mut assets =
                Vec::with_capacity((header.num_assets as usize).min(MAX_ENTRIES_PER_CHUNK));
            for _ in 0..header.num_assets {
                assets.push(read_entry(&mut self.reader)?);
            }

            tracing::debug!(
                "Chunk at {offset}: {} assets, next {}",
                assets.len(),
                header.next_chunk_offset
            );

            chunks.push(PackChunk {
                offset,
                next_chunk_offset: header.next_chunk_offset,
                assets,
            });

            if header.next_chunk_offset == 0 {
                break;
            }
            offset = u64::from(header.next_chunk_offset);
        }

        Ok(chunks)
    }

    fn loop_error(&self, offset: u64) -> Error {
        Error::MalformedChunk {
            path: self.path.clone(),
            offset,
            reason: "chunk chain loops back on itself".to_string(),
        }
    }

    /// All assets in chain order. The result is cached.
    pub fn list_assets(&mut self) -> Result<Vec<Asset>> {
        self.list_assets_cancellable(&CancellationToken::new())
    }

    /// [`PackReader::list_assets`] with cooperative cancellation.
    pub fn list_assets_cancellable(&mut self, cancel: &CancellationToken) -> Result<Vec<Asset>> {
        if let Some(assets) = &self.assets {
            return Ok(assets.clone());
        }
        let assets: Vec<Asset> = self
            .read_chunks_cancellable(cancel)?
            .into_iter()
            .flat_map(|chunk| chunk.assets)
            .collect();
        self.assets = Some(assets.clone());
        Ok(assets)
    }

    /// Sum the asset counts of every chunk header without decoding entries.
    pub fn count_assets(&mut self) -> Result<usize> {
        if let Some(assets) = &self.assets {
            return Ok(assets.len());
        }
        let mut visited = HashSet::new();
        let mut offset = 0u64;
        let mut count = 0usize;
        loop {
            if !visited.insert(offset) {
                return Err(self.loop_error(offset));
            }
            self.reader.seek_to(offset)?;
            let header = ChunkHeader::read(&mut self.reader)?;
            count += header.num_assets as usize;
            if header.next_chunk_offset == 0 {
                return Ok(count);
            }
            offset = u64::from(header.next_chunk_offset);
        }
    }

    /// Stream over the stored bytes of `asset`.
    ///
    /// The stream ends early if the file is shorter than the record claims;
    /// [`PackReader::read_asset`] turns that into [`Error::TruncatedAsset`].
    pub fn open_asset(&mut self, asset: &Asset) -> Result<impl Read + '_> {
        let size = if asset.is_empty() {
            0
        } else {
            self.reader.seek_to(asset.offset)?;
            u64::from(asset.size)
        };
        Ok(self.reader.get_mut().take(size))
    }

    /// Read the full content of `asset`.
    pub fn read_asset(&mut self, asset: &Asset) -> Result<Vec<u8>> {
        let mut data = Vec::with_capacity((asset.size as usize).min(DEFAULT_COPY_BUFFER_SIZE));
        self.open_asset(asset)?.read_to_end(&mut data)?;
        if data.len() < asset.size as usize {
            return Err(Error::TruncatedAsset {
                name: asset.name.clone(),
                expected: asset.size,
                available: data.len() as u64,
            });
        }
        Ok(data)
    }

    /// Look up the first asset named `name`.
    pub fn find(&mut self, name: &str) -> Result<Option<Asset>> {
        Ok(self.list_assets()?.into_iter().find(|a| a.name == name))
    }
}
