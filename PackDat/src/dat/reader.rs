//! `.dat` reader: manifest decoding and reads that span data files

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use super::manifest::{check_length, read_manifest_cancellable};
use super::{RECORD_SIZE, data_file_path, discover_data_files, locate};
use crate::asset::Asset;
use crate::cancel::CancellationToken;
use crate::error::{Error, Result};
use crate::options::{ContainerOptions, DEFAULT_COPY_BUFFER_SIZE};

/// Reads the manifest and content of one dat container.
///
/// Data file handles are opened lazily and kept for the lifetime of the
/// reader.
pub struct DatReader {
    manifest_path: PathBuf,
    data_files: Vec<PathBuf>,
    cap: u64,
    handles: HashMap<usize, File>,
    assets: Option<Vec<Asset>>,
}

impl DatReader {
    /// Open a manifest and discover its data files.
    pub fn open(manifest: impl AsRef<Path>, options: &ContainerOptions) -> Result<Self> {
        let manifest = manifest.as_ref();
        let data_files = discover_data_files(manifest)?;
        Ok(Self::with_data_files(manifest, data_files, options))
    }

    /// Use an explicit data file sequence instead of discovering one.
    pub fn with_data_files(
        manifest: impl AsRef<Path>,
        data_files: Vec<PathBuf>,
        options: &ContainerOptions,
    ) -> Self {
        let manifest_path = manifest.as_ref().to_path_buf();
        tracing::debug!(
            "Opened dat {} with {} data files",
            manifest_path.display(),
            data_files.len()
        );
        Self {
            manifest_path,
            data_files,
            cap: options.data_file_cap.max(1),
            handles: HashMap::new(),
            assets: None,
        }
    }

    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    pub fn data_files(&self) -> &[PathBuf] {
        &self.data_files
    }

    pub fn cap(&self) -> u64 {
        self.cap
    }

    /// All manifest records in file order. The result is cached.
    pub fn list_assets(&mut self) -> Result<Vec<Asset>> {
        self.list_assets_cancellable(&CancellationToken::new())
    }

    /// [`DatReader::list_assets`], checking `cancel` before each record.
    pub fn list_assets_cancellable(&mut self, cancel: &CancellationToken) -> Result<Vec<Asset>> {
        if let Some(assets) = &self.assets {
            return Ok(assets.clone());
        }
        let assets = read_manifest_cancellable(&self.manifest_path, cancel)?;
        self.assets = Some(assets.clone());
        Ok(assets)
    }

    /// Number of records, from the manifest length alone.
    pub fn count_assets(&mut self) -> Result<usize> {
        if let Some(assets) = &self.assets {
            return Ok(assets.len());
        }
        let length = std::fs::metadata(&self.manifest_path)?.len();
        check_length(&self.manifest_path, length)?;
        Ok((length / RECORD_SIZE) as usize)
    }

    /// Look up the first asset named `name`.
    pub fn find(&mut self, name: &str) -> Result<Option<Asset>> {
        Ok(self.list_assets()?.into_iter().find(|a| a.name == name))
    }

    /// Stream over the content of `asset`, crossing data files as needed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingDataFile`] if the first data file is absent.
    /// Later missing files surface from the stream's `read` and are
    /// recovered by [`DatReader::read_asset`].
    pub fn open_asset(&mut self, asset: &Asset) -> Result<SpanningReader<'_>> {
        let (file_index, address) = locate(asset.offset, self.cap);
        if !asset.is_empty() {
            self.data_file(file_index, &asset.name)?;
        }
        Ok(SpanningReader {
            source: self,
            name: asset.name.clone(),
            file_index,
            address,
            remaining: u64::from(asset.size),
        })
    }

    /// Read the full content of `asset`.
    pub fn read_asset(&mut self, asset: &Asset) -> Result<Vec<u8>> {
        let mut data = Vec::with_capacity((asset.size as usize).min(DEFAULT_COPY_BUFFER_SIZE));
        self.open_asset(asset)?
            .read_to_end(&mut data)
            .map_err(Error::from_stream)?;
        if data.len() < asset.size as usize {
            return Err(Error::TruncatedAsset {
                name: asset.name.clone(),
                expected: asset.size,
                available: data.len() as u64,
            });
        }
        Ok(data)
    }

    fn data_file(&mut self, index: usize, asset: &str) -> Result<&mut File> {
        match self.handles.entry(index) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let missing = || Error::MissingDataFile {
                    asset: asset.to_string(),
                    index,
                    path: data_file_path(&self.manifest_path, index).unwrap_or_default(),
                };
                let Some(path) = self.data_files.get(index) else {
                    return Err(missing());
                };
                let file = match File::open(path) {
                    Ok(file) => file,
                    Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(missing()),
                    Err(e) => return Err(e.into()),
                };
                Ok(entry.insert(file))
            }
        }
    }
}

/// Content stream of one dat asset.
///
/// Reads at most up to the end of the current data file per call, then
/// continues at address 0 of the next one. A data file that ends early
/// ends the stream early.
pub struct SpanningReader<'a> {
    source: &'a mut DatReader,
    name: String,
    file_index: usize,
    address: u64,
    remaining: u64,
}

impl SpanningReader<'_> {
    /// Bytes of the asset not yet read.
    pub fn remaining(&self) -> u64 {
        self.remaining
    }
}

impl Read for SpanningReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        if self.address >= self.source.cap {
            self.file_index += 1;
            self.address = 0;
        }

        let want = (buf.len() as u64)
            .min(self.remaining)
            .min(self.source.cap - self.address) as usize;
        let file = self
            .source
            .data_file(self.file_index, &self.name)
            .map_err(Error::into_io)?;
        file.seek(SeekFrom::Start(self.address))?;
        let read = file.read(&mut buf[..want])?;

        self.address += read as u64;
        self.remaining -= read as u64;
        Ok(read)
    }
}
