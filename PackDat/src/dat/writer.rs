//! `.dat` writer: content spread over capped data files, one manifest
//! record appended per asset

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::manifest::check_length;
use super::{RECORD_SIZE, data_file_path, discover_data_files, record_bytes};
use crate::asset::{Asset, validate_name};
use crate::checksum::Crc32Fold;
use crate::error::{Error, Result};
use crate::options::ContainerOptions;

/// Writer session over one dat container.
///
/// The logical cursor always equals `current_index * cap + position`, with
/// every data file before `current_index` exactly `cap` bytes long.
pub struct DatWriter {
    manifest: File,
    manifest_path: PathBuf,
    data_files: Vec<PathBuf>,
    current_index: usize,
    current: File,
    /// Write position inside the current data file.
    position: u64,
    /// Logical offset of the next content byte.
    next_offset: u64,
    cap: u64,
    buffer_size: usize,
    delete_unused: bool,
    assets_written: usize,
    finished: bool,
}

impl DatWriter {
    /// Create (or truncate) a manifest and start over at data file 0.
    ///
    /// Existing data files are reused in order as the writer rolls into
    /// them; the ones never reached are deleted on finish if
    /// [`ContainerOptions::delete_unused_data_files`] is set.
    pub fn create(manifest: impl AsRef<Path>, options: &ContainerOptions) -> Result<Self> {
        let manifest_path = manifest.as_ref().to_path_buf();
        if let Some(parent) = manifest_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let mut data_files = discover_data_files(&manifest_path)?;
        let first = sequence_path(&manifest_path, &mut data_files, 0)?;
        let current = open_data_file(&first, true)?;

        let manifest = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&manifest_path)?;

        tracing::info!("Creating dat {}", manifest_path.display());

        Ok(Self {
            manifest,
            manifest_path,
            data_files,
            current_index: 0,
            current,
            position: 0,
            next_offset: 0,
            cap: options.data_file_cap.max(1),
            buffer_size: options.copy_buffer_size.max(1),
            delete_unused: options.delete_unused_data_files,
            assets_written: 0,
            finished: false,
        })
    }

    /// Resume after the last byte of an existing container.
    ///
    /// A missing manifest is created instead.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedManifest`] for a manifest that is not a
    /// whole number of records, [`Error::OversizedDataFile`] for a data file
    /// above the cap and [`Error::MalformedDataSequence`] for a non-final
    /// data file below it.
    pub fn append(manifest: impl AsRef<Path>, options: &ContainerOptions) -> Result<Self> {
        let manifest_path = manifest.as_ref().to_path_buf();
        let manifest_len = match std::fs::metadata(&manifest_path) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Self::create(&manifest_path, options);
            }
            Err(e) => return Err(e.into()),
        };
        check_length(&manifest_path, manifest_len)?;

        let cap = options.data_file_cap.max(1);
        let mut data_files = discover_data_files(&manifest_path)?;
        let last = data_files.len().saturating_sub(1);
        let mut last_len = 0;
        for (index, path) in data_files.iter().enumerate() {
            let length = std::fs::metadata(path)?.len();
            if length > cap {
                return Err(Error::OversizedDataFile {
                    path: path.clone(),
                    length,
                    cap,
                });
            }
            if index < last && length < cap {
                return Err(Error::MalformedDataSequence {
                    path: path.clone(),
                    index,
                    length,
                    cap,
                });
            }
            last_len = length;
        }

        let current_path = sequence_path(&manifest_path, &mut data_files, last)?;
        let current = open_data_file(&current_path, false)?;
        let next_offset = last as u64 * cap + last_len;

        let manifest = OpenOptions::new().append(true).open(&manifest_path)?;

        tracing::info!(
            "Appending to dat {} ({} records, {} data files, cursor at {next_offset})",
            manifest_path.display(),
            manifest_len / RECORD_SIZE,
            data_files.len()
        );

        Ok(Self {
            manifest,
            manifest_path,
            data_files,
            current_index: last,
            current,
            position: last_len,
            next_offset,
            cap,
            buffer_size: options.copy_buffer_size.max(1),
            delete_unused: options.delete_unused_data_files,
            assets_written: 0,
            finished: false,
        })
    }

    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    /// Assets written during this session.
    pub fn assets_written(&self) -> usize {
        self.assets_written
    }

    /// Logical offset the next asset will start at.
    pub fn next_offset(&self) -> u64 {
        self.next_offset
    }

    /// Append one asset, streaming its content from `content`.
    ///
    /// On error the data files are rolled back to where this call started,
    /// no record is written and the writer stays usable.
    pub fn write_asset<R: Read + ?Sized>(&mut self, name: &str, content: &mut R) -> Result<Asset> {
        validate_name(name)?;

        let start_index = self.current_index;
        let start_position = self.position;
        let (crc32, size) = match self.write_content(name, content) {
            Ok(written) => written,
            Err(e) => {
                self.rollback(start_index, start_position)?;
                return Err(e);
            }
        };

        let start = self.next_offset;
        let offset = if size == 0 { 0 } else { start };
        let asset = Asset::new(name, offset, size as u32, crc32);

        if let Err(e) = self.manifest.write_all(&record_bytes(&asset)?) {
            self.rollback(start_index, start_position)?;
            return Err(e.into());
        }

        self.next_offset = start + size;
        self.assets_written += 1;

        tracing::debug!("Wrote {} ({} bytes at {})", asset.name, asset.size, asset.offset);
        Ok(asset)
    }

    /// Convenience for in-memory content.
    pub fn write_bytes(&mut self, name: &str, data: &[u8]) -> Result<Asset> {
        self.write_asset(name, &mut &data[..])
    }

    fn write_content<R: Read + ?Sized>(&mut self, name: &str, content: &mut R) -> Result<(u32, u64)> {
        let mut buffer = vec![0u8; self.buffer_size];
        let mut crc = Crc32Fold::new();
        loop {
            let read = match content.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            if crc.len() + read as u64 > u64::from(u32::MAX) {
                return Err(Error::CapacityExceeded {
                    name: name.to_string(),
                    limit: u64::from(u32::MAX),
                });
            }
            self.write_spanning(&buffer[..read])?;
            crc = crc.fold(&buffer[..read]);
        }
        Ok(crc.finish())
    }

    /// Write `block` at the cursor, rolling into following data files.
    fn write_spanning(&mut self, mut block: &[u8]) -> Result<()> {
        while !block.is_empty() {
            if self.position >= self.cap {
                self.roll_over()?;
            }
            let fits = (self.cap - self.position).min(block.len() as u64) as usize;
            self.current.write_all(&block[..fits])?;
            self.position += fits as u64;
            block = &block[fits..];
        }
        Ok(())
    }

    /// Move to the start of the next data file, creating or truncating it.
    fn roll_over(&mut self) -> Result<()> {
        self.current.flush()?;
        let next = self.current_index + 1;
        let path = sequence_path(&self.manifest_path, &mut self.data_files, next)?;
        self.current = open_data_file(&path, true)?;
        tracing::debug!(
            "Data file {} full, continuing in {}",
            self.current_index,
            path.display()
        );
        self.current_index = next;
        self.position = 0;
        Ok(())
    }

    /// Undo a partially written asset.
    fn rollback(&mut self, index: usize, position: u64) -> Result<()> {
        for rolled in (index + 1)..=self.current_index {
            if let Some(path) = self.data_files.get(rolled) {
                remove_if_exists(path)?;
            }
        }
        if self.current_index != index {
            let path = sequence_path(&self.manifest_path, &mut self.data_files, index)?;
            self.current = open_data_file(&path, false)?;
            self.current_index = index;
        }
        self.current.set_len(position)?;
        self.current.seek(SeekFrom::Start(position))?;
        self.position = position;
        Ok(())
    }

    /// Flush everything and drop unused data files. Consumes the session.
    pub fn finish(mut self) -> Result<()> {
        self.finalize()
    }

    fn finalize(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;

        self.current.flush()?;
        self.manifest.flush()?;

        if self.delete_unused {
            for path in self.data_files.iter().skip(self.current_index + 1) {
                if remove_if_exists(path)? {
                    tracing::warn!("Deleted unused data file {}", path.display());
                }
            }
            self.data_files.truncate(self.current_index + 1);
        }

        tracing::info!(
            "Finished dat {}: {} assets written, {} bytes in {} data files",
            self.manifest_path.display(),
            self.assets_written,
            self.next_offset,
            self.current_index + 1
        );
        Ok(())
    }
}

impl Drop for DatWriter {
    fn drop(&mut self) {
        if let Err(e) = self.finalize() {
            tracing::warn!(
                "Failed to finish dat {}: {}",
                self.manifest_path.display(),
                e
            );
        }
    }
}

/// Path of data file `index`, extending the known sequence by the naming
/// convention when it runs out.
fn sequence_path(manifest: &Path, data_files: &mut Vec<PathBuf>, index: usize) -> Result<PathBuf> {
    while data_files.len() <= index {
        let next = data_file_path(manifest, data_files.len()).ok_or_else(|| {
            Error::UnknownContainer {
                path: manifest.to_path_buf(),
            }
        })?;
        data_files.push(next);
    }
    Ok(data_files[index].clone())
}

fn open_data_file(path: &Path, truncate: bool) -> Result<File> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(truncate)
        .open(path)?;
    file.seek(SeekFrom::End(0))?;
    Ok(file)
}

fn remove_if_exists(path: &Path) -> Result<bool> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}
