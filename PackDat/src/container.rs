//! Single entry point over both container formats
//!
//! A [`Container`] is a classified path plus options. It holds no open
//! files; every operation opens a reader or writer session, and the
//! session owns its handles until it is finished or dropped.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use crate::asset::Asset;
use crate::cancel::CancellationToken;
use crate::checksum::copy_with_crc;
use crate::classify::{ContainerFormat, ContainerTag, classify};
use crate::compare::streams_equal;
use crate::dat::{DatReader, DatWriter, discover_data_files};
use crate::error::{Error, Result};
use crate::options::ContainerOptions;
use crate::pack::{PackReader, PackWriter};
use crate::recovery::{self, RecoveryOutcome};
use crate::validate::{ValidationIssue, ValidationReport};

/// A pack or dat container on disk.
///
/// # Example
///
/// ```no_run
/// use packdat::Container;
///
/// let container = Container::open("assets/ui.pack")?;
/// let mut writer = container.open_append()?;
/// writer.write_bytes("icons/close.png", &[0x89, b'P', b'N', b'G'])?;
/// writer.finish()?;
///
/// for asset in container.enumerate()? {
///     println!("{} ({} bytes)", asset.name, asset.size);
/// }
/// assert!(container.validate()?.is_clean());
/// # Ok::<(), packdat::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct Container {
    tag: ContainerTag,
    data_files: Vec<PathBuf>,
    primary_len: Option<u64>,
    options: ContainerOptions,
}

impl Container {
    /// Classify `path` and scan what is on disk. The file need not exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::with_tag(classify(path)?)
    }

    /// Use an explicit tag instead of classifying a path.
    pub fn with_tag(tag: ContainerTag) -> Result<Self> {
        let mut container = Self {
            tag,
            data_files: Vec::new(),
            primary_len: None,
            options: ContainerOptions::default(),
        };
        container.refresh()?;
        Ok(container)
    }

    #[must_use]
    pub fn with_options(mut self, options: ContainerOptions) -> Self {
        self.options = options;
        self
    }

    /// Write an empty container at `path`, replacing any existing one.
    pub fn create(path: impl AsRef<Path>, options: ContainerOptions) -> Result<Self> {
        let mut container = Self::open(path)?.with_options(options);
        container.open_write()?.finish()?;
        container.refresh()?;
        Ok(container)
    }

    /// Re-read file metadata and, for dat containers, data file membership.
    pub fn refresh(&mut self) -> Result<()> {
        self.primary_len = match std::fs::metadata(&self.tag.primary) {
            Ok(meta) => Some(meta.len()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };
        self.data_files = if self.tag.is_dat() {
            discover_data_files(&self.tag.primary)?
        } else {
            Vec::new()
        };
        Ok(())
    }

    /// The pack file or dat manifest.
    pub fn path(&self) -> &Path {
        &self.tag.primary
    }

    pub fn tag(&self) -> &ContainerTag {
        &self.tag
    }

    pub fn format(&self) -> ContainerFormat {
        self.tag.format
    }

    pub fn is_temp(&self) -> bool {
        self.tag.temp
    }

    pub fn options(&self) -> &ContainerOptions {
        &self.options
    }

    /// Data files as of the last [`Container::refresh`]. Empty for packs.
    pub fn data_files(&self) -> &[PathBuf] {
        &self.data_files
    }

    /// Whether the primary file existed at the last refresh.
    pub fn exists(&self) -> bool {
        self.primary_len.is_some()
    }

    /// Length of the primary file at the last refresh.
    pub fn primary_len(&self) -> Option<u64> {
        self.primary_len
    }

    /// Start a read session.
    pub fn open_read(&self) -> Result<AssetReader> {
        match self.tag.format {
            ContainerFormat::Pack => Ok(AssetReader::Pack(PackReader::open(self.path())?)),
            ContainerFormat::Dat => Ok(AssetReader::Dat(DatReader::open(
                self.path(),
                &self.options,
            )?)),
        }
    }

    /// Start a write session over an emptied container.
    pub fn open_write(&self) -> Result<AssetWriter> {
        self.check_writable("open_write")?;
        match self.tag.format {
            ContainerFormat::Pack => Ok(AssetWriter::Pack(PackWriter::create(
                self.path(),
                &self.options,
            )?)),
            ContainerFormat::Dat => Ok(AssetWriter::Dat(DatWriter::create(
                self.path(),
                &self.options,
            )?)),
        }
    }

    /// Start a write session after the existing assets.
    pub fn open_append(&self) -> Result<AssetWriter> {
        self.check_writable("open_append")?;
        match self.tag.format {
            ContainerFormat::Pack => Ok(AssetWriter::Pack(PackWriter::append(
                self.path(),
                &self.options,
            )?)),
            ContainerFormat::Dat => Ok(AssetWriter::Dat(DatWriter::append(
                self.path(),
                &self.options,
            )?)),
        }
    }

    /// Temp files must go through [`Container::recover`] first.
    fn check_writable(&self, operation: &'static str) -> Result<()> {
        if self.tag.temp {
            return Err(Error::UnsupportedOperation {
                operation,
                path: self.path().to_path_buf(),
            });
        }
        Ok(())
    }

    /// All assets in index order.
    pub fn enumerate(&self) -> Result<Vec<Asset>> {
        self.enumerate_cancellable(&CancellationToken::new())
    }

    pub fn enumerate_cancellable(&self, cancel: &CancellationToken) -> Result<Vec<Asset>> {
        self.open_read()?.list_assets_cancellable(cancel)
    }

    /// Number of assets, without decoding names where the format allows.
    pub fn count(&self) -> Result<usize> {
        self.open_read()?.count_assets()
    }

    /// Re-read every asset and compare its CRC-32 with the index.
    ///
    /// Only enumeration failures are errors; per-asset problems land in
    /// the report.
    pub fn validate(&self) -> Result<ValidationReport> {
        self.validate_cancellable(&CancellationToken::new())
    }

    pub fn validate_cancellable(&self, cancel: &CancellationToken) -> Result<ValidationReport> {
        let mut reader = self.open_read()?;
        let assets = reader.list_assets_cancellable(cancel)?;
        let mut report = ValidationReport::default();

        for asset in assets {
            cancel.check()?;
            report.checked += 1;
            match checksum_asset(&mut reader, &asset, self.options.copy_buffer_size) {
                Ok(actual) if actual == asset.crc32 => {}
                Ok(actual) => {
                    tracing::warn!(
                        "CRC mismatch for {}: indexed {:08x}, computed {actual:08x}",
                        asset.name,
                        asset.crc32
                    );
                    report
                        .issues
                        .push(ValidationIssue::CrcMismatch { asset, actual });
                }
                Err(error) => {
                    tracing::warn!("Could not read {}: {error}", asset.name);
                    report
                        .issues
                        .push(ValidationIssue::Unreadable { asset, error });
                }
            }
        }

        tracing::info!(
            "Validated {}: {} assets, {} issues",
            self.path().display(),
            report.checked,
            report.issues.len()
        );
        Ok(report)
    }

    /// Whether the stored content of `asset` equals `other`, reading both
    /// side by side.
    pub fn compare_asset<R: Read + Send>(
        &self,
        asset: &Asset,
        mut other: R,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        let mut reader = self.open_read()?;
        let mut stored = reader.open_asset(asset)?;
        streams_equal(
            &mut stored,
            &mut other,
            self.options.copy_buffer_size,
            cancel,
        )
    }

    /// Repair a `*.pack.temp` and promote it to a regular pack. The handle
    /// then points at the promoted file.
    pub fn recover(&mut self) -> Result<RecoveryOutcome> {
        if !self.tag.temp {
            return Err(Error::UnsupportedOperation {
                operation: "recover",
                path: self.path().to_path_buf(),
            });
        }
        let outcome = recovery::recover(self.path(), &CancellationToken::new())?;
        self.tag = classify(outcome.promotion.path())?;
        self.refresh()?;
        Ok(outcome)
    }
}

/// CRC-32 of the stored content of `asset`.
fn checksum_asset(reader: &mut AssetReader, asset: &Asset, buffer_size: usize) -> Result<u32> {
    let mut stream = reader.open_asset(asset)?;
    let (crc32, length) =
        copy_with_crc(&mut stream, &mut io::sink(), buffer_size).map_err(Error::from_stream)?;
    if length < u64::from(asset.size) {
        return Err(Error::TruncatedAsset {
            name: asset.name.clone(),
            expected: asset.size,
            available: length,
        });
    }
    Ok(crc32)
}

/// A read session over either format.
pub enum AssetReader {
    Pack(PackReader<File>),
    Dat(DatReader),
}

impl AssetReader {
    pub fn format(&self) -> ContainerFormat {
        match self {
            Self::Pack(_) => ContainerFormat::Pack,
            Self::Dat(_) => ContainerFormat::Dat,
        }
    }

    pub fn list_assets(&mut self) -> Result<Vec<Asset>> {
        self.list_assets_cancellable(&CancellationToken::new())
    }

    pub fn list_assets_cancellable(&mut self, cancel: &CancellationToken) -> Result<Vec<Asset>> {
        match self {
            Self::Pack(reader) => reader.list_assets_cancellable(cancel),
            Self::Dat(reader) => reader.list_assets_cancellable(cancel),
        }
    }

    pub fn count_assets(&mut self) -> Result<usize> {
        match self {
            Self::Pack(reader) => reader.count_assets(),
            Self::Dat(reader) => reader.count_assets(),
        }
    }

    /// First asset named `name`, in index order.
    pub fn find(&mut self, name: &str) -> Result<Option<Asset>> {
        match self {
            Self::Pack(reader) => reader.find(name),
            Self::Dat(reader) => reader.find(name),
        }
    }

    /// Stream the stored bytes of `asset`.
    pub fn open_asset(&mut self, asset: &Asset) -> Result<Box<dyn Read + Send + '_>> {
        match self {
            Self::Pack(reader) => Ok(Box::new(reader.open_asset(asset)?)),
            Self::Dat(reader) => Ok(Box::new(reader.open_asset(asset)?)),
        }
    }

    /// Read the full content of `asset`.
    pub fn read_asset(&mut self, asset: &Asset) -> Result<Vec<u8>> {
        match self {
            Self::Pack(reader) => reader.read_asset(asset),
            Self::Dat(reader) => reader.read_asset(asset),
        }
    }
}

/// A write session over either format.
///
/// Dropping it finishes best-effort; call [`AssetWriter::finish`] to see
/// errors.
pub enum AssetWriter {
    Pack(PackWriter),
    Dat(DatWriter),
}

impl AssetWriter {
    pub fn format(&self) -> ContainerFormat {
        match self {
            Self::Pack(_) => ContainerFormat::Pack,
            Self::Dat(_) => ContainerFormat::Dat,
        }
    }

    /// Append one asset, streaming its content.
    pub fn write_asset<R: Read + ?Sized>(&mut self, name: &str, content: &mut R) -> Result<Asset> {
        match self {
            Self::Pack(writer) => writer.write_asset(name, content),
            Self::Dat(writer) => writer.write_asset(name, content),
        }
    }

    pub fn write_bytes(&mut self, name: &str, data: &[u8]) -> Result<Asset> {
        self.write_asset(name, &mut &data[..])
    }

    pub fn assets_written(&self) -> usize {
        match self {
            Self::Pack(writer) => writer.assets_written(),
            Self::Dat(writer) => writer.assets_written(),
        }
    }

    /// Finalize the container and release its files.
    pub fn finish(self) -> Result<()> {
        match self {
            Self::Pack(writer) => writer.finish(),
            Self::Dat(writer) => writer.finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_temp_is_read_only_until_recovered() {
        let dir = tempdir().unwrap();
        let temp = dir.path().join("ui.pack.temp");
        {
            let mut writer = PackWriter::create(&temp, &ContainerOptions::default()).unwrap();
            writer.write_bytes("a", b"1").unwrap();
            writer.finish().unwrap();
        }

        let mut container = Container::open(&temp).unwrap();
        assert!(container.is_temp());
        assert_eq!(container.count().unwrap(), 1);
        assert!(matches!(
            container.open_append(),
            Err(Error::UnsupportedOperation {
                operation: "open_append",
                ..
            })
        ));

        let outcome = container.recover().unwrap();
        assert!(outcome.plan.is_noop());
        assert!(!container.is_temp());
        assert_eq!(container.path(), dir.path().join("ui.pack"));
        container.open_append().unwrap().finish().unwrap();
    }

    #[test]
    fn test_create_empty_containers() {
        let dir = tempdir().unwrap();
        for name in ["empty.pack", "empty_manifest.dat"] {
            let container =
                Container::create(dir.path().join(name), ContainerOptions::default()).unwrap();
            assert!(container.exists());
            assert_eq!(container.count().unwrap(), 0);
            assert!(container.enumerate().unwrap().is_empty());
            assert!(container.validate().unwrap().is_clean());
        }
        assert_eq!(
            std::fs::metadata(dir.path().join("empty.pack")).unwrap().len(),
            8192
        );
    }

    #[test]
    fn test_compare_asset() {
        let dir = tempdir().unwrap();
        let container =
            Container::create(dir.path().join("cmp.pack"), ContainerOptions::default()).unwrap();
        let mut writer = container.open_append().unwrap();
        let asset = writer.write_bytes("doc.txt", b"lorem ipsum").unwrap();
        writer.finish().unwrap();

        let cancel = CancellationToken::new();
        assert!(container
            .compare_asset(&asset, &b"lorem ipsum"[..], &cancel)
            .unwrap());
        assert!(!container
            .compare_asset(&asset, &b"lorem ipsun"[..], &cancel)
            .unwrap());
    }

    #[test]
    fn test_cancelled_validate_both_formats() {
        let dir = tempdir().unwrap();
        for name in ["stop.pack", "stop_manifest.dat"] {
            let container =
                Container::create(dir.path().join(name), ContainerOptions::default()).unwrap();
            let mut writer = container.open_append().unwrap();
            writer.write_bytes("a", b"1").unwrap();
            writer.write_bytes("b", b"22").unwrap();
            writer.finish().unwrap();

            let cancel = CancellationToken::new();
            cancel.cancel();
            assert!(
                matches!(container.validate_cancellable(&cancel), Err(Error::Cancelled)),
                "{name}"
            );
            assert!(matches!(
                container.enumerate_cancellable(&cancel),
                Err(Error::Cancelled)
            ));
            assert_eq!(container.validate().unwrap().checked, 2);
        }
    }
}
