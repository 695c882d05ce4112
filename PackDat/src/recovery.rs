//! Repair of pack files left half-written (`*.pack.temp`)
//!
//! An interrupted writer leaves a chain whose last sealed header may point
//! at a chunk that was never written, or a chunk whose entries run into
//! garbage or point past the end of the file. Recovery walks the chain,
//! stops at the first such inconsistency and terminates the chain there.
//! Only the first inconsistency is repaired.

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::cancel::CancellationToken;
use crate::compare::files_equal;
use crate::endian::{ByteOrder, EndianReader};
use crate::error::{Error, Result};
use crate::options::DEFAULT_COPY_BUFFER_SIZE;
use crate::pack::{
    CHUNK_HEADER_SIZE, CHUNK_SIZE, ChunkHeader, PACK_SUFFIX, TEMP_SUFFIX, entry_size, read_entry,
};

/// Where to cut the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkFix {
    /// Chunk whose `next_chunk_offset` becomes 0.
    pub chunk_offset: u64,
    /// New `num_assets`, or `None` to leave the stored count alone.
    pub corrected_count: Option<u32>,
}

/// Result of scanning a pack for the first inconsistency.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryPlan {
    /// `None` when the chain is already consistent.
    pub fix: Option<ChunkFix>,
    /// Chunks walked, including the one that failed.
    pub chunks_scanned: usize,
    /// Assets that stay reachable once the fix is applied.
    pub assets_kept: usize,
}

impl RecoveryPlan {
    pub fn is_noop(&self) -> bool {
        self.fix.is_none()
    }
}

/// Where a temp file ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Promotion {
    /// The temp file was renamed to this path.
    Renamed(PathBuf),
    /// A byte-identical file already lived here; the temp file was removed.
    Identical(PathBuf),
}

impl Promotion {
    pub fn path(&self) -> &Path {
        match self {
            Self::Renamed(path) | Self::Identical(path) => path,
        }
    }
}

/// Everything [`recover`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryOutcome {
    pub plan: RecoveryPlan,
    pub promotion: Promotion,
}

/// Scan the pack at `path`.
pub fn scan(path: impl AsRef<Path>) -> Result<RecoveryPlan> {
    let path = path.as_ref();
    let file = File::open(path)?;
    scan_reader(file, path)
}

/// Scan any seekable pack image. Only non-structural errors (I/O) fail
/// the scan; structural ones become the fix.
pub fn scan_reader<R: Read + Seek>(inner: R, label: impl AsRef<Path>) -> Result<RecoveryPlan> {
    let mut reader = EndianReader::new(BufReader::new(inner), ByteOrder::Big)
        .with_source(label.as_ref().display().to_string());
    let file_len = reader.stream_len()?;

    let mut plan = RecoveryPlan::default();
    let mut visited = HashSet::new();
    let mut previous: Option<u64> = None;
    let mut offset = 0u64;

    loop {
        // A pointer back into the chain is as broken as one into nothing
        if !visited.insert(offset) {
            plan.fix = Some(cut_before(previous));
            break;
        }
        plan.chunks_scanned += 1;

        reader.seek_to(offset)?;
        let header = match ChunkHeader::read(&mut reader) {
            Ok(header) => header,
            Err(e) if e.is_structural() => {
                plan.fix = Some(cut_before(previous));
                break;
            }
            Err(e) => return Err(e),
        };

        let mut used = CHUNK_HEADER_SIZE;
        let mut failed_at = None;
        for index in 0..header.num_assets {
            match read_entry(&mut reader) {
                Ok(asset) => {
                    used += entry_size(&asset.name);
                    if used > CHUNK_SIZE || (!asset.is_empty() && asset.end() > file_len) {
                        failed_at = Some(index);
                        break;
                    }
                    plan.assets_kept += 1;
                }
                Err(e) if e.is_structural() => {
                    failed_at = Some(index);
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        if let Some(count) = failed_at {
            plan.fix = Some(ChunkFix {
                chunk_offset: offset,
                corrected_count: Some(count),
            });
            break;
        }
        if header.next_chunk_offset == 0 {
            break;
        }
        previous = Some(offset);
        offset = u64::from(header.next_chunk_offset);
    }

    tracing::debug!(
        "Scanned {}: {} chunks, {} assets kept, fix {:?}",
        label.as_ref().display(),
        plan.chunks_scanned,
        plan.assets_kept,
        plan.fix
    );
    Ok(plan)
}

/// Terminate the chain at the chunk before the broken one; a broken first
/// chunk is emptied.
fn cut_before(previous: Option<u64>) -> ChunkFix {
    match previous {
        Some(chunk_offset) => ChunkFix {
            chunk_offset,
            corrected_count: None,
        },
        None => ChunkFix {
            chunk_offset: 0,
            corrected_count: Some(0),
        },
    }
}

/// Write the plan's fix into the file. Returns whether anything changed.
pub fn apply(path: impl AsRef<Path>, plan: &RecoveryPlan) -> Result<bool> {
    let path = path.as_ref();
    let Some(fix) = plan.fix else {
        return Ok(false);
    };

    let mut file = OpenOptions::new().write(true).open(path)?;
    let len = file.metadata()?.len();
    if len < fix.chunk_offset + CHUNK_HEADER_SIZE {
        // The header itself is cut short; pad it so the chain can end here
        file.set_len(fix.chunk_offset + CHUNK_HEADER_SIZE)?;
    }

    file.seek(SeekFrom::Start(fix.chunk_offset))?;
    file.write_all(&0u32.to_be_bytes())?;
    if let Some(count) = fix.corrected_count {
        file.write_all(&count.to_be_bytes())?;
    }
    file.flush()?;

    tracing::warn!(
        "Truncated chunk chain of {} at chunk {} (count {})",
        path.display(),
        fix.chunk_offset,
        fix.corrected_count
            .map_or_else(|| "unchanged".to_string(), |c| c.to_string())
    );
    Ok(true)
}

/// Rename `X.pack.temp` to `X.pack`, or `X_1.pack`, `X_2.pack`, ... when
/// the name is taken by a different file.
///
/// # Errors
///
/// Returns [`Error::UnsupportedOperation`] if `temp_path` does not end in
/// `.pack.temp`.
pub fn promote(temp_path: impl AsRef<Path>, cancel: &CancellationToken) -> Result<Promotion> {
    let temp_path = temp_path.as_ref();
    let unsupported = || Error::UnsupportedOperation {
        operation: "promote",
        path: temp_path.to_path_buf(),
    };
    let file_name = temp_path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(unsupported)?;
    if !file_name.to_ascii_lowercase().ends_with(TEMP_SUFFIX) {
        return Err(unsupported());
    }
    let stem = &file_name[..file_name.len() - TEMP_SUFFIX.len()];

    for attempt in 0u32.. {
        let candidate = if attempt == 0 {
            temp_path.with_file_name(format!("{stem}{PACK_SUFFIX}"))
        } else {
            temp_path.with_file_name(format!("{stem}_{attempt}{PACK_SUFFIX}"))
        };

        if !candidate.exists() {
            std::fs::rename(temp_path, &candidate)?;
            tracing::info!("Promoted {} to {}", temp_path.display(), candidate.display());
            return Ok(Promotion::Renamed(candidate));
        }
        if files_equal(temp_path, &candidate, DEFAULT_COPY_BUFFER_SIZE, cancel)? {
            std::fs::remove_file(temp_path)?;
            tracing::info!(
                "{} is identical to {}, removed the temp file",
                temp_path.display(),
                candidate.display()
            );
            return Ok(Promotion::Identical(candidate));
        }
    }
    Err(unsupported())
}

/// Scan, fix and promote a temp file.
pub fn recover(temp_path: impl AsRef<Path>, cancel: &CancellationToken) -> Result<RecoveryOutcome> {
    let temp_path = temp_path.as_ref();
    let plan = scan(temp_path)?;
    apply(temp_path, &plan)?;
    let promotion = promote(temp_path, cancel)?;
    Ok(RecoveryOutcome { plan, promotion })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::ContainerOptions;
    use crate::pack::{PackReader, PackWriter};
    use tempfile::tempdir;

    fn write_pack(path: &Path, count: usize) {
        let mut writer = PackWriter::create(path, &ContainerOptions::default()).unwrap();
        for i in 0..count {
            writer
                .write_bytes(&format!("asset_{i:04}.bin"), &[i as u8; 3])
                .unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn test_valid_pack_is_noop() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ok.pack.temp");
        write_pack(&path, 3);
        let before = std::fs::read(&path).unwrap();

        let plan = scan(&path).unwrap();
        assert!(plan.is_noop());
        assert_eq!(plan.assets_kept, 3);
        assert!(!apply(&path, &plan).unwrap());
        assert_eq!(std::fs::read(&path).unwrap(), before);
    }

    #[test]
    fn test_dangling_next_pointer() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dangling.pack.temp");
        write_pack(&path, 2);
        let mut bytes = std::fs::read(&path).unwrap();
        bytes[..4].copy_from_slice(&1_000_000u32.to_be_bytes());
        std::fs::write(&path, &bytes).unwrap();

        let plan = scan(&path).unwrap();
        assert_eq!(
            plan.fix,
            Some(ChunkFix {
                chunk_offset: 0,
                corrected_count: None
            })
        );
        assert!(apply(&path, &plan).unwrap());

        let assets = PackReader::open(&path).unwrap().list_assets().unwrap();
        assert_eq!(assets.len(), 2);
        assert!(scan(&path).unwrap().is_noop());
    }

    #[test]
    fn test_content_past_end_corrects_count() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("short.pack.temp");
        write_pack(&path, 3);
        // Cut into the last asset's content
        let len = std::fs::metadata(&path).unwrap().len();
        OpenOptions::new()
            .write(true)
            .open(&path)
            .unwrap()
            .set_len(len - 1)
            .unwrap();

        let plan = scan(&path).unwrap();
        assert_eq!(
            plan.fix,
            Some(ChunkFix {
                chunk_offset: 0,
                corrected_count: Some(2)
            })
        );
        apply(&path, &plan).unwrap();
        let assets = PackReader::open(&path).unwrap().list_assets().unwrap();
        assert_eq!(assets.len(), 2);
    }

    #[test]
    fn test_bad_entry_name_len_corrects_count() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("entry.pack.temp");
        write_pack(&path, 3);
        // Second entry follows the header and one 16 + 14 byte entry
        let second = (CHUNK_HEADER_SIZE + entry_size("asset_0000.bin")) as usize;
        let mut bytes = std::fs::read(&path).unwrap();
        bytes[second..second + 4].copy_from_slice(&500i32.to_be_bytes());
        std::fs::write(&path, &bytes).unwrap();

        let plan = scan(&path).unwrap();
        assert_eq!(
            plan.fix,
            Some(ChunkFix {
                chunk_offset: 0,
                corrected_count: Some(1)
            })
        );
        assert_eq!(plan.assets_kept, 1);
        assert!(apply(&path, &plan).unwrap());

        let names: Vec<String> = PackReader::open(&path)
            .unwrap()
            .list_assets()
            .unwrap()
            .into_iter()
            .map(|a| a.name)
            .collect();
        assert_eq!(names, vec!["asset_0000.bin"]);
        assert!(scan(&path).unwrap().is_noop());
    }

    #[test]
    fn test_promote_skips_different_and_stops_at_identical() {
        let dir = tempdir().unwrap();
        let cancel = CancellationToken::new();

        let temp = dir.path().join("ui.pack.temp");
        write_pack(&temp, 1);
        std::fs::write(dir.path().join("ui.pack"), b"something else").unwrap();
        std::fs::copy(&temp, dir.path().join("ui_1.pack")).unwrap();

        let promotion = promote(&temp, &cancel).unwrap();
        assert_eq!(promotion, Promotion::Identical(dir.path().join("ui_1.pack")));
        assert!(!temp.exists());

        write_pack(&temp, 2);
        let promotion = promote(&temp, &cancel).unwrap();
        assert_eq!(promotion, Promotion::Renamed(dir.path().join("ui_2.pack")));
    }

    #[test]
    fn test_promote_rejects_regular_pack() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("plain.pack");
        write_pack(&path, 0);
        assert!(matches!(
            promote(&path, &CancellationToken::new()),
            Err(Error::UnsupportedOperation { .. })
        ));
    }
}
