//! Per-asset CRC-32 validation results

use crate::asset::Asset;
use crate::error::{Error, Result};

/// One asset that failed validation.
#[derive(Debug)]
pub enum ValidationIssue {
    /// The stored bytes hash to `actual` instead of the indexed CRC-32.
    CrcMismatch { asset: Asset, actual: u32 },
    /// The content could not be read back in full.
    Unreadable { asset: Asset, error: Error },
}

impl ValidationIssue {
    pub fn asset(&self) -> &Asset {
        match self {
            Self::CrcMismatch { asset, .. } | Self::Unreadable { asset, .. } => asset,
        }
    }

    pub fn into_error(self) -> Error {
        match self {
            Self::CrcMismatch { asset, actual } => Error::CrcMismatch {
                name: asset.name,
                expected: asset.crc32,
                actual,
            },
            Self::Unreadable { error, .. } => error,
        }
    }
}

/// Outcome of re-reading every asset of a container.
///
/// Issues are collected, never thrown; pass/fail policy is up to the
/// caller.
#[derive(Debug, Default)]
pub struct ValidationReport {
    /// Assets whose content was re-read.
    pub checked: usize,
    /// Problems in enumeration order.
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    /// Assets whose content hashed to the wrong CRC-32.
    pub fn mismatched(&self) -> impl Iterator<Item = &Asset> {
        self.issues.iter().filter_map(|issue| match issue {
            ValidationIssue::CrcMismatch { asset, .. } => Some(asset),
            ValidationIssue::Unreadable { .. } => None,
        })
    }

    /// `Ok(checked)` when clean, otherwise the first issue as an error.
    pub fn into_result(self) -> Result<usize> {
        match self.issues.into_iter().next() {
            None => Ok(self.checked),
            Some(issue) => Err(issue.into_error()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_policy() {
        let clean = ValidationReport {
            checked: 3,
            issues: Vec::new(),
        };
        assert!(clean.is_clean());
        assert_eq!(clean.into_result().unwrap(), 3);

        let report = ValidationReport {
            checked: 2,
            issues: vec![
                ValidationIssue::Unreadable {
                    asset: Asset::new("gone", 10, 4, 1),
                    error: Error::TruncatedAsset {
                        name: "gone".to_string(),
                        expected: 4,
                        available: 0,
                    },
                },
                ValidationIssue::CrcMismatch {
                    asset: Asset::new("bad", 0, 1, 7),
                    actual: 9,
                },
            ],
        };
        assert_eq!(
            report.mismatched().map(|a| a.name.as_str()).collect::<Vec<_>>(),
            vec!["bad"]
        );
        assert!(matches!(
            report.into_result(),
            Err(Error::TruncatedAsset { .. })
        ));
    }
}
