#![allow(non_snake_case)]
//! # PackDat
//!
//! A pure-Rust reader/writer for two game asset container formats that
//! bundle many named blobs into a few large files.
//!
//! ## Supported Formats
//!
//! - **`.pack`** - one big-endian file, index in a chain of 8192-byte chunks
//! - **`.dat`** - little-endian `*_manifest.dat` of 148-byte records plus
//!   `*_NNN.dat` data files capped at 200 MiB, assets may span files
//! - **`.pack.temp`** - an interrupted pack write, repairable with
//!   [`Container::recover`]
//!
//! Content is stored raw: no compression, no encryption, no versioning.
//!
//! ## Quick Start
//!
//! ```no_run
//! use packdat::prelude::*;
//!
//! let container = Container::create("out/ui_manifest.dat", ContainerOptions::default())?;
//! let mut writer = container.open_append()?;
//! writer.write_bytes("a.txt", b"hello")?;
//! writer.write_bytes("b.txt", b"")?;
//! writer.finish()?;
//!
//! let mut reader = container.open_read()?;
//! for asset in reader.list_assets()? {
//!     let bytes = reader.read_asset(&asset)?;
//!     println!("{}: {} bytes", asset.name, bytes.len());
//! }
//!
//! let report = container.validate()?;
//! for asset in report.mismatched() {
//!     println!("corrupt: {}", asset.name);
//! }
//! # Ok::<(), packdat::Error>(())
//! ```
//!
//! ## Logging
//!
//! Diagnostics go through [`tracing`]; install a subscriber to see them.

pub mod asset;
pub mod cancel;
pub mod checksum;
pub mod classify;
pub mod compare;
pub mod container;
pub mod dat;
pub mod endian;
pub mod error;
pub mod options;
pub mod pack;
pub mod recovery;
pub mod validate;

// Re-exports for convenience
pub use asset::Asset;
pub use cancel::CancellationToken;
pub use classify::{ContainerFormat, ContainerTag, classify};
pub use container::{AssetReader, AssetWriter, Container};
pub use error::{Error, Result};
pub use options::ContainerOptions;
pub use validate::{ValidationIssue, ValidationReport};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::asset::{Asset, MAX_NAME_LEN};
    pub use crate::cancel::CancellationToken;
    pub use crate::classify::{ContainerFormat, ContainerTag, classify, data_files};
    pub use crate::container::{AssetReader, AssetWriter, Container};
    pub use crate::error::{Error, Result};
    pub use crate::options::ContainerOptions;
    pub use crate::validate::{ValidationIssue, ValidationReport};

    // Codecs, for callers that skip the facade
    pub use crate::dat::{DatReader, DatWriter};
    pub use crate::pack::{PackReader, PackWriter};

    pub use crate::recovery::{Promotion, RecoveryOutcome, RecoveryPlan};
}

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
