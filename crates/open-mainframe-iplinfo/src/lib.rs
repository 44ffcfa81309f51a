//! # IPLINFO: IPL Configuration from Control Blocks
//!
//! Reports how a z/OS system was IPLed by walking the control-block chain
//! from the PSA and reading fixed-width fields out of the IPL Parameter Area
//! and CVT extension 2.
//!
//! ## Modules
//!
//! - **layout**: validated catalog of block sizes and field offsets
//! - **walker**: chain paths and link-checked traversal from the root block
//! - **extract**: bounded, owned copies of fixed-width text fields
//! - **snapshot**: assembly of the load member, parmlib, device and IODF values
//! - **storage**: host storage access traits and in-memory storage images
//! - **config**: TOML configuration and layout overrides
//! - **output**: text and JSON rendering for the CLI
//!
//! # Example
//!
//! ```rust
//! use open_mainframe_iplinfo::{AddressingMode, SnapshotAssembler, StorageImage};
//!
//! let assembler = SnapshotAssembler::zos().unwrap();
//! let image = StorageImage::new(AddressingMode::Amode31);
//! // No root has been supplied by the host, so the walk fails cleanly.
//! assert!(assembler.snapshot_from(&image).is_err());
//! ```

#![forbid(unsafe_code)]

pub mod config;
pub mod ebcdic;
pub mod error;
pub mod extract;
pub mod layout;
pub mod output;
pub mod snapshot;
pub mod storage;
pub mod walker;

pub use config::IplInfoConfig;
pub use ebcdic::TextEncoding;
pub use error::{
    ConfigError, ExtractionError, LayoutError, LinkFault, Result, SnapshotError, StorageError,
    TraversalError,
};
pub use extract::{extract, FieldValue};
pub use layout::{BlockDescriptor, FieldDescriptor, FieldKind, LayoutCatalog};
pub use snapshot::{ConfigurationSnapshot, SnapshotAssembler, SnapshotField};
pub use storage::{AddressSpace, AddressingMode, ControlBlockLocator, RootHandle, StorageImage};
pub use walker::{resolve, BlockRef, ChainPath, ChainStep};
