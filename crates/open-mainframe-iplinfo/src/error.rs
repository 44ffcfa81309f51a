//! IPLINFO error types.
//!
//! Layout errors describe defects in the static control-block catalog and are
//! fatal at startup. Traversal and extraction errors are recoverable and are
//! reported to the snapshot caller with the failing step or field attached.

use std::fmt;
use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use crate::snapshot::SnapshotField;

// ---------------------------------------------------------------------------
//  Layout catalog
// ---------------------------------------------------------------------------

/// Defects in a control-block layout description.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum LayoutError {
    /// Two blocks share a name.
    #[error("control block '{block}' is declared more than once")]
    #[diagnostic(code(iplinfo::layout::duplicate_block))]
    DuplicateBlock { block: String },

    /// Two fields of one block share a name.
    #[error("field '{field}' is declared more than once in {block}")]
    #[diagnostic(code(iplinfo::layout::duplicate_field))]
    DuplicateField { block: String, field: String },

    /// A field covers no bytes.
    #[error("field {block}.{field} has zero width")]
    #[diagnostic(code(iplinfo::layout::zero_width))]
    ZeroWidth { block: String, field: String },

    /// A field extends past the end of its block.
    #[error("field {block}.{field} ends at byte {end}, past the {size}-byte block")]
    #[diagnostic(code(iplinfo::layout::field_out_of_bounds))]
    FieldOutOfBounds {
        block: String,
        field: String,
        end: usize,
        size: usize,
    },

    /// A field starts before the previously declared field.
    #[error("field {block}.{field} at offset {offset} is declared after {previous} at offset {previous_offset}")]
    #[diagnostic(code(iplinfo::layout::out_of_order))]
    OutOfOrder {
        block: String,
        field: String,
        offset: usize,
        previous: String,
        previous_offset: usize,
    },

    /// A field overlaps the previously declared field.
    #[error("field {block}.{field} overlaps {previous}")]
    #[diagnostic(code(iplinfo::layout::overlap))]
    Overlap {
        block: String,
        field: String,
        previous: String,
    },

    /// A link field is not pointer-sized.
    #[error("link field {block}.{field} is {width} bytes wide; links must be 4 or 8 bytes")]
    #[diagnostic(code(iplinfo::layout::link_width))]
    BadLinkWidth {
        block: String,
        field: String,
        width: usize,
    },

    /// A block name is not in the catalog.
    #[error("control block '{block}' is not in the layout catalog")]
    #[diagnostic(code(iplinfo::layout::unknown_block))]
    UnknownBlock { block: String },

    /// A field name is not declared by its block.
    #[error("field '{field}' is not declared in {block}")]
    #[diagnostic(code(iplinfo::layout::unknown_field))]
    UnknownField { block: String, field: String },

    /// A chain step names a field that is not a link.
    #[error("field {block}.{field} is not a link to another control block")]
    #[diagnostic(code(iplinfo::layout::not_a_link))]
    NotALink { block: String, field: String },

    /// A field expected to hold text has a different kind.
    #[error("field {block}.{field} is not a printable field")]
    #[diagnostic(code(iplinfo::layout::not_text))]
    NotText { block: String, field: String },

    /// A chain path has no steps.
    #[error("chain path '{path}' has no steps")]
    #[diagnostic(code(iplinfo::layout::empty_path))]
    EmptyPath { path: String },
}

// ---------------------------------------------------------------------------
//  Chain traversal
// ---------------------------------------------------------------------------

/// Reason a link field could not be followed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkFault {
    /// The link field holds zero.
    Null,
    /// The address lies at or beyond the host's addressable limit.
    OutOfRange { address: u64, limit: u64 },
    /// The host cannot supply the next block's bytes at this address.
    Unmapped { address: u64, size: usize },
}

impl fmt::Display for LinkFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkFault::Null => write!(f, "null pointer"),
            LinkFault::OutOfRange { address, limit } => {
                write!(f, "address {address:#x} is outside the addressable range (limit {limit:#x})")
            }
            LinkFault::Unmapped { address, size } => {
                write!(f, "{size} bytes at {address:#x} are not accessible")
            }
        }
    }
}

/// Failures while walking a control-block chain.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum TraversalError {
    /// The host environment has no live root to offer.
    #[error("no control-block root is available")]
    #[diagnostic(
        code(iplinfo::traversal::no_root),
        help("the host locator must supply the PSA address before a walk can start")
    )]
    NoRoot,

    /// The root block cannot be read at the supplied address.
    #[error("root block {block} is not accessible at {address:#x} ({size} bytes)")]
    #[diagnostic(code(iplinfo::traversal::root_unavailable))]
    RootUnavailable {
        block: String,
        address: u64,
        size: usize,
    },

    /// A link could not be followed at the given chain step.
    #[error("broken link at step {step}: {block}.{link}: {fault}")]
    #[diagnostic(code(iplinfo::traversal::broken_link))]
    BrokenLink {
        step: usize,
        block: String,
        link: String,
        fault: LinkFault,
    },
}

// ---------------------------------------------------------------------------
//  Field extraction
// ---------------------------------------------------------------------------

/// Failures while reading a field from a resolved block.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum ExtractionError {
    /// The field range is not covered by the block's bytes.
    #[error("field {block}.{field} ({offset}+{width}) exceeds the {available} available bytes")]
    #[diagnostic(code(iplinfo::extract::out_of_range))]
    OutOfRange {
        block: String,
        field: String,
        offset: usize,
        width: usize,
        available: usize,
    },

    /// The field is padding or a link, not printable text.
    #[error("field {block}.{field} is not a printable field")]
    #[diagnostic(code(iplinfo::extract::not_printable))]
    NotPrintable { block: String, field: String },
}

// ---------------------------------------------------------------------------
//  Snapshot assembly
// ---------------------------------------------------------------------------

/// A snapshot could not be built; names the field whose lookup failed.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum SnapshotError {
    /// The block holding the field could not be reached.
    #[error("cannot locate {field}: {source}")]
    #[diagnostic(code(iplinfo::snapshot::traversal))]
    Traversal {
        field: SnapshotField,
        #[source]
        source: TraversalError,
    },

    /// The field could not be read from its block.
    #[error("cannot read {field}: {source}")]
    #[diagnostic(code(iplinfo::snapshot::extraction))]
    Extraction {
        field: SnapshotField,
        #[source]
        source: ExtractionError,
    },
}

impl SnapshotError {
    /// The snapshot field whose lookup failed.
    pub fn field(&self) -> SnapshotField {
        match self {
            SnapshotError::Traversal { field, .. } | SnapshotError::Extraction { field, .. } => {
                *field
            }
        }
    }
}

// ---------------------------------------------------------------------------
//  Host collaborators
// ---------------------------------------------------------------------------

/// Failures while building a storage image.
#[derive(Debug, Error, Diagnostic)]
pub enum StorageError {
    /// A dump file could not be read.
    #[error("cannot read storage dump {path}: {source}")]
    #[diagnostic(code(iplinfo::storage::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A region would overlap one already mapped.
    #[error("region at {base:#x} ({len} bytes) overlaps an existing region")]
    #[diagnostic(code(iplinfo::storage::overlap))]
    OverlappingRegion { base: u64, len: usize },

    /// A region extends past the addressable limit.
    #[error("region at {base:#x} ({len} bytes) exceeds the addressable limit {limit:#x}")]
    #[diagnostic(code(iplinfo::storage::beyond_limit))]
    BeyondLimit { base: u64, len: usize, limit: u64 },
}

/// Failures while loading configuration.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("cannot read configuration {path}: {source}")]
    #[diagnostic(code(iplinfo::config::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration is not valid TOML for this schema.
    #[error("invalid configuration: {0}")]
    #[diagnostic(code(iplinfo::config::parse))]
    Parse(#[from] toml::de::Error),
}

/// Result type for snapshot operations.
pub type Result<T, E = SnapshotError> = std::result::Result<T, E>;
