//! IPLINFO configuration: storage addressing, root address and layout overrides.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ebcdic::TextEncoding;
use crate::error::{ConfigError, LayoutError};
use crate::layout::{zos_blocks, LayoutCatalog};
use crate::storage::AddressingMode;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IplInfoConfig {
    /// Storage settings.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Layout catalog settings.
    #[serde(default)]
    pub layout: LayoutConfig,
}

/// How storage is addressed and where the chain starts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Addressing mode: 24, 31 or 64.
    #[serde(default)]
    pub addressing_mode: AddressingMode,
    /// Address of the PSA.
    #[serde(default)]
    pub root_address: u64,
}

/// Adjustments applied to the built-in catalog before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Encoding of every printable field.
    #[serde(default)]
    pub text_encoding: TextEncoding,
    /// Printable fields moved to a different offset or width.
    #[serde(default)]
    pub overrides: Vec<FieldOverride>,
}

/// New position for one printable field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldOverride {
    /// Block name, e.g. "CVTEXT2".
    pub block: String,
    /// Field name, e.g. "IODF_ID".
    pub field: String,
    /// Byte offset within the block.
    pub offset: usize,
    /// Width in bytes.
    pub width: usize,
}

impl IplInfoConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Build and validate the layout catalog this configuration describes.
    pub fn catalog(&self) -> Result<LayoutCatalog, LayoutError> {
        let mut blocks = zos_blocks(self.layout.text_encoding);
        for o in &self.layout.overrides {
            let block = blocks
                .iter_mut()
                .find(|b| b.name() == o.block)
                .ok_or_else(|| LayoutError::UnknownBlock {
                    block: o.block.clone(),
                })?;
            tracing::debug!(
                block = %o.block,
                field = %o.field,
                offset = o.offset,
                width = o.width,
                "Applying layout override"
            );
            block.reposition(&o.field, o.offset, o.width)?;
        }
        LayoutCatalog::new(blocks)
    }
}
