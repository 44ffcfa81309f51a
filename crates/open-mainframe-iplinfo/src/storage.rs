//! Host storage access.
//!
//! The chain walker reads control blocks through the [`AddressSpace`] trait
//! and starts from a [`RootHandle`] handed out by a [`ControlBlockLocator`].
//! Both belong to the host environment. [`StorageImage`] is the in-memory
//! implementation used for storage dumps and tests.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{StorageError, TraversalError};

// ---------------------------------------------------------------------------
//  Addressing mode
// ---------------------------------------------------------------------------

/// Addressing mode of the storage being walked; bounds plausible addresses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum AddressingMode {
    /// 24-bit (below the line).
    Amode24,
    /// 31-bit (below the bar).
    #[default]
    Amode31,
    /// 64-bit.
    Amode64,
}

impl AddressingMode {
    /// One past the highest addressable byte.
    pub fn limit(self) -> u64 {
        match self {
            AddressingMode::Amode24 => 1 << 24,
            AddressingMode::Amode31 => 1 << 31,
            AddressingMode::Amode64 => u64::MAX,
        }
    }

    /// Number of address bits.
    pub fn bits(self) -> u8 {
        match self {
            AddressingMode::Amode24 => 24,
            AddressingMode::Amode31 => 31,
            AddressingMode::Amode64 => 64,
        }
    }
}

impl TryFrom<u8> for AddressingMode {
    type Error = String;

    fn try_from(bits: u8) -> Result<Self, Self::Error> {
        match bits {
            24 => Ok(AddressingMode::Amode24),
            31 => Ok(AddressingMode::Amode31),
            64 => Ok(AddressingMode::Amode64),
            other => Err(format!("unsupported addressing mode {other}; expected 24, 31 or 64")),
        }
    }
}

impl From<AddressingMode> for u8 {
    fn from(mode: AddressingMode) -> Self {
        mode.bits()
    }
}

// ---------------------------------------------------------------------------
//  Host traits
// ---------------------------------------------------------------------------

/// Read-only view of host storage.
pub trait AddressSpace: Send + Sync {
    /// One past the highest address a link may plausibly hold.
    fn limit(&self) -> u64;

    /// Borrow `len` bytes starting at `address`, or `None` if any of them
    /// cannot be read.
    fn read(&self, address: u64, len: usize) -> Option<&[u8]>;
}

/// Supplies the entry point of the control-block chain.
pub trait ControlBlockLocator {
    /// Return the root handle, or [`TraversalError::NoRoot`] when the host
    /// has no live root.
    fn locate(&self) -> Result<RootHandle<'_>, TraversalError>;
}

/// The environment-provided entry point into a control-block chain.
#[derive(Clone, Copy)]
pub struct RootHandle<'a> {
    space: &'a dyn AddressSpace,
    address: u64,
}

impl<'a> RootHandle<'a> {
    /// Wrap a root block address inside `space`.
    pub fn new(space: &'a dyn AddressSpace, address: u64) -> Self {
        Self { space, address }
    }

    /// Address of the root block.
    pub fn address(&self) -> u64 {
        self.address
    }

    /// Storage the chain lives in.
    pub fn space(&self) -> &'a dyn AddressSpace {
        self.space
    }
}

impl std::fmt::Debug for RootHandle<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RootHandle")
            .field("address", &format_args!("{:#x}", self.address))
            .field("limit", &format_args!("{:#x}", self.space.limit()))
            .finish()
    }
}

// ---------------------------------------------------------------------------
//  Storage image
// ---------------------------------------------------------------------------

/// Sparse in-memory storage: non-overlapping regions keyed by base address.
#[derive(Debug, Clone, Default)]
pub struct StorageImage {
    mode: AddressingMode,
    regions: BTreeMap<u64, Vec<u8>>,
    root: Option<u64>,
}

impl StorageImage {
    /// Create an empty image with no root.
    pub fn new(mode: AddressingMode) -> Self {
        Self {
            mode,
            regions: BTreeMap::new(),
            root: None,
        }
    }

    /// Load a flat storage dump whose first byte is at `base`.
    pub fn from_dump(
        path: &Path,
        base: u64,
        mode: AddressingMode,
    ) -> Result<Self, StorageError> {
        let bytes = std::fs::read(path).map_err(|source| StorageError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), base = %format_args!("{base:#x}"), len = bytes.len(), "Storage dump loaded");
        let mut image = Self::new(mode);
        image.map(base, bytes)?;
        Ok(image)
    }

    /// Set the root block address handed out by [`ControlBlockLocator::locate`].
    pub fn with_root(mut self, address: u64) -> Self {
        self.root = Some(address);
        self
    }

    /// Addressing mode of this image.
    pub fn mode(&self) -> AddressingMode {
        self.mode
    }

    /// Number of mapped regions.
    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    /// Map `bytes` at `base`.
    pub fn map(&mut self, base: u64, bytes: Vec<u8>) -> Result<(), StorageError> {
        let len = bytes.len();
        let end = base
            .checked_add(len as u64)
            .filter(|&end| end <= self.mode.limit())
            .ok_or(StorageError::BeyondLimit {
                base,
                len,
                limit: self.mode.limit(),
            })?;

        let before = self
            .regions
            .range(..=base)
            .next_back()
            .is_some_and(|(&b, r)| b + r.len() as u64 > base);
        let after = self
            .regions
            .range(base..)
            .next()
            .is_some_and(|(&b, _)| b < end);
        if before || after {
            return Err(StorageError::OverlappingRegion { base, len });
        }

        self.regions.insert(base, bytes);
        Ok(())
    }

    /// Overwrite bytes inside an already mapped region.
    ///
    /// Returns `false` if the range is not fully mapped.
    pub fn write(&mut self, address: u64, bytes: &[u8]) -> bool {
        let Some((&base, region)) = self.regions.range_mut(..=address).next_back() else {
            return false;
        };
        let start = (address - base) as usize;
        match region.get_mut(start..start + bytes.len()) {
            Some(dest) => {
                dest.copy_from_slice(bytes);
                true
            }
            None => false,
        }
    }
}

impl AddressSpace for StorageImage {
    fn limit(&self) -> u64 {
        self.mode.limit()
    }

    fn read(&self, address: u64, len: usize) -> Option<&[u8]> {
        let (&base, region) = self.regions.range(..=address).next_back()?;
        let start = usize::try_from(address - base).ok()?;
        region.get(start..start.checked_add(len)?)
    }
}

impl ControlBlockLocator for StorageImage {
    fn locate(&self) -> Result<RootHandle<'_>, TraversalError> {
        self.root
            .map(|address| RootHandle::new(self, address))
            .ok_or(TraversalError::NoRoot)
    }
}
