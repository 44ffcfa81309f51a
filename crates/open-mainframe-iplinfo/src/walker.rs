//! Chain walker.
//!
//! A [`ChainPath`] names the link fields to follow from the root block to a
//! terminal block. [`resolve`] follows them through an [`AddressSpace`],
//! checking every link before it is dereferenced: a null link, an address
//! beyond the addressing-mode limit, or storage the host cannot supply for
//! the next block's full size all stop the walk with
//! [`TraversalError::BrokenLink`].
//!
//! [`AddressSpace`]: crate::storage::AddressSpace

use crate::error::{LinkFault, TraversalError};
use crate::layout::{BlockDescriptor, FieldDescriptor};
use crate::storage::RootHandle;

// ---------------------------------------------------------------------------
//  Chain paths
// ---------------------------------------------------------------------------

/// One hop of a chain path: the block being read and the link leaving it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainStep {
    block: BlockDescriptor,
    link: FieldDescriptor,
}

impl ChainStep {
    pub(crate) fn new(block: BlockDescriptor, link: FieldDescriptor) -> Self {
        Self { block, link }
    }

    /// Block holding the link.
    pub fn block(&self) -> &BlockDescriptor {
        &self.block
    }

    /// Link field followed out of the block.
    pub fn link(&self) -> &FieldDescriptor {
        &self.link
    }
}

/// Route from a root block to a terminal block.
///
/// Built by [`LayoutCatalog::chain_path`](crate::layout::LayoutCatalog::chain_path),
/// which guarantees at least one step and that every step names a link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainPath {
    name: String,
    steps: Vec<ChainStep>,
    terminal: BlockDescriptor,
}

impl ChainPath {
    pub(crate) fn new(name: &str, steps: Vec<ChainStep>, terminal: BlockDescriptor) -> Self {
        Self {
            name: name.to_string(),
            steps,
            terminal,
        }
    }

    /// Path name, used in diagnostics.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Hops in walk order; the first one reads the root block.
    pub fn steps(&self) -> &[ChainStep] {
        &self.steps
    }

    /// Block the walk ends at.
    pub fn terminal(&self) -> &BlockDescriptor {
        &self.terminal
    }

    /// Descriptor of the root block.
    pub fn root(&self) -> &BlockDescriptor {
        self.steps.first().map_or(&self.terminal, |s| &s.block)
    }

    /// Descriptor of the block reached by following step `index`.
    fn target_of(&self, index: usize) -> &BlockDescriptor {
        self.steps
            .get(index + 1)
            .map_or(&self.terminal, |s| &s.block)
    }
}

// ---------------------------------------------------------------------------
//  Block references
// ---------------------------------------------------------------------------

/// Borrowed view of one control block in host storage.
///
/// Holds at least the descriptor's declared size in bytes.
#[derive(Debug, Clone, Copy)]
pub struct BlockRef<'a> {
    descriptor: &'a BlockDescriptor,
    address: u64,
    bytes: &'a [u8],
}

impl<'a> BlockRef<'a> {
    /// Interpret `bytes` as `descriptor`; `None` if they are shorter than the
    /// block.
    pub fn new(descriptor: &'a BlockDescriptor, address: u64, bytes: &'a [u8]) -> Option<Self> {
        (bytes.len() >= descriptor.size()).then_some(Self {
            descriptor,
            address,
            bytes,
        })
    }

    /// Layout this block is read with.
    pub fn descriptor(&self) -> &'a BlockDescriptor {
        self.descriptor
    }

    /// Block name.
    pub fn name(&self) -> &'a str {
        self.descriptor.name()
    }

    /// Address of the first byte.
    pub fn address(&self) -> u64 {
        self.address
    }

    /// The borrowed bytes.
    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Read a big-endian pointer from a link field.
    fn pointer(&self, link: &FieldDescriptor) -> Option<u64> {
        let raw = self.bytes.get(link.offset()..link.end())?;
        match *raw {
            [a, b, c, d] => Some(u64::from(u32::from_be_bytes([a, b, c, d]))),
            [a, b, c, d, e, f, g, h] => Some(u64::from_be_bytes([a, b, c, d, e, f, g, h])),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
//  Traversal
// ---------------------------------------------------------------------------

/// Walk `path` from `root` and return the terminal block.
pub fn resolve<'a>(
    root: &RootHandle<'a>,
    path: &'a ChainPath,
) -> Result<BlockRef<'a>, TraversalError> {
    let space = root.space();
    let limit = space.limit();
    let first = path.root();

    let bytes = space
        .read(root.address(), first.size())
        .ok_or_else(|| TraversalError::RootUnavailable {
            block: first.name().to_string(),
            address: root.address(),
            size: first.size(),
        })?;
    let mut current = BlockRef {
        descriptor: first,
        address: root.address(),
        bytes,
    };

    for (index, step) in path.steps.iter().enumerate() {
        let next = path.target_of(index);
        let broken = |fault: LinkFault| {
            tracing::warn!(
                path = %path.name,
                step = index,
                block = %step.block.name(),
                link = %step.link.name(),
                %fault,
                "Broken control-block link"
            );
            TraversalError::BrokenLink {
                step: index,
                block: step.block.name().to_string(),
                link: step.link.name().to_string(),
                fault,
            }
        };

        let address = current.pointer(&step.link).ok_or_else(|| {
            broken(LinkFault::Unmapped {
                address: current.address + step.link.offset() as u64,
                size: step.link.width(),
            })
        })?;
        if address == 0 {
            return Err(broken(LinkFault::Null));
        }
        let in_range = address
            .checked_add(next.size() as u64)
            .is_some_and(|end| end <= limit);
        if !in_range {
            return Err(broken(LinkFault::OutOfRange { address, limit }));
        }
        let bytes = space.read(address, next.size()).ok_or_else(|| {
            broken(LinkFault::Unmapped {
                address,
                size: next.size(),
            })
        })?;

        tracing::debug!(
            path = %path.name,
            step = index,
            from = %step.block.name(),
            to = %next.name(),
            address = %format_args!("{address:#010x}"),
            "Followed control-block link"
        );
        current = BlockRef {
            descriptor: next,
            address,
            bytes,
        };
    }

    Ok(current)
}
