//! Control-block layout catalog.
//!
//! Each [`BlockDescriptor`] lists the fields of one control block by offset,
//! width and kind. A [`LayoutCatalog`] validates every descriptor when it is
//! built, so traversal code can rely on field ranges lying inside their
//! block and never overlapping.
//!
//! The built-in catalog ([`LayoutCatalog::zos`]) maps the cut-down portions
//! of the PSA, CVT, ECVT, IPA and CVT extension 2 needed to report how the
//! system was IPLed.

use std::collections::HashSet;

use crate::ebcdic::TextEncoding;
use crate::error::LayoutError;
use crate::walker::{ChainPath, ChainStep};

// ---------------------------------------------------------------------------
//  z/OS block and field names
// ---------------------------------------------------------------------------

/// Prefixed Save Area.
pub const PSA: &str = "PSA";
/// Communications Vector Table.
pub const CVT: &str = "CVT";
/// Extended CVT.
pub const ECVT: &str = "ECVT";
/// IPL Parameter Area.
pub const IPA: &str = "IPA";
/// CVT extension 2.
pub const CVTEXT2: &str = "CVTEXT2";

/// PSA link to the CVT.
pub const PSACVT: &str = "PSACVT";
/// CVT link to the ECVT.
pub const CVTECVT: &str = "CVTECVT";
/// CVT link to CVT extension 2.
pub const CVTEXT2_PTR: &str = "CVTEXT2";
/// ECVT link to the IPA.
pub const ECVTIPA: &str = "ECVTIPA";
/// LOADxx member suffix used at IPL.
pub const IPALOADS: &str = "IPALOADS";
/// Dataset name of the parmlib holding LOADxx.
pub const IPALPDSN: &str = "IPALPDSN";
/// Device number of the LOADxx volume.
pub const IPALPDDV: &str = "IPALPDDV";
/// Active IODF identifier. The offset is provisional.
pub const IODF_ID: &str = "IODF_ID";

// ---------------------------------------------------------------------------
//  Field descriptors
// ---------------------------------------------------------------------------

/// What a field holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Bytes the catalog does not interpret.
    Padding,
    /// Big-endian address of another control block.
    Link,
    /// Fixed-width character data, blank or NUL padded.
    Text(TextEncoding),
}

/// One field of a control block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    name: String,
    offset: usize,
    width: usize,
    kind: FieldKind,
}

impl FieldDescriptor {
    /// Create a field descriptor.
    pub fn new(name: impl Into<String>, offset: usize, width: usize, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            offset,
            width,
            kind,
        }
    }

    /// Field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Byte offset from the start of the block.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Width in bytes.
    pub fn width(&self) -> usize {
        self.width
    }

    /// One past the last byte of the field, saturating at `usize::MAX`.
    pub fn end(&self) -> usize {
        self.offset.saturating_add(self.width)
    }

    /// Field kind.
    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    fn overlaps(&self, other: &FieldDescriptor) -> bool {
        self.offset < other.end() && other.offset < self.end()
    }
}

// ---------------------------------------------------------------------------
//  Block descriptors
// ---------------------------------------------------------------------------

/// Layout of one control block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockDescriptor {
    name: String,
    size: usize,
    fields: Vec<FieldDescriptor>,
}

impl BlockDescriptor {
    /// Start a block of `size` bytes with no fields.
    pub fn new(name: impl Into<String>, size: usize) -> Self {
        Self {
            name: name.into(),
            size,
            fields: Vec::new(),
        }
    }

    /// Append a field.
    pub fn with_field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    /// Append an unnamed padding range.
    pub fn reserved(self, offset: usize, width: usize) -> Self {
        let name = format!("{}+{offset:#X}", self.name);
        self.with_field(FieldDescriptor::new(name, offset, width, FieldKind::Padding))
    }

    /// Append a 31-bit link field.
    pub fn link(self, name: &str, offset: usize) -> Self {
        self.with_field(FieldDescriptor::new(name, offset, 4, FieldKind::Link))
    }

    /// Append a printable field.
    pub fn text(self, name: &str, offset: usize, width: usize, encoding: TextEncoding) -> Self {
        self.with_field(FieldDescriptor::new(
            name,
            offset,
            width,
            FieldKind::Text(encoding),
        ))
    }

    /// Block name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Minimum number of bytes that must be readable for this block.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Look up a field by name, failing with [`LayoutError::UnknownField`].
    pub fn require_field(&self, name: &str) -> Result<&FieldDescriptor, LayoutError> {
        self.field(name).ok_or_else(|| LayoutError::UnknownField {
            block: self.name.clone(),
            field: name.to_string(),
        })
    }

    /// Move a printable field to a new offset and width.
    ///
    /// Padding ranges the field now covers are dropped and the fields are
    /// re-ordered by offset. The block keeps its declared size, so the
    /// result still has to pass [`BlockDescriptor::validate`].
    pub fn reposition(
        &mut self,
        name: &str,
        offset: usize,
        width: usize,
    ) -> Result<(), LayoutError> {
        let index = self
            .fields
            .iter()
            .position(|f| f.name == name)
            .ok_or_else(|| LayoutError::UnknownField {
                block: self.name.clone(),
                field: name.to_string(),
            })?;
        if !matches!(self.fields[index].kind, FieldKind::Text(_)) {
            return Err(LayoutError::NotText {
                block: self.name.clone(),
                field: name.to_string(),
            });
        }

        let mut moved = self.fields.remove(index);
        moved.offset = offset;
        moved.width = width;
        self.fields
            .retain(|f| !(f.kind == FieldKind::Padding && f.overlaps(&moved)));
        self.fields.push(moved);
        self.fields.sort_by_key(|f| f.offset);
        Ok(())
    }

    /// Check the layout invariants for this block.
    ///
    /// Every field must have a non-zero width, end inside the block and
    /// follow the previous field without overlapping it. Links must be 4 or
    /// 8 bytes wide and names must be unique.
    pub fn validate(&self) -> Result<(), LayoutError> {
        let mut names = HashSet::new();
        let mut previous: Option<&FieldDescriptor> = None;

        for field in &self.fields {
            if !names.insert(field.name.as_str()) {
                return Err(LayoutError::DuplicateField {
                    block: self.name.clone(),
                    field: field.name.clone(),
                });
            }
            if field.width == 0 {
                return Err(LayoutError::ZeroWidth {
                    block: self.name.clone(),
                    field: field.name.clone(),
                });
            }
            let in_bounds = field
                .offset
                .checked_add(field.width)
                .is_some_and(|end| end <= self.size);
            if !in_bounds {
                return Err(LayoutError::FieldOutOfBounds {
                    block: self.name.clone(),
                    field: field.name.clone(),
                    end: field.end(),
                    size: self.size,
                });
            }
            if field.kind == FieldKind::Link && !matches!(field.width, 4 | 8) {
                return Err(LayoutError::BadLinkWidth {
                    block: self.name.clone(),
                    field: field.name.clone(),
                    width: field.width,
                });
            }
            if let Some(prev) = previous {
                if field.offset < prev.offset {
                    return Err(LayoutError::OutOfOrder {
                        block: self.name.clone(),
                        field: field.name.clone(),
                        offset: field.offset,
                        previous: prev.name.clone(),
                        previous_offset: prev.offset,
                    });
                }
                if field.offset < prev.end() {
                    return Err(LayoutError::Overlap {
                        block: self.name.clone(),
                        field: field.name.clone(),
                        previous: prev.name.clone(),
                    });
                }
            }
            previous = Some(field);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
//  Catalog
// ---------------------------------------------------------------------------

/// A validated set of control-block layouts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutCatalog {
    blocks: Vec<BlockDescriptor>,
}

impl LayoutCatalog {
    /// Validate `blocks` and build a catalog from them.
    pub fn new(blocks: Vec<BlockDescriptor>) -> Result<Self, LayoutError> {
        let mut names = HashSet::new();
        for block in &blocks {
            if !names.insert(block.name.as_str()) {
                return Err(LayoutError::DuplicateBlock {
                    block: block.name.clone(),
                });
            }
            block.validate()?;
        }
        Ok(Self { blocks })
    }

    /// The built-in z/OS catalog with EBCDIC text fields.
    pub fn zos() -> Result<Self, LayoutError> {
        Self::new(zos_blocks(TextEncoding::Ebcdic))
    }

    /// All blocks in declaration order.
    pub fn blocks(&self) -> &[BlockDescriptor] {
        &self.blocks
    }

    /// Look up a block by name.
    pub fn block(&self, name: &str) -> Option<&BlockDescriptor> {
        self.blocks.iter().find(|b| b.name == name)
    }

    /// Look up a block by name, failing with [`LayoutError::UnknownBlock`].
    pub fn require_block(&self, name: &str) -> Result<&BlockDescriptor, LayoutError> {
        self.block(name).ok_or_else(|| LayoutError::UnknownBlock {
            block: name.to_string(),
        })
    }

    /// Look up a printable field.
    pub fn text_field(&self, block: &str, field: &str) -> Result<FieldDescriptor, LayoutError> {
        let descriptor = self.require_block(block)?.require_field(field)?;
        match descriptor.kind {
            FieldKind::Text(_) => Ok(descriptor.clone()),
            _ => Err(LayoutError::NotText {
                block: block.to_string(),
                field: field.to_string(),
            }),
        }
    }

    /// Build a chain path from `(block, link)` steps ending at `terminal`.
    ///
    /// Every step must name a link field of its block. The path carries
    /// copies of the descriptors, so it stays valid independently of the
    /// catalog.
    pub fn chain_path(
        &self,
        name: &str,
        steps: &[(&str, &str)],
        terminal: &str,
    ) -> Result<ChainPath, LayoutError> {
        if steps.is_empty() {
            return Err(LayoutError::EmptyPath {
                path: name.to_string(),
            });
        }
        let mut resolved = Vec::with_capacity(steps.len());
        for &(block_name, link_name) in steps {
            let block = self.require_block(block_name)?;
            let link = block.require_field(link_name)?;
            if link.kind != FieldKind::Link {
                return Err(LayoutError::NotALink {
                    block: block_name.to_string(),
                    field: link_name.to_string(),
                });
            }
            resolved.push(ChainStep::new(block.clone(), link.clone()));
        }
        let terminal = self.require_block(terminal)?.clone();
        Ok(ChainPath::new(name, resolved, terminal))
    }
}

/// Unvalidated descriptors for the built-in z/OS catalog.
///
/// Exposed so configuration can adjust field positions before the catalog
/// is validated.
pub fn zos_blocks(encoding: TextEncoding) -> Vec<BlockDescriptor> {
    vec![
        BlockDescriptor::new(PSA, 20).reserved(0, 16).link(PSACVT, 16),
        BlockDescriptor::new(CVT, 332)
            .reserved(0, 140)
            .link(CVTECVT, 140)
            .reserved(144, 184)
            .link(CVTEXT2_PTR, 328),
        BlockDescriptor::new(ECVT, 396)
            .reserved(0, 392)
            .link(ECVTIPA, 392),
        BlockDescriptor::new(IPA, 96)
            .reserved(0, 20)
            .text(IPALOADS, 20, 2, encoding)
            .reserved(22, 26)
            .text(IPALPDSN, 48, 44, encoding)
            .text(IPALPDDV, 92, 4, encoding),
        BlockDescriptor::new(CVTEXT2, 8)
            .reserved(0, 6)
            .text(IODF_ID, 6, 2, encoding),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zos_catalog_validates() {
        let catalog = LayoutCatalog::zos().unwrap();
        assert_eq!(catalog.blocks().len(), 5);
        assert_eq!(catalog.require_block(IPA).unwrap().size(), 96);
    }

    #[test]
    fn test_every_field_fits_its_block() {
        for encoding in [TextEncoding::Ebcdic, TextEncoding::Ascii] {
            let catalog = LayoutCatalog::new(zos_blocks(encoding)).unwrap();
            for block in catalog.blocks() {
                for field in block.fields() {
                    assert!(
                        field.end() <= block.size(),
                        "{}.{} ends at {} past {}",
                        block.name(),
                        field.name(),
                        field.end(),
                        block.size()
                    );
                }
            }
        }
    }

    #[test]
    fn test_fields_are_ordered_and_disjoint() {
        let catalog = LayoutCatalog::zos().unwrap();
        for block in catalog.blocks() {
            for pair in block.fields().windows(2) {
                assert!(pair[0].end() <= pair[1].offset(), "{}", block.name());
            }
        }
    }

    #[test]
    fn test_documented_offsets() {
        let catalog = LayoutCatalog::zos().unwrap();
        let field = |b: &str, f: &str| {
            let d = catalog.require_block(b).unwrap().require_field(f).unwrap();
            (d.offset(), d.width())
        };
        assert_eq!(field(PSA, PSACVT), (16, 4));
        assert_eq!(field(CVT, CVTECVT), (140, 4));
        assert_eq!(field(CVT, CVTEXT2_PTR), (328, 4));
        assert_eq!(field(ECVT, ECVTIPA), (392, 4));
        assert_eq!(field(IPA, IPALOADS), (0x14, 2));
        assert_eq!(field(IPA, IPALPDSN), (0x30, 44));
        assert_eq!(field(IPA, IPALPDDV), (0x5C, 4));
        assert_eq!(field(CVTEXT2, IODF_ID), (6, 2));
    }

    #[test]
    fn test_field_past_block_end_rejected() {
        let block = BlockDescriptor::new("TINY", 8).text("NAME", 4, 8, TextEncoding::Ascii);
        let err = LayoutCatalog::new(vec![block]).unwrap_err();
        assert_eq!(
            err,
            LayoutError::FieldOutOfBounds {
                block: "TINY".into(),
                field: "NAME".into(),
                end: 12,
                size: 8,
            }
        );
    }

    #[test]
    fn test_link_overlapping_text_rejected() {
        let block = BlockDescriptor::new("BLK", 16)
            .text("NAME", 0, 8, TextEncoding::Ebcdic)
            .link("NEXT", 6);
        let err = LayoutCatalog::new(vec![block]).unwrap_err();
        assert!(matches!(err, LayoutError::Overlap { ref field, ref previous, .. }
            if field == "NEXT" && previous == "NAME"));
    }

    #[test]
    fn test_out_of_order_rejected() {
        let block = BlockDescriptor::new("BLK", 16)
            .link("NEXT", 8)
            .text("NAME", 0, 4, TextEncoding::Ebcdic);
        let err = LayoutCatalog::new(vec![block]).unwrap_err();
        assert!(matches!(err, LayoutError::OutOfOrder { offset: 0, previous_offset: 8, .. }));
    }

    #[test]
    fn test_link_width_rejected() {
        let block = BlockDescriptor::new("BLK", 16).with_field(FieldDescriptor::new(
            "NEXT",
            0,
            2,
            FieldKind::Link,
        ));
        let err = LayoutCatalog::new(vec![block]).unwrap_err();
        assert!(matches!(err, LayoutError::BadLinkWidth { width: 2, .. }));
    }

    #[test]
    fn test_zero_width_and_duplicates_rejected() {
        let zero = BlockDescriptor::new("BLK", 4).text("E", 0, 0, TextEncoding::Ascii);
        assert!(matches!(
            LayoutCatalog::new(vec![zero]),
            Err(LayoutError::ZeroWidth { .. })
        ));

        let dup_field = BlockDescriptor::new("BLK", 8)
            .text("A", 0, 2, TextEncoding::Ascii)
            .text("A", 4, 2, TextEncoding::Ascii);
        assert!(matches!(
            LayoutCatalog::new(vec![dup_field]),
            Err(LayoutError::DuplicateField { .. })
        ));

        let dup_block = vec![BlockDescriptor::new("BLK", 4), BlockDescriptor::new("BLK", 4)];
        assert!(matches!(
            LayoutCatalog::new(dup_block),
            Err(LayoutError::DuplicateBlock { .. })
        ));
    }

    #[test]
    fn test_chain_path_requires_links() {
        let catalog = LayoutCatalog::zos().unwrap();
        let err = catalog
            .chain_path("bad", &[(IPA, IPALPDSN)], IPA)
            .unwrap_err();
        assert!(matches!(err, LayoutError::NotALink { .. }));

        let err = catalog.chain_path("bad", &[(PSA, "PSAXXX")], CVT).unwrap_err();
        assert!(matches!(err, LayoutError::UnknownField { .. }));

        let err = catalog.chain_path("bad", &[], CVT).unwrap_err();
        assert!(matches!(err, LayoutError::EmptyPath { .. }));
    }

    #[test]
    fn test_reposition_replaces_padding() {
        let mut blocks = zos_blocks(TextEncoding::Ebcdic);
        let ext2 = blocks.iter_mut().find(|b| b.name() == CVTEXT2).unwrap();
        ext2.reposition(IODF_ID, 0, 8).unwrap();
        assert_eq!(ext2.size(), 8);
        assert_eq!(ext2.fields().len(), 1);

        let catalog = LayoutCatalog::new(blocks).unwrap();
        let iodf = catalog.text_field(CVTEXT2, IODF_ID).unwrap();
        assert_eq!((iodf.offset(), iodf.width()), (0, 8));
    }

    #[test]
    fn test_reposition_past_end_fails_validation() {
        let mut blocks = zos_blocks(TextEncoding::Ebcdic);
        let ext2 = blocks.iter_mut().find(|b| b.name() == CVTEXT2).unwrap();
        ext2.reposition(IODF_ID, 2, 8).unwrap();
        assert_eq!(ext2.size(), 8);
        assert!(matches!(
            LayoutCatalog::new(blocks),
            Err(LayoutError::FieldOutOfBounds { end: 10, size: 8, .. })
        ));
    }

    #[test]
    fn test_overflowing_field_rejected() {
        let block = BlockDescriptor::new("BLK", 8).with_field(FieldDescriptor::new(
            "X",
            usize::MAX,
            2,
            FieldKind::Text(TextEncoding::Ascii),
        ));
        assert_eq!(block.fields()[0].end(), usize::MAX);
        assert!(matches!(
            LayoutCatalog::new(vec![block]),
            Err(LayoutError::FieldOutOfBounds { size: 8, .. })
        ));
    }

    #[test]
    fn test_reposition_onto_neighbour_fails_validation() {
        let mut blocks = zos_blocks(TextEncoding::Ebcdic);
        let ipa = blocks.iter_mut().find(|b| b.name() == IPA).unwrap();
        ipa.reposition(IPALOADS, 46, 4).unwrap();
        assert!(matches!(
            LayoutCatalog::new(blocks),
            Err(LayoutError::Overlap { .. })
        ));
    }

    #[test]
    fn test_reposition_rejects_links() {
        let mut blocks = zos_blocks(TextEncoding::Ebcdic);
        let psa = blocks.iter_mut().find(|b| b.name() == PSA).unwrap();
        assert!(matches!(
            psa.reposition(PSACVT, 0, 4),
            Err(LayoutError::NotText { .. })
        ));
    }
}
