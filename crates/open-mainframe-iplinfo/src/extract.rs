//! Field extraction.
//!
//! Fixed-width character fields in control blocks are blank or NUL padded
//! and carry no terminator. [`extract`] copies exactly the declared range out
//! of a resolved block, trims the trailing fill and returns an owned
//! [`FieldValue`] whose length never exceeds the declared width.

use std::fmt;

use serde::{Serialize, Serializer};

use crate::error::ExtractionError;
use crate::layout::{FieldDescriptor, FieldKind};
use crate::walker::BlockRef;

/// Substituted for bytes that decode to control characters.
const UNPRINTABLE: char = '.';

/// An owned, length-tagged field value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldValue {
    name: String,
    width: usize,
    raw: Vec<u8>,
    text: String,
}

impl FieldValue {
    /// Name of the field this value was read from.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared width of the field.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Significant bytes, trailing fill removed, in the field's encoding.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// Number of significant bytes.
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    /// True if the field held only fill.
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Decoded text.
    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.text)
    }
}

/// Read a printable field out of `block`.
pub fn extract(block: &BlockRef<'_>, field: &FieldDescriptor) -> Result<FieldValue, ExtractionError> {
    let FieldKind::Text(encoding) = field.kind() else {
        return Err(ExtractionError::NotPrintable {
            block: block.name().to_string(),
            field: field.name().to_string(),
        });
    };

    let bytes = block.bytes();
    let window = bytes.get(field.offset()..field.end()).ok_or_else(|| {
        ExtractionError::OutOfRange {
            block: block.name().to_string(),
            field: field.name().to_string(),
            offset: field.offset(),
            width: field.width(),
            available: bytes.len(),
        }
    })?;

    let significant = window
        .iter()
        .rposition(|&b| !encoding.is_pad(b))
        .map_or(0, |last| last + 1);
    let raw = window[..significant].to_vec();
    let text = raw
        .iter()
        .map(|&b| encoding.decode_byte(b))
        .map(|ch| if ch.is_control() { UNPRINTABLE } else { ch })
        .collect();

    tracing::debug!(block = %block.name(), field = %field.name(), len = raw.len(), "Extracted field");
    Ok(FieldValue {
        name: field.name().to_string(),
        width: field.width(),
        raw,
        text,
    })
}
