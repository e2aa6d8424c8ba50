//! Fixed 16-entry color gradients.

use serde_json::Value;

use crate::document::{mismatch, DocumentValue};
use crate::error::ConversionError;

use super::color::Rgb;

/// Number of entries in a [`Palette16`].
pub const PALETTE_SIZE: usize = 16;

/// A gradient of exactly 16 colors.
///
/// Rendered as an array of 16 packed colors in index order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Palette16 {
    /// Colors in gradient order.
    pub entries: [Rgb; PALETTE_SIZE],
}

impl Palette16 {
    /// Creates a palette from explicit entries.
    #[must_use]
    pub const fn new(entries: [Rgb; PALETTE_SIZE]) -> Self {
        Self { entries }
    }

    /// A palette with every entry set to `color`.
    #[must_use]
    pub const fn solid(color: Rgb) -> Self {
        Self {
            entries: [color; PALETTE_SIZE],
        }
    }

    /// Linear blend from `from` (entry 0) to `to` (entry 15).
    #[must_use]
    pub fn gradient(from: Rgb, to: Rgb) -> Self {
        let last = (PALETTE_SIZE - 1) as u16;
        let lerp = |a: u8, b: u8, i: u16| -> u8 {
            let (a, b) = (u16::from(a), u16::from(b));
            // a + (b - a) * i / last, kept in unsigned arithmetic
            let v = (a * (last - i) + b * i + last / 2) / last;
            v as u8
        };
        let mut entries = [Rgb::BLACK; PALETTE_SIZE];
        for (i, entry) in (0u16..).zip(entries.iter_mut()) {
            *entry = Rgb::new(
                lerp(from.red, to.red, i),
                lerp(from.green, to.green, i),
                lerp(from.blue, to.blue, i),
            );
        }
        Self { entries }
    }
}

impl DocumentValue for Palette16 {
    fn to_value(&self) -> Result<Value, ConversionError> {
        let colors = self
            .entries
            .iter()
            .map(DocumentValue::to_value)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Value::Array(colors))
    }

    fn check(value: &Value) -> bool {
        value.as_array().is_some_and(|a| a.len() == PALETTE_SIZE)
    }

    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        let items = value.as_array().ok_or_else(|| mismatch("array", value))?;
        if items.len() != PALETTE_SIZE {
            return Err(ConversionError::ShapeMismatch {
                expected: PALETTE_SIZE,
                actual: items.len(),
            });
        }

        let mut entries = [Rgb::BLACK; PALETTE_SIZE];
        for (index, (entry, item)) in entries.iter_mut().zip(items).enumerate() {
            *entry = Rgb::from_value(item).map_err(|e| ConversionError::Entry {
                index,
                source: Box::new(e),
            })?;
        }
        Ok(Self { entries })
    }
}
