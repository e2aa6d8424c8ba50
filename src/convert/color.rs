//! Packed 24-bit RGB colors.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::{mismatch, DocumentValue};
use crate::error::ConversionError;

/// Largest value a packed color can take.
pub const MAX_PACKED: u32 = 0x00FF_FFFF;

/// A 3-channel color.
///
/// In documents a color is a single unsigned integer
/// `(red << 16) | (green << 8) | blue`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    /// Red channel.
    pub red: u8,
    /// Green channel.
    pub green: u8,
    /// Blue channel.
    pub blue: u8,
}

impl Rgb {
    /// All channels off.
    pub const BLACK: Self = Self::new(0, 0, 0);
    /// All channels at full intensity.
    pub const WHITE: Self = Self::new(0xFF, 0xFF, 0xFF);

    /// Creates a color from its channels.
    #[must_use]
    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    /// Packs the channels into the low 24 bits.
    #[must_use]
    pub const fn pack(self) -> u32 {
        ((self.red as u32) << 16) | ((self.green as u32) << 8) | self.blue as u32
    }

    /// Unpacks a 24-bit value; `None` if any of the top 8 bits are set.
    #[must_use]
    pub const fn unpack(packed: u32) -> Option<Self> {
        if packed > MAX_PACKED {
            return None;
        }
        Some(Self {
            red: (packed >> 16) as u8,
            green: (packed >> 8) as u8,
            blue: packed as u8,
        })
    }
}

impl From<(u8, u8, u8)> for Rgb {
    fn from((red, green, blue): (u8, u8, u8)) -> Self {
        Self::new(red, green, blue)
    }
}

impl DocumentValue for Rgb {
    fn to_value(&self) -> Result<Value, ConversionError> {
        Ok(Value::from(self.pack()))
    }

    fn check(value: &Value) -> bool {
        value.as_u64().is_some_and(|v| v <= u64::from(MAX_PACKED))
    }

    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        let raw = value.as_u64().ok_or_else(|| mismatch("packed color", value))?;
        u32::try_from(raw)
            .ok()
            .and_then(Self::unpack)
            .ok_or_else(|| ConversionError::OutOfRange {
                value: raw.to_string(),
                target: "packed color",
            })
    }
}
