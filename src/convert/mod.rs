//! Domain value converters.
//!
//! Pure, stateless conversions between document values and the compact
//! color types persisted by lighting effects.

mod color;
mod palette;

pub use color::{Rgb, MAX_PACKED};
pub use palette::{Palette16, PALETTE_SIZE};
