//! Room palette — ordered list of renderable colors.
//!
//! A cell stores an index into this list, so insertion order is the
//! identity of each color. Palettes are replaced wholesale on room load
//! and never partially mutated.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Index of a color inside the current [`Palette`].
pub type ColorIndex = u16;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PaletteError {
    #[error("Palette is empty")]
    Empty,
    #[error("Palette has {0} colors, at most {max} are addressable", max = ColorIndex::MAX as usize + 1)]
    TooLarge(usize),
}

/// Packed RGBA color, one byte per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const BLACK: Rgba = Rgba { r: 0, g: 0, b: 0, a: 255 };
    pub const TRANSPARENT: Rgba = Rgba { r: 0, g: 0, b: 0, a: 0 };

    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Parse a `#RRGGBB` hex string.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let digits = hex.strip_prefix('#')?;
        if digits.len() != 6 || !digits.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).ok();
        Some(Self::opaque(channel(0)?, channel(2)?, channel(4)?))
    }

    /// Little-endian packing: bytes in memory read R, G, B, A.
    #[inline]
    pub fn to_u32(self) -> u32 {
        u32::from_le_bytes([self.r, self.g, self.b, self.a])
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// One palette entry: the source string as the room declared it plus the
/// parsed color used for rasterization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaletteEntry {
    pub label: String,
    pub color: Rgba,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Palette {
    entries: Vec<PaletteEntry>,
}

impl Palette {
    /// Build a palette from hex strings.
    ///
    /// Entries that are not valid `#RRGGBB` keep their label but render
    /// as opaque black.
    pub fn from_hex_list<I, S>(colors: I) -> Result<Self, PaletteError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let entries: Vec<PaletteEntry> = colors
            .into_iter()
            .map(|s| {
                let label = s.as_ref().trim().to_string();
                let color = Rgba::from_hex(&label).unwrap_or_else(|| {
                    log::warn!("Invalid hex color '{label}' in palette, rendering as black");
                    Rgba::BLACK
                });
                PaletteEntry { label, color }
            })
            .collect();

        if entries.is_empty() {
            return Err(PaletteError::Empty);
        }
        if entries.len() > ColorIndex::MAX as usize + 1 {
            return Err(PaletteError::TooLarge(entries.len()));
        }
        Ok(Self { entries })
    }

    /// Parse the comma-separated `roomColors` setting.
    pub fn parse(room_colors: &str) -> Result<Self, PaletteError> {
        Self::from_hex_list(room_colors.split(',').filter(|s| !s.trim().is_empty()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `index` addresses a color in this palette.
    #[inline]
    pub fn contains(&self, index: i64) -> bool {
        index >= 0 && (index as u64) < self.entries.len() as u64
    }

    pub fn get(&self, index: ColorIndex) -> Option<&PaletteEntry> {
        self.entries.get(index as usize)
    }

    pub fn color(&self, index: ColorIndex) -> Option<Rgba> {
        self.get(index).map(|e| e.color)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PaletteEntry> {
        self.entries.iter()
    }
}
