//! Raster projection of the grid.
//!
//! The raster is a derived view: one packed RGBA word per cell, row-major.
//! A full repaint costs O(width·height) and only happens on load; pixel
//! events go through [`Raster::paint`], which touches exactly one word and
//! records a one-cell damage entry for the renderer to pick up.

use crate::palette::{ColorIndex, Palette, Rgba};

/// What changed since the renderer last drained the raster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Damage {
    /// Nothing to upload.
    None,
    /// Whole raster must be re-uploaded (after a load).
    Full,
    /// Only these cells changed, in paint order. May contain repeats.
    Cells(Vec<(u32, u32)>),
}

/// Past this many pending cells a full upload is cheaper than a cell list.
const MAX_TRACKED_CELLS: usize = 4096;

#[derive(Debug, Clone, Default)]
pub struct Raster {
    width: u32,
    height: u32,
    pixels: Vec<u32>,
    full_damage: bool,
    damaged_cells: Vec<(u32, u32)>,
}

impl Raster {
    /// Paint the whole buffer from cell indices. O(width·height).
    pub fn render_full(width: u32, height: u32, cells: &[ColorIndex], palette: &Palette) -> Self {
        let pixels = cells
            .iter()
            .map(|&idx| palette.color(idx).unwrap_or(Rgba::BLACK).to_u32())
            .collect();
        Self {
            width,
            height,
            pixels,
            full_damage: true,
            damaged_cells: Vec::new(),
        }
    }

    /// Repaint a single cell. O(1); caller has already bounds-checked.
    #[inline]
    pub fn paint(&mut self, x: u32, y: u32, color: Rgba) {
        let index = y as usize * self.width as usize + x as usize;
        self.pixels[index] = color.to_u32();

        if self.full_damage {
            return;
        }
        if self.damaged_cells.len() >= MAX_TRACKED_CELLS {
            self.damaged_cells.clear();
            self.full_damage = true;
        } else {
            self.damaged_cells.push((x, y));
        }
    }

    /// Take pending damage, leaving the raster clean.
    pub fn take_damage(&mut self) -> Damage {
        if std::mem::take(&mut self.full_damage) {
            self.damaged_cells.clear();
            return Damage::Full;
        }
        if self.damaged_cells.is_empty() {
            Damage::None
        } else {
            Damage::Cells(std::mem::take(&mut self.damaged_cells))
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Row-major packed RGBA pixels.
    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<u32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels.get(y as usize * self.width as usize + x as usize).copied()
    }
}
