//! Grid store — owns the shared pixel buffer and its palette.
//!
//! ```text
//! snapshot ──► GridStore::load() ──► Raster::render_full()   O(w·h), once
//! pixel event ──► GridStore::apply_cell() ──► Raster::paint() O(1)
//! ```
//!
//! Every stored color index is valid for the current palette. Loads
//! normalize corrupt entries to [`FALLBACK_COLOR`]; single-cell writes
//! reject them and leave the buffer untouched.

use thiserror::Error;

use crate::palette::{ColorIndex, Palette, PaletteEntry};
use crate::raster::{Damage, Raster};

/// Color index substituted for out-of-range snapshot entries.
pub const FALLBACK_COLOR: ColorIndex = 0;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GridError {
    #[error("Snapshot has {actual} cells, expected {width}x{height} = {expected}")]
    DimensionMismatch {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
    #[error("Grid dimensions must be non-zero, got {width}x{height}")]
    EmptyGrid { width: u32, height: u32 },
    #[error("No grid loaded")]
    NotLoaded,
    #[error("Cell ({x}, {y}) outside {width}x{height} grid")]
    OutOfBounds { x: i64, y: i64, width: u32, height: u32 },
    #[error("Color index {index} outside palette of {len} colors")]
    InvalidColor { index: i64, len: usize },
}

/// Integer grid coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CellPos {
    pub x: u32,
    pub y: u32,
}

impl CellPos {
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

/// Summary of a [`GridStore::load`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadReport {
    pub cells: usize,
    /// Snapshot entries that were replaced with [`FALLBACK_COLOR`].
    pub normalized: usize,
}

#[derive(Debug, Clone)]
struct Grid {
    width: u32,
    height: u32,
    cells: Vec<ColorIndex>,
    palette: Palette,
    raster: Raster,
}

/// Owner of the pixel buffer for one room session.
#[derive(Debug, Clone, Default)]
pub struct GridStore {
    grid: Option<Grid>,
}

impl GridStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole grid and palette.
    ///
    /// `cells` is row-major and must hold exactly `width * height` entries.
    pub fn load(
        &mut self,
        width: u32,
        height: u32,
        cells: &[i64],
        palette: Palette,
    ) -> Result<LoadReport, GridError> {
        if width == 0 || height == 0 {
            return Err(GridError::EmptyGrid { width, height });
        }
        let expected = width as usize * height as usize;
        if cells.len() != expected {
            return Err(GridError::DimensionMismatch {
                width,
                height,
                expected,
                actual: cells.len(),
            });
        }

        let mut normalized = 0usize;
        let stored: Vec<ColorIndex> = cells
            .iter()
            .map(|&c| {
                if palette.contains(c) {
                    c as ColorIndex
                } else {
                    normalized += 1;
                    FALLBACK_COLOR
                }
            })
            .collect();

        if normalized > 0 {
            log::warn!(
                "Snapshot contained {normalized} cell(s) with color index outside palette of {}; replaced with {FALLBACK_COLOR}",
                palette.len()
            );
        }

        let raster = Raster::render_full(width, height, &stored, &palette);
        self.grid = Some(Grid {
            width,
            height,
            cells: stored,
            palette,
            raster,
        });

        log::info!("Loaded {width}x{height} grid");
        Ok(LoadReport {
            cells: expected,
            normalized,
        })
    }

    /// Drop the current grid (room teardown).
    pub fn clear(&mut self) {
        self.grid = None;
    }

    pub fn is_loaded(&self) -> bool {
        self.grid.is_some()
    }

    /// Set one cell, returning its previous color index.
    ///
    /// Out-of-range coordinates or colors are rejected without touching
    /// the buffer.
    pub fn apply_cell(&mut self, x: i64, y: i64, color: i64) -> Result<ColorIndex, GridError> {
        let grid = self.grid.as_mut().ok_or(GridError::NotLoaded)?;

        let Some(pos) = grid.checked_pos(x, y) else {
            log::warn!("Rejected cell update at ({x}, {y}): outside {}x{} grid", grid.width, grid.height);
            return Err(GridError::OutOfBounds {
                x,
                y,
                width: grid.width,
                height: grid.height,
            });
        };
        if !grid.palette.contains(color) {
            log::warn!(
                "Rejected cell update at ({x}, {y}): color index {color} outside palette of {}",
                grid.palette.len()
            );
            return Err(GridError::InvalidColor {
                index: color,
                len: grid.palette.len(),
            });
        }

        let color = color as ColorIndex;
        let index = grid.index(pos);
        let previous = std::mem::replace(&mut grid.cells[index], color);
        if let Some(rgba) = grid.palette.color(color) {
            grid.raster.paint(pos.x, pos.y, rgba);
        }
        Ok(previous)
    }

    /// Color index at `(x, y)`.
    pub fn color_at(&self, x: i64, y: i64) -> Result<ColorIndex, GridError> {
        let grid = self.grid.as_ref().ok_or(GridError::NotLoaded)?;
        let pos = grid.checked_pos(x, y).ok_or(GridError::OutOfBounds {
            x,
            y,
            width: grid.width,
            height: grid.height,
        })?;
        Ok(grid.cells[grid.index(pos)])
    }

    /// Palette entry for the cell at `(x, y)`.
    pub fn entry_at(&self, x: i64, y: i64) -> Result<&PaletteEntry, GridError> {
        let index = self.color_at(x, y)?;
        let grid = self.grid.as_ref().ok_or(GridError::NotLoaded)?;
        grid.palette.get(index).ok_or(GridError::InvalidColor {
            index: index as i64,
            len: grid.palette.len(),
        })
    }

    /// `(width, height)` of the loaded grid.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.grid.as_ref().map(|g| (g.width, g.height))
    }

    pub fn contains(&self, x: i64, y: i64) -> bool {
        self.grid.as_ref().is_some_and(|g| g.checked_pos(x, y).is_some())
    }

    pub fn palette(&self) -> Option<&Palette> {
        self.grid.as_ref().map(|g| &g.palette)
    }

    /// Raw row-major color indices.
    pub fn cells(&self) -> &[ColorIndex] {
        self.grid
            .as_ref()
            .map(|g| g.cells.as_slice())
            .unwrap_or_default()
    }

    pub fn raster(&self) -> Option<&Raster> {
        self.grid.as_ref().map(|g| &g.raster)
    }

    /// Drain raster damage for the renderer.
    pub fn take_damage(&mut self) -> Damage {
        self.grid
            .as_mut()
            .map_or(Damage::None, |g| g.raster.take_damage())
    }
}

impl Grid {
    #[inline]
    fn checked_pos(&self, x: i64, y: i64) -> Option<CellPos> {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return None;
        }
        Some(CellPos::new(x as u32, y as u32))
    }

    #[inline]
    fn index(&self, pos: CellPos) -> usize {
        pos.y as usize * self.width as usize + pos.x as usize
    }
}
