//! # eplace-core — Canvas state for the eplace client
//!
//! Synchronous, I/O-free pieces of the collaborative pixel canvas:
//!
//! - [`palette`] — ordered room colors and `#RRGGBB` parsing
//! - [`grid`] — the pixel buffer with bounds-checked single-cell writes
//! - [`raster`] — packed RGBA projection with per-cell damage tracking
//! - [`viewport`] — zoom/pan transform and pointer→grid mapping
//! - [`gesture`] — click/drag disambiguation
//! - [`animation`] — quartic ease-out transitions as a function of time
//! - [`clock`] — swappable time source for the animation driver
//!
//! ## Cost model
//!
//! | Operation | Cost |
//! |-----------|------|
//! | `GridStore::load` | O(w·h), raster repainted once |
//! | `GridStore::apply_cell` | O(1), one raster word |
//! | `ViewportController::pointer_to_grid` | O(1), pure |

pub mod animation;
pub mod clock;
pub mod gesture;
pub mod grid;
pub mod palette;
pub mod raster;
pub mod viewport;

pub use animation::{Transform, ViewportAnimation};
pub use clock::{Clock, ManualClock, SystemClock};
pub use gesture::{GestureKind, GestureTracker, ScreenPoint};
pub use grid::{CellPos, GridError, GridStore, LoadReport};
pub use palette::{ColorIndex, Palette, PaletteEntry, PaletteError, Rgba};
pub use raster::{Damage, Raster};
pub use viewport::{GridPoint, ViewportController, ViewportEvent};
