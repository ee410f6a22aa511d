//! Viewport controller — zoom/pan state and pointer→grid mapping.
//!
//! The grid is drawn centered on a surface (the window), translated by
//! `(pan_x, pan_y)` screen units and scaled by `zoom` screen units per cell:
//!
//! ```text
//! screen_x = surface_w / 2 + pan_x + (grid_x - grid_w / 2) * zoom
//! ```
//!
//! All gesture entry points return a [`ViewportEvent`] telling the caller
//! what to do with the tooltip; nothing here touches I/O.

use crate::animation::{Transform, ViewportAnimation, CLICK_ANIMATION};
use crate::clock::{Clock, SystemClock};
use crate::gesture::{GestureKind, GestureTracker, ScreenPoint};
use crate::grid::CellPos;

pub const MIN_ZOOM: f64 = 2.5;
pub const MAX_ZOOM: f64 = 40.0;
/// A click zooms in to at least this level.
pub const CLICK_ZOOM: f64 = 15.0;
/// Relative zoom change per wheel notch.
pub const WHEEL_ZOOM_STEP: f64 = 1.0 / 25.0;

/// Grid positions this close to an integer floor onto it.
pub const SNAP_EPSILON: f64 = 1e-9;

fn snap_floor(v: f64) -> i64 {
    let nearest = v.round();
    if (v - nearest).abs() < SNAP_EPSILON {
        nearest as i64
    } else {
        v.floor() as i64
    }
}

/// Grid coordinate that may lie outside the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridPoint {
    pub x: i64,
    pub y: i64,
}

/// Screen-space rectangle the grid currently occupies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

/// What the caller should do after a viewport input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewportEvent {
    /// Nothing visible changed.
    Idle,
    /// The transform changed; repaint.
    Moved,
    /// The transform may have changed and any open tooltip must close.
    HideTooltip,
    /// A click started an animated transition toward `target`.
    Animating { target: CellPos },
    /// The view came to rest on `target`; show its tooltip.
    Settled { target: CellPos },
    /// A drag ended over `target`; selection moved, tooltip stays closed.
    Retargeted { target: CellPos },
    /// Release landed outside the grid; selection cleared.
    Cleared,
}

pub struct ViewportController<C: Clock = SystemClock> {
    grid_width: u32,
    grid_height: u32,
    surface_width: f64,
    surface_height: f64,
    transform: Transform,
    target: Option<CellPos>,
    gesture: Option<GestureTracker>,
    animation: Option<(ViewportAnimation, CellPos)>,
    clock: C,
}

impl ViewportController<SystemClock> {
    pub fn new(surface_width: f64, surface_height: f64) -> Self {
        Self::with_clock(surface_width, surface_height, SystemClock::new())
    }
}

impl<C: Clock> ViewportController<C> {
    pub fn with_clock(surface_width: f64, surface_height: f64, clock: C) -> Self {
        Self {
            grid_width: 0,
            grid_height: 0,
            surface_width,
            surface_height,
            transform: Transform::new(MIN_ZOOM, 0.0, 0.0),
            target: None,
            gesture: None,
            animation: None,
            clock,
        }
    }

    /// Reset to the room-entry view: minimum zoom, no pan, target on the
    /// center cell.
    pub fn reset(&mut self, grid_width: u32, grid_height: u32) {
        self.grid_width = grid_width;
        self.grid_height = grid_height;
        self.transform = Transform::new(MIN_ZOOM, 0.0, 0.0);
        self.gesture = None;
        self.animation = None;
        self.target = (grid_width > 0 && grid_height > 0)
            .then(|| CellPos::new(grid_width / 2, grid_height / 2));
    }

    pub fn resize(&mut self, surface_width: f64, surface_height: f64) {
        self.surface_width = surface_width;
        self.surface_height = surface_height;
    }

    pub fn zoom_level(&self) -> f64 {
        self.transform.zoom
    }

    pub fn pan_offset(&self) -> (f64, f64) {
        (self.transform.pan_x, self.transform.pan_y)
    }

    pub fn transform(&self) -> Transform {
        self.transform
    }

    pub fn target(&self) -> Option<CellPos> {
        self.target
    }

    pub fn is_animating(&self) -> bool {
        self.animation.is_some()
    }

    pub fn is_dragging(&self) -> bool {
        self.gesture.is_some_and(|g| g.kind() == GestureKind::Drag)
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Where the grid is drawn on the surface.
    pub fn display_rect(&self) -> DisplayRect {
        let width = self.grid_width as f64 * self.transform.zoom;
        let height = self.grid_height as f64 * self.transform.zoom;
        DisplayRect {
            left: self.surface_width / 2.0 + self.transform.pan_x - width / 2.0,
            top: self.surface_height / 2.0 + self.transform.pan_y - height / 2.0,
            width,
            height,
        }
    }

    /// Continuous grid-space position of a screen point.
    fn grid_position(&self, point: ScreenPoint) -> (f64, f64) {
        let t = self.transform;
        (
            (point.x - self.surface_width / 2.0 - t.pan_x) / t.zoom + self.grid_width as f64 / 2.0,
            (point.y - self.surface_height / 2.0 - t.pan_y) / t.zoom + self.grid_height as f64 / 2.0,
        )
    }

    /// Map a screen point to the grid cell under it.
    ///
    /// Positions within [`SNAP_EPSILON`] of a cell boundary count as on it.
    /// The result may lie outside the grid.
    pub fn pointer_to_grid(&self, point: ScreenPoint) -> GridPoint {
        if self.grid_width == 0 || self.grid_height == 0 {
            return GridPoint { x: -1, y: -1 };
        }
        let (gx, gy) = self.grid_position(point);
        GridPoint {
            x: snap_floor(gx),
            y: snap_floor(gy),
        }
    }

    /// The in-bounds cell under a screen point, if any.
    pub fn cell_at(&self, point: ScreenPoint) -> Option<CellPos> {
        let p = self.pointer_to_grid(point);
        self.checked_cell(p.x, p.y)
    }

    /// Select a cell. Out-of-bounds points clear the selection and
    /// return `None`.
    pub fn set_target(&mut self, x: i64, y: i64) -> Option<CellPos> {
        self.target = self.checked_cell(x, y);
        if self.target.is_none() {
            log::debug!("Target ({x}, {y}) outside grid, selection cleared");
        }
        self.target
    }

    pub fn clear_target(&mut self) {
        self.target = None;
    }

    /// Multiply zoom by `factor` (clamped), keeping `pivot` over the same
    /// cell. Returns `false` and leaves state alone if zoom did not change.
    pub fn zoom(&mut self, factor: f64, pivot: ScreenPoint) -> bool {
        if !factor.is_finite() || factor <= 0.0 {
            log::warn!("Ignoring zoom factor {factor}");
            return false;
        }
        let old = self.transform.zoom;
        let new = (old * factor).clamp(MIN_ZOOM, MAX_ZOOM);
        if new == old {
            return false;
        }

        let (gx, gy) = self.grid_position(pivot);
        let mx = pivot.x - self.surface_width / 2.0;
        let my = pivot.y - self.surface_height / 2.0;
        self.transform = Transform {
            zoom: new,
            pan_x: mx - (gx - self.grid_width as f64 / 2.0) * new,
            pan_y: my - (gy - self.grid_height as f64 / 2.0) * new,
        };
        true
    }

    /// Translate the pan offset by a screen-space delta.
    pub fn pan(&mut self, dx: f64, dy: f64) {
        self.transform.pan_x += dx;
        self.transform.pan_y += dy;
    }

    /// Drop any in-flight animation, leaving the view where it is.
    pub fn cancel_animation(&mut self) -> bool {
        self.animation.take().is_some()
    }

    /// Wheel notch at `pointer`. Positive `delta_y` zooms in.
    pub fn wheel(&mut self, delta_y: f64, pointer: ScreenPoint) -> ViewportEvent {
        self.cancel_animation();
        if delta_y != 0.0 {
            self.zoom(1.0 + delta_y.signum() * WHEEL_ZOOM_STEP, pointer);
        }
        ViewportEvent::HideTooltip
    }

    pub fn pointer_down(&mut self, at: ScreenPoint) -> ViewportEvent {
        let was_animating = self.cancel_animation();
        self.gesture = Some(GestureTracker::begin(at));
        if was_animating {
            ViewportEvent::Moved
        } else {
            ViewportEvent::Idle
        }
    }

    pub fn pointer_move(&mut self, at: ScreenPoint) -> ViewportEvent {
        let Some(gesture) = self.gesture.as_mut() else {
            return ViewportEvent::Idle;
        };
        let step = gesture.update(at);
        if let Some((dx, dy)) = step.pan {
            self.pan(dx, dy);
        }
        match (step.became_drag, step.pan.is_some()) {
            (true, _) => ViewportEvent::HideTooltip,
            (false, true) => ViewportEvent::Moved,
            _ => ViewportEvent::Idle,
        }
    }

    /// Finish the gesture. Clicks focus the released cell; drags only move
    /// the selection.
    pub fn pointer_up(&mut self, at: ScreenPoint) -> ViewportEvent {
        let Some(gesture) = self.gesture.take() else {
            return ViewportEvent::Idle;
        };
        let p = self.pointer_to_grid(at);
        let Some(target) = self.set_target(p.x, p.y) else {
            return ViewportEvent::Cleared;
        };

        match gesture.finish() {
            GestureKind::Drag => ViewportEvent::Retargeted { target },
            GestureKind::Click => self.focus(target),
        }
    }

    /// Zoom in on `target` and center it, animating unless already close.
    pub fn focus(&mut self, target: CellPos) -> ViewportEvent {
        let end = self.focus_transform(target);
        if self.transform.is_near(&end) {
            self.transform = end;
            self.animation = None;
            return ViewportEvent::Settled { target };
        }
        let animation = ViewportAnimation::new(self.transform, end, self.clock.now(), CLICK_ANIMATION);
        self.animation = Some((animation, target));
        ViewportEvent::Animating { target }
    }

    /// Advance the current animation to the clock's present.
    pub fn tick(&mut self) -> ViewportEvent {
        let Some((animation, target)) = self.animation else {
            return ViewportEvent::Idle;
        };
        let now = self.clock.now();
        self.transform = animation.state_at(now);
        if animation.is_finished(now) {
            self.animation = None;
            ViewportEvent::Settled { target }
        } else {
            ViewportEvent::Moved
        }
    }

    /// Transform that centers `target` at click zoom. Never zooms out.
    pub fn focus_transform(&self, target: CellPos) -> Transform {
        let zoom = self.transform.zoom.max(CLICK_ZOOM).min(MAX_ZOOM);
        let half_w = self.grid_width as f64 / 2.0;
        let half_h = self.grid_height as f64 / 2.0;
        Transform {
            zoom,
            pan_x: -(target.x as f64 + 0.5 - half_w) * zoom,
            pan_y: -(target.y as f64 + 0.5 - half_h) * zoom,
        }
    }

    fn checked_cell(&self, x: i64, y: i64) -> Option<CellPos> {
        if x < 0 || y < 0 || x >= self.grid_width as i64 || y >= self.grid_height as i64 {
            return None;
        }
        Some(CellPos::new(x as u32, y as u32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::time::Duration;

    const W: f64 = 800.0;
    const H: f64 = 600.0;

    fn controller(grid: u32) -> ViewportController<ManualClock> {
        let mut vp = ViewportController::with_clock(W, H, ManualClock::new());
        vp.reset(grid, grid);
        vp
    }

    fn center() -> ScreenPoint {
        ScreenPoint::new(W / 2.0, H / 2.0)
    }

    /// Screen point at the middle of a cell.
    fn cell_center(vp: &ViewportController<ManualClock>, x: u32, y: u32) -> ScreenPoint {
        let r = vp.display_rect();
        let z = vp.zoom_level();
        ScreenPoint::new(r.left + (x as f64 + 0.5) * z, r.top + (y as f64 + 0.5) * z)
    }

    #[test]
    fn test_reset_defaults() {
        let vp = controller(100);
        assert_eq!(vp.zoom_level(), MIN_ZOOM);
        assert_eq!(vp.pan_offset(), (0.0, 0.0));
        assert_eq!(vp.target(), Some(CellPos::new(50, 50)));
        assert!(!vp.is_animating());
    }

    #[test]
    fn test_pointer_to_grid_identity_view() {
        let vp = controller(100);
        // Grid is 250px wide centered on 400: spans 275..525.
        assert_eq!(vp.pointer_to_grid(ScreenPoint::new(275.0, 175.0)), GridPoint { x: 0, y: 0 });
        assert_eq!(vp.pointer_to_grid(ScreenPoint::new(277.4, 177.4)), GridPoint { x: 0, y: 0 });
        assert_eq!(vp.pointer_to_grid(ScreenPoint::new(277.6, 180.1)), GridPoint { x: 1, y: 2 });
        assert_eq!(vp.pointer_to_grid(ScreenPoint::new(274.0, 175.0)).x, -1);
        assert_eq!(vp.pointer_to_grid(center()), GridPoint { x: 50, y: 50 });
    }

    #[test]
    fn test_pointer_to_grid_follows_pan() {
        let mut vp = controller(100);
        vp.pan(25.0, 0.0);
        assert_eq!(vp.pointer_to_grid(center()), GridPoint { x: 40, y: 50 });
    }

    #[test]
    fn test_pointer_to_grid_without_grid() {
        let vp = ViewportController::with_clock(W, H, ManualClock::new());
        assert_eq!(vp.cell_at(center()), None);
    }

    #[test]
    fn test_set_target_out_of_bounds_clears() {
        let mut vp = controller(10);
        assert_eq!(vp.set_target(3, 4), Some(CellPos::new(3, 4)));
        assert_eq!(vp.set_target(10, 4), None);
        assert_eq!(vp.target(), None);
        assert_eq!(vp.set_target(-1, 0), None);
    }

    #[test]
    fn test_zoom_clamp_under_arbitrary_factors() {
        let mut vp = controller(100);
        let factors = [0.0001, 1e9, 3.0, 0.5, 100.0, 0.01, f64::NAN, -2.0, f64::INFINITY, 1.04, 0.96];
        for (i, f) in factors.iter().cycle().take(200).enumerate() {
            vp.zoom(*f, ScreenPoint::new(i as f64 * 3.0, i as f64 * 2.0));
            let z = vp.zoom_level();
            assert!((MIN_ZOOM..=MAX_ZOOM).contains(&z), "zoom {z} escaped bounds");
        }
    }

    #[test]
    fn test_zoom_noop_at_limit() {
        let mut vp = controller(100);
        let before = vp.transform();
        assert!(!vp.zoom(0.5, ScreenPoint::new(10.0, 10.0)));
        assert_eq!(vp.transform(), before);
    }

    #[test]
    fn test_pivot_preserving_zoom() {
        let factors = [1.04, 0.96, 2.0, 3.7, 0.5];
        for &factor in &factors {
            for &(cx, cy) in &[(10u32, 10u32), (0, 99), (73, 41), (50, 50)] {
                let mut vp = controller(100);
                vp.zoom(4.0, center());
                let pivot = cell_center(&vp, cx, cy);
                let before = vp.pointer_to_grid(pivot);
                vp.zoom(factor, pivot);
                let after = vp.pointer_to_grid(pivot);
                assert_eq!(before, after, "factor {factor} pivot cell ({cx}, {cy})");
            }
        }
    }

    #[test]
    fn test_pivot_on_cell_boundary_survives_zoom() {
        let factors = [1.04, 0.96, 1.5, 0.7, 3.0];
        for &grid in &[7u32, 100, 1000] {
            for &factor in &factors {
                for k in 0..=grid.min(40) {
                    let mut vp = controller(grid);
                    vp.zoom(4.0, center());
                    vp.pan(13.37, -7.1);
                    let r = vp.display_rect();
                    let z = vp.zoom_level();
                    let pivot = ScreenPoint::new(r.left + k as f64 * z, r.top + k as f64 * z);
                    let before = vp.pointer_to_grid(pivot);
                    assert_eq!(before, GridPoint { x: k as i64, y: k as i64 });
                    vp.zoom(factor, pivot);
                    assert_eq!(vp.pointer_to_grid(pivot), before, "grid {grid} factor {factor} edge {k}");
                }
            }
        }
    }

    #[test]
    fn test_pivot_sweep_keeps_cell() {
        for &factor in &[1.04, 0.96, 1.5, 0.7, 3.0] {
            for i in 0..40 {
                for j in 0..40 {
                    let mut vp = controller(100);
                    vp.zoom(4.0, center());
                    vp.pan(13.37, -7.1);
                    let pivot = ScreenPoint::new(150.0 + i as f64 * 12.5, 100.0 + j as f64 * 11.45);
                    let before = vp.pointer_to_grid(pivot);
                    vp.zoom(factor, pivot);
                    assert_eq!(vp.pointer_to_grid(pivot), before, "factor {factor} at {pivot:?}");
                }
            }
        }
    }

    #[test]
    fn test_wheel_zooms_by_step_and_hides_tooltip() {
        let mut vp = controller(100);
        assert_eq!(vp.wheel(1.0, center()), ViewportEvent::HideTooltip);
        assert!((vp.zoom_level() - MIN_ZOOM * (1.0 + WHEEL_ZOOM_STEP)).abs() < 1e-12);
        vp.wheel(-1.0, center());
        assert!(vp.zoom_level() >= MIN_ZOOM);
    }

    #[test]
    fn test_small_motion_release_is_click() {
        let mut vp = controller(100);
        let down = cell_center(&vp, 20, 30);
        vp.pointer_down(down);
        assert_eq!(vp.pointer_move(ScreenPoint::new(down.x + 3.0, down.y + 2.0)), ViewportEvent::Idle);
        let up = vp.pointer_up(ScreenPoint::new(down.x + 3.0, down.y + 2.0));
        assert!(matches!(up, ViewportEvent::Animating { .. }), "got {up:?}");
        assert_eq!(vp.pan_offset(), (0.0, 0.0));
    }

    #[test]
    fn test_drag_pans_one_to_one_and_hides_tooltip() {
        let mut vp = controller(100);
        vp.pointer_down(center());
        assert_eq!(vp.pointer_move(ScreenPoint::new(410.0, 300.0)), ViewportEvent::HideTooltip);
        assert_eq!(vp.pan_offset(), (10.0, 0.0));
        assert_eq!(vp.pointer_move(ScreenPoint::new(412.0, 305.0)), ViewportEvent::Moved);
        assert_eq!(vp.pan_offset(), (12.0, 5.0));
        assert!(vp.is_dragging());

        let up = vp.pointer_up(ScreenPoint::new(412.0, 305.0));
        assert!(matches!(up, ViewportEvent::Retargeted { .. }));
        assert!(!vp.is_animating());
    }

    #[test]
    fn test_release_outside_grid_clears_target() {
        let mut vp = controller(10);
        vp.pointer_down(ScreenPoint::new(1.0, 1.0));
        assert_eq!(vp.pointer_up(ScreenPoint::new(1.0, 1.0)), ViewportEvent::Cleared);
        assert_eq!(vp.target(), None);
    }

    #[test]
    fn test_pointer_up_without_down_is_ignored() {
        let mut vp = controller(10);
        assert_eq!(vp.pointer_up(center()), ViewportEvent::Idle);
        assert_eq!(vp.target(), Some(CellPos::new(5, 5)));
    }

    #[test]
    fn test_click_animation_runs_to_target() {
        let mut vp = controller(100);
        let clock = vp.clock().clone();
        let p = cell_center(&vp, 20, 30);
        vp.pointer_down(p);
        let ev = vp.pointer_up(p);
        let target = CellPos::new(20, 30);
        assert_eq!(ev, ViewportEvent::Animating { target });
        let end = vp.focus_transform(target);
        assert_eq!(end.zoom, CLICK_ZOOM);

        clock.advance(Duration::from_millis(100));
        assert_eq!(vp.tick(), ViewportEvent::Moved);
        let z = vp.zoom_level();
        assert!(z > MIN_ZOOM && z < CLICK_ZOOM);

        clock.advance(Duration::from_millis(400));
        assert_eq!(vp.tick(), ViewportEvent::Settled { target });
        assert_eq!(vp.transform(), end);
        assert!(!vp.is_animating());
        assert_eq!(vp.cell_at(center()), Some(target));
        assert_eq!(vp.tick(), ViewportEvent::Idle);
    }

    #[test]
    fn test_click_near_focus_snaps() {
        let mut vp = controller(100);
        let target = CellPos::new(50, 50);
        vp.focus(target);
        vp.clock().advance(CLICK_ANIMATION);
        vp.tick();

        let p = cell_center(&vp, 50, 50);
        vp.pointer_down(p);
        assert_eq!(vp.pointer_up(p), ViewportEvent::Settled { target });
        assert!(!vp.is_animating());
    }

    #[test]
    fn test_click_never_zooms_out() {
        let mut vp = controller(100);
        vp.zoom(30.0 / MIN_ZOOM, center());
        let end = vp.focus_transform(CellPos::new(1, 1));
        assert_eq!(end.zoom, 30.0);
    }

    #[test]
    fn test_new_gesture_cancels_animation() {
        let mut vp = controller(100);
        let p = cell_center(&vp, 5, 5);
        vp.pointer_down(p);
        vp.pointer_up(p);
        assert!(vp.is_animating());

        vp.clock().advance(Duration::from_millis(100));
        vp.tick();
        let frozen = vp.transform();

        assert_eq!(vp.pointer_down(center()), ViewportEvent::Moved);
        assert!(!vp.is_animating());
        vp.clock().advance(Duration::from_millis(400));
        assert_eq!(vp.tick(), ViewportEvent::Idle);
        assert_eq!(vp.transform(), frozen);
    }

    #[test]
    fn test_wheel_cancels_animation() {
        let mut vp = controller(100);
        vp.focus(CellPos::new(1, 1));
        assert!(vp.is_animating());
        vp.wheel(1.0, center());
        assert!(!vp.is_animating());
    }
}
