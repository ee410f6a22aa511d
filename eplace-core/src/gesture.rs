//! Pointer gesture classification.
//!
//! A press/release pair is a click unless the pointer strays more than
//! [`DRAG_THRESHOLD`] from where it went down on either axis. Once a
//! gesture becomes a drag it stays one until release.

/// Movement (screen units, per axis) that turns a click into a drag.
pub const DRAG_THRESHOLD: f64 = 5.0;

/// Point in screen space (same units as pointer events).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

impl ScreenPoint {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureKind {
    Click,
    Drag,
}

/// Classify a displacement from the press point.
pub fn classify(dx: f64, dy: f64) -> GestureKind {
    if dx.abs() > DRAG_THRESHOLD || dy.abs() > DRAG_THRESHOLD {
        GestureKind::Drag
    } else {
        GestureKind::Click
    }
}

/// Result of feeding one pointer move into a gesture.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GestureStep {
    /// This move turned the gesture into a drag.
    pub became_drag: bool,
    /// Pan to apply, 1:1 with pointer motion. `None` while still a click.
    pub pan: Option<(f64, f64)>,
}

/// One press-to-release pointer gesture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureTracker {
    anchor: ScreenPoint,
    kind: GestureKind,
}

impl GestureTracker {
    pub fn begin(at: ScreenPoint) -> Self {
        Self {
            anchor: at,
            kind: GestureKind::Click,
        }
    }

    pub fn kind(&self) -> GestureKind {
        self.kind
    }

    /// Feed a pointer move.
    ///
    /// Before the threshold is crossed the anchor stays at the press point;
    /// afterwards it follows the pointer so each step pans by the motion
    /// since the previous move.
    pub fn update(&mut self, at: ScreenPoint) -> GestureStep {
        let dx = at.x - self.anchor.x;
        let dy = at.y - self.anchor.y;

        let mut step = GestureStep::default();
        if self.kind == GestureKind::Click && classify(dx, dy) == GestureKind::Drag {
            self.kind = GestureKind::Drag;
            step.became_drag = true;
        }
        if self.kind == GestureKind::Drag {
            step.pan = Some((dx, dy));
            self.anchor = at;
        }
        step
    }

    pub fn finish(self) -> GestureKind {
        self.kind
    }
}
