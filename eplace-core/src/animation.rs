//! Eased viewport transitions.
//!
//! An animation is a pure function of time: [`ViewportAnimation::state_at`]
//! maps a clock reading to a transform. The driver (the viewport
//! controller's `tick`) decides when to sample it.

use std::time::Duration;

/// Length of the click-to-focus transition.
pub const CLICK_ANIMATION: Duration = Duration::from_millis(500);

/// Pan distance (screen units, per axis) under which a click snaps.
pub const SNAP_PAN_TOLERANCE: f64 = 10.0;

/// Zoom difference under which a click snaps.
pub const SNAP_ZOOM_TOLERANCE: f64 = 1.0;

/// Zoom and pan, the part of the viewport that animates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub zoom: f64,
    pub pan_x: f64,
    pub pan_y: f64,
}

impl Transform {
    pub const fn new(zoom: f64, pan_x: f64, pan_y: f64) -> Self {
        Self { zoom, pan_x, pan_y }
    }

    /// Whether moving to `other` is small enough to skip the animation.
    pub fn is_near(&self, other: &Transform) -> bool {
        (other.pan_x - self.pan_x).abs() <= SNAP_PAN_TOLERANCE
            && (other.pan_y - self.pan_y).abs() <= SNAP_PAN_TOLERANCE
            && (other.zoom - self.zoom).abs() < SNAP_ZOOM_TOLERANCE
    }
}

/// Quartic ease-out on `t ∈ [0, 1]`: `1 - (t - 1)^4`.
#[inline]
pub fn ease_out_quart(t: f64) -> f64 {
    let u = t.clamp(0.0, 1.0) - 1.0;
    1.0 - u * u * u * u
}

/// Ease-out interpolation from `start` to `end`.
#[inline]
pub fn ease(t: f64, start: f64, end: f64) -> f64 {
    start + (end - start) * ease_out_quart(t)
}

/// An in-flight transition between two transforms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportAnimation {
    from: Transform,
    to: Transform,
    started_at: Duration,
    duration: Duration,
}

impl ViewportAnimation {
    pub fn new(from: Transform, to: Transform, started_at: Duration, duration: Duration) -> Self {
        Self {
            from,
            to,
            started_at,
            duration,
        }
    }

    /// Normalized progress in `[0, 1]`.
    pub fn progress(&self, now: Duration) -> f64 {
        if self.duration.is_zero() {
            return 1.0;
        }
        let elapsed = now.saturating_sub(self.started_at);
        (elapsed.as_secs_f64() / self.duration.as_secs_f64()).min(1.0)
    }

    pub fn is_finished(&self, now: Duration) -> bool {
        now.saturating_sub(self.started_at) >= self.duration
    }

    /// Transform at clock reading `now`. Exactly `to` once finished.
    pub fn state_at(&self, now: Duration) -> Transform {
        if self.is_finished(now) {
            return self.to;
        }
        let t = self.progress(now);
        Transform {
            zoom: ease(t, self.from.zoom, self.to.zoom),
            pan_x: ease(t, self.from.pan_x, self.to.pan_x),
            pan_y: ease(t, self.from.pan_y, self.to.pan_y),
        }
    }

    pub fn from(&self) -> Transform {
        self.from
    }

    pub fn to(&self) -> Transform {
        self.to
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_ease_endpoints() {
        assert!(approx(ease_out_quart(0.0), 0.0));
        assert!(approx(ease_out_quart(1.0), 1.0));
        assert!(approx(ease_out_quart(0.5), 1.0 - 0.0625));
    }

    #[test]
    fn test_ease_clamps_input() {
        assert!(approx(ease_out_quart(-1.0), 0.0));
        assert!(approx(ease_out_quart(2.0), 1.0));
    }

    #[test]
    fn test_ease_is_monotonic() {
        let mut prev = 0.0;
        for i in 1..=100 {
            let v = ease_out_quart(i as f64 / 100.0);
            assert!(v >= prev);
            prev = v;
        }
    }

    #[test]
    fn test_state_at_start_middle_end() {
        let from = Transform::new(2.5, 0.0, 0.0);
        let to = Transform::new(15.0, -100.0, 40.0);
        let start = Duration::from_millis(1000);
        let anim = ViewportAnimation::new(from, to, start, CLICK_ANIMATION);

        assert_eq!(anim.state_at(start), from);

        let mid = anim.state_at(start + Duration::from_millis(250));
        assert!(approx(mid.zoom, ease(0.5, 2.5, 15.0)));
        assert!(approx(mid.pan_x, ease(0.5, 0.0, -100.0)));
        assert!(mid.zoom > 2.5 && mid.zoom < 15.0);

        assert_eq!(anim.state_at(start + CLICK_ANIMATION), to);
        assert_eq!(anim.state_at(start + Duration::from_secs(10)), to);
        assert!(anim.is_finished(start + CLICK_ANIMATION));
        assert!(!anim.is_finished(start + Duration::from_millis(499)));
    }

    #[test]
    fn test_clock_before_start_holds_origin() {
        let from = Transform::new(2.5, 0.0, 0.0);
        let to = Transform::new(15.0, 10.0, 10.0);
        let anim = ViewportAnimation::new(from, to, Duration::from_millis(100), CLICK_ANIMATION);
        assert_eq!(anim.state_at(Duration::ZERO), from);
    }

    #[test]
    fn test_is_near() {
        let a = Transform::new(15.0, 0.0, 0.0);
        assert!(a.is_near(&Transform::new(15.5, 10.0, -10.0)));
        assert!(!a.is_near(&Transform::new(16.0, 0.0, 0.0)));
        assert!(!a.is_near(&Transform::new(15.0, 10.5, 0.0)));
    }
}
