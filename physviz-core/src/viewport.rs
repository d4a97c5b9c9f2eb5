//! Viewport state for the 2D fallback renderer
//!
//! Plot-space bounds plus the transient pan bookkeeping. The owning
//! renderer's pointer/wheel handlers are the only mutators; pan speed is
//! proportional to the current range so panning feels the same at every
//! zoom level.

/// Multiplier applied to the ranges by one wheel step. Zoom-out uses the
/// factor directly, zoom-in its reciprocal, so an in/out pair restores the
/// original bounds to within floating-point tolerance.
pub const ZOOM_STEP: f64 = 1.1;

/// Ranges are never allowed to collapse below this span.
pub const MIN_SPAN: f64 = 1e-9;

/// Which halves of the bounds a mutation touched. X changes require a
/// re-solve (the sampled function values depend on the x window); y-only
/// changes are a local redraw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BoundsChange {
    pub x_changed: bool,
    pub y_changed: bool,
}

/// The plot-space rectangle currently mapped onto the canvas.
#[derive(Debug, Clone)]
pub struct ViewportState {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
    panning: bool,
    last_pointer: Option<(f64, f64)>,
}

impl Default for ViewportState {
    fn default() -> Self {
        Self::new(-10.0, 10.0, -10.0, 10.0)
    }
}

impl ViewportState {
    /// # Panics
    ///
    /// Panics unless `x_max > x_min` and `y_max > y_min`; degenerate bounds
    /// are a programming error, not a runtime condition.
    pub fn new(x_min: f64, x_max: f64, y_min: f64, y_max: f64) -> Self {
        assert!(x_max > x_min, "viewport requires x_max > x_min");
        assert!(y_max > y_min, "viewport requires y_max > y_min");
        Self {
            x_min,
            x_max,
            y_min,
            y_max,
            panning: false,
            last_pointer: None,
        }
    }

    pub fn x_range(&self) -> f64 {
        self.x_max - self.x_min
    }

    pub fn y_range(&self) -> f64 {
        self.y_max - self.y_min
    }

    pub fn is_panning(&self) -> bool {
        self.panning
    }

    /// Map a plot-space point to device-pixel space (y inverted).
    pub fn to_pixel(&self, wx: f64, wy: f64, width: u32, height: u32) -> (f32, f32) {
        let px = (wx - self.x_min) / self.x_range() * (width.saturating_sub(1)) as f64;
        let py = (height.saturating_sub(1)) as f64
            - (wy - self.y_min) / self.y_range() * (height.saturating_sub(1)) as f64;
        (px as f32, py as f32)
    }

    pub fn begin_pan(&mut self, px: f64, py: f64) {
        self.panning = true;
        self.last_pointer = Some((px, py));
    }

    /// Translate the bounds by the pointer displacement since the last pan
    /// event, scaled by the current ranges over the canvas size.
    pub fn pan_to(&mut self, px: f64, py: f64, canvas_w: f64, canvas_h: f64) -> BoundsChange {
        if !self.panning || canvas_w <= 0.0 || canvas_h <= 0.0 {
            return BoundsChange::default();
        }
        let Some((last_x, last_y)) = self.last_pointer else {
            self.last_pointer = Some((px, py));
            return BoundsChange::default();
        };
        let dx_px = px - last_x;
        let dy_px = py - last_y;
        self.last_pointer = Some((px, py));

        // Content follows the pointer: dragging right moves the window left,
        // dragging down (screen y grows downward) moves it up.
        let world_dx = -dx_px / canvas_w * self.x_range();
        let world_dy = dy_px / canvas_h * self.y_range();
        self.x_min += world_dx;
        self.x_max += world_dx;
        self.y_min += world_dy;
        self.y_max += world_dy;

        BoundsChange {
            x_changed: dx_px != 0.0,
            y_changed: dy_px != 0.0,
        }
    }

    pub fn end_pan(&mut self) {
        self.panning = false;
        self.last_pointer = None;
    }

    /// Scale both ranges about their centers. Positive wheel delta zooms
    /// out, negative zooms in; zero is a no-op. Returns false when the
    /// mutation was skipped (no-op delta or range floor reached).
    pub fn zoom(&mut self, wheel_delta: f64) -> bool {
        let factor = if wheel_delta > 0.0 {
            ZOOM_STEP
        } else if wheel_delta < 0.0 {
            1.0 / ZOOM_STEP
        } else {
            return false;
        };

        let x_half = self.x_range() * 0.5 * factor;
        let y_half = self.y_range() * 0.5 * factor;
        if x_half * 2.0 < MIN_SPAN || y_half * 2.0 < MIN_SPAN {
            return false;
        }

        let cx = (self.x_min + self.x_max) * 0.5;
        let cy = (self.y_min + self.y_max) * 0.5;
        self.x_min = cx - x_half;
        self.x_max = cx + x_half;
        self.y_min = cy - y_half;
        self.y_max = cy + y_half;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{} != {}", a, b);
    }

    #[test]
    fn test_default_bounds() {
        let vp = ViewportState::default();
        assert_close(vp.x_range(), 20.0);
        assert_close(vp.y_range(), 20.0);
        assert!(!vp.is_panning());
    }

    #[test]
    #[should_panic(expected = "x_max > x_min")]
    fn test_degenerate_bounds_panic() {
        let _ = ViewportState::new(1.0, 1.0, 0.0, 1.0);
    }

    #[test]
    fn test_pan_round_trip_restores_bounds() {
        let mut vp = ViewportState::default();
        vp.begin_pan(100.0, 100.0);
        vp.pan_to(140.0, 70.0, 800.0, 600.0);
        vp.pan_to(100.0, 100.0, 800.0, 600.0);
        vp.end_pan();
        assert_close(vp.x_min, -10.0);
        assert_close(vp.x_max, 10.0);
        assert_close(vp.y_min, -10.0);
        assert_close(vp.y_max, 10.0);
    }

    #[test]
    fn test_pan_reports_changed_axes() {
        let mut vp = ViewportState::default();
        vp.begin_pan(0.0, 0.0);
        let change = vp.pan_to(10.0, 0.0, 800.0, 600.0);
        assert!(change.x_changed);
        assert!(!change.y_changed);
        let change = vp.pan_to(10.0, 5.0, 800.0, 600.0);
        assert!(!change.x_changed);
        assert!(change.y_changed);
    }

    #[test]
    fn test_pan_without_begin_is_ignored() {
        let mut vp = ViewportState::default();
        let change = vp.pan_to(50.0, 50.0, 800.0, 600.0);
        assert_eq!(change, BoundsChange::default());
        assert_close(vp.x_min, -10.0);
    }

    #[test]
    fn test_pan_speed_scales_with_range() {
        let mut wide = ViewportState::new(-100.0, 100.0, -100.0, 100.0);
        let mut narrow = ViewportState::new(-1.0, 1.0, -1.0, 1.0);
        wide.begin_pan(0.0, 0.0);
        narrow.begin_pan(0.0, 0.0);
        wide.pan_to(80.0, 0.0, 800.0, 600.0);
        narrow.pan_to(80.0, 0.0, 800.0, 600.0);
        let wide_shift = -100.0 - wide.x_min;
        let narrow_shift = -1.0 - narrow.x_min;
        assert_close(wide_shift / narrow_shift, 100.0);
    }

    #[test]
    fn test_zoom_round_trip_restores_bounds() {
        let mut vp = ViewportState::default();
        assert!(vp.zoom(-1.0));
        assert!(vp.zoom(1.0));
        assert_close(vp.x_min, -10.0);
        assert_close(vp.x_max, 10.0);
        assert_close(vp.y_min, -10.0);
        assert_close(vp.y_max, 10.0);
    }

    #[test]
    fn test_zoom_never_collapses_range() {
        let mut vp = ViewportState::default();
        for _ in 0..10_000 {
            vp.zoom(-1.0);
        }
        assert!(vp.x_range() >= MIN_SPAN);
        assert!(vp.y_range() >= MIN_SPAN);
    }

    #[test]
    fn test_zoom_zero_delta_is_noop() {
        let mut vp = ViewportState::default();
        assert!(!vp.zoom(0.0));
        assert_close(vp.x_range(), 20.0);
    }

    #[test]
    fn test_to_pixel_corners() {
        let vp = ViewportState::default();
        let (x0, y0) = vp.to_pixel(-10.0, -10.0, 800, 600);
        let (x1, y1) = vp.to_pixel(10.0, 10.0, 800, 600);
        assert_eq!((x0.round(), y0.round()), (0.0, 599.0));
        assert_eq!((x1.round(), y1.round()), (799.0, 0.0));
    }
}
