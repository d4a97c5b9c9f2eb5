//! 2D raster fallback renderer
//!
//! The tier every device can run: an RGBA frame buffer, a pan/zoom
//! viewport, and one computation service supplying the sampled curve.
//! Frame order is fixed: background, 10x10 grid, zero axes when visible,
//! then the curve polyline. x-bound changes re-solve; y-only changes are a
//! local redraw.

use image::{Rgba, RgbaImage};
use physviz_core::viewport::BoundsChange;
use physviz_core::{ComputeError, ComputeService, Solution, ViewportState};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Sample count for every solve the canvas issues.
pub const DEFAULT_SAMPLES: usize = 200;

const GRID_DIVISIONS: u32 = 10;
const READY_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors from the 2D canvas path
#[derive(Debug, Error)]
pub enum CanvasError {
    #[error("canvas dimensions must be non-zero")]
    InvalidSize,

    #[error("invalid color literal '{0}' (expected #rrggbb or #rrggbbaa)")]
    InvalidColor(String),

    #[error("computation service error: {0}")]
    Compute(#[from] ComputeError),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

pub type CanvasResult<T> = Result<T, CanvasError>;

/// Plot styling, TOML-loadable through the CLI config.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasStyle {
    pub background: String,
    pub grid: String,
    pub axes: String,
    pub curve: String,
    pub samples: usize,
}

impl Default for CanvasStyle {
    fn default() -> Self {
        Self {
            background: "#ffffff".to_string(),
            grid: "#d8dde3".to_string(),
            axes: "#55606a".to_string(),
            curve: "#2a6fef".to_string(),
            samples: DEFAULT_SAMPLES,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Palette {
    background: Rgba<u8>,
    grid: Rgba<u8>,
    axes: Rgba<u8>,
    curve: Rgba<u8>,
}

impl Palette {
    fn resolve(style: &CanvasStyle) -> CanvasResult<Self> {
        Ok(Self {
            background: parse_hex_color(&style.background)?,
            grid: parse_hex_color(&style.grid)?,
            axes: parse_hex_color(&style.axes)?,
            curve: parse_hex_color(&style.curve)?,
        })
    }
}

/// The pan-zoom 2D plot renderer.
pub struct Canvas2dRenderer {
    width: u32,
    height: u32,
    palette: Palette,
    samples: usize,
    viewport: ViewportState,
    compute: ComputeService,
    equation: Option<String>,
    curve: Option<Solution>,
    frame: RgbaImage,
}

impl Canvas2dRenderer {
    /// Spawn the computation worker and draw the empty plot. Blocks until
    /// the worker handshake completes so the first solve cannot race it.
    pub fn new(width: u32, height: u32, style: &CanvasStyle) -> CanvasResult<Self> {
        if width == 0 || height == 0 {
            return Err(CanvasError::InvalidSize);
        }
        let palette = Palette::resolve(style)?;
        let mut compute = ComputeService::spawn();
        compute.wait_ready(READY_TIMEOUT)?;

        let mut renderer = Self {
            width,
            height,
            palette,
            samples: style.samples.max(2),
            viewport: ViewportState::default(),
            compute,
            equation: None,
            curve: None,
            frame: RgbaImage::from_pixel(width, height, palette.background),
        };
        renderer.redraw();
        Ok(renderer)
    }

    /// Set the plotted equation, solve it over the current x-bounds, and
    /// redraw. On failure the previous curve is kept and the error is
    /// returned to the caller.
    pub fn set_equation(&mut self, equation: &str) -> CanvasResult<()> {
        let solution = self.compute.solve(
            equation,
            "x",
            self.viewport.x_min,
            self.viewport.x_max,
            self.samples,
        )?;
        self.equation = Some(equation.to_string());
        self.curve = Some(solution);
        self.redraw();
        Ok(())
    }

    pub fn on_pointer_down(&mut self, px: f64, py: f64) {
        self.viewport.begin_pan(px, py);
    }

    pub fn on_pointer_move(&mut self, px: f64, py: f64) -> BoundsChange {
        let change = self
            .viewport
            .pan_to(px, py, self.width as f64, self.height as f64);
        if change.x_changed {
            self.resolve_after_x_change();
        }
        if change.x_changed || change.y_changed {
            self.redraw();
        }
        change
    }

    pub fn on_pointer_up(&mut self) {
        self.viewport.end_pan();
    }

    /// Wheel zoom about the viewport center. Returns whether the bounds
    /// actually changed.
    pub fn on_wheel(&mut self, delta: f64) -> bool {
        if !self.viewport.zoom(delta) {
            return false;
        }
        self.resolve_after_x_change();
        self.redraw();
        true
    }

    /// Re-solve against the current x-bounds. The plot must keep showing
    /// *something*, so a failed solve keeps the previous curve on screen.
    fn resolve_after_x_change(&mut self) {
        let Some(equation) = self.equation.clone() else {
            return;
        };
        match self.compute.solve(
            &equation,
            "x",
            self.viewport.x_min,
            self.viewport.x_max,
            self.samples,
        ) {
            Ok(solution) => self.curve = Some(solution),
            Err(err) => log::warn!("re-solve after viewport change failed: {}", err),
        }
    }

    /// Full frame redraw: background, grid, axes, curve.
    pub fn redraw(&mut self) {
        let background = self.palette.background;
        for pixel in self.frame.pixels_mut() {
            *pixel = background;
        }
        self.draw_grid();
        self.draw_axes();
        self.draw_curve();
    }

    /// Fixed 10x10 grid proportional to the canvas.
    fn draw_grid(&mut self) {
        let color = self.palette.grid;
        let (w, h) = (self.width as i32, self.height as i32);
        for i in 0..=GRID_DIVISIONS {
            let x = (i as f32 / GRID_DIVISIONS as f32 * (w - 1) as f32) as i32;
            draw_line(&mut self.frame, x, 0, x, h - 1, color);
            let y = (i as f32 / GRID_DIVISIONS as f32 * (h - 1) as f32) as i32;
            draw_line(&mut self.frame, 0, y, w - 1, y, color);
        }
    }

    /// Zero axes, drawn only when they fall inside the current bounds.
    fn draw_axes(&mut self) {
        let color = self.palette.axes;
        let (w, h) = (self.width as i32, self.height as i32);
        if self.viewport.x_min <= 0.0 && 0.0 <= self.viewport.x_max {
            let (x, _) = self.viewport.to_pixel(0.0, 0.0, self.width, self.height);
            draw_line(&mut self.frame, x as i32, 0, x as i32, h - 1, color);
        }
        if self.viewport.y_min <= 0.0 && 0.0 <= self.viewport.y_max {
            let (_, y) = self.viewport.to_pixel(0.0, 0.0, self.width, self.height);
            draw_line(&mut self.frame, 0, y as i32, w - 1, y as i32, color);
        }
    }

    /// Connected polyline through the finite samples; non-finite samples
    /// (poles, domain edges) break the line into segments.
    fn draw_curve(&mut self) {
        let Some(curve) = &self.curve else {
            return;
        };
        let color = self.palette.curve;
        let points: Vec<Option<(f32, f32)>> = curve
            .x_values
            .iter()
            .zip(&curve.y_values)
            .map(|(&x, &y)| {
                if x.is_finite() && y.is_finite() {
                    Some(self.viewport.to_pixel(x, y, self.width, self.height))
                } else {
                    None
                }
            })
            .collect();
        for pair in points.windows(2) {
            if let [Some((x0, y0)), Some((x1, y1))] = pair {
                draw_line(
                    &mut self.frame,
                    *x0 as i32,
                    *y0 as i32,
                    *x1 as i32,
                    *y1 as i32,
                    color,
                );
            }
        }
    }

    pub fn export_png<P: AsRef<Path>>(&self, path: P) -> CanvasResult<()> {
        self.frame.save(path)?;
        Ok(())
    }

    pub fn frame(&self) -> &RgbaImage {
        &self.frame
    }

    pub fn viewport(&self) -> &ViewportState {
        &self.viewport
    }

    pub fn equation(&self) -> Option<&str> {
        self.equation.as_deref()
    }

    pub fn curve(&self) -> Option<&Solution> {
        self.curve.as_ref()
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Tear down the computation worker. Also happens on drop.
    pub fn shutdown(&mut self) {
        self.compute.shutdown();
    }
}

/// Integer Bresenham polyline segment with clipped writes.
fn draw_line(img: &mut RgbaImage, x0: i32, y0: i32, x1: i32, y1: i32, color: Rgba<u8>) {
    let (w, h) = (img.width() as i32, img.height() as i32);
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    let (mut x, mut y) = (x0, y0);
    loop {
        if x >= 0 && x < w && y >= 0 && y < h {
            img.put_pixel(x as u32, y as u32, color);
        }
        if x == x1 && y == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}

/// Parse `#rrggbb` / `#rrggbbaa` color literals.
fn parse_hex_color(literal: &str) -> CanvasResult<Rgba<u8>> {
    let digits = literal.strip_prefix('#').unwrap_or(literal);
    let invalid = || CanvasError::InvalidColor(literal.to_string());
    let byte = |range: std::ops::Range<usize>| {
        digits
            .get(range)
            .and_then(|pair| u8::from_str_radix(pair, 16).ok())
    };
    match digits.len() {
        6 => Ok(Rgba([
            byte(0..2).ok_or_else(invalid)?,
            byte(2..4).ok_or_else(invalid)?,
            byte(4..6).ok_or_else(invalid)?,
            255,
        ])),
        8 => Ok(Rgba([
            byte(0..2).ok_or_else(invalid)?,
            byte(2..4).ok_or_else(invalid)?,
            byte(4..6).ok_or_else(invalid)?,
            byte(6..8).ok_or_else(invalid)?,
        ])),
        _ => Err(invalid()),
    }
}
