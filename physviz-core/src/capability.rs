//! Device capability snapshots
//!
//! A `DeviceCapabilities` value is produced once by the detector at startup
//! and then owned by the `CapabilityContext`. Consumers never mutate a
//! snapshot; pixel-ratio changes replace it wholesale.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The rendering strategy tier chosen for this device.
///
/// Closed set on purpose: hosts dispatch on it with an exhaustive `match`,
/// so adding a tier is a compile-time-checked change at every call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RenderPath {
    /// No usable GPU adapter; draw on the CPU raster canvas.
    Canvas2dFallback,
    /// Downlevel (GL-class) adapter with a reduced feature set.
    GpuLegacy,
    /// Fully capable adapter; instanced + LOD scene path.
    GpuOptimized,
}

impl RenderPath {
    pub fn is_gpu(self) -> bool {
        !matches!(self, RenderPath::Canvas2dFallback)
    }

    /// Fixed human-readable status line for this tier, used for
    /// accessibility announcements and CLI output.
    pub fn status_message(self) -> &'static str {
        match self {
            RenderPath::GpuOptimized => {
                "Hardware-accelerated rendering active (instanced GPU scene)"
            }
            RenderPath::GpuLegacy => {
                "Compatibility GPU rendering active (reduced feature set)"
            }
            RenderPath::Canvas2dFallback => {
                "Software 2D rendering active (no GPU acceleration detected)"
            }
        }
    }
}

impl fmt::Display for RenderPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderPath::Canvas2dFallback => write!(f, "canvas-2d-fallback"),
            RenderPath::GpuLegacy => write!(f, "gpu-legacy"),
            RenderPath::GpuOptimized => write!(f, "gpu-optimized"),
        }
    }
}

/// Immutable snapshot of what the device's graphics stack supports.
///
/// `gpu_memory_mb` and `estimated_ram_mb` are coarse heuristics (vendor
/// string matching and an allocation probe). They are tier hints, never
/// exact figures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceCapabilities {
    pub render_path: RenderPath,
    /// 0 = no graphics context, 1 = downlevel/legacy, 2 = fully capable.
    pub gpu_api_tier: u8,
    pub gpu_memory_mb: u32,
    /// Host display scale factor, >= 1.0. Defaults to 1.0 when no display
    /// subsystem is reachable.
    pub device_pixel_ratio: f64,
    /// 0 when no graphics context could be obtained.
    pub max_texture_size: u32,
    pub estimated_ram_mb: u32,
    pub supports_instancing: bool,
}

impl DeviceCapabilities {
    /// The lowest-tier snapshot: no adapter, CPU canvas only.
    pub fn fallback(estimated_ram_mb: u32, device_pixel_ratio: f64) -> Self {
        Self {
            render_path: RenderPath::Canvas2dFallback,
            gpu_api_tier: 0,
            gpu_memory_mb: 0,
            device_pixel_ratio: device_pixel_ratio.max(1.0),
            max_texture_size: 0,
            estimated_ram_mb,
            supports_instancing: false,
        }
    }

    /// A new snapshot identical to this one except for the pixel ratio.
    ///
    /// GPU capability does not change mid-session, so a display scale change
    /// never re-runs the adapter probe.
    pub fn with_pixel_ratio(&self, ratio: f64) -> Self {
        Self {
            device_pixel_ratio: ratio.max(1.0),
            ..self.clone()
        }
    }

    /// Cross-field invariants: fallback tier iff api tier 0, and the
    /// optimized tier always supports instancing.
    pub fn invariants_hold(&self) -> bool {
        let fallback_iff_tier0 =
            (self.render_path == RenderPath::Canvas2dFallback) == (self.gpu_api_tier == 0);
        let optimized_instances =
            self.render_path != RenderPath::GpuOptimized || self.supports_instancing;
        fallback_iff_tier0 && optimized_instances && self.device_pixel_ratio >= 1.0
    }
}
