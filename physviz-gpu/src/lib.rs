/*!
# PhysViz Rendering Crate

Everything that touches (or emulates) a graphics stack:

1. **Capability detection**: synchronous adapter probing that classifies the
   device into one of three render paths and never fails upward.
2. **GPU scene**: the optimized-tier instanced + LOD renderer.
3. **Shader lint**: static GLSL validation and conservative optimization,
   applied to every shader before it reaches a driver.
4. **2D canvas**: the pan-zoom raster fallback every device can run.

The host reads the capability snapshot and mounts exactly one renderer with
an exhaustive match over `RenderPath`; there is no code path that shows a
blank view for a capability mismatch.
*/

use physviz_core::RenderPath;
use thiserror::Error;

pub mod camera;
pub mod canvas;
pub mod capability;
pub mod diagnostics;
pub mod instances;
pub mod lint;
pub mod lod;
pub mod pipeline;
pub mod scene;
pub mod shaders;

pub use camera::OrbitCamera;
pub use canvas::{Canvas2dRenderer, CanvasError, CanvasStyle, DEFAULT_SAMPLES};
pub use capability::{detect_device_capabilities, detect_with_pixel_ratio, AdapterProbe};
pub use diagnostics::FrameStats;
pub use instances::ParticleField;
pub use lint::{
    optimize_shader, suggest_optimizations, validate_shader, OptimizationSuggestions, ShaderKind,
    ShaderValidation,
};
pub use lod::{LodLevel, LodSelector};
pub use scene::{GpuRenderer, SceneConfig};

/// Errors from mounting or driving the GPU scene
#[derive(Debug, Error)]
pub enum GpuError {
    #[error("render path '{0}' does not mount the GPU scene")]
    UnsupportedTier(RenderPath),

    #[error("no suitable GPU adapter found")]
    NoAdapter,

    #[error("device request failed: {0}")]
    DeviceRequest(#[from] wgpu::RequestDeviceError),

    #[error("shader '{label}' rejected by validation: {reasons}")]
    ShaderRejected { label: String, reasons: String },

    #[error("renderer already disposed")]
    Disposed,

    #[error("frame readback failed: {0}")]
    Readback(String),
}

pub type GpuResult<T> = Result<T, GpuError>;
