/*!
# Instanced + LOD GPU Scene

The optimized-tier renderer: a perspective orbit camera, ambient plus
directional lighting, a three-level LOD mesh, and one instanced particle
field drawn in a single pass per frame. Renders offscreen to a texture so
the host (window shell or CLI) decides what to do with the pixels.

Mounts only when the capability snapshot reports the optimized tier; every
other tier belongs to the 2D fallback path.
*/

use crate::camera::OrbitCamera;
use crate::capability;
use crate::diagnostics::FrameStats;
use crate::instances::{ParticleField, RawInstance};
use crate::lod::{LodLevel, LodSelector};
use crate::pipeline::{uv_sphere, Globals, MeshData, ScenePipelines};
use crate::{GpuError, GpuResult};
use glam::Mat4;
use physviz_core::{DeviceCapabilities, RenderPath};
use serde::{Deserialize, Serialize};
use wgpu::util::DeviceExt;

/// Device pixel ratios above this are clamped: past 2x the extra fragments
/// cost more than they show.
const PIXEL_RATIO_CAP: f64 = 2.0;

/// Draws submitted per frame: the LOD mesh and the instanced field.
const DRAW_CALLS_PER_FRAME: u32 = 2;

const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

/// Scene tuning knobs, loadable from the CLI config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub particles: usize,
    pub lod_near: f32,
    pub lod_far: f32,
    pub spread: f32,
    pub seed: u64,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            particles: 4096,
            lod_near: 14.0,
            lod_far: 30.0,
            spread: 12.0,
            seed: 7,
        }
    }
}

struct GpuMesh {
    vertex: wgpu::Buffer,
    index: wgpu::Buffer,
    index_count: u32,
}

impl GpuMesh {
    fn upload(device: &wgpu::Device, label: &str, data: &MeshData) -> Self {
        let vertex = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::cast_slice(&data.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::cast_slice(&data.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            vertex,
            index,
            index_count: data.indices.len() as u32,
        }
    }

    fn destroy(&self) {
        self.vertex.destroy();
        self.index.destroy();
    }
}

struct GlobalsSlot {
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

impl GlobalsSlot {
    fn new(device: &wgpu::Device, layout: &wgpu::BindGroupLayout, label: &str) -> Self {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: std::mem::size_of::<Globals>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        });
        Self { buffer, bind_group }
    }
}

/// The optimized-tier renderer.
pub struct GpuRenderer {
    device: wgpu::Device,
    queue: wgpu::Queue,
    pipelines: ScenePipelines,

    color_target: wgpu::Texture,
    color_view: wgpu::TextureView,
    msaa_view: Option<wgpu::TextureView>,
    msaa_target: Option<wgpu::Texture>,

    lod_meshes: [GpuMesh; 3],
    particle_mesh: GpuMesh,
    instance_buffer: wgpu::Buffer,
    instance_count: u32,
    mesh_globals: GlobalsSlot,
    particle_globals: GlobalsSlot,

    camera: OrbitCamera,
    lod: LodSelector,
    field: ParticleField,
    stats: FrameStats,

    width_px: u32,
    height_px: u32,
    pixel_ratio: f64,
    sample_count: u32,
    disposed: bool,
}

impl GpuRenderer {
    /// Build the scene for an optimized-tier device.
    ///
    /// Any other render path is refused with `GpuError::UnsupportedTier`;
    /// the host shows the capability status notice instead of a scene.
    pub fn mount(
        caps: &DeviceCapabilities,
        logical_width: u32,
        logical_height: u32,
        config: &SceneConfig,
    ) -> GpuResult<Self> {
        if caps.render_path != RenderPath::GpuOptimized {
            return Err(GpuError::UnsupportedTier(caps.render_path));
        }

        let instance = wgpu::Instance::default();
        let adapter = capability::best_adapter(&instance).ok_or(GpuError::NoAdapter)?;
        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("PhysViz Scene Device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
            },
            None,
        ))?;

        // Performance ceiling: never rasterize past 2x scale, and trade
        // MSAA away on dense displays where bandwidth is the bottleneck.
        let pixel_ratio = caps.device_pixel_ratio.min(PIXEL_RATIO_CAP);
        let sample_count = if caps.device_pixel_ratio >= 2.0 { 1 } else { 4 };

        let width_px = ((logical_width as f64 * pixel_ratio).round() as u32).max(1);
        let height_px = ((logical_height as f64 * pixel_ratio).round() as u32).max(1);

        let pipelines = ScenePipelines::new(&device, COLOR_FORMAT, sample_count)?;

        let color_target = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Scene Color Target"),
            size: wgpu::Extent3d {
                width: width_px,
                height: height_px,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: COLOR_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let color_view = color_target.create_view(&wgpu::TextureViewDescriptor::default());

        let (msaa_target, msaa_view) = if sample_count > 1 {
            let texture = device.create_texture(&wgpu::TextureDescriptor {
                label: Some("Scene MSAA Target"),
                size: wgpu::Extent3d {
                    width: width_px,
                    height: height_px,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count,
                dimension: wgpu::TextureDimension::D2,
                format: COLOR_FORMAT,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                view_formats: &[],
            });
            let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
            (Some(texture), Some(view))
        } else {
            (None, None)
        };

        let lod_meshes = [
            GpuMesh::upload(&device, "LOD Mesh High", &sphere_for(LodLevel::High, 3.0)),
            GpuMesh::upload(&device, "LOD Mesh Medium", &sphere_for(LodLevel::Medium, 3.0)),
            GpuMesh::upload(&device, "LOD Mesh Low", &sphere_for(LodLevel::Low, 3.0)),
        ];
        let particle_mesh = GpuMesh::upload(&device, "Particle Mesh", &sphere_for(LodLevel::Low, 1.0));

        let field = ParticleField::new(config.particles, config.spread, config.seed);
        let raw_instances: Vec<RawInstance> = field.raw();
        let instance_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Particle Instance Buffer"),
            contents: bytemuck::cast_slice(&raw_instances),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let mesh_globals = GlobalsSlot::new(&device, &pipelines.globals_layout, "Mesh Globals");
        let particle_globals =
            GlobalsSlot::new(&device, &pipelines.globals_layout, "Particle Globals");

        let camera = OrbitCamera::new(width_px as f32 / height_px as f32);
        let lod = LodSelector::new(config.lod_near, config.lod_far);

        log::info!(
            "GPU scene mounted: {}x{} px (ratio {:.2}), {} instances, msaa x{}",
            width_px,
            height_px,
            pixel_ratio,
            field.len(),
            sample_count
        );

        Ok(Self {
            device,
            queue,
            pipelines,
            color_target,
            color_view,
            msaa_view,
            msaa_target,
            lod_meshes,
            particle_mesh,
            instance_buffer,
            instance_count: field.len() as u32,
            mesh_globals,
            particle_globals,
            camera,
            lod,
            field,
            stats: FrameStats::new(),
            width_px,
            height_px,
            pixel_ratio,
            sample_count,
            disposed: false,
        })
    }

    /// Pointer or touch drag, in pixels. Proportional camera response, no
    /// inertia.
    pub fn handle_pointer_drag(&mut self, dx: f32, dy: f32) {
        self.camera.apply_drag(dx, dy);
    }

    /// The LOD level the next frame will draw with.
    pub fn current_lod(&self) -> LodLevel {
        self.lod.select(self.camera.distance())
    }

    /// Advance the scene by `dt` seconds and draw one frame.
    pub fn render_frame(&mut self, dt: f32) -> GpuResult<()> {
        if self.disposed {
            return Err(GpuError::Disposed);
        }

        let lod_level = self.current_lod();
        self.field.advance(dt);

        let view_proj = self.camera.view_proj().to_cols_array_2d();
        let lighting = Lighting::default();
        self.queue.write_buffer(
            &self.mesh_globals.buffer,
            0,
            bytemuck::bytes_of(&Globals {
                view_proj,
                model: Mat4::IDENTITY.to_cols_array_2d(),
                ambient: lighting.ambient,
                light_dir: lighting.light_dir,
                base_color: [0.32, 0.58, 0.92, 1.0],
            }),
        );
        self.queue.write_buffer(
            &self.particle_globals.buffer,
            0,
            bytemuck::bytes_of(&Globals {
                view_proj,
                model: self.field.group_rotation().to_cols_array_2d(),
                ambient: lighting.ambient,
                light_dir: lighting.light_dir,
                base_color: [0.95, 0.62, 0.25, 1.0],
            }),
        );

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Scene Render Encoder"),
            });
        {
            let (view, resolve_target) = match &self.msaa_view {
                Some(msaa) => (msaa, Some(&self.color_view)),
                None => (&self.color_view, None),
            };
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: 0.012,
                            g: 0.016,
                            b: 0.035,
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            let lod_mesh = &self.lod_meshes[lod_level.mesh_index()];
            pass.set_pipeline(&self.pipelines.mesh_pipeline);
            pass.set_bind_group(0, &self.mesh_globals.bind_group, &[]);
            pass.set_vertex_buffer(0, lod_mesh.vertex.slice(..));
            pass.set_index_buffer(lod_mesh.index.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..lod_mesh.index_count, 0, 0..1);

            pass.set_pipeline(&self.pipelines.particle_pipeline);
            pass.set_bind_group(0, &self.particle_globals.bind_group, &[]);
            pass.set_vertex_buffer(0, self.particle_mesh.vertex.slice(..));
            pass.set_vertex_buffer(1, self.instance_buffer.slice(..));
            pass.set_index_buffer(self.particle_mesh.index.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..self.particle_mesh.index_count, 0, 0..self.instance_count);
        }
        self.queue.submit(std::iter::once(encoder.finish()));

        self.stats.record_frame(DRAW_CALLS_PER_FRAME);
        Ok(())
    }

    /// Copy the last rendered frame back to the CPU.
    pub fn read_frame(&self) -> GpuResult<image::RgbaImage> {
        if self.disposed {
            return Err(GpuError::Disposed);
        }

        let bytes_per_row = 4 * self.width_px;
        let padded_bytes_per_row =
            bytes_per_row.div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT) * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let buffer_size = padded_bytes_per_row as u64 * self.height_px as u64;
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Frame Readback Buffer"),
            size: buffer_size,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Readback Encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: &self.color_target,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &staging,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(self.height_px),
                },
            },
            wgpu::Extent3d {
                width: self.width_px,
                height: self.height_px,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        slice.map_async(wgpu::MapMode::Read, |_| {});
        let _ = self.device.poll(wgpu::Maintain::Wait);

        let data = slice.get_mapped_range();
        let mut pixels = Vec::with_capacity((bytes_per_row * self.height_px) as usize);
        for row in 0..self.height_px {
            let start = (row * padded_bytes_per_row) as usize;
            pixels.extend_from_slice(&data[start..start + bytes_per_row as usize]);
        }
        drop(data);
        staging.unmap();
        staging.destroy();

        image::RgbaImage::from_raw(self.width_px, self.height_px, pixels)
            .ok_or_else(|| GpuError::Readback("frame buffer size mismatch".to_string()))
    }

    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    pub fn pixel_ratio(&self) -> f64 {
        self.pixel_ratio
    }

    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    pub fn size_px(&self) -> (u32, u32) {
        (self.width_px, self.height_px)
    }

    /// Explicit teardown: destroy every GPU allocation this renderer owns.
    /// Idempotent; `render_frame`/`read_frame` refuse to run afterwards.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        for mesh in &self.lod_meshes {
            mesh.destroy();
        }
        self.particle_mesh.destroy();
        self.instance_buffer.destroy();
        self.mesh_globals.buffer.destroy();
        self.particle_globals.buffer.destroy();
        self.color_target.destroy();
        if let Some(msaa) = &self.msaa_target {
            msaa.destroy();
        }
        self.disposed = true;
        log::debug!("GPU scene disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}

impl Drop for GpuRenderer {
    fn drop(&mut self) {
        self.dispose();
    }
}

struct Lighting {
    ambient: [f32; 4],
    light_dir: [f32; 4],
}

impl Default for Lighting {
    fn default() -> Self {
        Self {
            ambient: [0.55, 0.6, 0.75, 0.35],
            light_dir: [0.45, 0.8, 0.3, 0.9],
        }
    }
}

fn sphere_for(level: LodLevel, radius: f32) -> MeshData {
    let (rings, segments) = level.detail();
    uv_sphere(rings, segments, radius)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mount_refuses_lower_tiers() {
        let caps = DeviceCapabilities::fallback(512, 1.0);
        match GpuRenderer::mount(&caps, 640, 480, &SceneConfig::default()) {
            Err(GpuError::UnsupportedTier(RenderPath::Canvas2dFallback)) => {}
            Err(other) => panic!("expected an unsupported-tier refusal, got {other}"),
            Ok(_) => panic!("fallback tier must not mount the GPU scene"),
        }
    }

    #[test]
    fn test_scene_config_defaults_are_sane() {
        let config = SceneConfig::default();
        assert!(config.particles > 0);
        assert!(config.lod_near < config.lod_far);
    }
}
