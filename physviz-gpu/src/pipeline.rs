/*!
# Scene Pipeline Construction

Builds the two render pipelines the GPU scene uses: a plain mesh pipeline
for the LOD object and an instanced pipeline for the particle field. Shader
sources pass through the lint's optimizer and validator before they reach
the driver; a validation error aborts pipeline construction instead of
compiling a non-conformant shader.
*/

use crate::lint::{self, ShaderKind};
use crate::{GpuError, GpuResult};
use bytemuck::{Pod, Zeroable};
use std::f32::consts::{PI, TAU};

/// Uniform block shared by both pipelines. Field order and padding must
/// match the `Globals` block in the GLSL sources (std140: mat4, mat4, then
/// three vec4s).
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct Globals {
    pub view_proj: [[f32; 4]; 4],
    pub model: [[f32; 4]; 4],
    /// rgb = ambient tint, w = ambient intensity
    pub ambient: [f32; 4],
    /// xyz = direction toward the light, w = diffuse intensity
    pub light_dir: [f32; 4],
    pub base_color: [f32; 4],
}

/// Vertex data shared by the LOD meshes and the particle geometry
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

impl MeshVertex {
    pub fn desc<'a>() -> wgpu::VertexBufferLayout<'a> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<MeshVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

impl crate::instances::RawInstance {
    /// Instance matrix as four vec4 attributes in slots 2..=5.
    pub fn desc<'a>() -> wgpu::VertexBufferLayout<'a> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Self>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: 16,
                    shader_location: 3,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: 32,
                    shader_location: 4,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: 48,
                    shader_location: 5,
                    format: wgpu::VertexFormat::Float32x4,
                },
            ],
        }
    }
}

/// CPU-side mesh data ready for upload.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,
}

/// Generate a UV sphere. Ring/segment counts below 3 are clamped up so the
/// topology stays valid.
pub fn uv_sphere(rings: u32, segments: u32, radius: f32) -> MeshData {
    let rings = rings.max(3);
    let segments = segments.max(3);

    let mut vertices = Vec::with_capacity(((rings + 1) * (segments + 1)) as usize);
    for ring in 0..=rings {
        let v = ring as f32 / rings as f32;
        let phi = v * PI;
        for segment in 0..=segments {
            let u = segment as f32 / segments as f32;
            let theta = u * TAU;
            let normal = [
                phi.sin() * theta.cos(),
                phi.cos(),
                phi.sin() * theta.sin(),
            ];
            vertices.push(MeshVertex {
                position: [normal[0] * radius, normal[1] * radius, normal[2] * radius],
                normal,
            });
        }
    }

    let stride = segments + 1;
    let mut indices = Vec::with_capacity((rings * segments * 6) as usize);
    for ring in 0..rings {
        for segment in 0..segments {
            let i0 = ring * stride + segment;
            let i1 = i0 + 1;
            let i2 = i0 + stride;
            let i3 = i2 + 1;
            indices.extend_from_slice(&[i0, i2, i1, i1, i2, i3]);
        }
    }

    MeshData { vertices, indices }
}

/// The compiled pipelines plus the layout needed to bind globals.
pub struct ScenePipelines {
    pub mesh_pipeline: wgpu::RenderPipeline,
    pub particle_pipeline: wgpu::RenderPipeline,
    pub globals_layout: wgpu::BindGroupLayout,
}

impl ScenePipelines {
    pub fn new(
        device: &wgpu::Device,
        color_format: wgpu::TextureFormat,
        sample_count: u32,
    ) -> GpuResult<Self> {
        let mesh_vs = compile_glsl(device, "mesh.vert", crate::shaders::MESH_VERT, ShaderKind::Vertex)?;
        let particle_vs = compile_glsl(
            device,
            "particle.vert",
            crate::shaders::PARTICLE_VERT,
            ShaderKind::Vertex,
        )?;
        let mesh_fs = compile_glsl(device, "mesh.frag", crate::shaders::MESH_FRAG, ShaderKind::Fragment)?;

        let globals_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Globals Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Scene Pipeline Layout"),
            bind_group_layouts: &[&globals_layout],
            push_constant_ranges: &[],
        });

        let primitive = wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            unclipped_depth: false,
            polygon_mode: wgpu::PolygonMode::Fill,
            conservative: false,
        };
        let multisample = wgpu::MultisampleState {
            count: sample_count,
            mask: !0,
            alpha_to_coverage_enabled: false,
        };
        let targets = [Some(wgpu::ColorTargetState {
            format: color_format,
            blend: Some(wgpu::BlendState::ALPHA_BLENDING),
            write_mask: wgpu::ColorWrites::ALL,
        })];

        let mesh_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Mesh Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &mesh_vs,
                entry_point: "main",
                compilation_options: Default::default(),
                buffers: &[MeshVertex::desc()],
            },
            fragment: Some(wgpu::FragmentState {
                module: &mesh_fs,
                entry_point: "main",
                compilation_options: Default::default(),
                targets: &targets,
            }),
            primitive,
            depth_stencil: None,
            multisample,
            multiview: None,
        });

        let particle_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Particle Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &particle_vs,
                entry_point: "main",
                compilation_options: Default::default(),
                buffers: &[MeshVertex::desc(), crate::instances::RawInstance::desc()],
            },
            fragment: Some(wgpu::FragmentState {
                module: &mesh_fs,
                entry_point: "main",
                compilation_options: Default::default(),
                targets: &targets,
            }),
            primitive,
            depth_stencil: None,
            multisample,
            multiview: None,
        });

        Ok(Self {
            mesh_pipeline,
            particle_pipeline,
            globals_layout,
        })
    }
}

/// Optimize, validate, then hand the GLSL to the naga frontend. Validation
/// failures are hard errors here: feeding a non-conformant shader to a
/// mobile driver is how blank screens happen.
fn compile_glsl(
    device: &wgpu::Device,
    label: &str,
    source: &str,
    kind: ShaderKind,
) -> GpuResult<wgpu::ShaderModule> {
    let optimized = lint::optimize_shader(source, kind);
    let report = lint::validate_shader(&optimized, kind);
    if !report.is_valid {
        return Err(GpuError::ShaderRejected {
            label: label.to_string(),
            reasons: report.errors.join("; "),
        });
    }
    for warning in &report.warnings {
        log::warn!("shader '{}': {}", label, warning);
    }

    let stage = match kind {
        ShaderKind::Vertex => naga::ShaderStage::Vertex,
        ShaderKind::Fragment => naga::ShaderStage::Fragment,
    };
    Ok(device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Glsl {
            shader: optimized.into(),
            stage,
            defines: Default::default(),
        },
    }))
}
