/*!
# Scene Shader Collection

GLSL ES sources for the scene pipelines, compiled through wgpu's naga GLSL
frontend. Every source here is run through the lint's optimizer and
validator before first compilation; keeping them mobile-safe at rest means
that pass is a no-op in the common case.
*/

/// Vertex shader for the non-instanced LOD mesh
pub const MESH_VERT: &str = include_str!("mesh.vert");

/// Vertex shader for the instanced particle cloud
pub const PARTICLE_VERT: &str = include_str!("particle.vert");

/// Shared lambert fragment shader for both pipelines
pub const MESH_FRAG: &str = include_str!("mesh.frag");
