//! PhysViz Core Library
//!
//! Capability snapshots and the provider context, viewport state for the 2D
//! fallback path, the equation parser/evaluator, and the off-thread
//! computation service. Nothing in this crate touches a graphics API.

pub mod capability;
pub mod compute;
pub mod context;
pub mod equation;
pub mod viewport;

// Re-export commonly used types
pub use capability::{DeviceCapabilities, RenderPath};
pub use compute::{ComputeError, ComputeResult, ComputeService, ServiceState, Solution};
pub use context::{CapabilityContext, CapabilitySubscriber};
pub use equation::{Equation, EquationError, EquationResult};
pub use viewport::ViewportState;

/// Version information for the PhysViz core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
