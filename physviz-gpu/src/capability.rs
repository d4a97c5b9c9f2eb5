//! Device capability detection
//!
//! Synchronously probes the wgpu adapter list (no surface needed, so the
//! probe also works on headless machines) and classifies the device into
//! one of the three render paths. Absence of a capability is never an
//! error: every failure mode degrades to a lower tier.

use physviz_core::{DeviceCapabilities, RenderPath};

/// What the probe learned about the chosen adapter. Classification is a
/// pure function over this record so the decision tree is testable without
/// a GPU.
#[derive(Debug, Clone, PartialEq)]
pub struct AdapterProbe {
    pub name: String,
    /// Downlevel capabilities meet the full WebGPU baseline.
    pub webgpu_compliant: bool,
    /// Downlevel indirect-execution support; stands in for the legacy
    /// instancing probe on GL-class adapters.
    pub indirect_execution: bool,
    pub max_texture_size: u32,
}

/// Detect with the default pixel ratio of 1.0 (no display assumption).
pub fn detect_device_capabilities() -> DeviceCapabilities {
    detect_with_pixel_ratio(1.0)
}

/// Detect with a host-supplied display scale factor.
///
/// Never panics: a misbehaving driver stack is caught and classified as the
/// 2D fallback tier.
pub fn detect_with_pixel_ratio(pixel_ratio: f64) -> DeviceCapabilities {
    let probe = match std::panic::catch_unwind(probe_best_adapter) {
        Ok(probe) => probe,
        Err(_) => {
            log::warn!("graphics probe panicked; classifying as 2D fallback");
            None
        }
    };
    classify(probe.as_ref(), pixel_ratio)
}

/// The three-tier decision tree, in strict priority order.
pub fn classify(probe: Option<&AdapterProbe>, pixel_ratio: f64) -> DeviceCapabilities {
    let estimated_ram_mb = estimate_ram_mb();
    match probe {
        Some(probe) if probe.webgpu_compliant => DeviceCapabilities {
            render_path: RenderPath::GpuOptimized,
            gpu_api_tier: 2,
            gpu_memory_mb: estimate_gpu_memory_mb(&probe.name),
            device_pixel_ratio: pixel_ratio.max(1.0),
            max_texture_size: probe.max_texture_size,
            estimated_ram_mb,
            // The full baseline always includes instancing.
            supports_instancing: true,
        },
        Some(probe) => DeviceCapabilities {
            render_path: RenderPath::GpuLegacy,
            gpu_api_tier: 1,
            gpu_memory_mb: estimate_gpu_memory_mb(&probe.name),
            device_pixel_ratio: pixel_ratio.max(1.0),
            max_texture_size: probe.max_texture_size,
            estimated_ram_mb,
            supports_instancing: probe.indirect_execution,
        },
        None => DeviceCapabilities::fallback(estimated_ram_mb, pixel_ratio),
    }
}

fn probe_best_adapter() -> Option<AdapterProbe> {
    let instance = wgpu::Instance::default();
    let adapter = best_adapter(&instance)?;
    Some(probe_adapter(&adapter))
}

pub(crate) fn probe_adapter(adapter: &wgpu::Adapter) -> AdapterProbe {
    let info = adapter.get_info();
    let downlevel = adapter.get_downlevel_capabilities();
    AdapterProbe {
        name: info.name,
        webgpu_compliant: downlevel.is_webgpu_compliant(),
        indirect_execution: downlevel
            .flags
            .contains(wgpu::DownlevelFlags::INDIRECT_EXECUTION),
        max_texture_size: adapter.limits().max_texture_dimension_2d,
    }
}

/// Pick the most capable adapter on the machine. Software rasterizers rank
/// last but still count as a graphics context when nothing else exists.
pub(crate) fn best_adapter(instance: &wgpu::Instance) -> Option<wgpu::Adapter> {
    let adapters: Vec<wgpu::Adapter> = instance
        .enumerate_adapters(wgpu::Backends::all())
        .into_iter()
        .collect();
    for adapter in &adapters {
        let info = adapter.get_info();
        log::debug!(
            "adapter candidate: {} ({:?}, {:?})",
            info.name,
            info.backend,
            info.device_type
        );
    }
    adapters
        .into_iter()
        .min_by_key(|adapter| device_type_rank(adapter.get_info().device_type))
}

fn device_type_rank(device_type: wgpu::DeviceType) -> u8 {
    match device_type {
        wgpu::DeviceType::DiscreteGpu => 0,
        wgpu::DeviceType::IntegratedGpu => 1,
        wgpu::DeviceType::VirtualGpu => 2,
        wgpu::DeviceType::Other => 3,
        wgpu::DeviceType::Cpu => 4,
    }
}

/// Coarse VRAM estimate from the adapter name. A tier hint only; treat the
/// figure as an order of magnitude, never a measurement.
fn estimate_gpu_memory_mb(name: &str) -> u32 {
    let name = name.to_ascii_lowercase();
    if name.is_empty() {
        return 512;
    }

    const LEGACY_MOBILE: [&str; 4] = ["adreno 2", "adreno 3", "mali-4", "mali-t6"];
    const MOBILE: [&str; 6] = ["adreno", "mali", "powervr", "apple", "videocore", "xclipse"];
    const DESKTOP_DEDICATED: [&str; 7] = [
        "geforce", "rtx", "gtx", "quadro", "radeon rx", "radeon pro", "arc a",
    ];

    if LEGACY_MOBILE.iter().any(|family| name.contains(family)) {
        512
    } else if MOBILE.iter().any(|family| name.contains(family)) {
        1024
    } else if DESKTOP_DEDICATED.iter().any(|family| name.contains(family)) {
        4096
    } else {
        2048
    }
}

/// Binary RAM probe: can the host hand us a 4096x4096 RGBA buffer without
/// blinking? `try_reserve` keeps the probe infallible on low-memory hosts.
fn estimate_ram_mb() -> u32 {
    const PROBE_BYTES: usize = 4096 * 4096 * 4;
    let mut probe: Vec<u8> = Vec::new();
    match probe.try_reserve_exact(PROBE_BYTES) {
        Ok(()) => 2048,
        Err(_) => 512,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn optimized_probe() -> AdapterProbe {
        AdapterProbe {
            name: "NVIDIA GeForce RTX 3060".to_string(),
            webgpu_compliant: true,
            indirect_execution: true,
            max_texture_size: 16384,
        }
    }

    #[test]
    fn test_detect_never_panics_and_is_consistent() {
        let caps = detect_device_capabilities();
        assert!(caps.invariants_hold());
        assert_eq!(
            caps.render_path == RenderPath::Canvas2dFallback,
            caps.gpu_api_tier == 0
        );
    }

    #[test]
    fn test_classify_optimized_adapter() {
        let caps = classify(Some(&optimized_probe()), 2.0);
        assert_eq!(caps.render_path, RenderPath::GpuOptimized);
        assert_eq!(caps.gpu_api_tier, 2);
        assert!(caps.supports_instancing);
        assert_eq!(caps.device_pixel_ratio, 2.0);
        assert_eq!(caps.max_texture_size, 16384);
        assert!(caps.invariants_hold());
    }

    #[test]
    fn test_classify_legacy_adapter_probes_instancing() {
        let mut probe = AdapterProbe {
            name: "Mali-G78".to_string(),
            webgpu_compliant: false,
            indirect_execution: false,
            max_texture_size: 8192,
        };
        let caps = classify(Some(&probe), 1.0);
        assert_eq!(caps.render_path, RenderPath::GpuLegacy);
        assert_eq!(caps.gpu_api_tier, 1);
        assert!(!caps.supports_instancing);

        probe.indirect_execution = true;
        let caps = classify(Some(&probe), 1.0);
        assert!(caps.supports_instancing);
        assert!(caps.invariants_hold());
    }

    #[test]
    fn test_classify_no_adapter_is_fallback() {
        let caps = classify(None, 1.0);
        assert_eq!(caps.render_path, RenderPath::Canvas2dFallback);
        assert_eq!(caps.gpu_api_tier, 0);
        assert_eq!(caps.gpu_memory_mb, 0);
        assert!(!caps.supports_instancing);
    }

    #[test]
    fn test_gpu_memory_heuristic_tiers() {
        assert_eq!(estimate_gpu_memory_mb(""), 512);
        assert_eq!(estimate_gpu_memory_mb("Adreno 330"), 512);
        assert_eq!(estimate_gpu_memory_mb("Adreno 740"), 1024);
        assert_eq!(estimate_gpu_memory_mb("Apple M2"), 1024);
        assert_eq!(estimate_gpu_memory_mb("NVIDIA GeForce GTX 1080"), 4096);
        assert_eq!(estimate_gpu_memory_mb("AMD Radeon RX 7800"), 4096);
        assert_eq!(estimate_gpu_memory_mb("Intel UHD Graphics 620"), 2048);
        assert_eq!(estimate_gpu_memory_mb("llvmpipe (LLVM 15.0.7)"), 2048);
    }

    #[test]
    fn test_ram_probe_returns_a_tier() {
        let ram = estimate_ram_mb();
        assert!(ram == 512 || ram == 2048);
    }

    #[test]
    fn test_pixel_ratio_is_floored_at_one() {
        let caps = classify(Some(&optimized_probe()), 0.25);
        assert_eq!(caps.device_pixel_ratio, 1.0);
    }
}
