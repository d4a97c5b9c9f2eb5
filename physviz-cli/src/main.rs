use clap::{Parser, Subcommand};
use physviz_core::{CapabilityContext, DeviceCapabilities, RenderPath};
use physviz_gpu::{
    detect_with_pixel_ratio, optimize_shader, suggest_optimizations, validate_shader,
    Canvas2dRenderer, GpuError, GpuRenderer, ShaderKind,
};
use std::path::{Path, PathBuf};

mod config;
mod error;

use config::RenderConfig;
use error::{CliError, CliResult};

#[derive(Parser)]
#[command(name = "physviz")]
#[command(about = "PhysViz - adaptive-capability physics visualization rendering")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Probe the graphics stack and report the detected capabilities
    Probe {
        /// Emit the report as JSON
        #[arg(long)]
        json: bool,

        /// Display scale factor reported by the host window system
        #[arg(long, default_value = "1.0")]
        pixel_ratio: f64,
    },

    /// Render adaptively: GPU scene on capable devices, 2D plot otherwise
    Render {
        /// Equation sampled for the 2D path
        #[arg(short, long, default_value = "sin(x) * x")]
        equation: String,

        /// Output image file (PNG)
        #[arg(short, long)]
        output: PathBuf,

        /// Logical width in pixels
        #[arg(long, default_value = "1280")]
        width: u32,

        /// Logical height in pixels
        #[arg(long, default_value = "720")]
        height: u32,

        /// Frames to advance the GPU scene before capturing
        #[arg(long, default_value = "120")]
        frames: u32,

        /// Skip the GPU scene even when the device could mount it
        #[arg(long)]
        force_2d: bool,

        /// Display scale factor reported by the host window system
        #[arg(long, default_value = "1.0")]
        pixel_ratio: f64,

        /// Optional TOML style/scene configuration
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Plot an equation with the 2D renderer
    Plot {
        /// Equation to sample, e.g. "x**2"
        equation: String,

        /// Output image file (PNG)
        #[arg(short, long)]
        output: PathBuf,

        /// Image width in pixels
        #[arg(long, default_value = "1200")]
        width: u32,

        /// Image height in pixels
        #[arg(long, default_value = "800")]
        height: u32,

        /// Simulated pan in pixels before capturing, as "dx,dy"
        #[arg(long)]
        pan: Option<String>,

        /// Simulated wheel steps: positive zooms out, negative zooms in
        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        zoom: i32,

        /// Optional TOML style/scene configuration
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Validate a GLSL shader against the mobile-safe ruleset
    ShaderCheck {
        /// Shader source file (.vert/.vs or .frag/.fs)
        path: PathBuf,

        /// Shader stage; inferred from the extension when omitted
        #[arg(short, long)]
        kind: Option<String>,

        /// Write the optimized source back next to the input (.optimized)
        #[arg(long)]
        fix: bool,
    },

    /// Configuration helpers
    Config {
        /// Print an example configuration file
        #[arg(long)]
        example: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let result = match cli.command {
        Commands::Probe { json, pixel_ratio } => cmd_probe(json, pixel_ratio),
        Commands::Render {
            equation,
            output,
            width,
            height,
            frames,
            force_2d,
            pixel_ratio,
            config,
        } => cmd_render(
            &equation,
            &output,
            width,
            height,
            frames,
            force_2d,
            pixel_ratio,
            config.as_deref(),
        ),
        Commands::Plot {
            equation,
            output,
            width,
            height,
            pan,
            zoom,
            config,
        } => cmd_plot(&equation, &output, width, height, pan.as_deref(), zoom, config.as_deref()),
        Commands::ShaderCheck { path, kind, fix } => cmd_shader_check(&path, kind.as_deref(), fix),
        Commands::Config { example } => cmd_config(example),
    };

    if let Err(err) = result {
        error::print_error_and_exit(&err);
    }
}

fn cmd_probe(json: bool, pixel_ratio: f64) -> CliResult<()> {
    let caps = detect_with_pixel_ratio(pixel_ratio);
    let context = CapabilityContext::new(caps);
    let caps = context.current();

    if json {
        let report = serde_json::json!({
            "capabilities": &*caps,
            "status": context.status_message(),
            "generated_at": chrono::Utc::now().to_rfc3339(),
        });
        println!("{}", serde_json::to_string_pretty(&report).map_err(|e| CliError::Io { message: e.to_string() })?);
    } else {
        println!("{}", context.status_message());
        println!();
        println!("  render path        : {}", caps.render_path);
        println!("  gpu api tier       : {}", caps.gpu_api_tier);
        println!("  gpu memory (est.)  : {} MB", caps.gpu_memory_mb);
        println!("  system ram (est.)  : {} MB", caps.estimated_ram_mb);
        println!("  max texture size   : {}", caps.max_texture_size);
        println!("  device pixel ratio : {}", caps.device_pixel_ratio);
        println!("  instancing         : {}", caps.supports_instancing);
    }

    context.teardown();
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn cmd_render(
    equation: &str,
    output: &Path,
    width: u32,
    height: u32,
    frames: u32,
    force_2d: bool,
    pixel_ratio: f64,
    config_path: Option<&Path>,
) -> CliResult<()> {
    let config = RenderConfig::load_or_default(config_path)?;
    let caps = detect_with_pixel_ratio(pixel_ratio);
    let context = CapabilityContext::new(caps);
    let caps = context.current();
    log::info!("{}", context.status_message());

    // The dispatch: one renderer per path, chosen exhaustively.
    let result = match caps.render_path {
        RenderPath::GpuOptimized if !force_2d => {
            match render_gpu_scene(&caps, equation, output, width, height, frames, &config) {
                Ok(()) => Ok(()),
                // A mount refusal after successful detection (driver raced
                // away, hybrid GPU switched off) degrades instead of failing:
                // the user still gets a picture.
                Err(GpuError::NoAdapter) | Err(GpuError::DeviceRequest(_)) => {
                    log::warn!("GPU mount failed after detection; dropping to the 2D path");
                    render_canvas_plot(equation, output, width, height, None, 0, &config)
                }
                Err(other) => Err(other.into()),
            }
        }
        RenderPath::GpuOptimized | RenderPath::GpuLegacy | RenderPath::Canvas2dFallback => {
            println!("{}", caps.render_path.status_message());
            render_canvas_plot(equation, output, width, height, None, 0, &config)
        }
    };

    context.teardown();
    result
}

fn render_gpu_scene(
    caps: &DeviceCapabilities,
    equation: &str,
    output: &Path,
    width: u32,
    height: u32,
    frames: u32,
    config: &RenderConfig,
) -> Result<(), GpuError> {
    let mut renderer = GpuRenderer::mount(caps, width, height, &config.scene)?;
    log::info!(
        "scene mounted ({}x{} px, msaa x{}), equation overlay handled by the 2D path: {}",
        renderer.size_px().0,
        renderer.size_px().1,
        renderer.sample_count(),
        equation
    );

    let dt = 1.0 / 60.0;
    for frame in 0..frames.max(1) {
        // A gentle synthetic drag keeps the camera (and LOD selection) moving.
        if frame % 30 == 0 {
            renderer.handle_pointer_drag(6.0, 12.0);
        }
        renderer.render_frame(dt)?;
    }

    let image = renderer.read_frame()?;
    image
        .save(output)
        .map_err(|e| GpuError::Readback(e.to_string()))?;

    println!(
        "GPU scene: {} frames, ~{} fps, {} draw calls/frame, LOD {:?}",
        renderer.stats().total_frames(),
        renderer.stats().fps(),
        renderer.stats().draw_calls_last_frame(),
        renderer.current_lod()
    );
    println!("Wrote {}", output.display());

    renderer.dispose();
    Ok(())
}

fn render_canvas_plot(
    equation: &str,
    output: &Path,
    width: u32,
    height: u32,
    pan: Option<(f64, f64)>,
    zoom: i32,
    config: &RenderConfig,
) -> CliResult<()> {
    let mut canvas = Canvas2dRenderer::new(width, height, &config.canvas)?;
    canvas.set_equation(equation)?;

    if let Some((dx, dy)) = pan {
        let (cx, cy) = (width as f64 / 2.0, height as f64 / 2.0);
        canvas.on_pointer_down(cx, cy);
        canvas.on_pointer_move(cx + dx, cy + dy);
        canvas.on_pointer_up();
    }
    for _ in 0..zoom.unsigned_abs() {
        canvas.on_wheel(if zoom > 0 { 1.0 } else { -1.0 });
    }

    canvas.export_png(output)?;
    let vp = canvas.viewport();
    println!(
        "2D plot: {} over [{:.3}, {:.3}] ({} samples)",
        equation,
        vp.x_min,
        vp.x_max,
        canvas.curve().map_or(0, |c| c.x_values.len())
    );
    println!("Wrote {}", output.display());

    canvas.shutdown();
    Ok(())
}

fn cmd_plot(
    equation: &str,
    output: &Path,
    width: u32,
    height: u32,
    pan: Option<&str>,
    zoom: i32,
    config_path: Option<&Path>,
) -> CliResult<()> {
    let config = RenderConfig::load_or_default(config_path)?;
    let pan = pan.map(parse_pan).transpose()?;
    render_canvas_plot(equation, output, width, height, pan, zoom, &config)
}

fn parse_pan(raw: &str) -> CliResult<(f64, f64)> {
    let parts: Vec<&str> = raw.split(',').collect();
    if parts.len() != 2 {
        return Err(CliError::invalid_argument(format!(
            "pan must be 'dx,dy' in pixels, got '{}'",
            raw
        )));
    }
    let dx = parts[0].trim().parse::<f64>();
    let dy = parts[1].trim().parse::<f64>();
    match (dx, dy) {
        (Ok(dx), Ok(dy)) => Ok((dx, dy)),
        _ => Err(CliError::invalid_argument(format!(
            "pan components must be numbers, got '{}'",
            raw
        ))),
    }
}

fn cmd_shader_check(path: &Path, kind: Option<&str>, fix: bool) -> CliResult<()> {
    if !path.exists() {
        return Err(CliError::FileNotFound { path: path.to_path_buf() });
    }
    let source = std::fs::read_to_string(path)?;
    let kind = resolve_shader_kind(path, kind)?;

    let report = validate_shader(&source, kind);
    for warning in &report.warnings {
        println!("warning: {}", warning);
    }
    for error in &report.errors {
        println!("error: {}", error);
    }

    let suggestions = suggest_optimizations(&source);
    for suggestion in suggestions
        .conditional_replacements
        .iter()
        .chain(&suggestions.precision_issues)
        .chain(&suggestions.performance_warnings)
    {
        println!("suggest: {}", suggestion);
    }

    if fix {
        let optimized = optimize_shader(&source, kind);
        let out_path = path.with_extension(format!(
            "{}.optimized",
            path.extension().and_then(|e| e.to_str()).unwrap_or("glsl")
        ));
        std::fs::write(&out_path, &optimized)?;
        println!("Wrote {}", out_path.display());

        let fixed_report = validate_shader(&optimized, kind);
        if !fixed_report.is_valid {
            return Err(CliError::shader(fixed_report.errors.join("; ")));
        }
        return Ok(());
    }

    if report.is_valid {
        println!(
            "{}: valid ({} warnings)",
            path.display(),
            report.warnings.len()
        );
        Ok(())
    } else {
        Err(CliError::shader(report.errors.join("; ")))
    }
}

fn resolve_shader_kind(path: &Path, kind: Option<&str>) -> CliResult<ShaderKind> {
    if let Some(kind) = kind {
        return match kind {
            "vertex" | "vert" | "vs" => Ok(ShaderKind::Vertex),
            "fragment" | "frag" | "fs" => Ok(ShaderKind::Fragment),
            other => Err(CliError::invalid_argument(format!(
                "unknown shader kind '{}' (expected vertex|fragment)",
                other
            ))),
        };
    }
    match path.extension().and_then(|e| e.to_str()) {
        Some("vert") | Some("vs") => Ok(ShaderKind::Vertex),
        Some("frag") | Some("fs") => Ok(ShaderKind::Fragment),
        _ => Err(CliError::invalid_argument(
            "cannot infer shader kind from the extension; pass --kind vertex|fragment",
        )),
    }
}

fn cmd_config(example: bool) -> CliResult<()> {
    if example {
        println!("{}", RenderConfig::example_toml()?);
    } else {
        println!("Use 'physviz config --example' to print a sample configuration.");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pan() {
        assert_eq!(parse_pan("40,-25").unwrap(), (40.0, -25.0));
        assert_eq!(parse_pan(" 1.5 , 2 ").unwrap(), (1.5, 2.0));
        assert!(parse_pan("40").is_err());
        assert!(parse_pan("a,b").is_err());
    }

    #[test]
    fn test_resolve_shader_kind() {
        let vert = Path::new("particle.vert");
        let frag = Path::new("mesh.frag");
        assert_eq!(resolve_shader_kind(vert, None).unwrap(), ShaderKind::Vertex);
        assert_eq!(resolve_shader_kind(frag, None).unwrap(), ShaderKind::Fragment);
        assert_eq!(
            resolve_shader_kind(Path::new("x.glsl"), Some("vertex")).unwrap(),
            ShaderKind::Vertex
        );
        assert!(resolve_shader_kind(Path::new("x.glsl"), None).is_err());
        assert!(resolve_shader_kind(vert, Some("geometry")).is_err());
    }
}
