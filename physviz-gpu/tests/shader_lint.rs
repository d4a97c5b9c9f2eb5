//! Shader lint contract tests, including the guarantee that the shaders we
//! ship are themselves clean under the ruleset they gate.

use physviz_gpu::{
    optimize_shader, shaders, suggest_optimizations, validate_shader, ShaderKind,
};

#[test]
fn fragment_without_precision_is_invalid() {
    let source = "void main() { gl_FragColor = vec4(1.0); }";
    let report = validate_shader(source, ShaderKind::Fragment);
    assert!(!report.is_valid);
    assert!(report.errors.iter().any(|e| e.contains("precision")));
}

#[test]
fn optimize_is_idempotent_on_precision() {
    let source = "void main() { gl_FragColor = vec4(1.0); }";
    let once = optimize_shader(source, ShaderKind::Fragment);
    let twice = optimize_shader(&once, ShaderKind::Fragment);
    assert_eq!(once, twice);
    assert_eq!(once.matches("precision mediump float;").count(), 1);
}

#[test]
fn threshold_branch_becomes_step_mix() {
    let source = "precision mediump float;\nvoid main() { float y; if (x > 0.5) y = 1.0; else y = 0.0; }";
    let optimized = optimize_shader(source, ShaderKind::Fragment);
    assert!(optimized.contains("step"));
    assert!(optimized.contains("mix"));
    assert!(!optimized.contains("if (x > 0.5)"));
}

#[test]
fn suggestions_extract_without_mutating() {
    let source = "\
precision highp float;
uniform vec4 u_weights[64];
void main() {
    float y = 0.0;
    if (x > 1.5) y = 1.0;
    vec3 c = baseColor * y;
    gl_Position = vec4(c, 1.0);
}
";
    let suggestions = suggest_optimizations(source);
    assert_eq!(suggestions.conditional_replacements.len(), 1);
    assert!(suggestions.conditional_replacements[0].contains("step(1.5, x)"));
    assert_eq!(suggestions.performance_warnings.len(), 1);
    assert!(suggestions.performance_warnings[0].contains("u_weights"));
    // No mediump declared anywhere: the color math gets flagged.
    assert!(!suggestions.precision_issues.is_empty());
}

#[test]
fn shipped_shaders_pass_their_own_gate() {
    for (source, kind) in [
        (shaders::MESH_VERT, ShaderKind::Vertex),
        (shaders::PARTICLE_VERT, ShaderKind::Vertex),
        (shaders::MESH_FRAG, ShaderKind::Fragment),
    ] {
        let report = validate_shader(source, kind);
        assert!(report.is_valid, "shipped shader failed validation: {:?}", report.errors);
        assert!(
            report.warnings.is_empty(),
            "shipped shader carries lint warnings: {:?}",
            report.warnings
        );
        // Already mobile-safe, so the optimizer must be a no-op.
        assert_eq!(optimize_shader(source, kind), source);
    }
}
