//! Static GLSL shader analysis
//!
//! Pure text passes with no graphics dependency: a validator that enforces
//! the mobile-safe patterns our target drivers tolerate, a suggestion pass
//! that extracts rewrite candidates, and a conservative optimizer that
//! performs the two rewrites that are always safe. The scene pipeline runs
//! the optimizer and validator on every shader before first compilation.

use once_cell::sync::Lazy;
use regex::Regex;

/// Which pipeline stage a source string is written for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderKind {
    Vertex,
    Fragment,
}

/// Outcome of one validation pass. Any entry in `errors` makes the shader
/// invalid; `warnings` are advisory.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ShaderValidation {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Rewrite candidates extracted by `suggest_optimizations`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OptimizationSuggestions {
    pub conditional_replacements: Vec<String>,
    pub precision_issues: Vec<String>,
    pub performance_warnings: Vec<String>,
}

static BRANCH: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bif\s*\(").expect("static pattern"));

static LOOP: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(?:for|while)\s*\(").expect("static pattern"));

static TRANSCENDENTAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:sin|cos|tan|pow|exp|log|sqrt)\s*\(").expect("static pattern"));

static PRECISION_STATEMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"precision\s+(?:highp|mediump|lowp)\s+float\s*;").expect("static pattern"));

static THRESHOLD_CONDITIONAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"if\s*\(\s*(?P<var>[A-Za-z_][A-Za-z0-9_.]*)\s*(?P<op>[<>])\s*(?P<k>[0-9]*\.?[0-9]+)\s*\)")
        .expect("static pattern")
});

static THRESHOLD_ASSIGNMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"if\s*\(\s*(?P<var>[A-Za-z_][A-Za-z0-9_.]*)\s*(?P<op>[<>])\s*(?P<k>[0-9]*\.?[0-9]+)\s*\)\s*(?P<tgt>[A-Za-z_][A-Za-z0-9_.\[\]]*)\s*=\s*(?P<a>[^;{}]+);\s*else\s*(?P<tgt2>[A-Za-z_][A-Za-z0-9_.\[\]]*)\s*=\s*(?P<b>[^;{}]+);",
    )
    .expect("static pattern")
});

static COLOR_ARITHMETIC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[A-Za-z_]*(?:color|Color|col|rgb)[A-Za-z0-9_.]*\s*[*/]|[*/]\s*[A-Za-z_]*(?:color|Color|col|rgb)[A-Za-z0-9_.]*")
        .expect("static pattern")
});

static UNIFORM_ARRAY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"uniform\s+\w+\s+(?P<name>\w+)\s*\[\s*(?P<len>\d+)\s*\]").expect("static pattern")
});

/// Largest uniform array we accept before suggesting texture-backed storage.
const UNIFORM_ARRAY_LIMIT: usize = 16;

/// Fragment shaders get this many transcendental calls before we suggest
/// hoisting the math into the vertex stage.
const TRANSCENDENTAL_BUDGET: usize = 2;

/// Validate one shader source against the mobile-safe ruleset.
pub fn validate_shader(source: &str, kind: ShaderKind) -> ShaderValidation {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let has_highp = source.contains("highp");
    let has_mediump = source.contains("mediump");

    if !has_highp && !has_mediump {
        errors.push(
            "no precision qualifier (highp/mediump) declared; mobile GLSL requires explicit precision"
                .to_string(),
        );
    }

    if kind == ShaderKind::Vertex && source.contains("gl_Position") && !has_highp {
        errors.push(
            "vertex shader writes gl_Position without highp precision; position math below highp causes visible jitter"
                .to_string(),
        );
    }

    if kind == ShaderKind::Fragment {
        for (index, _) in BRANCH.find_iter(source).enumerate() {
            warnings.push(format!(
                "conditional branch #{} costs divergence on mobile GPUs; prefer step() or mix()",
                index + 1
            ));
        }

        let transcendental_calls = TRANSCENDENTAL.find_iter(source).count();
        if transcendental_calls > TRANSCENDENTAL_BUDGET {
            warnings.push(format!(
                "{} transcendental calls in a fragment shader; consider precomputing in the vertex stage",
                transcendental_calls
            ));
        }
    }

    for (index, _) in LOOP.find_iter(source).enumerate() {
        warnings.push(format!(
            "bounded loop #{} is a mobile driver compatibility risk; unroll or move to the CPU",
            index + 1
        ));
    }

    ShaderValidation {
        is_valid: errors.is_empty(),
        errors,
        warnings,
    }
}

/// Extract rewrite candidates without touching the source.
pub fn suggest_optimizations(source: &str) -> OptimizationSuggestions {
    let mut suggestions = OptimizationSuggestions::default();

    for caps in THRESHOLD_CONDITIONAL.captures_iter(source) {
        let var = &caps["var"];
        let op = &caps["op"];
        let k = &caps["k"];
        suggestions.conditional_replacements.push(format!(
            "replace 'if ({var} {op} {k})' with a step({k}, {var}) selection"
        ));
    }

    if !source.contains("mediump") {
        for m in COLOR_ARITHMETIC.find_iter(source) {
            suggestions.precision_issues.push(format!(
                "color arithmetic '{}' without a mediump declaration; color math rarely needs highp",
                m.as_str().trim()
            ));
        }
    }

    for caps in UNIFORM_ARRAY.captures_iter(source) {
        let len: usize = caps["len"].parse().unwrap_or(0);
        if len > UNIFORM_ARRAY_LIMIT {
            suggestions.performance_warnings.push(format!(
                "uniform array '{}' has {} elements; consider texture-backed storage",
                &caps["name"], len
            ));
        }
    }

    suggestions
}

/// Safe, idempotent rewriting: ensure a precision declaration exists and
/// collapse simple threshold branches into `mix`/`step`. Everything else
/// passes through unmodified.
pub fn optimize_shader(source: &str, kind: ShaderKind) -> String {
    let mut output = rewrite_threshold_assignments(source);

    if !PRECISION_STATEMENT.is_match(&output) {
        let declaration = match kind {
            ShaderKind::Vertex => "precision highp float;",
            ShaderKind::Fragment => "precision mediump float;",
        };
        output = insert_after_version(&output, declaration);
    }

    output
}

/// `if (x > k) y = a; else y = b;`  =>  `y = mix(b, a, step(k, x));`
/// (and the `<` form with the arms swapped). Skipped when the two branches
/// assign different targets; the optimizer is conservative, not a general
/// rewriter.
fn rewrite_threshold_assignments(source: &str) -> String {
    THRESHOLD_ASSIGNMENT
        .replace_all(source, |caps: &regex::Captures<'_>| {
            let tgt = caps["tgt"].trim().to_string();
            if tgt != caps["tgt2"].trim() {
                return caps[0].to_string();
            }
            let var = caps["var"].trim();
            let k = caps["k"].trim();
            let a = caps["a"].trim();
            let b = caps["b"].trim();
            match &caps["op"] {
                ">" => format!("{tgt} = mix({b}, {a}, step({k}, {var}));"),
                _ => format!("{tgt} = mix({a}, {b}, step({k}, {var}));"),
            }
        })
        .into_owned()
}

/// A `#version` directive must stay on the first line, so the injected
/// declaration goes immediately after it.
fn insert_after_version(source: &str, declaration: &str) -> String {
    if let Some(first_newline) = source.find('\n') {
        let (first_line, rest) = source.split_at(first_newline + 1);
        if first_line.trim_start().starts_with("#version") {
            return format!("{first_line}{declaration}\n{rest}");
        }
    }
    format!("{declaration}\n{source}")
}

#[cfg(test)]
mod tests {
    use super::*;

    const BARE_FRAGMENT: &str = "\
void main() {
    gl_FragColor = vec4(1.0);
}
";

    #[test]
    fn test_missing_precision_is_an_error() {
        let report = validate_shader(BARE_FRAGMENT, ShaderKind::Fragment);
        assert!(!report.is_valid);
        assert!(report.errors.iter().any(|e| e.contains("precision")));
    }

    #[test]
    fn test_precision_qualifier_satisfies_rule() {
        let source = "precision mediump float;\nvoid main() { gl_FragColor = vec4(1.0); }";
        let report = validate_shader(source, ShaderKind::Fragment);
        assert!(report.is_valid);
    }

    #[test]
    fn test_vertex_position_without_highp_is_an_error() {
        let source = "\
precision mediump float;
attribute vec3 a_position;
void main() {
    gl_Position = vec4(a_position, 1.0);
}
";
        let report = validate_shader(source, ShaderKind::Vertex);
        assert!(!report.is_valid);
        assert!(report.errors.iter().any(|e| e.contains("gl_Position")));

        let fixed = source.replace("precision mediump float;", "precision highp float;");
        assert!(validate_shader(&fixed, ShaderKind::Vertex).is_valid);
    }

    #[test]
    fn test_fragment_branches_warn_and_name_step_mix() {
        let source = "\
precision mediump float;
void main() {
    float v = 0.0;
    if (v > 0.5) { v = 1.0; }
    if (v < 0.2) { v = 0.0; }
}
";
        let report = validate_shader(source, ShaderKind::Fragment);
        assert!(report.is_valid);
        let branch_warnings: Vec<_> = report
            .warnings
            .iter()
            .filter(|w| w.contains("step()") && w.contains("mix()"))
            .collect();
        assert_eq!(branch_warnings.len(), 2);
    }

    #[test]
    fn test_branches_do_not_warn_in_vertex_stage() {
        let source = "\
precision highp float;
void main() {
    float v = 0.0;
    if (v > 0.5) { v = 1.0; }
    gl_Position = vec4(v);
}
";
        let report = validate_shader(source, ShaderKind::Vertex);
        assert!(report.is_valid);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_transcendental_budget() {
        let within = "precision mediump float;\nvoid main() { float v = sin(1.0) + cos(2.0); }";
        assert!(validate_shader(within, ShaderKind::Fragment)
            .warnings
            .iter()
            .all(|w| !w.contains("transcendental")));

        let over = "\
precision mediump float;
void main() {
    float v = sin(1.0) + cos(2.0) + exp(3.0) + pow(2.0, 4.0);
}
";
        let report = validate_shader(over, ShaderKind::Fragment);
        assert!(report
            .warnings
            .iter()
            .any(|w| w.contains("4 transcendental calls")));
    }

    #[test]
    fn test_loops_warn_in_either_stage() {
        let source = "\
precision highp float;
void main() {
    for (int i = 0; i < 4; i++) { }
    gl_Position = vec4(0.0);
}
";
        let report = validate_shader(source, ShaderKind::Vertex);
        assert!(report.warnings.iter().any(|w| w.contains("loop")));
    }

    #[test]
    fn test_suggest_threshold_conditionals() {
        let source = "\
precision mediump float;
void main() {
    float y = 0.0;
    if (x > 0.5) y = 1.0;
    if (t < 2.0) y = 0.2;
}
";
        let suggestions = suggest_optimizations(source);
        assert_eq!(suggestions.conditional_replacements.len(), 2);
        assert!(suggestions.conditional_replacements[0].contains("step(0.5, x)"));
        assert!(suggestions.conditional_replacements[1].contains("step(2.0, t)"));
    }

    #[test]
    fn test_suggest_color_precision() {
        let source = "void main() { vec3 c = baseColor * 0.5; }";
        let suggestions = suggest_optimizations(source);
        assert!(!suggestions.precision_issues.is_empty());

        let declared = "precision mediump float;\nvoid main() { vec3 c = baseColor * 0.5; }";
        assert!(suggest_optimizations(declared).precision_issues.is_empty());
    }

    #[test]
    fn test_suggest_large_uniform_arrays() {
        let source = "uniform vec4 u_lights[32];\nuniform vec4 u_small[8];";
        let suggestions = suggest_optimizations(source);
        assert_eq!(suggestions.performance_warnings.len(), 1);
        assert!(suggestions.performance_warnings[0].contains("u_lights"));
        assert!(suggestions.performance_warnings[0].contains("32"));
    }

    #[test]
    fn test_optimize_prepends_precision_once() {
        let once = optimize_shader(BARE_FRAGMENT, ShaderKind::Fragment);
        let twice = optimize_shader(&once, ShaderKind::Fragment);
        assert_eq!(once, twice);
        assert_eq!(once.matches("precision mediump float;").count(), 1);
        assert!(once.starts_with("precision mediump float;"));
    }

    #[test]
    fn test_optimize_vertex_gets_highp() {
        let source = "void main() { gl_Position = vec4(0.0); }";
        let optimized = optimize_shader(source, ShaderKind::Vertex);
        assert!(optimized.starts_with("precision highp float;"));
        assert!(validate_shader(&optimized, ShaderKind::Vertex).is_valid);
    }

    #[test]
    fn test_optimize_respects_version_directive() {
        let source = "#version 310 es\nvoid main() { }";
        let optimized = optimize_shader(source, ShaderKind::Fragment);
        assert!(optimized.starts_with("#version 310 es\n"));
        assert!(optimized.contains("#version 310 es\nprecision mediump float;"));
    }

    #[test]
    fn test_optimize_rewrites_threshold_branch() {
        let source = "precision mediump float;\nvoid main() { float y; if (x > 0.5) y = 1.0; else y = 0.0; }";
        let optimized = optimize_shader(source, ShaderKind::Fragment);
        assert!(optimized.contains("step"));
        assert!(optimized.contains("mix"));
        assert!(!optimized.contains("if (x > 0.5)"));
        assert!(optimized.contains("y = mix(0.0, 1.0, step(0.5, x));"));
    }

    #[test]
    fn test_optimize_rewrites_less_than_with_swapped_arms() {
        let source = "precision mediump float;\nvoid main() { float y; if (x < 0.5) y = 1.0; else y = 0.0; }";
        let optimized = optimize_shader(source, ShaderKind::Fragment);
        assert!(optimized.contains("y = mix(1.0, 0.0, step(0.5, x));"));
    }

    #[test]
    fn test_optimize_keeps_mismatched_targets() {
        let source =
            "precision mediump float;\nvoid main() { if (x > 0.5) y = 1.0; else z = 0.0; }";
        let optimized = optimize_shader(source, ShaderKind::Fragment);
        assert!(optimized.contains("if (x > 0.5)"));
    }

    #[test]
    fn test_optimize_passes_other_text_through() {
        let source = "precision highp float;\nvoid main() { gl_Position = vec4(1.0); }";
        assert_eq!(optimize_shader(source, ShaderKind::Vertex), source);
    }
}
