//! Error handling for the PhysViz CLI

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for PhysViz CLI operations
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Input/Output error: {message}")]
    Io { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("Rendering error: {message}")]
    Rendering { message: String },

    #[error("Computation error: {message}")]
    Compute { message: String },

    #[error("Shader validation failed: {message}")]
    Shader { message: String },
}

impl CliError {
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into() }
    }

    pub fn invalid_argument<S: Into<String>>(message: S) -> Self {
        Self::InvalidArgument { message: message.into() }
    }

    pub fn rendering<S: Into<String>>(message: S) -> Self {
        Self::Rendering { message: message.into() }
    }

    pub fn compute<S: Into<String>>(message: S) -> Self {
        Self::Compute { message: message.into() }
    }

    pub fn shader<S: Into<String>>(message: S) -> Self {
        Self::Shader { message: message.into() }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        Self::Io { message: err.to_string() }
    }
}

impl From<toml::de::Error> for CliError {
    fn from(err: toml::de::Error) -> Self {
        Self::config(format!("TOML parsing error: {}", err))
    }
}

impl From<toml::ser::Error> for CliError {
    fn from(err: toml::ser::Error) -> Self {
        Self::config(format!("TOML serialization error: {}", err))
    }
}

impl From<physviz_core::ComputeError> for CliError {
    fn from(err: physviz_core::ComputeError) -> Self {
        Self::compute(err.to_string())
    }
}

impl From<physviz_gpu::CanvasError> for CliError {
    fn from(err: physviz_gpu::CanvasError) -> Self {
        match err {
            physviz_gpu::CanvasError::Compute(inner) => Self::compute(inner.to_string()),
            other => Self::rendering(other.to_string()),
        }
    }
}

impl From<physviz_gpu::GpuError> for CliError {
    fn from(err: physviz_gpu::GpuError) -> Self {
        Self::rendering(err.to_string())
    }
}

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// Provide helpful error messages and suggestions
pub fn format_error_with_suggestions(error: &CliError) -> String {
    let mut message = error.to_string();

    match error {
        CliError::FileNotFound { path } => {
            message.push_str(&format!(
                "\n\nSuggestions:\n\
                 • Check that the file path is correct: {}\n\
                 • Ensure you have read permissions for the file",
                path.display()
            ));
        }

        CliError::Config { .. } => {
            message.push_str(
                "\n\nSuggestions:\n\
                 • Check your physviz.toml configuration file\n\
                 • Use 'physviz config --example' to generate a sample configuration\n\
                 • Verify that all configuration values are valid",
            );
        }

        CliError::Compute { .. } => {
            message.push_str(
                "\n\nSuggestions:\n\
                 • Check the equation syntax (supported operators: + - * / ^ and **)\n\
                 • Use one free variable, e.g. 'sin(x) * x'\n\
                 • Keep the sampling interval finite with x-max greater than x-min",
            );
        }

        CliError::Rendering { .. } => {
            message.push_str(
                "\n\nSuggestions:\n\
                 • Run 'physviz probe' to inspect the detected render path\n\
                 • Use --force-2d to bypass the GPU scene on this machine\n\
                 • Check that your graphics drivers are up to date",
            );
        }

        CliError::Shader { .. } => {
            message.push_str(
                "\n\nSuggestions:\n\
                 • Declare a precision qualifier (highp/mediump) in the shader\n\
                 • Use --fix to apply the safe rewrites automatically\n\
                 • Re-run 'physviz shader-check' to confirm the result",
            );
        }

        _ => {}
    }

    message
}

/// Print error with helpful suggestions and exit
pub fn print_error_and_exit(error: &CliError) -> ! {
    eprintln!("Error: {}", format_error_with_suggestions(error));
    std::process::exit(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = CliError::config("test message");
        assert!(matches!(err, CliError::Config { .. }));
        assert_eq!(err.to_string(), "Configuration error: test message");
    }

    #[test]
    fn test_error_suggestions() {
        let err = CliError::FileNotFound { path: PathBuf::from("style.toml") };
        let formatted = format_error_with_suggestions(&err);
        assert!(formatted.contains("Suggestions:"));
        assert!(formatted.contains("style.toml"));
    }

    #[test]
    fn test_compute_error_conversion() {
        let err: CliError = physviz_core::ComputeError::Solve("bad input".to_string()).into();
        assert!(matches!(err, CliError::Compute { .. }));
        assert!(err.to_string().contains("bad input"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let cli_err: CliError = io_err.into();
        assert!(matches!(cli_err, CliError::Io { .. }));
    }
}
