//! Logging setup and configuration
//!
//! Diagnostics go to stderr so that device listings on stdout stay
//! machine-readable.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Crates whose events follow the configured level; everything else stays at `warn`
const WORKSPACE_TARGETS: &[&str] = &["enumerator", "common", "identity", "usb_enum"];

/// Setup tracing subscriber for the application
///
/// `RUST_LOG` takes precedence over `default_level` when set.
pub fn setup_logging(default_level: &str) -> crate::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive(default_level)))
        .map_err(|e| crate::Error::Config(format!("Invalid log filter: {}", e)))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .map_err(|e| crate::Error::Config(format!("Logging already initialized: {}", e)))
}

fn default_directive(level: &str) -> String {
    let mut directive = String::from("warn");
    for target in WORKSPACE_TARGETS {
        directive.push_str(&format!(",{}={}", target, level));
    }
    directive
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive_scopes_level() {
        let directive = default_directive("trace");
        assert!(directive.starts_with("warn,"));
        assert!(directive.contains("enumerator=trace"));
        assert!(EnvFilter::try_new(&directive).is_ok());
    }
}
