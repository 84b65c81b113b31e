//! File logging. The terminal belongs to the UI, so log lines go to
//! `<cache_dir>/messenger-tui/messenger.log` instead of stderr.

use std::fs::{self, File};
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber and return the log file path.
///
/// `RUST_LOG` takes precedence over the default filter.
pub fn init(debug: bool) -> Result<PathBuf> {
    let log_dir = dirs::cache_dir()
        .ok_or_else(|| anyhow!("Could not determine cache directory"))?
        .join("messenger-tui");
    fs::create_dir_all(&log_dir)?;

    let log_path = log_dir.join("messenger.log");
    let log_file = File::create(&log_path)?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(debug)));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_ansi(false)
                .with_writer(Mutex::new(log_file)),
        )
        .try_init()?;

    Ok(log_path)
}

/// Filter used when `RUST_LOG` is unset. Event targets start with the crate
/// name, which is the binary name rather than the package name.
fn default_filter(debug: bool) -> String {
    if debug {
        "debug,hyper=info".to_string()
    } else {
        format!("info,{}=debug,hyper=warn,reqwest=warn", env!("CARGO_CRATE_NAME"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_matches_own_targets() {
        // Targets are module paths, so the first segment is what the filter must name
        let crate_target = module_path!().split("::").next().unwrap();

        let filter = default_filter(false);

        assert!(filter.contains(&format!(",{crate_target}=debug,")));
        assert!(EnvFilter::try_new(&filter).is_ok());
    }

    #[test]
    fn test_debug_filter_parses() {
        assert!(EnvFilter::try_new(default_filter(true)).is_ok());
    }
}
