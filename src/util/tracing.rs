//! Tracing helpers
// (c) 2025 Ross Younger

use tracing_subscriber::EnvFilter;

/// Environment variable that controls what gets logged
const STANDARD_ENV_VAR: &str = "RUST_LOG";

/// Log filter setup:
/// use `RUST_LOG` if set; otherwise log only this crate's items at the given
/// trace level.
fn filter_for(trace_level: &str) -> anyhow::Result<EnvFilter> {
    EnvFilter::try_from_env(STANDARD_ENV_VAR).or_else(|e| {
        // The env var was unset or invalid. Which is it?
        if std::env::var(STANDARD_ENV_VAR).is_ok() {
            anyhow::bail!("{STANDARD_ENV_VAR} (set in environment) was not understood: {e}");
        }
        // It was unset. Fall back.
        Ok(EnvFilter::try_new(format!("linkftp={trace_level}"))?)
    })
}

/// Sets up a stderr tracing subscriber for the process.
///
/// Embedding applications with their own subscriber should skip this and
/// route the crate's `tracing` events however they see fit.
pub fn setup_tracing(trace_level: &str) -> anyhow::Result<()> {
    let filter = filter_for(trace_level)?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialise tracing: {e}"))
}

#[cfg(test)]
mod tests {
    #[test]
    fn fallback_filter_is_accepted() {
        // no RUST_LOG manipulation here; whatever it holds must parse or
        // the fallback path must engage
        let _ = super::filter_for("debug").unwrap();
    }
}
