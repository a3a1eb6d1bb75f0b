//! Log filter setup for the binary

use tracing_subscriber::EnvFilter;

/// Directives used when `RUST_LOG` is unset or unparsable
pub fn default_directives(verbose: bool) -> String {
    let level = if verbose { "debug" } else { "info" };
    format!("docbulk={level},docbulk_core={level},docbulk_storage={level},docbulk_loader={level}")
}

/// Filter from `RUST_LOG` if set, otherwise from the verbosity flag
pub fn log_filter(verbose: bool) -> EnvFilter {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    filter_from(rust_log.as_deref(), verbose)
}

fn filter_from(rust_log: Option<&str>, verbose: bool) -> EnvFilter {
    rust_log
        .filter(|directives| !directives.trim().is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(default_directives(verbose)))
}
