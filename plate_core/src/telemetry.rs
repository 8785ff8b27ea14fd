use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Environment variable that overrides the configured filter.
pub const LOG_ENV: &str = "PLATE_LOG";

/// A filter plus the directives that were tried and rejected on the way.
#[derive(Debug)]
pub struct ResolvedFilter {
    pub filter: EnvFilter,
    pub rejected: Vec<(String, String)>,
}

/// `override_` if valid, else `fallback`, else `info`.
pub fn resolve_filter(override_: Option<&str>, fallback: &str) -> ResolvedFilter {
    let mut rejected = Vec::new();
    for directives in override_.into_iter().chain([fallback]) {
        match EnvFilter::try_new(directives) {
            Ok(filter) => return ResolvedFilter { filter, rejected },
            Err(e) => rejected.push((directives.to_string(), e.to_string())),
        }
    }
    ResolvedFilter {
        filter: EnvFilter::new("info"),
        rejected,
    }
}

/// Install a stderr fmt subscriber filtered by `PLATE_LOG` or `filter`.
/// Safe to call more than once; later calls keep the first subscriber.
pub fn init(filter: &str) {
    let env = std::env::var(LOG_ENV).ok();
    let resolved = resolve_filter(env.as_deref(), filter);

    let layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let installed = tracing_subscriber::registry()
        .with(resolved.filter)
        .with(layer)
        .try_init()
        .is_ok();

    if installed {
        for (directives, error) in &resolved.rejected {
            tracing::warn!(%directives, %error, "ignoring invalid log filter");
        }
    }
}
