use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

use crate::config::LogFormat;

/// Environment variable holding the tracing filter directives.
pub const LOG_FILTER_ENV: &str = "PRICEBOOK_LOG";
pub const DEFAULT_FILTER: &str = "pricebook=info,tower_http=info,sqlx=warn";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_FILTER_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber and route `log` records from dependencies
/// into it. Events go to stderr; stdout carries command output only.
/// Safe to call more than once; later calls keep the first setup.
pub fn init_logging(format: LogFormat) {
    let _ = tracing_log::LogTracer::init();
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_target(true)
        .with_writer(std::io::stderr)
        .with_timer(UtcTime::rfc_3339());

    let _ = match format {
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish()),
        LogFormat::Pretty => tracing::subscriber::set_global_default(builder.finish()),
    };
}
