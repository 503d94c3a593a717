//! Structured logging for the converter.

use crate::converter::ConversionReport;
use anyhow::Result;
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Conversions slower than this are logged as warnings.
pub const SLOW_CONVERSION_MS: i64 = 5000;

/// Log level used when `RUST_LOG` is not set.
const DEFAULT_FILTER: &str = "warn";

/// Installs the global subscriber.
///
/// Logs always go to stderr since stdout may carry the EPS output.
/// Reads configuration from environment variables:
/// - `RUST_LOG` - filter directives (default: warn)
/// - `SK2PS_LOG_FORMAT` - `json` for JSON lines, anything else for text
pub fn init_logging() -> Result<()> {
    let json = std::env::var("SK2PS_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json).then(|| fmt::layer().with_writer(std::io::stderr)))
        .try_init()?;
    Ok(())
}

/// Records a finished conversion.
///
/// Emits the duration, bounding box and font count, and warns when the
/// conversion exceeded [`SLOW_CONVERSION_MS`].
pub fn record_conversion(report: &ConversionReport) {
    let duration_ms = report.duration_ms();
    let [llx, lly, urx, ury] = report.bounding_box.to_eps_ints();

    info!(
        input = %report.input.display(),
        output = %report.output,
        duration_ms = duration_ms,
        llx, lly, urx, ury,
        fonts = report.fonts,
        "EPS conversion completed"
    );

    if duration_ms > SLOW_CONVERSION_MS {
        warn!(
            input = %report.input.display(),
            duration_ms = duration_ms,
            "EPS conversion exceeded performance threshold ({}ms)",
            SLOW_CONVERSION_MS
        );
    }

    match serde_json::to_string(report) {
        Ok(json) => debug!(report = %json, "Conversion report"),
        Err(e) => warn!(error = %e, "Failed to serialize conversion report"),
    }
}
