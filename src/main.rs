//! sk2ps - Convert a drawing file to Encapsulated PostScript
//!
//! Loads one drawing, selects the layers to print, computes the bounding
//! box from those layers and writes an EPS file (or stdout).
//!
//! ## Configuration
//!
//! Environment variables:
//! - `SK2PS_FONT_PATH`: `:`-separated directories holding `.pfa` fonts
//! - `SK2PS_LOG_FORMAT`: `json` for JSON log lines on stderr
//! - `RUST_LOG`: Log level (default: warn)

use eps_export::{cli, telemetry, EpsConverter};

fn main() {
    if let Err(e) = telemetry::init_logging() {
        eprintln!("sk2ps: failed to initialize logging: {e:#}");
    }

    let status = cli::run(std::env::args_os(), &EpsConverter::new());
    if status != 0 {
        std::process::exit(status);
    }
}
