//! Command line front end for `sk2ps`.

use crate::converter::EpsConverter;
use crate::device::{DeviceFactory, OutputTarget};
use crate::loader::Loader;
use crate::options::{current_date, real_username, ConversionOptions, LayerSelection};
use crate::telemetry;
use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::{ArgAction, Parser};
use std::ffi::OsString;
use std::path::PathBuf;
use tracing::error;

/// Status returned after printing usage, for `--help` and bad arguments.
pub const EXIT_USAGE: i32 = -1;

/// Status returned when a conversion fails.
pub const EXIT_FAILURE: i32 = 1;

const LAYER_HELP: &str = "\
Layer selection:
  By default every layer marked printable is printed, whether it is
  visible or not. --visible adds every layer marked visible;
  --noprintable drops the printable criterion, so layers are chosen by
  their visible flag and --visible alone. The bounding box covers exactly
  the selected layers.";

/// Convert a drawing file to PostScript (EPS). Output is written to
/// OUTFILE or to stdout.
#[derive(Parser, Debug)]
#[command(name = "sk2ps")]
#[command(about, long_about = None, after_help = LAYER_HELP)]
#[command(disable_version_flag = true)]
pub struct Args {
    /// Drawing file to convert
    pub infile: PathBuf,

    /// EPS file to write (default: stdout)
    pub outfile: Option<PathBuf>,

    /// Print all layers marked as visible
    #[arg(short = 'v', long, action = ArgAction::SetTrue)]
    pub visible: bool,

    /// Do not select layers by their printable flag
    #[arg(short = 'p', long = "noprintable", action = ArgAction::SetTrue)]
    pub no_printable: bool,

    /// Value of the `Title:` comment (default: base name of INFILE)
    #[arg(short = 't', long, value_name = "TITLE")]
    pub title: Option<String>,

    /// Value of the `CreationDate:` comment (default: current date)
    #[arg(short = 'd', long, value_name = "DATE")]
    pub date: Option<String>,

    /// Value of the `For:` comment (default: real user name)
    #[arg(short = 'f', long = "for", value_name = "NAME")]
    pub for_user: Option<String>,

    /// Embed fonts in the EPS file
    #[arg(short = 'e', long = "embed-fonts", action = ArgAction::SetTrue)]
    pub embed_fonts: bool,

    /// Rotate the drawing 90 degrees counter-clockwise
    #[arg(short = 'r', long, action = ArgAction::SetTrue)]
    pub rotate: bool,

    /// Directories searched for `<Font>.pfa` files when embedding fonts
    #[arg(
        long = "font-path",
        value_name = "DIRS",
        env = "SK2PS_FONT_PATH",
        value_delimiter = ':'
    )]
    pub font_path: Vec<PathBuf>,
}

impl Args {
    /// Builds conversion options, filling in the header defaults.
    pub fn options(&self) -> ConversionOptions {
        ConversionOptions {
            selection: LayerSelection::new(self.visible, !self.no_printable),
            rotate: self.rotate,
            embed_fonts: self.embed_fonts,
            title: self.title.clone(),
            creation_date: self.date.clone().unwrap_or_else(current_date),
            for_user: self.for_user.clone().unwrap_or_else(real_username),
            font_path: self.font_path.clone(),
        }
    }

    pub fn output(&self) -> OutputTarget {
        self.outfile.clone().into()
    }
}

/// Parses `argv`, runs the conversion and returns the process status.
///
/// Usage errors never reach the loader or the device.
pub fn run<I, T, L, F>(argv: I, converter: &EpsConverter<L, F>) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
    L: Loader,
    F: DeviceFactory,
{
    let args = match Args::try_parse_from(argv) {
        Ok(args) => args,
        Err(e) => {
            // Help goes to stdout, argument errors (with usage) to stderr.
            let _ = e.print();
            if e.kind() != ErrorKind::DisplayHelp {
                error!(kind = ?e.kind(), "Invalid command line");
            }
            return EXIT_USAGE;
        }
    };

    match execute(&args, converter) {
        Ok(()) => 0,
        Err(e) => {
            error!("Conversion failed: {:#}", e);
            eprintln!("sk2ps: {:#}", e);
            EXIT_FAILURE
        }
    }
}

fn execute<L, F>(args: &Args, converter: &EpsConverter<L, F>) -> Result<()>
where
    L: Loader,
    F: DeviceFactory,
{
    let output = args.output();
    let description = output.to_string();
    let report = converter
        .convert(&args.infile, output, &args.options())
        .with_context(|| format!("cannot convert {} to {}", args.infile.display(), description))?;
    telemetry::record_conversion(&report);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::MockDeviceFactory;
    use crate::error::LoadError;
    use crate::loader::MockLoader;
    use mockall::predicate::eq;
    use pretty_assertions::assert_eq;
    use std::path::Path;

    fn untouched_converter() -> EpsConverter<MockLoader, MockDeviceFactory> {
        let mut loader = MockLoader::new();
        loader.expect_load().never();
        let mut devices = MockDeviceFactory::new();
        devices.expect_open().never();
        EpsConverter::with_parts(loader, devices)
    }

    #[test]
    fn test_no_positional_arguments_prints_usage() {
        let converter = untouched_converter();
        assert_eq!(run(["sk2ps"], &converter), EXIT_USAGE);
    }

    #[test]
    fn test_three_positional_arguments_prints_usage() {
        let converter = untouched_converter();
        assert_eq!(run(["sk2ps", "a.sk", "b.eps", "c.eps"], &converter), EXIT_USAGE);
    }

    #[test]
    fn test_help_is_not_success() {
        let converter = untouched_converter();
        assert_eq!(run(["sk2ps", "--help", "a.sk"], &converter), EXIT_USAGE);
        assert_eq!(run(["sk2ps", "-h"], &converter), EXIT_USAGE);
    }

    #[test]
    fn test_unknown_flag_prints_usage() {
        let converter = untouched_converter();
        assert_eq!(run(["sk2ps", "--bogus", "a.sk"], &converter), EXIT_USAGE);
    }

    #[test]
    fn test_flags_map_to_options() {
        let args = Args::try_parse_from([
            "sk2ps",
            "-v",
            "-p",
            "-r",
            "-e",
            "--title=Logo",
            "--date",
            "yesterday",
            "-f",
            "bob",
            "in.sk",
            "out.eps",
        ])
        .unwrap();
        let options = args.options();

        assert_eq!(options.selection, LayerSelection::new(true, false));
        assert!(options.rotate);
        assert!(options.embed_fonts);
        assert_eq!(options.title.as_deref(), Some("Logo"));
        assert_eq!(options.creation_date, "yesterday");
        assert_eq!(options.for_user, "bob");
        assert!(matches!(args.output(), OutputTarget::Path(p) if p == Path::new("out.eps")));
    }

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["sk2ps", "drawing.sk"]).unwrap();
        let options = args.options();

        assert_eq!(options.selection, LayerSelection::default());
        assert!(!options.rotate && !options.embed_fonts);
        assert_eq!(options.title, None);
        assert!(!options.creation_date.is_empty());
        assert!(matches!(args.output(), OutputTarget::Stdout));
    }

    #[test]
    fn test_conversion_failure_status() {
        let mut loader = MockLoader::new();
        loader
            .expect_load()
            .with(eq(Path::new("corrupt.sk")))
            .times(1)
            .returning(|_| {
                Err(LoadError::UnsupportedVersion {
                    found: 9,
                    supported: 1,
                })
            });
        let mut devices = MockDeviceFactory::new();
        devices.expect_open().never();
        let converter = EpsConverter::with_parts(loader, devices);

        assert_eq!(run(["sk2ps", "corrupt.sk"], &converter), EXIT_FAILURE);
    }
}
