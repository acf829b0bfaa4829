use std::io::Write as _;

use crate::error::Result;
use crate::serve;

/// Serve a static site over HTTP for local development preview
#[derive(Clone, Debug, clap::Parser)]
#[command(name = "site-preview", version)]
pub(crate) struct Args {
    /// Port to serve from
    #[arg(value_name = "PORT", default_value_t = 8000)]
    pub(crate) port: u16,

    /// Directory to serve (defaults to the directory holding this executable)
    #[arg(long, value_name = "DIR")]
    pub(crate) root: Option<std::path::PathBuf>,

    /// Don't open a browser tab once the server is up
    #[arg(long)]
    pub(crate) no_open: bool,

    #[command(flatten)]
    pub(crate) verbose: clap_verbosity_flag::Verbosity<clap_verbosity_flag::InfoLevel>,
}

impl Args {
    pub(crate) fn run(&self) -> Result<()> {
        serve::run(self)
    }
}

pub(crate) fn init_logging(level: log::LevelFilter) {
    if level == log::LevelFilter::Off {
        return;
    }

    let mut builder = env_logger::Builder::new();
    builder.filter_level(level);
    builder.format(|f, record| {
        let level = format!("[{}]", record.level()).to_lowercase();
        writeln!(f, "{:8} {}", level, record.args())
    });
    builder.init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory as _;
        Args::command().debug_assert();
    }

    #[test]
    fn port_defaults_to_8000() {
        use clap::Parser as _;
        let args = Args::try_parse_from(["site-preview"]).unwrap();
        assert_eq!(args.port, 8000);
    }

    #[test]
    fn port_argument_overrides_the_default() {
        use clap::Parser as _;
        let args = Args::try_parse_from(["site-preview", "9090"]).unwrap();
        assert_eq!(args.port, 9090);
    }
}
