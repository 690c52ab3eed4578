use clap::{ArgGroup, Parser};
use std::path::PathBuf;

pub const HELP_MSG: &str = "Usage: directory-samples [-options]

where options include:

-authenticate        runs the OAuth 2.0 authorization code flow
                     (needed before using the API from scheduled or batch jobs).

-run                 uses the Directory API as implemented by the samples
                     (runs the OAuth 2.0 authorization code flow if needed).

-help                shows this help text.

--config <path>      configuration file (default: ./directory-client.toml if present).
--verbose            debug logging.
";

pub const AUTHENTICATE_BANNER: &str = "*** initializing OAuth 2.0 authentication ***";
pub const RUN_BANNER: &str = "*** running sample ***";

#[derive(Debug, Clone, Parser)]
#[command(name = "directory-samples")]
#[command(about = "Google Admin SDK Directory API samples")]
#[command(disable_help_flag = true, disable_version_flag = true)]
#[command(group(ArgGroup::new("mode").args(["authenticate", "run", "help"])))]
pub struct CliConfig {
    #[arg(long, help = "Run the OAuth 2.0 authorization code flow only")]
    pub authenticate: bool,

    #[arg(long, help = "Run the enabled samples")]
    pub run: bool,

    #[arg(long, help = "Show usage")]
    pub help: bool,

    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Authenticate,
    Run,
    Help,
}

impl CliConfig {
    /// Parses the process arguments, accepting `-run` as well as `--run`.
    pub fn try_parse_args<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self::try_parse_from(normalize_args(args))
    }

    pub fn mode(&self) -> Mode {
        if self.authenticate {
            Mode::Authenticate
        } else if self.run {
            Mode::Run
        } else {
            Mode::Help
        }
    }
}

/// Rewrites single-dash long flags (`-authenticate`) to their `--` form.
/// The program name is left untouched.
pub fn normalize_args<I, T>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = T>,
    T: Into<String>,
{
    args.into_iter()
        .map(Into::into)
        .enumerate()
        .map(|(index, arg)| {
            if index > 0 && arg.len() > 2 && arg.starts_with('-') && !arg.starts_with("--") {
                format!("-{}", arg)
            } else {
                arg
            }
        })
        .collect()
}
