//! Command-line interface for runproc.
//!
//! Uses lexopt for minimal binary size overhead (~34KB).

use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

/// Which projection of the result the binary prints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// The full report: command, exit status, duration, both streams.
    #[default]
    Full,
    /// Only the exit status.
    Status,
    /// Only the captured stdout.
    Output,
}

/// Command-line arguments.
#[derive(Debug, Clone, Default)]
pub struct Args {
    /// Words of the command line to run.
    pub command: Vec<String>,
    /// Timeout for the command.
    pub timeout: Option<Duration>,
    /// Do not log the command or echo its output.
    pub quiet: bool,
    /// Treat a non-zero exit status as success.
    pub ignore_status: bool,
    /// Result projection to print.
    pub mode: Mode,
    /// Look a command up on the search path instead of running anything.
    pub which: Option<String>,
    /// Path to configuration file.
    pub config: Option<PathBuf>,
    /// Log level (error, warn, info, debug, trace).
    pub log_level: Option<String>,
    /// Show version and exit.
    pub version: bool,
    /// Show help and exit.
    pub help: bool,
}

impl Args {
    /// The command words quoted and joined back into one command line.
    ///
    /// Splitting the result again yields the same words.
    pub fn command_line(&self) -> Result<String, ArgsError> {
        shlex::try_join(self.command.iter().map(String::as_str)).map_err(ArgsError::Quote)
    }
}

/// Parse a non-negative number of seconds.
pub fn parse_secs(value: &str) -> Option<Duration> {
    let secs: f64 = value.trim().parse().ok()?;
    Duration::try_from_secs_f64(secs).ok()
}

/// Parse command-line arguments.
pub fn parse_args() -> Result<Args, ArgsError> {
    parse_args_from(std::env::args_os())
}

/// Parse arguments from an iterator (for testing).
pub fn parse_args_from<I>(args: I) -> Result<Args, ArgsError>
where
    I: IntoIterator<Item = OsString>,
{
    use lexopt::prelude::*;

    let mut result = Args::default();
    let mut parser = lexopt::Parser::from_iter(args);

    while let Some(arg) = parser.next()? {
        match arg {
            Short('h') | Long("help") => {
                result.help = true;
            }
            Short('V') | Long("version") => {
                result.version = true;
            }
            Short('t') | Long("timeout") => {
                let value: String = parser.value()?.parse()?;
                result.timeout =
                    Some(parse_secs(&value).ok_or(ArgsError::InvalidValue("timeout", value))?);
            }
            Short('q') | Long("quiet") => {
                result.quiet = true;
            }
            Short('i') | Long("ignore-status") => {
                result.ignore_status = true;
            }
            Short('m') | Long("mode") => {
                let value: String = parser.value()?.parse()?;
                result.mode = match value.as_str() {
                    "full" => Mode::Full,
                    "status" => Mode::Status,
                    "output" => Mode::Output,
                    _ => return Err(ArgsError::InvalidValue("mode", value)),
                };
            }
            Short('w') | Long("which") => {
                result.which = Some(parser.value()?.parse()?);
            }
            Short('c') | Long("config") => {
                result.config = Some(parser.value()?.parse()?);
            }
            Short('l') | Long("log-level") => {
                result.log_level = Some(parser.value()?.parse()?);
            }
            Value(val) => {
                // Everything from the first word on belongs to the command.
                result.command.push(val.string()?);
                for raw in parser.raw_args()? {
                    result
                        .command
                        .push(raw.into_string().map_err(ArgsError::NonUnicode)?);
                }
            }
            _ => return Err(arg.unexpected().into()),
        }
    }

    Ok(result)
}

/// Print help message.
pub fn print_help() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        r#"runproc {version}
Run a command, capturing stdout and stderr, with timeout escalation

USAGE:
    runproc [OPTIONS] [--] <COMMAND>...
    runproc --which <NAME>

OPTIONS:
    -t, --timeout <SECS>    Terminate the command after SECS seconds
    -q, --quiet             Do not log the command or echo its output
    -i, --ignore-status     Do not fail on a non-zero exit status
    -m, --mode <MODE>       What to print: full, status, output [default: full]
    -w, --which <NAME>      Print the absolute path of NAME and exit
    -c, --config <FILE>     Path to configuration file (JSON)
    -l, --log-level <LVL>   Log level (error, warn, info, debug, trace)
    -h, --help              Print help
    -V, --version           Print version

ENVIRONMENT VARIABLES:
    RUNPROC_GRACE_MS        Grace window between SIGTERM and SIGKILL
    RUNPROC_POLL_MS         Exit-status poll interval
    RUNPROC_TIMEOUT         Default timeout in seconds
    RUNPROC_LOG_LEVEL       Log level (overrides config)
    RUST_LOG                Alternative log level setting

EXAMPLES:
    # Run with a 5 second timeout and print the full report
    runproc -t 5 -- make check

    # Print only stdout, quietly
    runproc -q -m output uname -r

    # Locate a command
    runproc --which ls
"#
    );
}

/// Print version.
pub fn print_version() {
    println!("runproc {}", env!("CARGO_PKG_VERSION"));
}

/// Argument parsing errors.
#[derive(Debug)]
pub enum ArgsError {
    /// Lexopt parsing error.
    Lexopt(lexopt::Error),
    /// Invalid argument value.
    InvalidValue(&'static str, String),
    /// Command word is not valid UTF-8.
    NonUnicode(OsString),
    /// Command word cannot be quoted (contains a nul byte).
    Quote(shlex::QuoteError),
}

impl std::fmt::Display for ArgsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lexopt(e) => write!(f, "{}", e),
            Self::InvalidValue(name, value) => {
                write!(f, "invalid value for --{}: '{}'", name, value)
            }
            Self::NonUnicode(arg) => {
                write!(f, "argument is not valid UTF-8: {:?}", arg)
            }
            Self::Quote(e) => write!(f, "cannot quote command word: {}", e),
        }
    }
}

impl std::error::Error for ArgsError {}

impl From<lexopt::Error> for ArgsError {
    fn from(e: lexopt::Error) -> Self {
        Self::Lexopt(e)
    }
}
