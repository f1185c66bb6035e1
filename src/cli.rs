//! Command-line interface for guidance-session.
//!
//! Uses lexopt for minimal binary size overhead.

use std::ffi::OsString;
use std::path::PathBuf;

/// Command-line arguments.
#[derive(Debug, Clone, Default)]
pub struct Args {
    /// Root URL of the step service API.
    pub api_url: Option<String>,
    /// Bearer token for the step service.
    pub token: Option<String>,
    /// Path to configuration file.
    pub config: Option<PathBuf>,
    /// Global prefetch timeout in milliseconds.
    pub prefetch_timeout_ms: Option<u64>,
    /// Log level (error, warn, info, debug, trace).
    pub log_level: Option<String>,
    /// Run against the built-in scripted questionnaire.
    pub demo: bool,
    /// Show version and exit.
    pub version: bool,
    /// Show help and exit.
    pub help: bool,
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
            Short('u') | Long("api-url") => {
                let value: String = parser.value()?.parse()?;
                if !(value.starts_with("http://") || value.starts_with("https://")) {
                    return Err(ArgsError::InvalidValue("api-url", value));
                }
                result.api_url = Some(value);
            }
            Short('t') | Long("token") => {
                result.token = Some(parser.value()?.parse()?);
            }
            Short('c') | Long("config") => {
                result.config = Some(parser.value()?.parse()?);
            }
            Long("prefetch-timeout-ms") => {
                let value: String = parser.value()?.parse()?;
                let timeout = value
                    .parse::<u64>()
                    .ok()
                    .filter(|ms| *ms > 0)
                    .ok_or(ArgsError::InvalidValue("prefetch-timeout-ms", value))?;
                result.prefetch_timeout_ms = Some(timeout);
            }
            Short('l') | Long("log-level") => {
                result.log_level = Some(parser.value()?.parse()?);
            }
            Long("demo") => {
                result.demo = true;
            }
            Value(val) => {
                return Err(ArgsError::UnexpectedArgument(val.to_string_lossy().into()));
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
        r#"guidance-session {version}
Adaptive career-guidance test session in the terminal

USAGE:
    guidance-session [OPTIONS]

OPTIONS:
    -u, --api-url <URL>             Step service API root [default: http://127.0.0.1:8000/api]
    -t, --token <TOKEN>             Bearer token for the step service
    -c, --config <FILE>             Path to configuration file (JSON)
        --prefetch-timeout-ms <MS>  Option media timeout [default: 25000]
    -l, --log-level <LVL>           Log level (error, warn, info, debug, trace)
        --demo                      Run the built-in questionnaire offline
    -h, --help                      Print help
    -V, --version                   Print version

ENVIRONMENT VARIABLES:
    GUIDANCE_API_URL                API root (overrides config)
    GUIDANCE_API_TOKEN              Bearer token (overrides config)
    GUIDANCE_PREFETCH_TIMEOUT_MS    Prefetch timeout (overrides config)
    GUIDANCE_LOG_LEVEL              Log level (overrides config)
    RUST_LOG                        Alternative log level setting

CONTROLS:
    <number>   Pick an option
    b          Back to the previous step
    r          Restart the test
    q          Quit (progress is kept on the server)

EXAMPLES:
    # Try the questionnaire without a server
    guidance-session --demo

    # Connect to a deployment
    guidance-session -u https://guidance.example.org/api -t my-token

    # Start with config file
    guidance-session -c ~/.config/guidance/config.json
"#
    );
}

/// Print version.
pub fn print_version() {
    println!("guidance-session {}", env!("CARGO_PKG_VERSION"));
}

/// Argument parsing errors.
#[derive(Debug)]
pub enum ArgsError {
    /// Lexopt parsing error.
    Lexopt(lexopt::Error),
    /// Invalid argument value.
    InvalidValue(&'static str, String),
    /// Unexpected positional argument.
    UnexpectedArgument(String),
}

impl std::fmt::Display for ArgsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lexopt(e) => write!(f, "{}", e),
            Self::InvalidValue(name, value) => {
                write!(f, "invalid value for --{}: '{}'", name, value)
            }
            Self::UnexpectedArgument(arg) => {
                write!(f, "unexpected argument: '{}'", arg)
            }
        }
    }
}

impl std::error::Error for ArgsError {}

impl From<lexopt::Error> for ArgsError {
    fn from(e: lexopt::Error) -> Self {
        Self::Lexopt(e)
    }
}
