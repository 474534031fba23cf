//! Binary entry point for the pyopt CLI.
//!
//! ## Usage
//!
//! ```bash
//! # Estimate complexity and list anti-patterns
//! pyopt analyze src/
//!
//! # Rewrite append-in-loop into list comprehensions and print the result
//! pyopt refactor module.py --format code
//!
//! # Also apply the opt-in string join rewrite, format, and write back
//! pyopt refactor module.py --rule append-in-loop --rule string-concat-in-loop --format-code --write
//!
//! # Show the rule table
//! pyopt rules --format text
//! ```

use std::io::{self, Write};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};

use pyopt::cli::{run_analyze, run_refactor, run_rules, OutputFormat, RefactorOptions};
use pyopt_core::error::{OutputErrorCode, PyoptError};
use pyopt_core::output::{emit_response, ErrorResponse};

// ============================================================================
// CLI Structure
// ============================================================================

/// Static complexity analysis and safe loop refactoring for Python source.
#[derive(Parser, Debug)]
#[command(name = "pyopt", version, about = "Static complexity analysis for Python")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

/// Global arguments shared by all subcommands.
#[derive(Parser, Debug)]
struct GlobalArgs {
    /// Log level for tracing output.
    #[arg(long, global = true, value_enum, default_value = "warn")]
    log_level: LogLevel,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,
}

/// Log level for tracing output.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn to_tracing_level(self) -> tracing::Level {
        match self {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

/// Output format for analyze and rules.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
enum ReportFormat {
    /// Full JSON response (default).
    #[default]
    Json,
    /// Human-readable summary.
    Text,
}

impl From<ReportFormat> for OutputFormat {
    fn from(format: ReportFormat) -> Self {
        match format {
            ReportFormat::Json => OutputFormat::Json,
            ReportFormat::Text => OutputFormat::Text,
        }
    }
}

/// Output format for refactor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
enum RefactorFormat {
    /// Full JSON response (default).
    #[default]
    Json,
    /// Summary plus the rewritten source.
    Text,
    /// The rewritten source only.
    Code,
}

impl From<RefactorFormat> for OutputFormat {
    fn from(format: RefactorFormat) -> Self {
        match format {
            RefactorFormat::Json => OutputFormat::Json,
            RefactorFormat::Text => OutputFormat::Text,
            RefactorFormat::Code => OutputFormat::Code,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Estimate complexity and detect anti-patterns.
    Analyze {
        /// A `.py` file, a directory to scan, or `-` for stdin.
        input: String,

        /// Output format.
        #[arg(long, value_enum, default_value_t = ReportFormat::Json)]
        format: ReportFormat,
    },

    /// Apply safe rewrites to one file.
    Refactor {
        /// A `.py` file, or `-` for stdin.
        input: String,

        /// Rule to apply (repeatable). Defaults to the rules that apply
        /// automatically (append-in-loop).
        #[arg(long = "rule", value_name = "ID")]
        rules: Vec<String>,

        /// Run an external formatter (black, then ruff) on the result.
        #[arg(long)]
        format_code: bool,

        /// Formatter command line, e.g. "ruff format -". Implies --format-code.
        #[arg(long, value_name = "CMD")]
        formatter: Option<String>,

        /// Formatter timeout in seconds.
        #[arg(long, value_name = "SECS")]
        formatter_timeout: Option<u64>,

        /// Write the result back to the input file. The file is rewritten
        /// in canonical form, so comments and blank lines are not kept.
        #[arg(long)]
        write: bool,

        /// Output format.
        #[arg(long, value_enum, default_value_t = RefactorFormat::Json)]
        format: RefactorFormat,
    },

    /// List the detection rules.
    Rules {
        /// Output format.
        #[arg(long, value_enum, default_value_t = ReportFormat::Json)]
        format: ReportFormat,
    },
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_tracing(cli.global.log_level, cli.global.log_json);

    match execute(cli.command) {
        Ok(output) => {
            let mut stdout = io::stdout();
            let _ = stdout.write_all(output.as_bytes());
            let _ = stdout.flush();
            ExitCode::SUCCESS
        }
        Err(err) => {
            let error_code = OutputErrorCode::from(&err);
            let response = ErrorResponse::from_error(&err);

            // Errors go to stdout as JSON, like every other response.
            let _ = emit_response(&response, &mut io::stdout());
            let _ = io::stdout().flush();

            ExitCode::from(error_code.code())
        }
    }
}

/// Initialize tracing subscriber. `RUST_LOG` overrides `--log-level`.
fn init_tracing(level: LogLevel, json: bool) {
    use tracing_subscriber::fmt::format::FmtSpan;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_tracing_level().to_string()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Execute the CLI command.
fn execute(command: Command) -> Result<String, PyoptError> {
    match command {
        Command::Analyze { input, format } => run_analyze(&input, format.into()),
        Command::Refactor {
            input,
            rules,
            format_code,
            formatter,
            formatter_timeout,
            write,
            format,
        } => {
            let options = RefactorOptions {
                rules,
                format_code: format_code || formatter.is_some(),
                formatter,
                formatter_timeout,
                write,
            };
            run_refactor(&input, &options, format.into())
        }
        Command::Rules { format } => run_rules(format.into()),
    }
}

// ============================================================================
// Tests
// ============================================================================
