//! CLI command implementations.
//!
//! Each `run_*` function reads its input, calls into `pyopt-analysis`, and
//! returns the rendered output. The binary in `main.rs` parses arguments,
//! prints the output, and maps errors to exit codes.
//!
//! ## Input
//!
//! - `-` reads source from stdin.
//! - A file path reads that file.
//! - A directory (analyze only) collects every `.py` file beneath it, sorted
//!   by relative path, skipping `.git`, `__pycache__` and virtualenv dirs.
//!
//! ## Error Handling
//!
//! All functions return `Result<String, PyoptError>`. Parse errors carry the
//! offending file name.

use std::fmt::Write as _;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use walkdir::WalkDir;

use pyopt_analysis::{
    analyze, refactor_with_formatter, rules, AnalysisReport, AutoApply, ExternalFormatter,
    FormatterConfig, RefactorResult, RuleDescriptor, SourceFormatter,
};
use pyopt_core::error::PyoptError;
use pyopt_core::output::{emit_response, Response};

/// Path label used for source read from stdin.
pub const STDIN_PATH: &str = "-";

/// Directory names never descended into.
const EXCLUDED_DIRS: &[&str] = &[
    ".git",
    ".hg",
    "__pycache__",
    ".venv",
    "venv",
    ".tox",
    "node_modules",
];

// ============================================================================
// Input
// ============================================================================

/// Error reading input sources.
#[derive(Debug, Error)]
pub enum InputError {
    /// The path does not exist.
    #[error("file not found: {path}")]
    NotFound { path: String },

    /// The command needs a single file but got a directory.
    #[error("expected a file, got directory: {path}")]
    NotAFile { path: String },

    /// Reading the file or stdin failed.
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },

    /// Directory traversal failed.
    #[error("failed to walk directory: {0}")]
    Walk(#[from] walkdir::Error),
}

/// One source text and the path it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: String,
    pub text: String,
}

fn read_file(path: &Path) -> Result<SourceFile, InputError> {
    let label = path.display().to_string();
    let text = fs::read_to_string(path).map_err(|source| InputError::Read {
        path: label.clone(),
        source,
    })?;
    Ok(SourceFile { path: label, text })
}

fn read_stdin() -> Result<SourceFile, InputError> {
    let mut text = String::new();
    io::stdin()
        .read_to_string(&mut text)
        .map_err(|source| InputError::Read {
            path: STDIN_PATH.to_string(),
            source,
        })?;
    Ok(SourceFile {
        path: STDIN_PATH.to_string(),
        text,
    })
}

/// Read a single source: a file, or stdin for `-`.
pub fn read_single(input: &str) -> Result<SourceFile, InputError> {
    if input == STDIN_PATH {
        return read_stdin();
    }
    let path = Path::new(input);
    if !path.exists() {
        return Err(InputError::NotFound {
            path: input.to_string(),
        });
    }
    if path.is_dir() {
        return Err(InputError::NotAFile {
            path: input.to_string(),
        });
    }
    read_file(path)
}

/// Collect sources for analysis: stdin, one file, or every `.py` file under
/// a directory in sorted order.
pub fn collect_sources(input: &str) -> Result<Vec<SourceFile>, InputError> {
    let root = Path::new(input);
    if input == STDIN_PATH || !root.is_dir() {
        return read_single(input).map(|file| vec![file]);
    }

    let mut paths: Vec<PathBuf> = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || !entry.file_type().is_dir()
                || !EXCLUDED_DIRS
                    .iter()
                    .any(|name| entry.file_name() == *name)
        });
    for entry in walker {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type().is_file() && path.extension().is_some_and(|ext| ext == "py") {
            paths.push(path.to_path_buf());
        }
    }
    paths.sort();
    tracing::debug!(root = input, files = paths.len(), "collected python files");

    paths.iter().map(|path| read_file(path.as_path())).collect()
}

// ============================================================================
// Output formats
// ============================================================================

/// How a command renders its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON envelope.
    Json,
    /// Human-readable summary.
    Text,
    /// The rewritten source only (refactor).
    Code,
}

fn to_json<T: Serialize>(payload: T) -> Result<String, PyoptError> {
    let mut buf = Vec::new();
    emit_response(&Response::ok(payload), &mut buf)
        .map_err(|e| PyoptError::internal(e.to_string()))?;
    String::from_utf8(buf).map_err(|e| PyoptError::internal(e.to_string()))
}

// ============================================================================
// analyze
// ============================================================================

/// Analysis result for one file.
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub path: String,
    #[serde(flatten)]
    pub report: AnalysisReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzeResponse {
    pub files: Vec<FileReport>,
}

/// Analyze a file, a directory, or stdin.
pub fn run_analyze(input: &str, format: OutputFormat) -> Result<String, PyoptError> {
    if format == OutputFormat::Code {
        return Err(PyoptError::invalid_args(
            "analyze supports --format json or text",
        ));
    }

    let sources = collect_sources(input)?;
    let mut files = Vec::with_capacity(sources.len());
    for source in sources {
        let report =
            analyze(&source.text).map_err(|e| PyoptError::from(e).in_file(source.path.as_str()))?;
        files.push(FileReport {
            path: source.path,
            report,
        });
    }
    tracing::info!(files = files.len(), "analyzed");

    match format {
        OutputFormat::Text => Ok(render_analysis(&files)),
        _ => to_json(AnalyzeResponse { files }),
    }
}

fn render_analysis(files: &[FileReport]) -> String {
    let mut out = String::new();
    for file in files {
        let complexity = &file.report.complexity;
        let _ = writeln!(
            out,
            "{}: time {}, space {}",
            file.path, complexity.time, complexity.space
        );
        for unit in &complexity.units {
            let _ = writeln!(
                out,
                "  {}: time {}, space {}",
                unit.name, unit.time, unit.space
            );
        }
        for finding in &file.report.findings {
            let _ = writeln!(
                out,
                "{}:{}:{}: {} [{}] {}",
                file.path,
                finding.location.line,
                finding.location.column,
                finding.severity,
                finding.rule_id,
                finding.message
            );
        }
    }
    out
}

// ============================================================================
// refactor
// ============================================================================

/// Options for `pyopt refactor`.
#[derive(Debug, Clone, Default)]
pub struct RefactorOptions {
    /// Rule identifiers to apply; empty selects the default rules.
    pub rules: Vec<String>,
    /// Run an external formatter over the rewritten text.
    pub format_code: bool,
    /// Explicit formatter command line (split on whitespace).
    pub formatter: Option<String>,
    /// Formatter timeout in seconds.
    pub formatter_timeout: Option<u64>,
    /// Write the rewritten text back to the input file. The text is the
    /// canonical serialization, which drops comments and blank lines.
    pub write: bool,
}

impl RefactorOptions {
    fn formatter_config(&self) -> FormatterConfig {
        let mut config = FormatterConfig::default();
        if let Some(command) = &self.formatter {
            config = config.with_command(command.split_whitespace().map(String::from).collect());
        }
        if let Some(secs) = self.formatter_timeout {
            config = config.with_timeout(Duration::from_secs(secs));
        }
        config
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RefactorResponse {
    pub path: String,
    #[serde(flatten)]
    pub result: RefactorResult,
    /// The rewritten text was written back to `path`.
    pub written: bool,
}

/// Refactor a single file or stdin.
pub fn run_refactor(
    input: &str,
    options: &RefactorOptions,
    format: OutputFormat,
) -> Result<String, PyoptError> {
    if options.write && input == STDIN_PATH {
        return Err(PyoptError::invalid_args("--write needs a file, not stdin"));
    }
    let source = read_single(input)?;

    let formatter = if options.format_code {
        match ExternalFormatter::discover(&options.formatter_config()) {
            Ok(formatter) => Some(formatter),
            Err(err) => {
                tracing::warn!(error = %err, "formatting skipped");
                None
            }
        }
    } else {
        None
    };

    let selected: Vec<&str> = options.rules.iter().map(String::as_str).collect();
    let selected = (!selected.is_empty()).then_some(selected.as_slice());
    let result = refactor_with_formatter(
        &source.text,
        selected,
        formatter.as_ref().map(|f| f as &dyn SourceFormatter),
    )
    .map_err(|e| PyoptError::from(e).in_file(source.path.as_str()))?;

    let written = options.write && result.changed();
    if written {
        fs::write(&source.path, &result.rewritten_text).map_err(|e| PyoptError::ApplyError {
            message: e.to_string(),
            file: Some(source.path.clone()),
        })?;
        tracing::info!(path = %source.path, "wrote refactored source");
    }

    match format {
        OutputFormat::Code => Ok(result.rewritten_text),
        OutputFormat::Text => Ok(render_refactor(&source.path, &result, written)),
        OutputFormat::Json => to_json(RefactorResponse {
            path: source.path,
            result,
            written,
        }),
    }
}

fn render_refactor(path: &str, result: &RefactorResult, written: bool) -> String {
    let mut out = String::new();
    if result.applied_rule_ids.is_empty() {
        let _ = writeln!(out, "{}: no changes", path);
    } else {
        let applied: Vec<&str> = result.applied_rule_ids.iter().map(|id| id.as_str()).collect();
        let _ = writeln!(out, "{}: applied {}", path, applied.join(", "));
    }
    for skipped in &result.skipped {
        let _ = writeln!(
            out,
            "{}:{}:{}: skipped [{}] {}",
            path, skipped.location.line, skipped.location.column, skipped.rule_id, skipped.reason
        );
    }
    if result.formatted {
        let _ = writeln!(out, "{}: formatted", path);
    }
    if written {
        let _ = writeln!(out, "{}: written", path);
    } else if result.changed() {
        out.push_str("---\n");
        out.push_str(&result.rewritten_text);
    }
    out
}

// ============================================================================
// rules
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct RulesResponse {
    pub rules: &'static [RuleDescriptor],
}

/// List the rule table.
pub fn run_rules(format: OutputFormat) -> Result<String, PyoptError> {
    match format {
        OutputFormat::Json => to_json(RulesResponse { rules: rules() }),
        OutputFormat::Text => {
            let mut out = String::new();
            for rule in rules() {
                let severity = rule.severity.to_string();
                let _ = writeln!(
                    out,
                    "{:<24} {:<8} {:<8} {}",
                    rule.id.as_str(),
                    severity,
                    auto_apply_label(rule),
                    rule.summary
                );
            }
            Ok(out)
        }
        OutputFormat::Code => Err(PyoptError::invalid_args(
            "rules supports --format json or text",
        )),
    }
}

fn auto_apply_label(rule: &RuleDescriptor) -> &'static str {
    match rule.auto_apply {
        AutoApply::Default => "default",
        AutoApply::OptIn => "opt-in",
        AutoApply::Never => "never",
    }
}

// ============================================================================
// Tests
// ============================================================================
