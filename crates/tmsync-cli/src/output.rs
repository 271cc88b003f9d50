//! Terminal output
//!
//! Human output goes to stdout with ✓/✗/⚠ markers; errors and warnings go
//! to stderr. `--json` switches every command to machine-readable output
//! where each command prints one JSON document describing its report.

use tmsync_core::ports::TmsError;

/// Output format selector
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputFormat {
    Human,
    Json,
}

/// Trait for formatting CLI output
pub trait OutputFormatter {
    fn success(&self, message: &str);
    fn error(&self, message: &str);
    fn warn(&self, message: &str);
    fn info(&self, message: &str);
    fn print_json(&self, value: &serde_json::Value);
}

/// Checkmarks and indentation; quiet mode keeps only warnings and errors
pub struct HumanFormatter {
    quiet: bool,
}

impl OutputFormatter for HumanFormatter {
    fn success(&self, message: &str) {
        if !self.quiet {
            println!("\u{2713} {message}");
        }
    }
    fn error(&self, message: &str) {
        eprintln!("\u{2717} {message}");
    }
    fn warn(&self, message: &str) {
        eprintln!("\u{26a0} {message}");
    }
    fn info(&self, message: &str) {
        if !self.quiet {
            println!("  {message}");
        }
    }
    fn print_json(&self, _value: &serde_json::Value) {}
}

/// One JSON line per message; reports are printed as a single document
pub struct JsonFormatter;

impl JsonFormatter {
    fn line(level: &str, message: &str) -> String {
        serde_json::json!({ "level": level, "message": message }).to_string()
    }
}

impl OutputFormatter for JsonFormatter {
    fn success(&self, message: &str) {
        println!("{}", Self::line("success", message));
    }
    fn error(&self, message: &str) {
        eprintln!("{}", Self::line("error", message));
    }
    fn warn(&self, message: &str) {
        eprintln!("{}", Self::line("warning", message));
    }
    fn info(&self, _message: &str) {}
    fn print_json(&self, value: &serde_json::Value) {
        println!(
            "{}",
            serde_json::to_string_pretty(value).unwrap_or_default()
        );
    }
}

pub fn get_formatter(format: OutputFormat, quiet: bool) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::Json => Box::new(JsonFormatter),
        OutputFormat::Human => Box::new(HumanFormatter { quiet }),
    }
}

/// `"1 case"`, `"3 cases"`
pub fn counted(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("{count} {noun}")
    } else {
        format!("{count} {noun}s")
    }
}

/// Prints a failed remote operation of `subject` (a plan file, a run)
///
/// The remote message goes on its own line so long server messages stay
/// readable. A case created before the failure is mentioned, since the next
/// import picks it up again.
pub fn remote_failure(formatter: &dyn OutputFormatter, subject: &str, err: &TmsError) {
    let status = err
        .status
        .map(|s| format!(" (HTTP {s})"))
        .unwrap_or_default();
    formatter.error(&format!("{subject}: {} failed{status}", err.operation));
    formatter.info(&err.remote_message);
    if let Some(case_id) = &err.created_case {
        formatter.warn(&format!(
            "{subject}: case {case_id} was created and will be completed on the next import"
        ));
    }
}

/// Closing line of a report: `"2 of 5 files failed"`
///
/// Prints nothing when everything succeeded.
pub fn failure_summary(formatter: &dyn OutputFormatter, failed: usize, total: usize, noun: &str) {
    if failed > 0 {
        formatter.error(&format!("{failed} of {} failed", counted(total, noun)));
    }
}
