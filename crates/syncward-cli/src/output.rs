//! Terminal output
//!
//! Command results go to stdout and diagnostics to stderr. In JSON mode
//! stdout carries the command's JSON documents only; informational lines are
//! dropped and warnings and errors become one-line JSON objects on stderr.
//! A closed pipe (`syncward logs | head`) ends output quietly.

use std::io::{self, Write};

use serde_json::{json, Value};

/// Output format selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Json,
}

impl OutputFormat {
    pub fn is_json(self) -> bool {
        matches!(self, OutputFormat::Json)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    Stdout,
    Stderr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tone {
    Success,
    Error,
    Warning,
    Info,
}

/// Writes command output in one [`OutputFormat`]
pub struct Printer {
    format: OutputFormat,
}

impl Printer {
    pub fn success(&self, message: &str) {
        self.say(Tone::Success, message);
    }

    pub fn error(&self, message: &str) {
        self.say(Tone::Error, message);
    }

    pub fn warn(&self, message: &str) {
        self.say(Tone::Warning, message);
    }

    pub fn info(&self, message: &str) {
        self.say(Tone::Info, message);
    }

    /// Prints a JSON document; nothing in human mode
    pub fn print_json(&self, value: &Value) {
        if self.format.is_json() {
            let text = serde_json::to_string_pretty(value).unwrap_or_default();
            emit(Stream::Stdout, &text);
        }
    }

    fn say(&self, tone: Tone, message: &str) {
        if let Some((stream, line)) = render(self.format, tone, message) {
            emit(stream, &line);
        }
    }
}

fn render(format: OutputFormat, tone: Tone, message: &str) -> Option<(Stream, String)> {
    let rendered = match (format, tone) {
        (OutputFormat::Human, Tone::Success) => (Stream::Stdout, format!("\u{2713} {message}")),
        (OutputFormat::Human, Tone::Error) => (Stream::Stderr, format!("\u{2717} Error: {message}")),
        (OutputFormat::Human, Tone::Warning) => {
            (Stream::Stderr, format!("\u{26a0} Warning: {message}"))
        }
        (OutputFormat::Human, Tone::Info) => (Stream::Stdout, format!("  {message}")),
        (OutputFormat::Json, Tone::Success) => (
            Stream::Stdout,
            json!({ "success": true, "message": message }).to_string(),
        ),
        (OutputFormat::Json, Tone::Error) => (
            Stream::Stderr,
            json!({ "success": false, "error": message }).to_string(),
        ),
        (OutputFormat::Json, Tone::Warning) => (
            Stream::Stderr,
            json!({ "level": "warning", "message": message }).to_string(),
        ),
        (OutputFormat::Json, Tone::Info) => return None,
    };
    Some(rendered)
}

fn emit(stream: Stream, line: &str) {
    // A reader that went away is not an error worth reporting
    let _ = match stream {
        Stream::Stdout => writeln!(io::stdout().lock(), "{line}"),
        Stream::Stderr => writeln!(io::stderr().lock(), "{line}"),
    };
}

pub fn get_formatter(format: OutputFormat) -> Printer {
    Printer { format }
}
