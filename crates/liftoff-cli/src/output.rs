//! Output formatting utilities

use crate::error::CliResult;
use colored::*;
use liftoff_types::{EventSeverity, RunEvent, RunEventEnvelope};
use serde::Serialize;
use tabled::{Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed table format
    #[default]
    Table,
    /// JSON format
    Json,
    /// YAML format
    Yaml,
}

/// Log line format for tracing output
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Print rows in the requested format
pub fn print_output<T: Serialize + Tabled>(data: Vec<T>, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Table => {
            if data.is_empty() {
                println!("{}", "No results".dimmed());
            } else {
                println!("{}", Table::new(data));
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&data)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(&data)?),
    }
    Ok(())
}

/// Print a single structured value; tables fall back to JSON
pub fn print_single<T: Serialize>(data: &T, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Table | OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(data)?)
        }
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(data)?),
    }
    Ok(())
}

pub fn print_success(message: &str) {
    println!("{} {}", "✓".green(), message);
}

pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red(), message);
}

pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow(), message);
}

pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue(), message);
}

/// One line of the run log
pub fn print_event(envelope: &RunEventEnvelope) {
    let line = envelope.event.to_line();
    match (&envelope.event, envelope.severity) {
        (RunEvent::AppLog { .. }, _) => println!("  {}", line.dimmed()),
        (RunEvent::PushSucceeded { .. }, _)
        | (RunEvent::RunCompleted { succeeded: true, .. }, _) => print_success(&line),
        (_, EventSeverity::Error) => print_error(&line),
        (_, EventSeverity::Warning) => print_warning(&line),
        (_, EventSeverity::Info) => print_info(&line),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_default() {
        assert!(matches!(OutputFormat::default(), OutputFormat::Table));
        assert!(matches!(LogFormat::default(), LogFormat::Text));
    }
}
