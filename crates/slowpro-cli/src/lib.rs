use clap::ValueEnum;

pub mod commands;

/// Default location of captured sessions, relative to the working directory
pub const DEFAULT_DATA_DIR: &str = "performance_data";

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Pretty,
    Json,
    Table,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Pretty => "pretty",
            OutputFormat::Json => "json",
            OutputFormat::Table => "table",
        }
    }
}

/// Format an optional millisecond value for display
pub(crate) fn fmt_ms(value: Option<f64>) -> String {
    value
        .map(|ms| format!("{:.2} ms", ms))
        .unwrap_or_else(|| "n/a".to_string())
}

/// Format an optional ratio as a percentage
pub(crate) fn fmt_rate(value: Option<f64>) -> String {
    value
        .map(|rate| format!("{:.1}%", rate * 100.0))
        .unwrap_or_else(|| "n/a".to_string())
}
