use crate::{OutputFormat, fmt_ms, fmt_rate};
use anyhow::{Context, Result};
use chrono::Local;
use slowpro_core::analysis::{AggregateOptions, AggregateStats, Aggregator, Analyzer, DEFAULT_TOP_N};
use slowpro_core::filter::DomainFilter;
use slowpro_core::session::{SessionId, SessionLoader, Selection};
use std::path::{Path, PathBuf};

/// Inputs of the `report` command
#[derive(Debug, Clone)]
pub struct ReportSettings {
    pub data_dir: PathBuf,
    pub all: bool,
    pub domains: Vec<String>,
    pub sessions: Vec<String>,
    pub output: Option<PathBuf>,
    pub top: usize,
}

impl ReportSettings {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            all: false,
            domains: Vec::new(),
            sessions: Vec::new(),
            output: None,
            top: DEFAULT_TOP_N,
        }
    }
}

/// Turn the command-line choices into a loader selection.
///
/// With no flags only the most recent session is selected.
pub fn resolve_selection(loader: &SessionLoader, settings: &ReportSettings) -> Result<Selection> {
    if settings.all {
        return Ok(Selection::all());
    }

    let domains = if settings.domains.is_empty() {
        None
    } else {
        Some(DomainFilter::parse(&settings.domains)?)
    };
    let sessions = if !settings.sessions.is_empty() {
        Some(settings.sessions.iter().map(SessionId::new).collect())
    } else if domains.is_none() {
        Some(vec![loader.latest_session()?])
    } else {
        None
    };

    Ok(Selection { domains, sessions })
}

/// Load the selected sessions and aggregate them
pub fn build_report(settings: &ReportSettings) -> Result<AggregateStats> {
    let loader = SessionLoader::new(&settings.data_dir);
    let selection = resolve_selection(&loader, settings)?;

    if let Some(sessions) = &selection.sessions {
        tracing::debug!(
            "Selected sessions: {}",
            sessions
                .iter()
                .map(SessionId::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        );
    }

    let records = loader.load_selection(&selection)?;

    let aggregator = Aggregator::new(AggregateOptions {
        domain_filter: selection.domains.clone(),
        top_n: settings.top,
    });
    Ok(aggregator.analyze(&records))
}

/// `slowpro_report_<timestamp>.json`, inside the data directory when it exists
pub fn default_output_path(data_dir: &Path) -> PathBuf {
    let file_name = format!("slowpro_report_{}.json", Local::now().format("%Y%m%d_%H%M%S"));
    if data_dir.is_dir() {
        data_dir.join(file_name)
    } else {
        PathBuf::from(file_name)
    }
}

pub fn write_artifact(stats: &AggregateStats, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(stats)?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write report to {}", path.display()))?;
    Ok(())
}

pub fn execute(settings: &ReportSettings, format: OutputFormat) -> Result<()> {
    tracing::info!("Building report from {}", settings.data_dir.display());

    let stats = build_report(settings)?;

    let output = settings
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&settings.data_dir));
    write_artifact(&stats, &output)?;

    match format {
        OutputFormat::Json => output_json(&stats)?,
        OutputFormat::Table => output_table(&stats),
        OutputFormat::Pretty => output_pretty(&stats),
    }

    eprintln!("Report written to: {}", output.display());
    Ok(())
}

fn output_pretty(stats: &AggregateStats) {
    use console::style;

    let global = &stats.global;

    println!("\n{}", style("Slowpro Performance Report").bold().cyan());
    println!("{}", style("==========================").cyan());

    println!("\n{}", style("Summary:").bold());
    println!("  Requests:        {}", global.total_requests);
    println!("  Domains:         {}", global.total_domains);
    println!("  Sessions:        {}", global.total_sessions);
    println!(
        "  Failed:          {} ({})",
        global.failed_requests,
        fmt_rate(global.failure_rate)
    );
    println!("  Abandoned:       {}", global.abandoned_requests);
    println!("  HTTP errors:     {}", global.http_errors);
    println!("  Transferred:     {} bytes", global.total_bytes);

    println!("\n{}", style("Durations:").bold());
    println!("  Average:         {}", fmt_ms(global.avg_duration_ms));
    println!("  Median:          {}", fmt_ms(global.median_duration_ms));
    println!("  Min / Max:       {} / {}", fmt_ms(global.min_duration_ms), fmt_ms(global.max_duration_ms));
    if let Some(p) = &global.duration_percentiles {
        println!(
            "  p90 / p95 / p99: {:.2} / {:.2} / {:.2} ms",
            p.p90, p.p95, p.p99
        );
    }

    if !stats.domains.is_empty() {
        println!("\n{}", style("Domains:").bold());
        for (domain, group) in &stats.domains {
            println!(
                "  {:<40} {:>6} req  avg {:>12}  failed {}",
                domain,
                group.requests,
                fmt_ms(group.avg_duration_ms),
                fmt_rate(group.failure_rate)
            );
        }
    }

    if !stats.slowest_requests.is_empty() {
        println!("\n{}", style("Slowest Requests:").bold());
        for (i, req) in stats.slowest_requests.iter().enumerate() {
            println!(
                "  {}. [{}] {} {} - {}",
                i + 1,
                fmt_ms(req.duration_ms),
                req.method,
                req.status_code
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "-".to_string()),
                req.url
            );
        }
    }

    if !stats.failed_requests.is_empty() {
        println!("\n{}", style("Failed Requests:").bold().red());
        for req in &stats.failed_requests {
            println!("  {} {} - {}", req.method, req.url, style(&req.error_text).red());
        }
    }

    println!();
}

fn output_json(stats: &AggregateStats) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(stats)?);
    Ok(())
}

fn output_table(stats: &AggregateStats) {
    println!("Domain,Requests,Failures,Failure Rate,Avg Duration (ms),Total Bytes");
    for (domain, group) in &stats.domains {
        println!(
            "{},{},{},{},{},{}",
            domain,
            group.requests,
            group.failures,
            group
                .failure_rate
                .map(|r| format!("{:.4}", r))
                .unwrap_or_default(),
            group
                .avg_duration_ms
                .map(|d| format!("{:.2}", d))
                .unwrap_or_default(),
            group.total_bytes
        );
    }
}
