use crate::OutputFormat;
use anyhow::Result;
use serde::Serialize;
use slowpro_core::session::{PartitionRef, SessionFormat, SessionId, SessionLoader};
use std::collections::BTreeMap;
use std::path::Path;

/// One captured session and the domains it touched
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionListing {
    pub session_id: SessionId,
    pub domains: Vec<String>,
    pub formats: Vec<&'static str>,
}

/// Group discovered partitions by session, oldest first
pub fn list_sessions(data_dir: &Path) -> Result<Vec<SessionListing>> {
    let partitions = SessionLoader::new(data_dir).discover()?;
    Ok(group_partitions(&partitions))
}

fn group_partitions(partitions: &[PartitionRef]) -> Vec<SessionListing> {
    let mut sessions: BTreeMap<&SessionId, SessionListing> = BTreeMap::new();

    for partition in partitions {
        let listing = sessions
            .entry(&partition.session_id)
            .or_insert_with(|| SessionListing {
                session_id: partition.session_id.clone(),
                domains: Vec::new(),
                formats: Vec::new(),
            });
        listing.domains.push(partition.domain.clone());
        for format in partition.formats() {
            let ext = format.extension();
            if !listing.formats.contains(&ext) {
                listing.formats.push(ext);
            }
        }
    }

    sessions
        .into_values()
        .map(|mut listing| {
            listing.domains.sort();
            listing.formats.sort_by_key(|ext| *ext != SessionFormat::Json.extension());
            listing
        })
        .collect()
}

pub fn execute(data_dir: &Path, format: OutputFormat) -> Result<()> {
    tracing::debug!("Listing sessions in {}", data_dir.display());

    let sessions = list_sessions(data_dir)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&sessions)?),
        OutputFormat::Table => {
            println!("Session,Domains,Formats");
            for session in &sessions {
                println!(
                    "{},{},{}",
                    session.session_id,
                    session.domains.join(";"),
                    session.formats.join(";")
                );
            }
        }
        OutputFormat::Pretty => output_pretty(data_dir, &sessions),
    }

    Ok(())
}

fn output_pretty(data_dir: &Path, sessions: &[SessionListing]) {
    use console::style;

    if sessions.is_empty() {
        println!("No sessions found in {}", data_dir.display());
        return;
    }

    println!(
        "\n{} ({})",
        style("Captured Sessions").bold().cyan(),
        data_dir.display()
    );
    for (i, session) in sessions.iter().enumerate() {
        let latest = if i + 1 == sessions.len() {
            style(" (latest)").green().to_string()
        } else {
            String::new()
        };
        println!(
            "\n  {}{}  {} domains [{}]",
            style(&session.session_id).bold(),
            latest,
            session.domains.len(),
            session.formats.join(", ")
        );
        for domain in &session.domains {
            println!("    - {}", domain);
        }
    }
    println!();
}
