use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use slowpro_browser::{CdpSession, ChromeFinder, ChromeLauncher, ProfileManager};
use slowpro_core::capture::{CaptureConfig, CaptureReport, run_capture};
use slowpro_core::session::{DirectoryStorage, SessionInfo};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;

/// Bound of the channel between the CDP forwarder and the pipeline
const EVENT_BUFFER: usize = 1024;

/// Inputs of the `capture` command
#[derive(Debug, Clone)]
pub struct CaptureSettings {
    pub data_dir: PathBuf,
    pub url: Option<String>,
    pub chrome_path: Option<PathBuf>,
    pub profile: Option<String>,
    pub headless: bool,
    pub debugging_port: u16,
    pub capture: CaptureConfig,
}

/// Why the capture ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopReason {
    ChromeExited,
    StopKey,
    Interrupted,
}

/// Kill a process by PID (cross-platform)
fn kill_process_by_pid(pid: u32) {
    #[cfg(unix)]
    {
        use std::process::Command;
        let _ = Command::new("kill").arg(pid.to_string()).output();
    }

    #[cfg(windows)]
    {
        use std::process::Command;
        let _ = Command::new("taskkill")
            .args(["/PID", &pid.to_string(), "/F"])
            .output();
    }
}

/// Block until `s` is pressed; `None` when stdin is not a terminal
fn wait_for_stop_key() -> Option<char> {
    if !std::io::stdin().is_terminal() {
        return None;
    }
    let term = console::Term::stdout();
    loop {
        match term.read_char() {
            Ok(key) if key.eq_ignore_ascii_case(&'s') => return Some(key),
            Ok(_) => continue,
            Err(_) => return None,
        }
    }
}

fn spinner() -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg} [{elapsed}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.set_message("Capturing network traffic (press 's' or Ctrl+C to stop, or close Chrome)");
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

pub fn execute(settings: CaptureSettings) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let result = runtime.block_on(capture(settings));

    // Do not hang on the blocking keypress reader
    runtime.shutdown_timeout(Duration::from_millis(100));

    let report = result?;
    print_summary(&report);
    Ok(())
}

async fn capture(settings: CaptureSettings) -> Result<CaptureReport> {
    use console::style;

    let chrome_binary = ChromeFinder::new(settings.chrome_path.clone()).find()?;
    println!("Found Chrome at: {}", chrome_binary.display());

    let profile = match &settings.profile {
        Some(name) => ProfileManager::named(name)?,
        None => ProfileManager::temporary()?,
    };
    if profile.is_temporary() {
        println!("Using temporary profile");
    } else {
        println!("Using profile: {}", profile.path().display());
    }

    let launcher = ChromeLauncher::new(
        chrome_binary,
        profile.path().to_path_buf(),
        settings.url.clone(),
    )
    .with_debugging_port(settings.debugging_port)
    .headless(settings.headless);

    let mut chrome = launcher.launch()?;
    let chrome_pid = chrome.id();
    tracing::info!("Chrome started (pid {})", chrome_pid);

    let info = SessionInfo::start();
    println!(
        "Session {} -> {}",
        style(&info.session_id).bold(),
        settings.data_dir.display()
    );

    // The pipeline task owns all session state until the intake closes
    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    let storage = DirectoryStorage::new(&settings.data_dir);
    let pipeline = tokio::spawn(run_capture(info, storage, settings.capture, rx));

    let forwarder = match CdpSession::new(launcher.debugging_port()).capture_events(tx).await {
        Ok(forwarder) => forwarder,
        Err(e) => {
            kill_process_by_pid(chrome_pid);
            return Err(e.into());
        }
    };

    let bar = spinner();
    let mut chrome_exit = tokio::task::spawn_blocking(move || chrome.wait());
    let key_task = tokio::task::spawn_blocking(wait_for_stop_key);
    let stop_key = async {
        match key_task.await {
            Ok(Some(_)) => {}
            _ => std::future::pending::<()>().await,
        }
    };

    let reason = tokio::select! {
        status = &mut chrome_exit => {
            match status {
                Ok(Ok(status)) => tracing::info!("Chrome exited ({})", status),
                Ok(Err(e)) => tracing::warn!("Failed waiting for Chrome: {}", e),
                Err(e) => tracing::warn!("Chrome wait task failed: {}", e),
            }
            StopReason::ChromeExited
        }
        _ = stop_key => StopReason::StopKey,
        _ = tokio::signal::ctrl_c() => StopReason::Interrupted,
    };
    bar.finish_and_clear();

    match reason {
        StopReason::ChromeExited => println!("Chrome closed, finishing capture..."),
        StopReason::StopKey => println!("Stopping capture (Chrome keeps running)..."),
        StopReason::Interrupted => {
            println!("Interrupted, closing Chrome...");
            kill_process_by_pid(chrome_pid);
        }
    }

    let forwarded = forwarder.stop().await;
    tracing::debug!(
        "Forwarded {} of {} CDP events",
        forwarded.forwarded,
        forwarded.received
    );

    let report = pipeline.await??;

    if reason == StopReason::Interrupted {
        let _ = chrome_exit.await;
    }
    drop(profile);

    Ok(report)
}

fn print_summary(report: &CaptureReport) {
    use console::style;

    let stats = &report.stats;
    println!("\n{}", style("Capture Summary").bold().cyan());
    println!("{}", style("===============").cyan());
    println!("  Session:    {}", report.session.info.session_id);
    println!("  Requests:   {}", report.session.total_records);
    println!("  Completed:  {}", stats.completed);
    println!("  Failed:     {}", stats.failed);
    println!("  Abandoned:  {}", stats.abandoned);

    if !report.session.domains.is_empty() {
        println!("\n{}", style("Domains:").bold());
        for (domain, count) in &report.session.domains {
            println!("  {:<40} {:>6}", domain, count);
        }
    }
    println!();
}
