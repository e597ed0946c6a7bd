use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use slowpro_browser::DEFAULT_DEBUGGING_PORT;
use slowpro_cli::commands::{self, capture::CaptureSettings, report::ReportSettings};
use slowpro_cli::{DEFAULT_DATA_DIR, OutputFormat};
use slowpro_core::analysis::DEFAULT_TOP_N;
use slowpro_core::capture::CaptureConfig;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "slowpro")]
#[command(author, version, long_about = None)]
#[command(
    about = "Capture browser network traffic and report on request performance",
    long_about = "Slowpro drives Chrome over the DevTools protocol, records every request \
                  into per-domain session files and aggregates those sessions into \
                  performance reports."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Pretty)]
    format: OutputFormat,

    /// Directory holding captured sessions
    #[arg(long, global = true, env = "SLOWPRO_DATA_DIR", default_value = DEFAULT_DATA_DIR)]
    data_dir: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch Chrome and capture network traffic into a new session
    Capture {
        /// Page to open when Chrome starts
        #[arg(long)]
        url: Option<String>,

        /// Path to the Chrome binary
        #[arg(long, env = "SLOWPRO_CHROME")]
        chrome_path: Option<PathBuf>,

        /// Persistent profile name under ~/.slowpro/profiles
        #[arg(long, conflicts_with = "temp")]
        profile: Option<String>,

        /// Throwaway profile (same as omitting --profile)
        #[arg(long)]
        temp: bool,

        /// Run Chrome without a window
        #[arg(long)]
        headless: bool,

        /// Remote debugging port
        #[arg(long, default_value_t = DEFAULT_DEBUGGING_PORT)]
        port: u16,

        /// Seconds between checkpoints of the session files (0 disables)
        #[arg(long, default_value_t = 5)]
        flush_interval: u64,

        /// Finished requests that force a checkpoint (0 disables)
        #[arg(long, default_value_t = 100)]
        flush_threshold: usize,
    },

    /// Aggregate captured sessions into a JSON report
    Report {
        /// Include every session and domain
        #[arg(long, conflicts_with_all = ["domains", "sessions"])]
        all: bool,

        /// Domains to include (exact or glob, e.g. *.example.com)
        #[arg(long, num_args = 1..)]
        domains: Vec<String>,

        /// Session ids to include
        #[arg(long, num_args = 1..)]
        sessions: Vec<String>,

        /// Report file (default: slowpro_report_<timestamp>.json)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Number of slowest and largest requests to keep
        #[arg(long, default_value_t = DEFAULT_TOP_N)]
        top: usize,
    },

    /// List captured sessions
    Sessions,

    /// Generate shell completion scripts
    #[command(long_about = "Generate shell completion scripts for slowpro.

SUPPORTED SHELLS:
    bash, zsh, fish, powershell, elvish

INSTALLATION:
    bash:  slowpro completion --shell bash >> ~/.bashrc
    zsh:   slowpro completion --shell zsh > ~/.zfunc/_slowpro
           (add `fpath=(~/.zfunc $fpath)` to ~/.zshrc)
    fish:  slowpro completion --shell fish > ~/.config/fish/completions/slowpro.fish")]
    Completion {
        /// Target shell
        #[arg(long, value_enum)]
        shell: Shell,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    match cli.command {
        Commands::Capture {
            url,
            chrome_path,
            profile,
            temp: _,
            headless,
            port,
            flush_interval,
            flush_threshold,
        } => commands::capture::execute(CaptureSettings {
            data_dir: cli.data_dir,
            url,
            chrome_path,
            profile,
            headless,
            debugging_port: port,
            capture: CaptureConfig {
                flush_interval: Duration::from_secs(flush_interval),
                flush_threshold,
            },
        }),
        Commands::Report {
            all,
            domains,
            sessions,
            output,
            top,
        } => commands::report::execute(
            &ReportSettings {
                data_dir: cli.data_dir,
                all,
                domains,
                sessions,
                output,
                top,
            },
            cli.format,
        ),
        Commands::Sessions => commands::sessions::execute(&cli.data_dir, cli.format),
        Commands::Completion { shell } => commands::completion::execute(shell, &mut Cli::command()),
    }
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("slowpro=debug,slowpro_cli=debug,slowpro_core=debug,slowpro_browser=debug")
    } else {
        EnvFilter::new("slowpro=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}
