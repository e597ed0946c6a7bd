use crate::{Error, Result};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};

pub const DEFAULT_DEBUGGING_PORT: u16 = 9222;

/// Starts a Chrome process with remote debugging enabled
pub struct ChromeLauncher {
    chrome_path: PathBuf,
    profile_path: PathBuf,
    initial_url: Option<String>,
    debugging_port: u16,
    headless: bool,
}

impl ChromeLauncher {
    pub fn new(chrome_path: PathBuf, profile_path: PathBuf, initial_url: Option<String>) -> Self {
        Self {
            chrome_path,
            profile_path,
            initial_url,
            debugging_port: DEFAULT_DEBUGGING_PORT,
            headless: false,
        }
    }

    pub fn with_debugging_port(mut self, port: u16) -> Self {
        self.debugging_port = port;
        self
    }

    pub fn headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    pub fn debugging_port(&self) -> u16 {
        self.debugging_port
    }

    pub fn launch(&self) -> Result<Child> {
        let args = self.build_args();
        tracing::debug!("Launching {} {}", self.chrome_path.display(), args.join(" "));

        Command::new(&self.chrome_path)
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| Error::Browser(format!("Failed to launch Chrome: {}", e)))
    }

    fn build_args(&self) -> Vec<String> {
        let mut args = vec![
            format!("--remote-debugging-port={}", self.debugging_port),
            "--no-first-run".to_string(),
            "--no-default-browser-check".to_string(),
            format!("--user-data-dir={}", self.profile_path.display()),
        ];

        if self.headless {
            args.push("--headless=new".to_string());
        }

        args.push(
            self.initial_url
                .as_deref()
                .map(normalize_start_url)
                .unwrap_or_else(|| "about:blank".to_string()),
        );

        args
    }
}

/// Bare hosts like `example.com` are opened over https
pub fn normalize_start_url(url: &str) -> String {
    if url.contains("://") || url.starts_with("about:") {
        url.to_string()
    } else {
        format!("https://{}", url)
    }
}
