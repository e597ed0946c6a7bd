mod cdp_session;
mod chrome_finder;
mod error;
pub mod ingest;
mod launcher;
mod profile;

pub use cdp_session::{CdpCapture, CdpSession, ForwardStats};
pub use chrome_finder::ChromeFinder;
pub use error::{Error, Result};
pub use ingest::{RawCdpEvent, normalize, try_normalize};
pub use launcher::{ChromeLauncher, DEFAULT_DEBUGGING_PORT, normalize_start_url};
pub use profile::{ProfileManager, profiles_root};
