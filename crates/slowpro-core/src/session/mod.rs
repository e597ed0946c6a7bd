pub mod format;
mod reader;
mod storage;
mod types;
mod writer;

pub use reader::{Selection, SessionLoader};
pub use storage::{DirectoryStorage, SessionStorage, partition_dir_name, partition_domain, session_file_name};
pub use types::*;
pub use writer::{SessionSummary, SessionWriter};
