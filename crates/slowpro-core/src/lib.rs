pub mod analysis;
pub mod capture;
pub mod correlator;
pub mod error;
pub mod event;
pub mod filter;
pub mod record;
pub mod session;

pub use error::{Error, Result};
