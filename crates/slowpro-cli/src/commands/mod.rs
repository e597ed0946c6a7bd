pub mod capture;
pub mod completion;
pub mod report;
pub mod sessions;
