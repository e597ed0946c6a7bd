mod resource;
mod types;

pub use resource::ResourceType;
pub use types::*;
