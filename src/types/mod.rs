mod capability;
mod models;
mod status;

pub use capability::{Capabilities, Capability};
pub use models::*;
pub use status::ExecutionStatus;
