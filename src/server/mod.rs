mod admin;
mod dataset;
pub mod dto;
mod pipeline;
pub mod response;
mod router;
pub mod user;
pub mod validation;

pub use admin::admin_router;
pub use dataset::dataset_router;
pub use pipeline::pipeline_router;
pub use router::{AppState, create_router};
pub use user::{access_router, require_capability, user_router};
