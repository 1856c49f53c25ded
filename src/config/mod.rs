mod server;

pub use server::{AuthConfig, AuthMode, Config, ErpConfig, ExecutorConfig, ServerConfig};
