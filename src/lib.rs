pub mod config;
pub mod error;
pub mod logging;
pub mod server;
pub mod translate;
pub mod upstream;

pub use config::GatewayConfig;
pub use error::{GatewayError, Result};
pub use logging::AccessLog;
pub use server::{build_router, AppState};
pub use upstream::UpstreamClient;
