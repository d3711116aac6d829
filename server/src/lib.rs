pub mod config;
pub mod routes;
pub mod startup;
pub mod telemetry;

pub use config::ServiceConfig;
pub use routes::{router, AppState};
