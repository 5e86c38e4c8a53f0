pub mod schema;

pub use schema::{Config, DisplayConfig, GatewayConfig, SessionsConfig};
