pub mod auth;
pub mod cache;
pub mod codes;
pub mod config;
pub mod database;
pub mod deletion;
pub mod email;
pub mod error;
pub mod keycloak;
pub mod rate_limit;
pub mod routes;
pub mod server;
pub mod test_utils;
pub mod utils;

pub use config::Config;
pub use server::Server;
