pub mod config;
pub mod error;
pub mod gateway;
pub mod presence;
pub mod routes;
pub mod state;
