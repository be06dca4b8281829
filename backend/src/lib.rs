pub mod assistant;
pub mod config;
pub mod error;
pub mod inference;
pub mod routes;
pub mod state;
