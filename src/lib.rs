pub mod config;
pub mod db;
pub mod models;
pub mod responses;
pub mod routes;
pub mod services;
pub mod state;
pub mod tenancy;
pub mod utils;

pub use routes::router;
pub use state::AppState;
