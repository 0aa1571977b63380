pub mod app_state;
pub mod auth;
pub mod cache;
pub mod clock;
pub mod config;
pub mod errors;
pub mod forms;
pub mod handlers;
pub mod middleware_auth;
pub mod models;
pub mod pagination;
pub mod renewal;
pub mod repository;
pub mod routes;
pub mod templates;

pub use app_state::AppState;
pub use auth::*;
pub use config::{Backend, Config, Credentials};
pub use errors::*;
pub use models::*;
