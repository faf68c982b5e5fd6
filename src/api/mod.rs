// HTTP surface: refresh trigger, country queries, status and summary image

pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod server;
pub mod validation;

pub use errors::ApiError;
pub use server::{configure_app, ApiServer, AppState};
