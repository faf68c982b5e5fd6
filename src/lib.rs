pub mod api;
pub mod database_ops;
pub mod normalization;
pub mod orchestrator;
pub mod render;
pub mod sources;

pub mod util {
    pub mod env;
    pub mod logging;
}
