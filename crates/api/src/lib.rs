//! HTTP surface: credential extraction, the authorization middleware chain,
//! and the routes behind it.

pub mod app;
pub mod context;
pub mod middleware;

pub use app::build_app;
pub use app::services::{AppServices, HttpSettings, build_services};
