pub mod api;
pub mod auth;
pub mod error;
pub mod fallback;
pub mod heatmap;
pub mod models;
pub mod reconciler;
pub mod session;
