//! HTTP surface for the SchoolHub subject service.

pub mod response;
pub mod routes;
pub mod settings;

pub use routes::{app, AppState};
pub use settings::{Settings, SettingsError};
