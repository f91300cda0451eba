//! Core of the Ship and Weigh admin API: stored shipping settings, notification
//! recipients, and address verification, exposed through an authorized REST
//! namespace.

pub mod api;
pub mod config;
pub mod error;
pub mod recipients;
pub mod sanitize;
pub mod settings;
pub mod store;
pub mod telemetry;
pub mod verification;
