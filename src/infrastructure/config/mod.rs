//! Infrastructure configuration modules.

pub mod api;
pub mod cache;
pub mod logging;
pub mod retry;
pub mod settings;
