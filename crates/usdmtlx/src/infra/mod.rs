//! Infrastructure adapters for the host boundary, config, logging, and the desktop.

pub mod config;
pub mod host;
pub mod logging;
pub mod memory;
pub mod opener;
