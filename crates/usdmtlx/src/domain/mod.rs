//! Core types shared by the exporters.

pub mod errors;
pub mod model;
