//! Application layer: classification, the USD and MaterialX writers, and the export run.

pub mod classify;
pub mod frame_range;
pub mod loader;
pub mod materialx;
pub mod pipeline;
pub mod usd;
