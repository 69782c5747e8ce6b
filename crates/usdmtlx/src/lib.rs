pub mod app;
pub mod cli;
pub mod domain;
pub mod infra;

pub fn init(verbosity: i8) {
    infra::logging::init(verbosity);
}
