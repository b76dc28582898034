pub mod diff_types;
pub mod engine;
pub mod history_types;
pub mod snapshot;
