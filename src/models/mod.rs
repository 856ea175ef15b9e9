pub mod bar;
pub mod config;
pub mod settings;
pub mod snapshot;
pub mod stats;
