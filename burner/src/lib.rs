pub mod config;
pub mod controller;

pub use controller::{Burner, Running, SHUTDOWN_BROADCAST};
