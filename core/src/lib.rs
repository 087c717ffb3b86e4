pub mod api;
pub mod communicator;
pub mod config;
pub mod context;
pub mod error;
pub mod events_out;
pub mod interpreter;
pub mod notify;
pub mod responder;
pub mod runner;
pub mod script_path;

pub use runner::Runner;
