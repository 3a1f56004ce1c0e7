pub mod cli;
pub mod config;
pub mod events;
pub mod input_handler;
pub mod logging;

pub use events::AppEvent;
pub use input_handler::Command;
