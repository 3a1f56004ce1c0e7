pub mod app;
pub mod catalog;
pub mod error;
pub mod lyrics;
pub mod media;
pub mod player;
pub mod session;
