mod app;
mod config;
mod error;
mod flash;
mod handlers;
mod markdown;
mod models;
mod uploads;
mod utils;

pub use app::App;
pub use config::Config;
pub use error::Error;
