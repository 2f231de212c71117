pub mod config;
pub mod error;
pub mod production;

pub use config::Config;
pub use error::*;
pub use production::*;
