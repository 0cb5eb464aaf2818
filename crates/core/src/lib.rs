pub mod config;
pub mod error;
pub mod settings;

pub use config::{Configuration, SmtpAuth, SmtpConfig};
pub use error::*;
pub use settings::{ConfigLayer, ConfigResolver};
