pub mod error;
pub mod links;
pub mod logger;
pub mod monitor;
pub mod validation;
