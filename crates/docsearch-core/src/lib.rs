pub mod chunker;
pub mod config;
pub mod corpus;
pub mod data_processor;
pub mod error;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
