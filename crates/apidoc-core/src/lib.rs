pub mod config;
pub mod error;
pub mod parse;
pub mod transform;
