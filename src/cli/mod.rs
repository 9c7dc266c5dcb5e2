pub mod cache;
pub mod config;
pub mod guide;
pub mod help;
