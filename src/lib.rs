//! In-app help engine: knowledge matching, conversational context,
//! offline cache, behavior tracking, proactive suggestions and guides.

pub mod assistant;
pub mod behavior;
pub mod config;
pub mod context;
pub mod error;
pub mod guide;
pub mod index;
pub mod knowledge;
pub mod matcher;
pub mod offline;
pub mod proactive;
pub mod storage;
pub mod types;
