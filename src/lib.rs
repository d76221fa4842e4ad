#![allow(clippy::doc_markdown)]

pub mod core;
pub mod handler;
pub mod prelude;
pub mod provider;
pub mod quantity;
pub mod query;
pub mod runner;
pub mod scenario;
pub mod settings;
pub mod tables;
