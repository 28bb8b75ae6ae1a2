// Library for tests to access modules

pub mod analytics;
pub mod config;
pub mod error;
pub mod filter;
pub mod models;
pub mod parser;
pub mod routes;
pub mod source;
pub mod sync;
