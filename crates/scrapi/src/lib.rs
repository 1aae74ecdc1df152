//! scrapi command line: capture pages, synthesize extractors, serve the
//! run-test API.

pub mod cli;
pub mod config;
pub mod logging;
pub mod server;
