#![forbid(unsafe_code)]

pub mod capture;
pub mod cli;
pub mod config;
pub mod errors;
pub mod extract;
pub mod fetch;
pub mod formats;
pub mod logging;
pub mod naming;
pub mod server;
pub mod vault;
