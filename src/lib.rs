pub mod cli;
pub mod commands;
pub mod config;
pub mod health;
pub mod killswitch;
pub mod lock;
pub mod logging;
pub mod platform;
pub mod ports;
pub mod ready;
pub mod registry;
pub mod service;
pub mod summary;
pub mod supervisor;
