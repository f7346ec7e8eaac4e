pub mod auth;
pub mod config;
pub mod navigator;
pub mod output;
pub mod tasks;
