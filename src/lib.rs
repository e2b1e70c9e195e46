pub mod accounts;
pub mod api;
pub mod auth;
pub mod config;
pub mod domain;
pub mod engine;
pub mod gate;
pub mod store;
