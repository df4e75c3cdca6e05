//! # TaskTrack Server Library
//!
//! Server-rendered task tracker with role-based permissions, plus a small
//! JSON API over the same task model.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `middleware`: Session guards, policy stage, method override, headers
//! - `routes`: Page and API handlers
//! - `views`: Template environment

pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod views;
