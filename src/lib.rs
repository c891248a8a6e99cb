//! Dotabank - Dota 2 replay archive web service
//!
//! This library exposes the core modules for testing and reuse.

pub mod common;
pub mod config;
pub mod entity;
pub mod error;
pub mod filters;
pub mod routes;
pub mod services;
pub mod steam;
