//! Cursus Backend - an e-learning platform API
//!
//! This crate provides the backend for Cursus, including:
//! - RESTful API with Axum
//! - PostgreSQL database with SQLx
//! - JWT authentication with role-based authorization
//! - Courses, lesson contents and graded quizzes
//! - Enrollments, progression tracking and certificates

pub mod admin_init;
pub mod authz;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod migrate;
pub mod models;
pub mod server;

// Re-export commonly used types
pub use error::{AppError, Result};
pub use models::*;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
