//! API request handlers

pub mod admin;
pub mod auth;
pub mod content;
pub mod course;
pub mod domain;
pub mod learning;
pub mod notification;
pub mod quiz;
pub mod user;
