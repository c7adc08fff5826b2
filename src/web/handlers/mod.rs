//! # Web API Request Handlers
//!
//! HTTP request handlers organized by functional area.

pub mod health;
pub mod inventory;
pub mod stock;
pub mod tasks;
pub mod templates;
