//! Diabetes predictor server
//!
//! HTTP boundary around the prediction service: configuration, model
//! loading and the axum router.

pub mod api;
pub mod config;
pub mod model;
