//! Identity Photo Verification Submission Service
//!
//! This library provides the core functionality for photo-verify: persisting
//! identity-verification attempts, submitting them asynchronously to the
//! verification vendor with bounded delayed retries, and sending best-effort
//! status notification emails.

pub mod app_state;
pub mod config;
pub mod db;
pub mod models;
pub mod routes;
pub mod services;
