//! services/client/src/lib.rs
//!
//! HTTP adapters, configuration and calendar import for the StudyBuddy client.

pub mod adapters;
pub mod config;
pub mod error;
pub mod ics;
