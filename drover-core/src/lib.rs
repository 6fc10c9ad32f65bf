//! Drover Core
//!
//! Core types and abstractions for the Drover job submission system.
//!
//! This crate contains:
//! - Domain types: Core business entities (Run, Status, ...)
//! - DTOs: Data transfer objects crossing the submission boundary

pub mod domain;
pub mod dto;
