//! # Rabt Support
//!
//! Shared utilities for the Rabt DI framework.
//!
//! This crate provides:
//! - Text rendering for resolution errors (chains, type names, suggestions)

pub mod rendering;
