//! Stitch Core - Shared domain types.
//!
//! This crate provides the types shared by every Stitch component:
//! - `storefront` - JSON API server and domain services
//! - `cli` - Command-line tools for migrations, seeding and staff accounts
//!
//! # Architecture
//!
//! The core crate contains only types and pure rules - no I/O, no database
//! access, no HTTP. Status machines and money arithmetic live here so every
//! layer enforces the same rules.
//!
//! # Modules
//!
//! - [`types`] - Type-safe IDs, money, emails, statuses and the request principal

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
