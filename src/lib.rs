//! Quotaward - In-Process Sliding-Window Rate Limiting
//!
//! This crate tracks request timestamps per client identifier under a fixed
//! set of named policies and answers admission queries against a sliding
//! time window. A background reclaimer bounds memory by evicting identifiers
//! whose windows have emptied, and a small HTTP service exposes the
//! decisions to route handlers that live in other processes.

pub mod config;
pub mod error;
pub mod http;
pub mod ratelimit;
