//! Gatekeeper - per-device request admission control
//!
//! This crate decides, per caller and per protected operation, whether an
//! API request may proceed. Callers are identified by a device cookie,
//! counted in fixed windows held in an injectable counter store, and either
//! throttled or passed through to the exercise catalog upstream.

pub mod catalog;
pub mod config;
pub mod error;
pub mod gate;
pub mod http;
pub mod identity;
pub mod ratelimit;
