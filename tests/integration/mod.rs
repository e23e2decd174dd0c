//! Integration tests for the vigil check engine
//!
//! These tests drive the engine through its public API: object definitions
//! are loaded from YAML, results enter through the result queue or the
//! on-disk spool, and behaviour is observed through object state, the
//! event queue, recorded hook calls and the published status file.

pub mod freshness;
pub mod helpers;
pub mod pipeline;
pub mod reachability;
pub mod soft_hard;
pub mod timeperiods;
