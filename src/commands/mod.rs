//! Command implementations behind the `vigil` binary

pub mod common;
pub mod reap;
pub mod run;
pub mod status;
pub mod submit;
pub mod verify;
