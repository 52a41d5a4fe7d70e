//! Output generation.
//!
//! The handoff document and confirmation template written for a run,
//! plus the terminal summary printed afterwards.

pub mod handoff;
pub mod summary;

pub use handoff::*;
pub use summary::*;
