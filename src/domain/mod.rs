//! Method handlers registered in the engine's dispatch table
//!
//! Each handler owns the collaborators it needs (catalogs, session registry,
//! rate limiter, injected providers) and nothing else.

pub mod notifications;
pub mod resources;
pub mod system;
pub mod tools;
pub mod ui;
