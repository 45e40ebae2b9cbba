//! Purpose: Loopback HTTP Bridge in front of the engine.
//! Exports: `envelope`, `handlers`, `registry`, `server`, `session`.
//! Role: Process A of the adapter pair; the only code that touches workspace state.

pub mod envelope;
pub mod handlers;
pub mod registry;
pub mod server;
pub mod session;
