//! Purpose: Library root for the recaf-mcp adapter pair.
//! Exports: `bridge`, `core`, `diff`, `engine`, `mcp`, `relay`.
//! Role: Shared by the `recaf-mcp` binary and integration tests.

pub mod bridge;
pub mod core;
pub mod diff;
pub mod engine;
pub mod mcp;
pub mod relay;
