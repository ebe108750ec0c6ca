//! Workspace root for the `vstream` event-stream server.
//!
//! This crate carries no code of its own — it exists so the root
//! `Cargo.toml` can host the `tests/integration/*.rs` suite, which drives a
//! real `vstream-server` through `vstream-client` via `vstream-test-utils`.
//! The server itself lives in `services/server`; the reusable pieces live
//! under `crates/`.
