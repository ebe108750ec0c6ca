//! Command handlers, one module per command family, matching the source's
//! `commands/<family>/commands.go` split.

pub mod events;
pub mod pubsub;
pub mod stream;
