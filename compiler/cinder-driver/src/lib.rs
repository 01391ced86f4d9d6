//! Driver for the cinder backend core.
//!
//! Composes the three backend passes over an in-memory module. Producing the
//! HIR input and consuming the MIR output are the business of external
//! collaborators; nothing here touches the filesystem.

pub mod pipeline;
