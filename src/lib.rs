//! Chat gateway — bridges a session-based long-poll event API to an
//! internal reply pipeline.

pub mod actions;
pub mod api;
pub mod config;
pub mod error;
pub mod gateway;
pub mod pipeline;

#[cfg(test)]
pub(crate) mod testutil;
