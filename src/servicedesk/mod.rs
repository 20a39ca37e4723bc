//! Service-desk API collaborator.

pub mod client;

pub use client::*;
