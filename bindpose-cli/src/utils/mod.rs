//! Shared utilities for the bindpose CLI

pub mod tree;

pub use tree::*;
