//! Segtrans - adaptive batch translation for timed subtitle segments
//!
//! Deduplicates segment text, serves repeats from an LRU cache, and picks a
//! batching strategy per language pair from observed provider behavior.

pub mod cli;
pub mod config;
pub mod error;
pub mod retry;
pub mod service;
pub mod subtitle;
pub mod translate;
