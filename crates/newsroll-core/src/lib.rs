//! # newsroll core
//!
//! Runtime-agnostic logic for newsroll: item models, content
//! normalization, keyword scoring, the ingestion/deduplication engine,
//! list chunking, the hierarchical summarizer, and the case workflow
//! with its plain-text report.
//!
//! This crate contains no tokio, sqlx, HTTP, or filesystem I/O. Storage,
//! media, and text generation are reached through the traits in
//! [`store`], [`media`], and [`summarize`], so every pipeline can run
//! against the in-memory fakes in tests.

pub mod cases;
pub mod chunk;
pub mod dedup;
pub mod error;
pub mod media;
pub mod models;
pub mod normalize;
pub mod report;
pub mod scoring;
pub mod store;
pub mod summarize;

pub use error::{Error, FieldError};
