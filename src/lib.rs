//! harvest - scheduled scraping into CSV and SQLite
//!
//! This crate provides:
//! - Source adapters for JSON APIs and HTML documents, gated by robots.txt
//! - Extraction of headings, paragraphs and mapped API fields into records
//! - Persistence of every batch to a per-source CSV snapshot and a SQLite table
//! - A scheduler that repeats the cycle once, on an interval or daily

pub mod commands;
pub mod config;
pub mod crawl;
pub mod error;
pub mod logging;
pub mod meta;
pub mod models;
pub mod parse;
pub mod pipeline;
pub mod schedule;
pub mod source;
pub mod store;

pub use config::Config;
pub use error::{Error, Result};
