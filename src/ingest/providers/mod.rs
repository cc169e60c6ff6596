// src/ingest/providers/mod.rs
//! Payload parsers: RSS/Atom feeds and HTML listing/article pages.

pub mod feed;
pub mod html;
