#![warn(missing_docs)]
//! # restbox-reqwest
//!
//! A [`Fetcher`](restbox_core::Fetcher) backed by a [`reqwest::Client`].
//!
//! Request urls are joined to an optional base url, bodies are sent as JSON
//! and response payloads are parsed as JSON. An empty payload is read as
//! `null`.

mod fetcher;

pub use fetcher::ReqwestFetcher;
