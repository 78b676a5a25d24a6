//! # Bridge Harvester
//!
//! Scrapes public bridge distribution pages for `obfs4` and `webtunnel`
//! bridge lines, deduplicates them against everything seen before,
//! persists the new ones and announces new, duplicate and malformed lines.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────────────────────┐   ┌─────────────┐
//! │ Source pages│──▶│ extract → classify → dedupe  │──▶│ JSON/SQLite │
//! │ (4 URLs)    │   │          (pipeline)          │   │   store     │
//! └─────────────┘   └──────────────┬───────────────┘   └─────────────┘
//!                                  ▼
//!                     ┌──────────────────────────┐
//!                     │ Telegram / log notifier  │
//!                     └──────────────────────────┘
//!        triggered by: CLI `run` · scheduler · `POST /run`
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! bridges init                  # prepare storage
//! bridges run                   # one run, JSON report on stdout
//! bridges serve                 # scheduler + HTTP trigger
//! bridges check saved_page.html # offline extraction check
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and environment overrides |
//! | [`models`] | Categories, bridge records, run report |
//! | [`extract`] | Bridge line extraction from page text |
//! | [`classify`] | Line parsing and categorisation |
//! | [`dedupe`] | Per-category deduplication |
//! | [`pipeline`] | One full harvest run |
//! | [`runner`] | Single-flight run coordination |
//! | [`scheduler`] | Interval scheduling |
//! | [`server`] | HTTP trigger and status |
//! | [`store`] | Storage trait and backends |
//! | [`fetch`] | HTTP page fetcher |
//! | [`notify`] | Message rendering and notifiers |
//! | [`traits`] | Fetcher and notifier traits |

pub mod classify;
pub mod config;
pub mod db;
pub mod dedupe;
pub mod extract;
pub mod fetch;
pub mod inspect;
pub mod migrate;
pub mod models;
pub mod notify;
pub mod pipeline;
pub mod runner;
pub mod scheduler;
pub mod server;
pub mod sources;
pub mod store;
pub mod traits;
