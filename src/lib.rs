//! # Docmirror
//!
//! A searchable local mirror of a documentation site.
//!
//! Docmirror keeps a checkout of a documentation repository up to date,
//! parses every page into structured facts (title, section, class tokens,
//! code samples), and serves ranked full-text and structured queries over a
//! SQLite FTS5 index through a CLI, a JSON HTTP API, and an MCP endpoint.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────┐   ┌──────────┐   ┌─────────────┐
//! │   Mirror   │──▶│  Parser  │──▶│ Indexer  │──▶│   SQLite    │
//! │ git/local  │   │+Taxonomy │   │  (swap)  │   │ FTS5 + meta │
//! └────────────┘   └──────────┘   └──────────┘   └──────┬──────┘
//!                                                       │
//!                                                ┌──────▼──────┐
//!                                                │SearchEngine │
//!                                                └──────┬──────┘
//!                                       ┌───────────────┼──────────┐
//!                                       ▼               ▼          ▼
//!                                    ┌─────┐      ┌──────────┐ ┌──────┐
//!                                    │ CLI │      │/tools/*  │ │ /mcp │
//!                                    └─────┘      └──────────┘ └──────┘
//! ```
//!
//! Every refresh rebuilds the whole index and swaps it in atomically;
//! readers see either the previous generation or the new one.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration |
//! | [`error`] | Typed errors |
//! | [`models`] | Core data types |
//! | [`taxonomy`] | Section labels and public URLs from paths |
//! | [`parser`] | Document parsing and fact extraction |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema |
//! | [`store`] | Generation-swapped index store |
//! | [`indexer`] | Full rebuilds |
//! | [`search`] | Query engine |
//! | [`sync`] | Mirror synchronization |
//! | [`harness`] | Service facade |
//! | [`tools`] | Named operations for remote callers |
//! | [`server`] | HTTP server |
//! | [`mcp`] | MCP bridge |
//! | [`stats`] | Index statistics |

pub mod config;
pub mod db;
pub mod error;
pub mod harness;
pub mod indexer;
pub mod mcp;
pub mod migrate;
pub mod models;
pub mod parser;
pub mod search;
pub mod server;
pub mod stats;
pub mod store;
pub mod sync;
pub mod taxonomy;
pub mod tools;

#[cfg(test)]
mod test_support;
