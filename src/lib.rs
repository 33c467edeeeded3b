//! # ChatDB
//!
//! Natural-language queries over a relational or a document database.
//!
//! A request is turned into a prompt that describes the live schema, sent
//! to a text-generation provider, and the reply is cleaned, parsed into a
//! [`StructuredQuery`](chatdb_core::StructuredQuery) by a restricted
//! literal parser, and executed. The generated text is never evaluated as
//! code.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌─────────────┐   ┌────────────┐
//! │ Introspector │──▶│   Prompt    │──▶│ Generation │
//! │ SQL / Docs   │   │  assembly   │   │  provider  │
//! └──────────────┘   └─────────────┘   └─────┬──────┘
//!                                            ▼
//! ┌──────────────┐   ┌─────────────┐   ┌────────────┐
//! │  Executors   │◀──│   Router    │◀──│ Sanitize + │
//! │ SQL / Docs   │   │             │   │   parse    │
//! └──────┬───────┘   └─────────────┘   └────────────┘
//!        ▼
//!   QueryOutcome
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! chatdb init --store document --db clinic
//! chatdb import --db clinic doctors.json
//! chatdb ask --store document --db clinic "ENT doctors with over 20 years experience"
//! chatdb run --store sql --db shop "SELECT * FROM orders; SELECT COUNT(*) FROM orders"
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Per-request SQLite connections |
//! | [`migrate`] | Database creation, document-store tables |
//! | [`introspect`] | Schema introspection |
//! | [`generation`] | Generation provider abstraction |
//! | [`relational`] | Statement-by-statement SQL execution |
//! | [`document_store`] | SQLite-backed document store |
//! | [`pipeline`] | The request pipeline |
//! | [`import`] | JSON / NDJSON import |
//! | [`output`] | Terminal rendering |

pub mod config;
pub mod db;
pub mod document_store;
pub mod generation;
pub mod import;
pub mod introspect;
pub mod migrate;
pub mod output;
pub mod pipeline;
pub mod relational;
