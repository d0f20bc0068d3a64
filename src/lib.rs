//! # Hebei Guide
//!
//! A retrieval-augmented travel assistant over a tagged knowledge file.
//!
//! The knowledge file is parsed into entries, normalized into documents,
//! embedded once into a persisted vector index, and queried at serving time.
//! Each answer is grounded in the retrieved entries and generated by a
//! chat-completion model, with an optional second model that only rephrases.
//!
//! ## Architecture
//!
//! ```text
//!  build (offline)                         serve
//! ┌───────────┐  ┌──────────┐  ┌───────┐   ┌───────────┐  ┌──────────┐  ┌────────────┐
//! │ knowledge │─▶│ entries  │─▶│ index │──▶│ retriever │─▶│ assistant│─▶│ CLI / HTTP │
//! │   .txt    │  │documents │  │ .json │   │ + filter  │  │ + memory │  │            │
//! └───────────┘  └──────────┘  └───────┘   └───────────┘  └────┬─────┘  └────────────┘
//!                                                               │
//!                                                 generation ◀──┴──▶ enhancement
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! guide build                       # parse + embed + persist the index
//! guide search "清东陵门票"          # inspect filtered hits
//! guide ask "承德2日游" --evidence   # one grounded answer
//! guide chat                        # interactive session
//! guide serve                       # HTTP API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration with environment overrides |
//! | [`error`] | Typed error taxonomy and user-facing messages |
//! | [`models`] | Core data types |
//! | [`parse`] | Knowledge file splitting |
//! | [`document`] | Tagged-field extraction and normalization |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | Vector index build, persistence, and search |
//! | [`retrieve`] | Over-fetch, exclusion filter, context assembly |
//! | [`memory`] | Per-user conversation memory |
//! | [`completion`] | Chat-completion providers |
//! | [`prompt`] | Prompt templates and canned replies |
//! | [`itinerary`] | Query intent and day sections |
//! | [`answer`] | The per-query answer state machine |
//! | [`chat`] | Interactive terminal session |
//! | [`server`] | HTTP API |
//! | [`stats`] | Index statistics |
//! | [`progress`] | Build progress reporting |
//! | [`logging`] | `tracing` subscriber setup |

pub mod answer;
pub mod chat;
pub mod completion;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod index;
pub mod itinerary;
pub mod logging;
pub mod memory;
pub mod models;
pub mod parse;
pub mod progress;
pub mod prompt;
pub mod retrieve;
pub mod server;
pub mod stats;
