//! # EEFF Analyst
//!
//! Retrieval-augmented question answering and comparison over
//! financial-statement PDFs (EEFF — *Estados Financieros*).
//!
//! A PDF becomes a persisted, searchable knowledge base: extracted text is
//! normalized, split into token-bounded chunks at sentence boundaries,
//! embedded chunk by chunk, and stored as a JSON snapshot. Questions
//! retrieve the most similar chunks from the fixed Grupo Sura reference
//! base and a comparison target (a preset document or a fresh upload), and
//! the retrieved context rides a structured Spanish analyst prompt to the
//! completion model.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────────────┐   ┌────────────────┐
//! │   PDF    │──▶│ normalize + chunk │──▶│ embed (OpenAI) │
//! └──────────┘   └───────────────────┘   └───────┬────────┘
//!                                                │
//!                       ┌────────────────────────▼───┐
//!                       │ KnowledgeBase snapshot     │
//!                       │ (chunks, vectors, metadata)│
//!                       └───────────┬────────────────┘
//!                  search (cosine)  │
//!              ┌────────────────────┤
//!              ▼                    ▼
//!        ┌──────────┐        ┌──────────┐
//!        │   CLI    │        │   HTTP   │
//!        │  (eeff)  │        │  (axum)  │
//!        └──────────┘        └──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Error taxonomy shared with the HTTP boundary |
//! | [`normalize`] | Extracted-text cleanup and length bounding |
//! | [`chunker`] | Token-bounded sentence-boundary chunking |
//! | [`metadata`] | Filename-convention provenance parsing |
//! | [`extract`] | PDF text extraction |
//! | [`embedding`] | Embedding provider and cosine similarity |
//! | [`kb`] | Knowledge base build/load/search/persist |
//! | [`registry`] | Named bases shared across requests |
//! | [`prompt`] | Spanish analyst prompt templates |
//! | [`completion`] | Completion oracle client |
//! | [`compare`] | Question-answering orchestration |
//! | [`server`] | HTTP routes |

pub mod chunker;
pub mod compare;
pub mod completion;
pub mod config;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod kb;
pub mod metadata;
pub mod normalize;
pub mod prompt;
pub mod registry;
pub mod server;
