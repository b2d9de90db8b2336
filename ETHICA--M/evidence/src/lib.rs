#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

//! Evidence source adapters: framework knowledge base (tier 1) and
//! general web search (tier 2), both returning adequacy-scorable text.

/// Typed adequacy signal for retrieved evidence.
#[path = "../adequacy.rs"]
pub mod adequacy;

/// In-memory framework corpus store.
#[path = "../store.rs"]
pub mod store;

/// Startup corpus loading and chunking.
#[path = "../corpus.rs"]
pub mod corpus;

/// Tier-1 retriever over the framework store.
#[path = "../retriever.rs"]
pub mod retriever;

/// Tier-2 web search port and clients.
#[path = "../web.rs"]
pub mod web;

pub use adequacy::{Adequacy, EvidenceOutcome, MIN_ADEQUATE_CHARS};
pub use corpus::CorpusLoader;
pub use retriever::{FrameworkRetriever, SearchError};
pub use store::{CorpusRecord, FrameworkStore};
pub use web::{LoopbackWebClient, SerperWebClient, WebSearchClient};
