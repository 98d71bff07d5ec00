//! roster-store — the in-memory person store served by a Roster node.
//!
//! # Architecture
//!
//! A single `HashMap<ObjectId, Person>` behind one `tokio::sync::RwLock`.
//! Every operation takes the lock for its whole duration, so single-key
//! operations are linearizable and a bulk call is applied as one critical
//! section. Bulk calls are not transactional: each item is validated and
//! applied on its own, and one bad id never stops the rest.
//!
//! Identifiers arrive as raw strings and are validated before any lookup.
//! Malformed and absent ids are both reported as "not there" to the wire
//! layer; the typed outcomes below keep them apart for callers and logs.
//!
//! `PersonStore` is `Clone` (backed by `Arc`) and can be shared across
//! request handlers.

pub mod store;

pub use store::{BatchOutcome, DeleteOutcome, PersonStore, UpsertOutcome};
