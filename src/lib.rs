//! seqmap: an ordered, string-keyed map where every entry is addressable
//! both by integer position and by key, backed by a process-wide unique
//! token source.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: keep the positional view and the keyed view of one sequence
//!   mutually consistent under concurrent mutation, with collision-free
//!   default keys for entries added without one.
//! - Layers:
//!   - SeqMap<T>: the container. A single indexed arena (ordered vector of
//!     slots plus a key->position map) behind a reader-writer lock; every
//!     compound mutation runs under one write-lock scope so the views can
//!     never be observed torn.
//!   - TokenSource: mints 128-bit random tokens guaranteed distinct across
//!     the whole process via a shared registry, and bulk-imports externally
//!     sourced tokens from delimited text, tabular rows, and markup streams.
//!
//! Constraints
//! - Every new slot's identity token comes from TokenSource; positions
//!   renumber on insert/remove, tokens never change for a live entry.
//! - Default keys are `prefix + counter` with a monotone counter that skips
//!   collisions and is never reset by removals.
//! - Positional insert only splices before an occupied position; inserting
//!   at `len` (or into an empty map) is rejected, not coerced to append.
//! - Reads take the read lock: the container chooses the reader-writer
//!   consistency level over unsynchronized best-effort reads, which Rust
//!   could not express soundly anyway.
//! - "Not found"/"out of range" are data conditions reported through
//!   `Result`/`Option`/`bool` returns; only misuse of the explicit buffer
//!   export (`copy_into`) panics.
//!
//! Notes and non-goals
//! - Ordering is purely structural (order of pushes and splices), never
//!   derived from values; there is no sorting.
//! - Iterators are snapshots taken at creation; they do not track later
//!   mutation and can simply be re-created for a fresh view.
//! - The token registry is process-global by contract: tokens minted through
//!   any `TokenSource` value are distinct from all others in the process,
//!   and `TokenSource::clear` wipes that history globally.
//! - No persistence, no network, no schema validation.

mod seq_map;
mod seq_map_proptest;
mod token_source;

// Public surface
pub use seq_map::{Entries, InsertError, Iter, MapError, SeqMap};
pub use token_source::{TokenSource, XmlImportError, XmlNodeKind};
pub use uuid::Uuid;
