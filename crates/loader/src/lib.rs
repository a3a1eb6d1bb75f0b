//! Bulk loading of a document corpus through a server-side batch-insert procedure
//!
//! The corpus is split into size-bounded batches ([`BatchSizer`]) which the
//! [`BulkLoader`] submits one at a time to a [`BatchSink`], advancing by the
//! number of documents the remote side reports as committed.

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

pub mod batch;
pub mod bulk_loader;
pub mod corpus;
pub mod sink;

pub use batch::{BatchDescriptor, BatchSizer};
pub use bulk_loader::{BulkLoader, LoadProgress, LoadState};
pub use corpus::{Corpus, CorpusItem};
pub use sink::{BatchSink, StoredProcedureSink};
