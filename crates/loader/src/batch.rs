//! Size-bounded batching of corpus documents
//!
//! A batch is a contiguous run of documents serialized as `[doc,doc,...]`, the
//! argument shape the server-side batch-insert procedure expects.

use crate::corpus::Corpus;
use docbulk_storage::RawPayload;

const OPEN: &[u8] = b"[";
const SEPARATOR: &[u8] = b",";
const CLOSE: &[u8] = b"]";

/// A contiguous run `[start, end)` of corpus documents and its serialized form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchDescriptor {
    pub start: usize,
    pub end: usize,
    pub payload: RawPayload,
}

impl BatchDescriptor {
    /// Number of documents in the batch
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }

    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }
}

/// Computes the next batch under a byte ceiling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSizer {
    ceiling: usize,
}

impl BatchSizer {
    pub fn new(ceiling: usize) -> Self {
        Self { ceiling }
    }

    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    /// The largest batch starting at `cursor` whose payload fits in the ceiling
    ///
    /// The document at `cursor` is always included, so a document larger than the
    /// ceiling forms a batch of its own. Returns `None` once `cursor` reaches the
    /// end of the corpus.
    pub fn next_batch(&self, corpus: &Corpus, cursor: usize) -> Option<BatchDescriptor> {
        let first = corpus.get(cursor)?;

        let mut payload_len = OPEN.len() + first.len() + CLOSE.len();
        let mut end = cursor + 1;
        while let Some(item) = corpus.get(end) {
            let grown = payload_len + SEPARATOR.len() + item.len();
            if grown > self.ceiling {
                break;
            }
            payload_len = grown;
            end += 1;
        }

        let mut payload = Vec::with_capacity(payload_len);
        payload.extend_from_slice(OPEN);
        for (i, item) in corpus.items()[cursor..end].iter().enumerate() {
            if i > 0 {
                payload.extend_from_slice(SEPARATOR);
            }
            payload.extend_from_slice(&item.contents);
        }
        payload.extend_from_slice(CLOSE);

        Some(BatchDescriptor {
            start: cursor,
            end,
            payload: RawPayload::new(payload),
        })
    }
}
