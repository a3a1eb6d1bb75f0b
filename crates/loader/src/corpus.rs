//! Ordered, read-only set of documents to load
//!
//! Each matching file is one document; its full contents are the payload.

use docbulk_core::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// One document of the corpus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusItem {
    /// Where the document came from (file path or a synthetic label)
    pub source: String,
    pub contents: Vec<u8>,
}

impl CorpusItem {
    pub fn len(&self) -> usize {
        self.contents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Corpus {
    items: Vec<CorpusItem>,
}

impl Corpus {
    /// Reads up to `max_files` files in `directory` matching `pattern`, in path order
    pub fn open(directory: &Path, pattern: &str, max_files: usize) -> Result<Self> {
        if !directory.is_dir() {
            return Err(Error::corpus(
                directory.display().to_string(),
                "not a directory",
            ));
        }

        let full_pattern = format!(
            "{}/{}",
            glob::Pattern::escape(&directory.to_string_lossy()),
            pattern
        );
        let entries = glob::glob(&full_pattern)
            .map_err(|e| Error::corpus(&full_pattern, format!("invalid file pattern: {e}")))?;

        let mut paths: Vec<PathBuf> = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| {
                Error::corpus(e.path().display().to_string(), e.error().to_string())
            })?;
            if path.is_file() {
                paths.push(path);
            }
        }
        paths.sort();

        let matched = paths.len();
        paths.truncate(max_files);
        if matched > paths.len() {
            debug!(
                "Corpus capped at {max_files} of {matched} files matching '{pattern}'"
            );
        }

        let items = paths
            .into_iter()
            .map(|path| {
                let contents = std::fs::read(&path)
                    .map_err(|e| Error::corpus(path.display().to_string(), e.to_string()))?;
                Ok(CorpusItem {
                    source: path.display().to_string(),
                    contents,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let corpus = Self { items };
        info!(
            "Opened corpus of {} documents ({} bytes) from {}",
            corpus.len(),
            corpus.total_bytes(),
            directory.display()
        );
        Ok(corpus)
    }

    /// Builds a corpus from in-memory documents, labelled by position
    pub fn from_documents<I, B>(documents: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Vec<u8>>,
    {
        let items = documents
            .into_iter()
            .enumerate()
            .map(|(i, doc)| CorpusItem {
                source: format!("document[{i}]"),
                contents: doc.into(),
            })
            .collect();
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&CorpusItem> {
        self.items.get(index)
    }

    pub fn items(&self) -> &[CorpusItem] {
        &self.items
    }

    pub fn total_bytes(&self) -> usize {
        self.items.iter().map(CorpusItem::len).sum()
    }
}
