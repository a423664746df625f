//! Lazily cached access to reference chromosome sequences.

use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use bio::io::fasta;
use lru_time_cache::LruCache;

use crate::errors::Error;

/// Whole-chromosome buffer over an indexed FASTA. Fetching a chromosome a
/// second time is O(1) while it stays in the cache.
pub struct ReferenceBuffer {
    reader: Mutex<fasta::IndexedReader<fs::File>>,
    cache: Mutex<LruCache<String, Arc<Vec<u8>>>>,
}

impl ReferenceBuffer {
    pub fn new<P: AsRef<Path>>(path: P, capacity: usize) -> Result<Self> {
        let reader = fasta::IndexedReader::from_file(&path).map_err(|_| {
            Error::MissingReferenceIndex {
                path: path.as_ref().to_owned(),
            }
        })?;
        Ok(ReferenceBuffer {
            reader: Mutex::new(reader),
            cache: Mutex::new(LruCache::with_capacity(capacity)),
        })
    }

    pub fn seq(&self, chrom: &str) -> Result<Arc<Vec<u8>>> {
        let mut cache = self.cache.lock().unwrap();
        if let Some(seq) = cache.get(chrom) {
            return Ok(Arc::clone(seq));
        }
        let mut sequence = Vec::new();
        {
            let mut reader = self.reader.lock().unwrap();
            reader.fetch_all(chrom)?;
            reader.read(&mut sequence)?;
        }
        let sequence = Arc::new(sequence);
        cache.insert(chrom.to_owned(), Arc::clone(&sequence));
        Ok(sequence)
    }
}
