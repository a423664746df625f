//! Valid-region intervals per reference sequence.
//!
//! Scanning and assembly only touch reads inside these intervals. Without
//! an exclude file every chromosome is one whole interval; an exclude BED
//! carves its regions out. Intervals are sorted, non-overlapping and
//! half-open.

use std::path::Path;

use anyhow::Result;
use bio::io::bed;
use log::warn;
use rust_htslib::bam;

use crate::errors::Error;

pub type ChrIntervals = Vec<(i64, i64)>;

#[derive(Debug, Clone)]
pub struct ValidRegions {
    per_ref: Vec<ChrIntervals>,
}

impl ValidRegions {
    pub fn new(per_ref: Vec<ChrIntervals>) -> Self {
        ValidRegions { per_ref }
    }

    pub fn get(&self, tid: i32) -> &[(i64, i64)] {
        self.per_ref
            .get(tid as usize)
            .map(|intervals| intervals.as_slice())
            .unwrap_or(&[])
    }

    pub fn is_empty_ref(&self, tid: i32) -> bool {
        self.get(tid).is_empty()
    }
}

/// Complement of the (possibly overlapping) excluded intervals within
/// `[0, len)`.
fn subtract_intervals(len: i64, mut excluded: ChrIntervals) -> ChrIntervals {
    excluded.sort_unstable();
    let mut kept = Vec::new();
    let mut cursor = 0i64;
    for (start, end) in excluded {
        let start = start.max(0).min(len);
        let end = end.max(0).min(len);
        if start > cursor {
            kept.push((cursor, start));
        }
        cursor = cursor.max(end);
    }
    if cursor < len {
        kept.push((cursor, len));
    }
    kept
}

/// Build the per-reference valid regions for one alignment header.
///
/// Exclude records naming references absent from the header are ignored
/// with a warning.
pub fn valid_regions(exclude: Option<&Path>, header: &bam::HeaderView) -> Result<ValidRegions> {
    let n_targets = header.target_count() as usize;
    let mut excluded: Vec<ChrIntervals> = vec![Vec::new(); n_targets];

    if let Some(path) = exclude {
        if path.extension().map_or(true, |ext| ext != "bed") {
            return Err(Error::InvalidBedFile {
                path: path.to_owned(),
            }
            .into());
        }
        let mut reader = bed::Reader::from_file(path)?;
        for record in reader.records() {
            let record = record?;
            match header.tid(record.chrom().as_bytes()) {
                Some(tid) => {
                    excluded[tid as usize].push((record.start() as i64, record.end() as i64));
                }
                None => {
                    warn!(
                        "exclude region on unknown reference {}, ignoring",
                        record.chrom()
                    );
                }
            }
        }
    }

    let per_ref = excluded
        .into_iter()
        .enumerate()
        .map(|(tid, intervals)| {
            let len = header.target_len(tid as u32).unwrap_or(0) as i64;
            subtract_intervals(len, intervals)
        })
        .collect();
    Ok(ValidRegions { per_ref })
}
