// Copyright 2021 svelt developers.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Per-sample insert-size library characterisation.
//!
//! The first properly oriented pairs of each alignment file yield the
//! median and MAD of the insert-size distribution; from those the normal
//! range and the deletion cutoff are derived. A library without usable
//! pairs is treated as single-end (median 0), which disables paired-end
//! evidence for that sample.

use std::path::Path;

use anyhow::Result;
use itertools::Itertools;
use log::{info, warn};
use rust_htslib::bam::{self, Read};
use statrs::statistics::{Data, OrderStatistics};

/// Records screened per sample before estimation stops.
const MAX_RECORDS_SCREENED: usize = 100_000;
/// Insert sizes sampled per sample.
const MAX_INSERT_SIZES: usize = 10_000;
/// Below this sample count the library counts as single-end.
const MIN_INSERT_SIZES: usize = 100;

/// Insert-size parameters of one sample, captured once before scanning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryParams {
    pub median: i32,
    pub mad: i32,
    pub read_size: i32,
    /// Upper bound of the normal insert-size range (median + 5 MADs).
    pub max_normal_isize: i32,
    /// Deletion evidence cutoff (median + 9 MADs, at least twice the read
    /// length).
    pub max_isize_cutoff: i32,
    /// Abnormal pairs recorded during scanning, for the end-of-run report.
    pub abnormal_pairs: u64,
}

impl LibraryParams {
    pub fn single_end(read_size: i32) -> Self {
        LibraryParams {
            median: 0,
            mad: 0,
            read_size,
            max_normal_isize: 0,
            max_isize_cutoff: 0,
            abnormal_pairs: 0,
        }
    }

    pub fn from_insert_sizes(isizes: Vec<f64>, read_size: i32) -> Self {
        if isizes.len() < MIN_INSERT_SIZES {
            return LibraryParams::single_end(read_size);
        }
        let mut data = Data::new(isizes);
        let median = data.median();
        let mut deviations =
            Data::new(data.iter().map(|isize| (isize - median).abs()).collect_vec());
        let mad = deviations.median();
        let median = median.round() as i32;
        let mad = mad.round() as i32;
        LibraryParams {
            median,
            mad,
            read_size,
            max_normal_isize: median + 5 * mad,
            max_isize_cutoff: (median + 9 * mad).max(2 * read_size),
            abnormal_pairs: 0,
        }
    }

    /// True for libraries whose paired-end stream carries no information.
    #[inline]
    pub fn is_single_end(&self) -> bool {
        self.median == 0
    }
}

/// Estimate library parameters from the leading records of one file.
pub fn estimate_library<P: AsRef<Path>>(path: P) -> Result<LibraryParams> {
    let mut bam = bam::Reader::from_path(&path)?;
    let mut isizes = Vec::with_capacity(MAX_INSERT_SIZES);
    let mut read_size = 0i32;
    for (screened, result) in bam.records().enumerate() {
        if screened >= MAX_RECORDS_SCREENED || isizes.len() >= MAX_INSERT_SIZES {
            break;
        }
        let record = result?;
        if record.is_unmapped()
            || record.is_duplicate()
            || record.is_quality_check_failed()
            || record.is_secondary()
            || record.is_supplementary()
        {
            continue;
        }
        read_size = read_size.max(record.seq_len() as i32);
        if !record.is_paired()
            || record.is_mate_unmapped()
            || record.tid() != record.mtid()
            || !record.is_first_in_template()
        {
            continue;
        }
        // Only properly oriented pairs inform the normal distribution.
        if crate::evidence::pairs::layout(&record) != 0 {
            continue;
        }
        let isize = record.insert_size().abs();
        if isize > 0 {
            isizes.push(isize as f64);
        }
    }

    let params = LibraryParams::from_insert_sizes(isizes, read_size);
    if params.is_single_end() {
        warn!(
            "{}: not enough properly oriented pairs, treating library as single-end \
             (split-read evidence only)",
            path.as_ref().display()
        );
    } else {
        info!(
            "{}: median insert size {}, MAD {}, deletion cutoff {}",
            path.as_ref().display(),
            params.median,
            params.mad,
            params.max_isize_cutoff
        );
    }
    Ok(params)
}
