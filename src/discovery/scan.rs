// Copyright 2021 svelt developers.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Streaming evidence pass over one sample.
//!
//! Reference partitions are visited in header order; within each, the
//! configured valid-region intervals stream position-sorted reads. Every
//! surviving record feeds junction extraction; primary paired records
//! additionally run through classification and mate reconciliation. Mate
//! state lives here: the intra-chromosomal map resets per partition, the
//! inter-chromosomal one spans the sample.

use std::collections::HashSet;
use std::path::Path;

use anyhow::Result;
use rust_htslib::bam::{self, Read};

use crate::config::DiscoverConfig;
use crate::errors::Error;
use crate::estimation::library::LibraryParams;
use crate::evidence::junction::extract_junctions;
use crate::evidence::pairs::{
    alignment_length, classify_pair, is_first_pair_obs, pair_hash, MateMap,
};
use crate::evidence::select::sort_junctions;
use crate::evidence::{hash_read_name, PairRecord, ReadJunctions};
use crate::regions::ValidRegions;
use crate::sv::{is_translocation, DELETION, NUM_SVT};

/// Everything one sample contributes to the shared evidence sinks.
pub struct ScanOutcome {
    /// Per-read junction lists, ordered by read offset.
    pub read_bp: ReadJunctions,
    /// Per-svt paired-end evidence.
    pub pairs: Vec<Vec<PairRecord>>,
    pub abnormal_pairs: u64,
}

pub struct SampleScanner<'a> {
    config: &'a DiscoverConfig,
    valid: &'a ValidRegions,
    lib: &'a LibraryParams,
    overall_max_isize: i64,
    mate_map: MateMap,
    mate_map_tra: MateMap,
    read_bp: ReadJunctions,
    pairs: Vec<Vec<PairRecord>>,
    abnormal_pairs: u64,
    last_pos: i64,
    last_pos_reads: HashSet<u64>,
    // Reused per record.
    scratch: Vec<crate::evidence::Junction>,
}

impl<'a> SampleScanner<'a> {
    pub fn new(config: &'a DiscoverConfig, valid: &'a ValidRegions, lib: &'a LibraryParams) -> Self {
        SampleScanner {
            config,
            valid,
            lib,
            overall_max_isize: i64::from(lib.max_isize_cutoff.max(lib.read_size)),
            mate_map: MateMap::default(),
            mate_map_tra: MateMap::default(),
            read_bp: ReadJunctions::new(),
            pairs: vec![Vec::new(); NUM_SVT],
            abnormal_pairs: 0,
            last_pos: -1,
            last_pos_reads: HashSet::new(),
            scratch: Vec::new(),
        }
    }

    /// Reset the per-partition state before streaming a new reference.
    pub fn begin_reference(&mut self) {
        self.mate_map.clear();
        self.last_pos = -1;
        self.last_pos_reads.clear();
    }

    pub fn process_record(&mut self, record: &bam::Record) {
        if record.is_quality_check_failed() || record.is_duplicate() || record.is_unmapped() {
            return;
        }
        if record.mapq() < self.config.min_map_qual || record.tid() < 0 {
            return;
        }

        let seed = hash_read_name(record.qname());
        self.scratch.clear();
        extract_junctions(
            record,
            self.config.min_ref_sep,
            self.config.min_clip,
            &mut self.scratch,
        );
        if !self.scratch.is_empty() {
            self.read_bp
                .entry(seed)
                .or_default()
                .extend(self.scratch.drain(..));
        }

        if !record.is_paired() || self.lib.is_single_end() {
            return;
        }
        if record.is_secondary() || record.is_supplementary() {
            return;
        }
        if record.mtid() < 0 || record.is_mate_unmapped() {
            return;
        }
        if self.valid.is_empty_ref(record.mtid()) {
            return;
        }
        let inter = record.tid() != record.mtid();
        if inter && record.mapq() < self.config.min_tra_qual {
            return;
        }
        let svt = match classify_pair(record, self.overall_max_isize) {
            Some(svt) => svt,
            None => return,
        };
        if !self.config.allows(svt) {
            return;
        }
        if svt == DELETION && record.insert_size().abs() < i64::from(self.lib.max_isize_cutoff) {
            return;
        }

        if record.pos() > self.last_pos {
            self.last_pos_reads.clear();
            self.last_pos = record.pos();
        }

        let hv = pair_hash(record);
        let mate_map = if is_translocation(svt) {
            &mut self.mate_map_tra
        } else {
            &mut self.mate_map
        };
        if is_first_pair_obs(record, &self.last_pos_reads) {
            self.last_pos_reads.insert(seed);
            mate_map.store(hv, record.mapq(), alignment_length(record));
        } else if let Some((mate_qual, alen_mate)) = mate_map.consume(hv) {
            let own = (record.tid(), record.pos());
            let mate = (record.mtid(), record.mpos());
            let ((chr, pos), (chr2, pos2)) = if mate <= own { (mate, own) } else { (own, mate) };
            self.pairs[svt as usize].push(PairRecord {
                chr,
                pos,
                chr2,
                pos2,
                id: hv,
                qual: mate_qual.min(record.mapq()),
                alen: alignment_length(record),
                alen_mate,
                isize: record.insert_size().abs(),
                median: self.lib.median,
                mad: self.lib.mad,
                max_normal_isize: self.lib.max_normal_isize,
                svid: -1,
            });
            self.abnormal_pairs += 1;
        }
    }

    pub fn finish(mut self) -> ScanOutcome {
        sort_junctions(&mut self.read_bp);
        ScanOutcome {
            read_bp: self.read_bp,
            pairs: self.pairs,
            abnormal_pairs: self.abnormal_pairs,
        }
    }
}

/// Stream one alignment file and gather its evidence.
pub fn scan_sample(
    config: &DiscoverConfig,
    valid: &ValidRegions,
    lib: &LibraryParams,
    path: &Path,
) -> Result<ScanOutcome> {
    let mut bam = bam::IndexedReader::from_path(path).map_err(|_| Error::MissingAlignmentIndex {
        path: path.to_owned(),
    })?;
    // CRAM indices carry no per-reference counts, so the skip-empty check
    // only applies to BAM input.
    let is_cram = path.extension().map_or(false, |ext| ext == "cram");
    let mapped_per_tid: Vec<u64> = bam
        .index_stats()?
        .into_iter()
        .filter(|(tid, _, _, _)| *tid >= 0)
        .map(|(_, _, mapped, _)| mapped)
        .collect();

    let n_targets = bam.header().target_count() as i32;
    let mut scanner = SampleScanner::new(config, valid, lib);
    for tid in 0..n_targets {
        if valid.is_empty_ref(tid) {
            continue;
        }
        if !is_cram && mapped_per_tid.get(tid as usize).copied().unwrap_or(0) == 0 {
            continue;
        }
        scanner.begin_reference();
        for &(start, end) in valid.get(tid) {
            bam.fetch((tid, start, end))?;
            for result in bam.records() {
                scanner.process_record(&result?);
            }
        }
    }
    Ok(scanner.finish())
}
