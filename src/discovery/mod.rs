// Copyright 2021 svelt developers.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Discovery orchestration.
//!
//! One worker thread per sample streams evidence; the shared per-svt sinks
//! sit behind a single mutex that each worker takes exactly once, at the
//! end of its sample, to append pair evidence and run the split-read
//! selectors. Afterwards the split-read pool is clustered per svt, then the
//! paired-end pool, the split-read back-index is rebuilt from the assigned
//! records, assembly refines the split-read candidates, and the two
//! candidate sets are merged into the final call set.

pub mod scan;

use std::sync::Mutex;

use anyhow::Result;
use log::info;
use rust_htslib::bam::{self, Read};

use crate::assembly::{assemble_split_reads, SrStore};
use crate::clustering::{cluster, EvidenceKind};
use crate::config::DiscoverConfig;
use crate::errors::Error;
use crate::estimation::library::{estimate_library, LibraryParams};
use crate::evidence::select::{
    select_deletions, select_duplications, select_insertions, select_inversions,
    select_translocations,
};
use crate::evidence::{PairRecord, SrBamRecord};
use crate::merge::merge_sv_calls;
use crate::regions::{valid_regions, ValidRegions};
use crate::sv::{StructuralVariantRecord, NUM_SVT};

/// Result of one discovery pass.
pub struct Discovery {
    /// Final call set (merged, or PE and SR candidates side by side).
    pub svs: Vec<StructuralVariantRecord>,
    /// Split-read back-index as used by assembly; its ids refer to the
    /// split-read candidate pool before merging renumbers the call set.
    pub sr_store: SrStore,
    pub target_names: Vec<String>,
}

type SharedSinks = (Vec<Vec<PairRecord>>, Vec<Vec<SrBamRecord>>);

/// Paired-end clustering tolerance derived from the per-sample insert-size
/// variability.
fn variability(libs: &[LibraryParams]) -> i64 {
    libs.iter()
        .map(|lib| i64::from(lib.median + 7 * lib.mad))
        .max()
        .unwrap_or(0)
}

/// Run the full discovery pass over all configured samples.
pub fn discover(config: &DiscoverConfig) -> Result<Discovery> {
    if config.bams.is_empty() {
        return Err(Error::EmptySampleSet.into());
    }

    let mut libs = Vec::with_capacity(config.bams.len());
    for path in &config.bams {
        libs.push(estimate_library(path)?);
    }

    let (valid, target_names) = {
        let bam = bam::IndexedReader::from_path(&config.bams[0]).map_err(|_| {
            Error::MissingAlignmentIndex {
                path: config.bams[0].clone(),
            }
        })?;
        let header = bam.header();
        let names = header
            .target_names()
            .iter()
            .map(|name| String::from_utf8_lossy(name).into_owned())
            .collect();
        (valid_regions(config.exclude.as_deref(), header)?, names)
    };

    info!("Paired-end and split-read scanning");
    let (mut pe_pool, mut sr_pool) = scan_samples(config, &valid, &mut libs)?;

    info!("Split-read clustering");
    let mut sr_svs = Vec::new();
    for svt in 0..NUM_SVT {
        if !config.allows(svt as u8) {
            continue;
        }
        cluster(
            &mut sr_pool[svt],
            &mut sr_svs,
            config.max_read_sep,
            svt as u8,
            config.min_cluster_size,
            EvidenceKind::SplitRead,
        );
    }

    info!("Paired-end clustering");
    let varisize = variability(&libs);
    let mut pe_svs = Vec::new();
    for svt in 0..NUM_SVT {
        if !config.allows(svt as u8) {
            continue;
        }
        cluster(
            &mut pe_pool[svt],
            &mut pe_svs,
            varisize,
            svt as u8,
            config.min_cluster_size,
            EvidenceKind::PairedEnd,
        );
    }

    let sr_store = SrStore::from_records(&sr_pool);
    assemble_split_reads(config, &valid, &sr_store, &mut sr_svs)?;

    let total_abnormal: u64 = libs.iter().map(|lib| lib.abnormal_pairs).sum();
    info!(
        "{} PE candidates, {} SR candidates from {} abnormal pairs",
        pe_svs.len(),
        sr_svs.len(),
        total_abnormal
    );

    let svs = if config.merge {
        merge_sv_calls(pe_svs, sr_svs, varisize.max(config.max_read_sep))
    } else {
        let mut svs: Vec<_> = sr_svs.into_iter().chain(pe_svs).collect();
        svs.sort_by_key(|sv| (sv.chr, sv.sv_start, sv.chr2, sv.sv_end, sv.svt));
        for (i, sv) in svs.iter_mut().enumerate() {
            sv.id = i as i32;
        }
        svs
    };

    Ok(Discovery {
        svs,
        sr_store,
        target_names,
    })
}

/// Scan every sample on its own thread, draining each into the shared
/// sinks inside one critical section per sample.
fn scan_samples(
    config: &DiscoverConfig,
    valid: &ValidRegions,
    libs: &mut [LibraryParams],
) -> Result<SharedSinks> {
    let shared: Mutex<SharedSinks> =
        Mutex::new((vec![Vec::new(); NUM_SVT], vec![Vec::new(); NUM_SVT]));

    let abnormal: Result<Vec<u64>> = crossbeam::thread::scope(|scope| {
        let mut handles = Vec::with_capacity(config.bams.len());
        for (path, lib) in config.bams.iter().zip(libs.iter()) {
            let shared = &shared;
            handles.push(scope.spawn(move |_| -> Result<u64> {
                let outcome = scan::scan_sample(config, valid, lib, path)?;
                let mut sinks = shared.lock().unwrap();
                let (pe_sink, sr_sink) = &mut *sinks;
                for (svt, pool) in outcome.pairs.into_iter().enumerate() {
                    pe_sink[svt].extend(pool);
                }
                let min_ref_sep = i64::from(config.min_ref_sep);
                select_deletions(&outcome.read_bp, min_ref_sep, sr_sink);
                select_duplications(&outcome.read_bp, min_ref_sep, sr_sink);
                select_inversions(&outcome.read_bp, min_ref_sep, sr_sink);
                select_insertions(
                    &outcome.read_bp,
                    min_ref_sep,
                    i64::from(config.min_clip),
                    sr_sink,
                );
                select_translocations(&outcome.read_bp, sr_sink);
                Ok(outcome.abnormal_pairs)
            }));
        }
        handles
            .into_iter()
            .map(|handle| handle.join().expect("scan worker panicked"))
            .collect()
    })
    .expect("scan scope panicked");

    for (lib, count) in libs.iter_mut().zip(abnormal?) {
        lib.abnormal_pairs = count;
    }
    Ok(shared.into_inner().unwrap())
}
