// Copyright 2021 svelt developers.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Split-read assembly and breakpoint refinement.
//!
//! A second streaming pass per reference collects the sequences of reads
//! whose (position, read id) pair resolves in the split-read back-index.
//! Once an SV has gathered its supporting sequences (capped per SV), a
//! consensus is computed and re-anchored against the reference;
//! translocations keep their cluster-level breakpoints.

pub mod msa;
pub mod realign;

use std::collections::HashMap;

use anyhow::Result;
use bio::alphabets::dna;
use log::info;
use rust_htslib::bam::{self, Read};

use crate::config::DiscoverConfig;
use crate::errors::Error;
use crate::evidence::{hash_read_name, SrBamRecord};
use crate::reference::ReferenceBuffer;
use crate::regions::ValidRegions;
use crate::sv::{is_translocation, StructuralVariantRecord, INV_3TO3, INV_5TO5, TRA_BASE};

/// 4-bit nucleotide decoding table; part of the contract with the
/// alignment file format.
pub const NT_DECODE: &[u8; 16] = b"=ACMGRSVTWYHKDBN";

/// Decode a record's 4-bit packed sequence.
pub fn decode_sequence(record: &bam::Record) -> Vec<u8> {
    let seq = record.seq();
    let encoded = seq.encoded;
    (0..record.seq_len())
        .map(|i| {
            let packed = encoded[i / 2];
            let code = if i % 2 == 0 { packed >> 4 } else { packed & 0x0f };
            NT_DECODE[code as usize]
        })
        .collect()
}

/// Orientation-adjust a supporting sequence before storage. `bp_point` is
/// true when the read comes from the SV's second breakpoint (for
/// translocations: the secondary reference; otherwise: beyond the SV
/// start). Only the 3'-to-3' and 5'-to-5' geometries mix strands across
/// the junction.
pub fn adjust_orientation(sequence: &mut Vec<u8>, bp_point: bool, svt: u8) {
    let flip = match svt {
        INV_3TO3 => bp_point,
        INV_5TO5 => !bp_point,
        svt if svt == TRA_BASE => bp_point,
        svt if svt == TRA_BASE + 1 => !bp_point,
        _ => false,
    };
    if flip {
        *sequence = dna::revcomp(sequence.as_slice());
    }
}

/// Split-read back-index: per reference, (position, read id) to SV id.
/// Both endpoints of every assigned record are inserted so that assembly
/// at either breakpoint resolves the same SV.
#[derive(Debug, Default)]
pub struct SrStore {
    pub per_ref: HashMap<i32, HashMap<(i64, u64), i32>>,
}

impl SrStore {
    pub fn from_records(srbr: &[Vec<SrBamRecord>]) -> Self {
        let mut store = SrStore::default();
        for pool in srbr {
            for rec in pool {
                if rec.svid == -1 {
                    continue;
                }
                store
                    .per_ref
                    .entry(rec.chr)
                    .or_default()
                    .insert((rec.pos, rec.id), rec.svid);
                store
                    .per_ref
                    .entry(rec.chr2)
                    .or_default()
                    .insert((rec.pos2, rec.id), rec.svid);
            }
        }
        store
    }

    pub fn is_empty(&self) -> bool {
        self.per_ref.values().all(|m| m.is_empty())
    }
}

/// Supporting sequences gathered per SV, capped at `max_read_per_sv`.
#[derive(Debug)]
pub struct SvSequenceStore {
    seqs: Vec<Vec<Vec<u8>>>,
    done: Vec<bool>,
    cap: usize,
}

impl SvSequenceStore {
    pub fn new(n_svs: usize, cap: usize) -> Self {
        SvSequenceStore {
            seqs: vec![Vec::new(); n_svs],
            done: vec![false; n_svs],
            cap,
        }
    }

    /// Store one sequence unless the SV is finalised or at capacity.
    pub fn add(&mut self, svid: usize, sequence: Vec<u8>) {
        if !self.done[svid] && self.seqs[svid].len() < self.cap {
            self.seqs[svid].push(sequence);
        }
    }

    pub fn count(&self, svid: usize) -> usize {
        self.seqs[svid].len()
    }

    pub fn is_done(&self, svid: usize) -> bool {
        self.done[svid]
    }

    /// Mark the SV finalised and hand out its sequences.
    pub fn finish(&mut self, svid: usize) -> Vec<Vec<u8>> {
        self.done[svid] = true;
        std::mem::take(&mut self.seqs[svid])
    }
}

/// Consensus and re-anchoring for one gathered SV. Translocations skip
/// consensus work; failures demote the candidate to imprecise.
pub fn finalize_sv(sv: &mut StructuralVariantRecord, mut seqs: Vec<Vec<u8>>, refseq: &[u8]) {
    if is_translocation(sv.svt) {
        return;
    }
    if seqs.len() < 2 {
        sv.precise = false;
        return;
    }
    seqs.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    match msa::consensus(&seqs) {
        Some(consensus) => {
            let window = consensus.len() as i64;
            sv.consensus = consensus;
            if !realign::align_consensus(refseq, sv, window) {
                sv.consensus.clear();
                sv.sr_support = 0;
                sv.precise = false;
            }
        }
        None => {
            sv.precise = false;
        }
    }
}

/// Second pass over all samples: gather supporting sequences per SV and
/// refine every split-read candidate.
pub fn assemble_split_reads(
    config: &DiscoverConfig,
    valid: &ValidRegions,
    sr_store: &SrStore,
    svs: &mut [StructuralVariantRecord],
) -> Result<()> {
    if svs.is_empty() || sr_store.is_empty() {
        return Ok(());
    }
    info!("Split-read assembly");
    let reference = ReferenceBuffer::new(&config.genome, 2)?;

    let mut readers = Vec::with_capacity(config.bams.len());
    for path in &config.bams {
        readers.push(bam::IndexedReader::from_path(path).map_err(|_| {
            Error::MissingAlignmentIndex {
                path: path.to_owned(),
            }
        })?);
    }
    let header = readers[0].header().clone();
    let target_names: Vec<String> = header
        .target_names()
        .iter()
        .map(|name| String::from_utf8_lossy(name).into_owned())
        .collect();

    let mut store = SvSequenceStore::new(svs.len(), config.max_read_per_sv);

    for tid in 0..header.target_count() as i32 {
        if valid.is_empty_ref(tid) {
            continue;
        }
        let positions = match sr_store.per_ref.get(&tid) {
            Some(positions) if !positions.is_empty() => positions,
            _ => continue,
        };

        // Bitset of known split-read positions on this reference.
        let target_len = header.target_len(tid as u32).unwrap_or(0) as usize;
        let mut hits = vec![false; target_len];
        for (pos, _) in positions.keys() {
            if (*pos as usize) < target_len {
                hits[*pos as usize] = true;
            }
        }

        for reader in readers.iter_mut() {
            for &(start, end) in valid.get(tid) {
                reader.fetch((tid, start, end))?;
                for result in reader.records() {
                    let record = result?;
                    if record.is_quality_check_failed()
                        || record.is_duplicate()
                        || record.is_unmapped()
                        || record.is_secondary()
                        || record.is_supplementary()
                    {
                        continue;
                    }
                    if record.mapq() < config.min_map_qual || record.tid() < 0 {
                        continue;
                    }
                    let pos = record.pos();
                    if pos < 0 || pos as usize >= target_len || !hits[pos as usize] {
                        continue;
                    }
                    let seed = hash_read_name(record.qname());
                    let svid = match positions.get(&(pos, seed)) {
                        Some(&svid) => svid as usize,
                        None => continue,
                    };
                    if store.is_done(svid) || store.count(svid) >= config.max_read_per_sv {
                        continue;
                    }
                    let mut sequence = decode_sequence(&record);
                    let sv = &svs[svid];
                    let bp_point = if is_translocation(sv.svt) {
                        record.tid() == sv.chr2
                    } else {
                        record.pos() > sv.sv_start
                    };
                    adjust_orientation(&mut sequence, bp_point, sv.svt);
                    store.add(svid, sequence);
                }

                // Finalise every SV whose support is fully gathered.
                for svid in 0..svs.len() {
                    let complete = !store.is_done(svid)
                        && (store.count(svid) == config.max_read_per_sv
                            || store.count(svid) == svs[svid].sr_support as usize);
                    if complete {
                        let seqs = store.finish(svid);
                        let chrom = &target_names[svs[svid].chr as usize];
                        let refseq = reference.seq(chrom)?;
                        finalize_sv(&mut svs[svid], seqs, &refseq);
                    }
                }
            }
        }
    }

    // SVs whose reads never fully materialised are finalised with whatever
    // was gathered, keeping the precision invariant crate-wide.
    for svid in 0..svs.len() {
        if !store.is_done(svid) {
            let seqs = store.finish(svid);
            let chrom = &target_names[svs[svid].chr as usize];
            let refseq = reference.seq(chrom)?;
            finalize_sv(&mut svs[svid], seqs, &refseq);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sv::DELETION;
    use rust_htslib::bam::record::{Cigar, CigarString};

    #[test]
    fn test_decode_sequence_round_trips() {
        let mut record = bam::Record::new();
        let seq = b"ACGTNACGTTGCA";
        let qual = vec![30u8; seq.len()];
        let cigar = CigarString(vec![Cigar::Match(seq.len() as u32)]);
        record.set(b"read1", Some(&cigar), seq, &qual);
        assert_eq!(decode_sequence(&record), seq.to_vec());
    }

    #[test]
    fn test_adjust_orientation_per_type() {
        let original = b"AACCGGTT".to_vec();
        let mut seq = original.clone();
        adjust_orientation(&mut seq, true, DELETION);
        assert_eq!(seq, original);

        let mut seq = original.clone();
        adjust_orientation(&mut seq, true, INV_3TO3);
        assert_eq!(seq, dna::revcomp(&original));
        let mut seq = original.clone();
        adjust_orientation(&mut seq, false, INV_3TO3);
        assert_eq!(seq, original);

        let mut seq = original.clone();
        adjust_orientation(&mut seq, false, INV_5TO5);
        assert_eq!(seq, dna::revcomp(&original));
    }

    #[test]
    fn test_sequence_store_cap() {
        let mut store = SvSequenceStore::new(1, 20);
        for _ in 0..30 {
            store.add(0, b"ACGT".to_vec());
        }
        assert_eq!(store.count(0), 20);
        let seqs = store.finish(0);
        assert_eq!(seqs.len(), 20);
        // Finalised SVs accept nothing further.
        store.add(0, b"ACGT".to_vec());
        assert_eq!(store.count(0), 0);
    }

    #[test]
    fn test_sr_store_indexes_both_endpoints() {
        let mut rec = SrBamRecord::new(0, 1000, 0, 1500, 77, DELETION);
        rec.svid = 3;
        let mut unassigned = SrBamRecord::new(0, 4000, 0, 4500, 78, DELETION);
        unassigned.svid = -1;
        let store = SrStore::from_records(&[vec![rec, unassigned]]);
        let positions = &store.per_ref[&0];
        assert_eq!(positions.get(&(1000, 77)), Some(&3));
        assert_eq!(positions.get(&(1500, 77)), Some(&3));
        assert!(positions.get(&(4000, 78)).is_none());
        assert_eq!(positions.len(), 2);
    }

    #[test]
    fn test_finalize_translocation_keeps_breakpoints() {
        let mut sv = StructuralVariantRecord::new(0, TRA_BASE + 2);
        sv.chr = 0;
        sv.chr2 = 1;
        sv.sv_start = 5000;
        sv.sv_end = 9000;
        sv.sr_support = 2;
        sv.precise = false;
        let seqs = vec![b"ACGTACGT".to_vec(), b"ACGTACGT".to_vec()];
        finalize_sv(&mut sv, seqs, b"ACGT");
        assert!(sv.consensus.is_empty());
        assert_eq!((sv.sv_start, sv.sv_end), (5000, 9000));
        assert_eq!(sv.sr_support, 2);
    }

    #[test]
    fn test_finalize_single_sequence_demotes() {
        let mut sv = StructuralVariantRecord::new(0, DELETION);
        sv.chr = 0;
        sv.chr2 = 0;
        sv.sv_start = 300;
        sv.sv_end = 400;
        sv.sr_support = 2;
        sv.precise = true;
        finalize_sv(&mut sv, vec![b"ACGTACGT".to_vec()], b"ACGT");
        assert!(!sv.precise);
        assert!(sv.consensus.is_empty());
    }

    #[test]
    fn test_finalize_failure_clears_support() {
        let mut sv = StructuralVariantRecord::new(0, DELETION);
        sv.chr = 0;
        sv.chr2 = 0;
        sv.sv_start = 50;
        sv.sv_end = 90;
        sv.sr_support = 2;
        sv.precise = true;
        // Reference far too short for any junction window.
        let seqs = vec![vec![b'A'; 60], vec![b'A'; 60]];
        finalize_sv(&mut sv, seqs, b"ACGTACGT");
        assert!(!sv.precise);
        assert_eq!(sv.sr_support, 0);
        assert!(sv.consensus.is_empty());
    }
}
