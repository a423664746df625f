// Copyright 2021 svelt developers.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Consensus re-anchoring against the reference.
//!
//! A window is cut around each of the SV's two (possibly imprecise)
//! breakpoints, orientation-adjusted per SV type, and the two windows are
//! concatenated into a junction-spanning pseudo-reference. The consensus is
//! aligned semiglobally against it; a successful alignment must cross from
//! the left into the right window with enough aligned bases on both sides,
//! and the columns flanking the crossing re-derive the breakpoints at
//! base-pair precision. Insertions use a single window and locate the
//! junction at the largest consensus-only gap instead.

use bio::alignment::pairwise::Aligner;
use bio::alignment::AlignmentOperation;
use bio::alphabets::dna;

use crate::sv::{StructuralVariantRecord, DELETION, DUPLICATION, INSERTION, INV_3TO3, INV_5TO5};

const MATCH_SCORE: i32 = 5;
const MISMATCH_SCORE: i32 = -4;
const GAP_OPEN: i32 = -10;
const GAP_EXTEND: i32 = -1;

/// Minimum aligned consensus bases on either side of the junction.
const MIN_FLANK: usize = 10;
/// Minimum identity over the aligned consensus columns.
const MIN_QUALITY: f64 = 0.9;

fn window_around(refseq: &[u8], center: i64, w: i64) -> Option<(i64, Vec<u8>)> {
    let start = (center - w).max(0);
    let end = (center + w).min(refseq.len() as i64);
    if end - start < 2 * MIN_FLANK as i64 {
        return None;
    }
    Some((start, refseq[start as usize..end as usize].to_vec()))
}

struct SplitWindows {
    seq: Vec<u8>,
    jmid: usize,
    left_start: i64,
    left_len: i64,
    left_rc: bool,
    right_start: i64,
    right_len: i64,
    right_rc: bool,
}

impl SplitWindows {
    fn col_to_genome(&self, col: usize) -> i64 {
        if col < self.jmid {
            let off = col as i64;
            if self.left_rc {
                self.left_start + self.left_len - 1 - off
            } else {
                self.left_start + off
            }
        } else {
            let off = (col - self.jmid) as i64;
            if self.right_rc {
                self.right_start + self.right_len - 1 - off
            } else {
                self.right_start + off
            }
        }
    }
}

fn split_windows(refseq: &[u8], sv: &StructuralVariantRecord, w: i64) -> Option<SplitWindows> {
    let (start, end) = (sv.sv_start, sv.sv_end);
    let ((left_start, left_seq), left_rc, (right_start, right_seq), right_rc) = match sv.svt {
        DELETION => (
            window_around(refseq, start, w)?,
            false,
            window_around(refseq, end, w)?,
            false,
        ),
        // The duplication junction joins the segment end back to its start.
        DUPLICATION => (
            window_around(refseq, end, w)?,
            false,
            window_around(refseq, start, w)?,
            false,
        ),
        INV_3TO3 => (
            window_around(refseq, start, w)?,
            false,
            window_around(refseq, end, w)?,
            true,
        ),
        INV_5TO5 => (
            window_around(refseq, start, w)?,
            true,
            window_around(refseq, end, w)?,
            false,
        ),
        _ => return None,
    };
    let left_seq = if left_rc {
        dna::revcomp(&left_seq)
    } else {
        left_seq
    };
    let right_seq = if right_rc {
        dna::revcomp(&right_seq)
    } else {
        right_seq
    };
    let jmid = left_seq.len();
    let left_len = left_seq.len() as i64;
    let right_len = right_seq.len() as i64;
    let mut seq = left_seq;
    seq.extend_from_slice(&right_seq);
    Some(SplitWindows {
        seq,
        jmid,
        left_start,
        left_len,
        left_rc,
        right_start,
        right_len,
        right_rc,
    })
}

struct AlignmentWalk {
    matches: usize,
    aligned: usize,
    /// Aligned (consensus, window) column pairs in order.
    columns: Vec<usize>,
    /// Largest consensus-only gap: (preceding column index, run length).
    longest_ins: Option<(usize, usize)>,
}

fn walk(consensus: &[u8], window: &[u8], alignment: &bio::alignment::Alignment) -> AlignmentWalk {
    let mut xi = alignment.xstart;
    let mut yj = alignment.ystart;
    let mut out = AlignmentWalk {
        matches: 0,
        aligned: 0,
        columns: Vec::new(),
        longest_ins: None,
    };
    let mut ins_run = 0usize;
    for op in &alignment.operations {
        match op {
            AlignmentOperation::Match | AlignmentOperation::Subst => {
                if ins_run > 0 {
                    if let Some(&prev) = out.columns.last() {
                        if out.longest_ins.map_or(true, |(_, len)| ins_run > len) {
                            out.longest_ins = Some((prev, ins_run));
                        }
                    }
                    ins_run = 0;
                }
                if consensus[xi].eq_ignore_ascii_case(&window[yj]) {
                    out.matches += 1;
                }
                out.aligned += 1;
                out.columns.push(yj);
                xi += 1;
                yj += 1;
            }
            AlignmentOperation::Ins => {
                ins_run += 1;
                xi += 1;
            }
            AlignmentOperation::Del => {
                ins_run = 0;
                yj += 1;
            }
            AlignmentOperation::Xclip(n) => {
                ins_run = 0;
                xi += n;
            }
            AlignmentOperation::Yclip(n) => {
                ins_run = 0;
                yj += n;
            }
        }
    }
    out
}

fn semiglobal(consensus: &[u8], window: &[u8]) -> bio::alignment::Alignment {
    let score = |a: u8, b: u8| {
        if a.eq_ignore_ascii_case(&b) {
            MATCH_SCORE
        } else {
            MISMATCH_SCORE
        }
    };
    let mut aligner =
        Aligner::with_capacity(consensus.len(), window.len(), GAP_OPEN, GAP_EXTEND, &score);
    aligner.semiglobal(consensus, window)
}

fn realign_insertion(refseq: &[u8], sv: &mut StructuralVariantRecord, w: i64) -> bool {
    let (wstart, wseq) = match window_around(refseq, sv.sv_start, w) {
        Some(found) => found,
        None => return false,
    };
    let alignment = semiglobal(&sv.consensus, &wseq);
    let result = walk(&sv.consensus, &wseq, &alignment);
    let (junction_col, _) = match result.longest_ins {
        Some(found) => found,
        None => return false,
    };
    let left_cols = result.columns.iter().filter(|&&y| y <= junction_col).count();
    let right_cols = result.aligned - left_cols;
    if left_cols < MIN_FLANK || right_cols < MIN_FLANK {
        return false;
    }
    if (result.matches as f64) < MIN_QUALITY * result.aligned as f64 {
        return false;
    }
    sv.sv_start = wstart + junction_col as i64 + 1;
    sv.sv_end = sv.sv_start;
    sv.ci_pos = (0, 0);
    sv.ci_end = (0, 0);
    sv.sr_align_quality = result.matches as f64 / result.aligned as f64;
    true
}

/// Re-anchor `sv.consensus` against the reference. On success the SV's
/// breakpoints, confidence intervals and alignment quality are updated and
/// true is returned; the caller handles failure.
pub fn align_consensus(refseq: &[u8], sv: &mut StructuralVariantRecord, window: i64) -> bool {
    if sv.consensus.is_empty() {
        return false;
    }
    if sv.svt == INSERTION {
        return realign_insertion(refseq, sv, window);
    }
    let windows = match split_windows(refseq, sv, window) {
        Some(found) => found,
        None => return false,
    };
    let consensus = sv.consensus.clone();
    let alignment = semiglobal(&consensus, &windows.seq);
    let result = walk(&consensus, &windows.seq, &alignment);

    // The junction is the alignment's crossing from the left into the
    // right window.
    let crossing = result
        .columns
        .windows(2)
        .find(|pair| pair[0] < windows.jmid && pair[1] >= windows.jmid);
    let (y_left, y_right) = match crossing {
        Some(pair) => (pair[0], pair[1]),
        None => return false,
    };
    let left_cols = result.columns.iter().filter(|&&y| y < windows.jmid).count();
    let right_cols = result.aligned - left_cols;
    if left_cols < MIN_FLANK || right_cols < MIN_FLANK {
        return false;
    }
    if (result.matches as f64) < MIN_QUALITY * result.aligned as f64 {
        return false;
    }

    let left_bp = windows.col_to_genome(y_left);
    let right_bp = windows.col_to_genome(y_right);
    let (sv_start, sv_end) = match sv.svt {
        DELETION => (left_bp + 1, right_bp),
        DUPLICATION => (right_bp, left_bp + 1),
        INV_3TO3 => ((left_bp + 1).min(right_bp + 1), (left_bp + 1).max(right_bp + 1)),
        _ => (left_bp.min(right_bp), left_bp.max(right_bp)),
    };
    if sv_start > sv_end {
        return false;
    }
    sv.sv_start = sv_start;
    sv.sv_end = sv_end;
    sv.ci_pos = (0, 0);
    sv.ci_end = (0, 0);
    sv.sr_align_quality = result.matches as f64 / result.aligned as f64;
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sv::StructuralVariantRecord;

    fn reference() -> Vec<u8> {
        // Deterministic non-repetitive sequence.
        let bases = b"ACGT";
        (0..2000u32)
            .map(|i| bases[((i * 7 + i / 13 + i / 131) % 4) as usize])
            .collect()
    }

    fn sv(svt: u8, start: i64, end: i64) -> StructuralVariantRecord {
        let mut record = StructuralVariantRecord::new(0, svt);
        record.chr = 0;
        record.chr2 = 0;
        record.sv_start = start;
        record.sv_end = end;
        record.sr_support = 3;
        record.precise = true;
        record
    }

    #[test]
    fn test_deletion_breakpoints_refined() {
        let refseq = reference();
        // Cluster-level estimate is a few bases off the true 300/400
        // junction.
        let mut record = sv(DELETION, 303, 405);
        let mut consensus = refseq[270..300].to_vec();
        consensus.extend_from_slice(&refseq[400..430]);
        record.consensus = consensus;
        let window = record.consensus.len() as i64;
        assert!(align_consensus(&refseq, &mut record, window));
        assert_eq!(record.sv_start, 300);
        assert_eq!(record.sv_end, 400);
        assert!(record.sr_align_quality > 0.99);
    }

    #[test]
    fn test_insertion_junction_detected() {
        let refseq = reference();
        let mut record = sv(INSERTION, 500, 502);
        let mut consensus = refseq[470..500].to_vec();
        consensus.extend_from_slice(b"TTAGGCATTAGGCATTAGGCATTAGGCA");
        consensus.extend_from_slice(&refseq[500..530]);
        record.consensus = consensus;
        let window = record.consensus.len() as i64;
        assert!(align_consensus(&refseq, &mut record, window));
        assert_eq!(record.sv_start, 500);
        assert_eq!(record.sv_end, 500);
    }

    #[test]
    fn test_duplication_junction_detected() {
        let refseq = reference();
        // Tandem duplication of [600, 700): the junction joins 699 to 600.
        let mut record = sv(DUPLICATION, 598, 702);
        let mut consensus = refseq[670..700].to_vec();
        consensus.extend_from_slice(&refseq[600..630]);
        record.consensus = consensus;
        let window = record.consensus.len() as i64;
        assert!(align_consensus(&refseq, &mut record, window));
        assert_eq!(record.sv_start, 600);
        assert_eq!(record.sv_end, 700);
    }

    #[test]
    fn test_inversion_junction_detected() {
        let refseq = reference();
        // 3'-to-3' junction: forward flank joined to the reverse complement
        // of the segment end.
        let mut record = sv(INV_3TO3, 800, 900);
        let mut consensus = refseq[770..800].to_vec();
        consensus.extend_from_slice(&dna::revcomp(&refseq[870..900]));
        record.consensus = consensus;
        let window = record.consensus.len() as i64;
        assert!(align_consensus(&refseq, &mut record, window));
        assert_eq!(record.sv_start, 800);
        assert_eq!(record.sv_end, 900);
        assert!(record.sr_align_quality > 0.99);
    }

    #[test]
    fn test_unrelated_consensus_fails() {
        let refseq = reference();
        let mut record = sv(DELETION, 300, 400);
        record.consensus = vec![b'A'; 60];
        assert!(!align_consensus(&refseq, &mut record, 60));
        // The caller clears consensus and support on failure; breakpoints
        // must be untouched here.
        assert_eq!(record.sv_start, 300);
        assert_eq!(record.sv_end, 400);
    }

    #[test]
    fn test_empty_consensus_fails() {
        let refseq = reference();
        let mut record = sv(DELETION, 300, 400);
        assert!(!align_consensus(&refseq, &mut record, 60));
    }
}
