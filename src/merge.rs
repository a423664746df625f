// Copyright 2021 svelt developers.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Post-processing of the two candidate sets.
//!
//! Paired-end candidates whose breakpoints agree with a split-read
//! candidate of the same type within the wiggle are absorbed into it,
//! combining support counts. Afterwards support-less leftovers and
//! unresolved precise calls are pruned and near-duplicate precise calls
//! within a small window are suppressed. The whole step is optional; with
//! it disabled the two candidate sets are emitted side by side.

use crate::sv::StructuralVariantRecord;

/// Window for suppressing near-duplicate precise calls.
const DUP_WINDOW: i64 = 10;

pub fn merge_sv_calls(
    pe_svs: Vec<StructuralVariantRecord>,
    mut sr_svs: Vec<StructuralVariantRecord>,
    wiggle: i64,
) -> Vec<StructuralVariantRecord> {
    let mut unmatched = Vec::new();
    for pe_sv in pe_svs {
        let mut best: Option<(usize, i64)> = None;
        for (i, sr_sv) in sr_svs.iter().enumerate() {
            if sr_sv.svt != pe_sv.svt || sr_sv.chr != pe_sv.chr || sr_sv.chr2 != pe_sv.chr2 {
                continue;
            }
            let start_delta = (sr_sv.sv_start - pe_sv.sv_start).abs();
            let end_delta = (sr_sv.sv_end - pe_sv.sv_end).abs();
            if start_delta > wiggle || end_delta > wiggle {
                continue;
            }
            let delta = start_delta + end_delta;
            if best.map_or(true, |(_, best_delta)| delta < best_delta) {
                best = Some((i, delta));
            }
        }
        match best {
            Some((i, _)) => {
                sr_svs[i].pe_support += pe_sv.pe_support;
                if !sr_svs[i].precise {
                    sr_svs[i].ci_pos = pe_sv.ci_pos;
                    sr_svs[i].ci_end = pe_sv.ci_end;
                }
            }
            None => unmatched.push(pe_sv),
        }
    }

    let mut all: Vec<_> = sr_svs.into_iter().chain(unmatched).collect();
    all.retain(|sv| {
        if sv.precise && sv.sr_align_quality == 0.0 {
            // Unresolved soft clips.
            return false;
        }
        sv.pe_support > 0 || sv.sr_support > 0
    });
    all.sort_by_key(|sv| (sv.chr, sv.sv_start, sv.chr2, sv.sv_end, sv.svt));

    let mut kept: Vec<StructuralVariantRecord> = Vec::new();
    for sv in all {
        let duplicate = sv.precise
            && kept.iter().any(|other| {
                other.svt == sv.svt
                    && other.chr == sv.chr
                    && other.chr2 == sv.chr2
                    && (other.sv_start - sv.sv_start).abs() + (other.sv_end - sv.sv_end).abs()
                        < DUP_WINDOW
                    && sv.sv_start <= other.sv_end
                    && other.sv_start <= sv.sv_end
            });
        if !duplicate {
            kept.push(sv);
        }
    }
    for (i, sv) in kept.iter_mut().enumerate() {
        sv.id = i as i32;
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sv::{StructuralVariantRecord, DELETION, TRA_BASE};

    fn pe_sv(start: i64, end: i64, support: u32) -> StructuralVariantRecord {
        let mut sv = StructuralVariantRecord::new(0, DELETION);
        sv.chr = 0;
        sv.chr2 = 0;
        sv.sv_start = start;
        sv.sv_end = end;
        sv.pe_support = support;
        sv
    }

    fn sr_sv(start: i64, end: i64, support: u32) -> StructuralVariantRecord {
        let mut sv = StructuralVariantRecord::new(0, DELETION);
        sv.chr = 0;
        sv.chr2 = 0;
        sv.sv_start = start;
        sv.sv_end = end;
        sv.sr_support = support;
        sv.precise = true;
        sv.sr_align_quality = 1.0;
        sv.consensus = b"ACGTACGTACGT".to_vec();
        sv
    }

    #[test]
    fn test_pe_absorbed_into_agreeing_sr() {
        let pe = vec![pe_sv(980, 1520, 5)];
        let sr = vec![sr_sv(1000, 1500, 3)];
        let merged = merge_sv_calls(pe, sr, 100);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].pe_support, 5);
        assert_eq!(merged[0].sr_support, 3);
        assert!(merged[0].precise);
        assert!(!merged[0].consensus.is_empty());
    }

    #[test]
    fn test_disagreeing_pe_kept_separately() {
        let pe = vec![pe_sv(5000, 9000, 4)];
        let sr = vec![sr_sv(1000, 1500, 3)];
        let merged = merge_sv_calls(pe, sr, 100);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_near_duplicate_precise_suppressed() {
        let sr = vec![sr_sv(1000, 1500, 3), sr_sv(1003, 1502, 2)];
        let merged = merge_sv_calls(Vec::new(), sr, 100);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].sv_start, 1000);
    }

    #[test]
    fn test_unresolved_precise_dropped() {
        let mut unresolved = sr_sv(1000, 1500, 3);
        unresolved.sr_align_quality = 0.0;
        let merged = merge_sv_calls(Vec::new(), vec![unresolved], 100);
        assert!(merged.is_empty());
    }

    #[test]
    fn test_supportless_record_dropped() {
        let mut failed = sr_sv(1000, 1500, 0);
        failed.precise = false;
        failed.sr_align_quality = 0.0;
        failed.consensus.clear();
        let merged = merge_sv_calls(Vec::new(), vec![failed], 100);
        assert!(merged.is_empty());
    }

    #[test]
    fn test_imprecise_translocation_survives() {
        let mut tra = StructuralVariantRecord::new(0, TRA_BASE + 2);
        tra.chr = 0;
        tra.chr2 = 1;
        tra.sv_start = 5000;
        tra.sv_end = 9000;
        tra.sr_support = 2;
        tra.precise = false;
        let mut pe_tra = StructuralVariantRecord::new(0, TRA_BASE + 2);
        pe_tra.chr = 0;
        pe_tra.chr2 = 1;
        pe_tra.sv_start = 5010;
        pe_tra.sv_end = 8990;
        pe_tra.pe_support = 4;
        let merged = merge_sv_calls(vec![pe_tra], vec![tra], 100);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].pe_support, 4);
        assert_eq!(merged[0].sr_support, 2);
        assert!(!merged[0].precise);
    }

    #[test]
    fn test_ids_reassigned_in_order() {
        let sr = vec![sr_sv(5000, 5500, 2), sr_sv(1000, 1500, 3)];
        let merged = merge_sv_calls(Vec::new(), sr, 100);
        assert_eq!(merged[0].id, 0);
        assert_eq!(merged[0].sv_start, 1000);
        assert_eq!(merged[1].id, 1);
    }
}
