// Copyright 2021 svelt developers.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Split-read breakpoint selection.
//!
//! After a sample's junctions are gathered, each read's junction list is
//! sorted by read offset and five selectors derive breakpoint-pair records,
//! one selector per SV family. Only adjacent junctions in offset order are
//! paired: the two sides of one junction event are consecutive on the read,
//! and skipping over an intervening junction would combine breakpoints of
//! different events. For such a pair the clip-side pattern encodes the
//! geometry: a right clip followed by a left clip is a colinear jump
//! (deletion when the jump moves forward on the reference, duplication when
//! it moves backward, insertion when it barely moves but skips read
//! sequence); equal clip sides on opposite strands are an inversion;
//! junctions on two references are a translocation.

use crate::evidence::{ReadJunctions, SrBamRecord};
use crate::sv::{DELETION, DUPLICATION, INSERTION, INV_3TO3, INV_5TO5, TRA_BASE};

/// Order every junction list by read offset (ties by reference coordinate).
pub fn sort_junctions(read_bp: &mut ReadJunctions) {
    for list in read_bp.values_mut() {
        list.sort_by_key(|j| (j.seqpos, j.refidx, j.refpos));
    }
}

fn junction_pairs<F>(read_bp: &ReadJunctions, mut f: F)
where
    F: FnMut(u64, &crate::evidence::Junction, &crate::evidence::Junction),
{
    for (seed, list) in read_bp {
        for pair in list.windows(2) {
            f(*seed, &pair[0], &pair[1]);
        }
    }
}

pub fn select_deletions(
    read_bp: &ReadJunctions,
    min_ref_sep: i64,
    srbr: &mut Vec<Vec<SrBamRecord>>,
) {
    junction_pairs(read_bp, |seed, a, b| {
        if a.refidx == b.refidx && a.fw == b.fw && !a.scleft && b.scleft {
            let gap = b.refpos - a.refpos;
            if gap >= min_ref_sep {
                srbr[DELETION as usize].push(SrBamRecord::new(
                    a.refidx, a.refpos, b.refidx, b.refpos, seed, DELETION,
                ));
            }
        }
    });
}

pub fn select_duplications(
    read_bp: &ReadJunctions,
    min_ref_sep: i64,
    srbr: &mut Vec<Vec<SrBamRecord>>,
) {
    junction_pairs(read_bp, |seed, a, b| {
        if a.refidx != b.refidx || a.fw != b.fw {
            return;
        }
        // The read either jumps backward on the reference or anchors the
        // right segment first.
        let backward = !a.scleft && b.scleft && a.refpos - b.refpos >= min_ref_sep;
        let right_first = a.scleft && !b.scleft && b.refpos - a.refpos >= min_ref_sep;
        if backward || right_first {
            srbr[DUPLICATION as usize].push(SrBamRecord::new(
                a.refidx,
                a.refpos,
                b.refidx,
                b.refpos,
                seed,
                DUPLICATION,
            ));
        }
    });
}

pub fn select_inversions(
    read_bp: &ReadJunctions,
    min_ref_sep: i64,
    srbr: &mut Vec<Vec<SrBamRecord>>,
) {
    junction_pairs(read_bp, |seed, a, b| {
        if a.refidx == b.refidx
            && a.fw != b.fw
            && a.scleft == b.scleft
            && (b.refpos - a.refpos).abs() >= min_ref_sep
        {
            let svt = if !a.scleft { INV_3TO3 } else { INV_5TO5 };
            srbr[svt as usize].push(SrBamRecord::new(
                a.refidx, a.refpos, b.refidx, b.refpos, seed, svt,
            ));
        }
    });
}

pub fn select_insertions(
    read_bp: &ReadJunctions,
    min_ref_sep: i64,
    min_clip: i64,
    srbr: &mut Vec<Vec<SrBamRecord>>,
) {
    junction_pairs(read_bp, |seed, a, b| {
        if a.refidx == b.refidx
            && a.fw == b.fw
            && !a.scleft
            && b.scleft
            && (b.refpos - a.refpos).abs() < min_ref_sep
            && b.seqpos - a.seqpos >= min_clip
        {
            srbr[INSERTION as usize].push(SrBamRecord::new(
                a.refidx, a.refpos, b.refidx, b.refpos, seed, INSERTION,
            ));
        }
    });
}

pub fn select_translocations(read_bp: &ReadJunctions, srbr: &mut Vec<Vec<SrBamRecord>>) {
    junction_pairs(read_bp, |seed, a, b| {
        if a.refidx == b.refidx {
            return;
        }
        let (lo, hi) = if (a.refidx, a.refpos) <= (b.refidx, b.refpos) {
            (a, b)
        } else {
            (b, a)
        };
        let sub = match (lo.scleft, hi.scleft) {
            (false, false) => 0,
            (true, true) => 1,
            (false, true) => 2,
            (true, false) => 3,
        };
        let svt = TRA_BASE + sub;
        srbr[svt as usize].push(SrBamRecord::new(
            lo.refidx, lo.refpos, hi.refidx, hi.refpos, seed, svt,
        ));
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evidence::Junction;
    use crate::sv::NUM_SVT;

    fn junction(fw: bool, scleft: bool, refidx: i32, refpos: i64, seqpos: i64) -> Junction {
        Junction {
            fw,
            scleft,
            refidx,
            refpos,
            seqpos,
        }
    }

    fn read_bp(junctions: Vec<Junction>) -> ReadJunctions {
        let mut map = ReadJunctions::new();
        map.insert(42, junctions);
        sort_junctions(&mut map);
        map
    }

    fn sinks() -> Vec<Vec<SrBamRecord>> {
        vec![Vec::new(); NUM_SVT]
    }

    #[test]
    fn test_deletion_split() {
        let bp = read_bp(vec![
            junction(true, false, 0, 1000, 50),
            junction(true, true, 0, 1500, 50),
        ]);
        let mut srbr = sinks();
        select_deletions(&bp, 25, &mut srbr);
        assert_eq!(srbr[DELETION as usize].len(), 1);
        let rec = &srbr[DELETION as usize][0];
        assert_eq!((rec.pos, rec.pos2), (1000, 1500));
        assert_eq!(rec.svid, -1);
    }

    #[test]
    fn test_deletion_gap_too_small() {
        let bp = read_bp(vec![
            junction(true, false, 0, 1000, 50),
            junction(true, true, 0, 1020, 50),
        ]);
        let mut srbr = sinks();
        select_deletions(&bp, 25, &mut srbr);
        assert!(srbr[DELETION as usize].is_empty());
    }

    #[test]
    fn test_duplication_right_anchor_first() {
        let bp = read_bp(vec![
            junction(true, true, 0, 1000, 50),
            junction(true, false, 0, 1500, 50),
        ]);
        let mut srbr = sinks();
        select_duplications(&bp, 25, &mut srbr);
        assert_eq!(srbr[DUPLICATION as usize].len(), 1);
        let rec = &srbr[DUPLICATION as usize][0];
        assert_eq!((rec.pos, rec.pos2), (1000, 1500));
    }

    #[test]
    fn test_inversion_clip_sides() {
        let bp = read_bp(vec![
            junction(true, false, 0, 1000, 50),
            junction(false, false, 0, 1500, 50),
        ]);
        let mut srbr = sinks();
        select_inversions(&bp, 25, &mut srbr);
        assert_eq!(srbr[INV_3TO3 as usize].len(), 1);
        assert!(srbr[INV_5TO5 as usize].is_empty());

        let bp = read_bp(vec![
            junction(true, true, 0, 1000, 50),
            junction(false, true, 0, 1500, 50),
        ]);
        let mut srbr = sinks();
        select_inversions(&bp, 25, &mut srbr);
        assert_eq!(srbr[INV_5TO5 as usize].len(), 1);
    }

    #[test]
    fn test_insertion_needs_sequence_gap() {
        let bp = read_bp(vec![
            junction(true, false, 0, 1000, 40),
            junction(true, true, 0, 1002, 100),
        ]);
        let mut srbr = sinks();
        select_insertions(&bp, 25, 25, &mut srbr);
        assert_eq!(srbr[INSERTION as usize].len(), 1);

        // Small sequence gap: colinear junction pair, not an insertion.
        let bp = read_bp(vec![
            junction(true, false, 0, 1000, 40),
            junction(true, true, 0, 1002, 50),
        ]);
        let mut srbr = sinks();
        select_insertions(&bp, 25, 25, &mut srbr);
        assert!(srbr[INSERTION as usize].is_empty());
    }

    #[test]
    fn test_translocation_orientation_subindex() {
        let bp = read_bp(vec![
            junction(true, false, 0, 5000, 50),
            junction(true, true, 1, 9000, 50),
        ]);
        let mut srbr = sinks();
        select_translocations(&bp, &mut srbr);
        let svt = TRA_BASE + 2;
        assert_eq!(srbr[svt as usize].len(), 1);
        let rec = &srbr[svt as usize][0];
        assert_eq!((rec.chr, rec.pos, rec.chr2, rec.pos2), (0, 5000, 1, 9000));

        let bp = read_bp(vec![
            junction(true, false, 1, 9000, 50),
            junction(false, false, 0, 5000, 50),
        ]);
        let mut srbr = sinks();
        select_translocations(&bp, &mut srbr);
        assert_eq!(srbr[TRA_BASE as usize].len(), 1);
    }

    #[test]
    fn test_non_adjacent_junctions_not_paired() {
        // A deletion's bracketing pair plus an unrelated trailing clip
        // further along the read: only the adjacent pair may pair up, even
        // though the outer junctions also face each other across a large
        // gap.
        let bp = read_bp(vec![
            junction(true, false, 0, 1000, 50),
            junction(true, true, 0, 1500, 50),
            junction(true, true, 0, 3000, 110),
        ]);
        let mut srbr = sinks();
        select_deletions(&bp, 25, &mut srbr);
        assert_eq!(srbr[DELETION as usize].len(), 1);
        let rec = &srbr[DELETION as usize][0];
        assert_eq!((rec.pos, rec.pos2), (1000, 1500));
    }

    #[test]
    fn test_lone_junction_yields_nothing() {
        let bp = read_bp(vec![junction(true, true, 0, 1000, 30)]);
        let mut srbr = sinks();
        select_deletions(&bp, 25, &mut srbr);
        select_duplications(&bp, 25, &mut srbr);
        select_inversions(&bp, 25, &mut srbr);
        select_insertions(&bp, 25, 25, &mut srbr);
        select_translocations(&bp, &mut srbr);
        assert!(srbr.iter().all(|v| v.is_empty()));
    }
}
