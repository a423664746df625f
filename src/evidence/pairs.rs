// Copyright 2021 svelt developers.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Paired-end classification and mate reconciliation.

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};

use rust_htslib::bam;

use crate::evidence::hash_read_name;
use crate::sv::{DELETION, DUPLICATION, INV_3TO3, INV_5TO5, TRA_BASE};

/// Reference-consuming alignment length of one record.
pub fn alignment_length(record: &bam::Record) -> i32 {
    (record.cigar().end_pos() - record.pos()) as i32
}

/// Relative orientation of an intra-chromosomal mate pair: 0 = expected
/// forward/reverse order, 1 = everted, 2 = both on the forward strand,
/// 3 = both on the reverse strand. Symmetric between the two mates.
pub fn layout(record: &bam::Record) -> u8 {
    if !record.is_reverse() {
        if !record.is_mate_reverse() {
            2
        } else if record.pos() < record.mpos() {
            0
        } else {
            1
        }
    } else if record.is_mate_reverse() {
        3
    } else if record.pos() > record.mpos() {
        0
    } else {
        1
    }
}

/// Orientation sub-index of an inter-chromosomal pair: 0 = 3'-to-3',
/// 1 = 5'-to-5', 2/3 = colinear joins keyed by the strand of the
/// lower-coordinate mate.
pub fn tra_layout(record: &bam::Record) -> u8 {
    let fw = !record.is_reverse();
    let mate_fw = !record.is_mate_reverse();
    match (fw, mate_fw) {
        (true, true) => 0,
        (false, false) => 1,
        _ => {
            let self_lower = (record.tid(), record.pos()) < (record.mtid(), record.mpos());
            let lower_fw = if self_lower { fw } else { mate_fw };
            if lower_fw {
                2
            } else {
                3
            }
        }
    }
}

/// Map a mate pair's geometry onto an SV type, or reject.
///
/// Inter-chromosomal pairs always carry a translocation tag. Same-chromosome
/// pairs qualify only when their insert size exceeds the overall maximum
/// tolerated one; same-position pairs are rejected. Deletion candidates are
/// additionally re-checked against the per-sample cutoff by the scanner.
pub fn classify_pair(record: &bam::Record, overall_max_isize: i64) -> Option<u8> {
    if record.tid() != record.mtid() {
        return Some(TRA_BASE + tra_layout(record));
    }
    if record.pos() == record.mpos() {
        return None;
    }
    if record.insert_size().abs() <= overall_max_isize {
        return None;
    }
    Some(match layout(record) {
        0 => DELETION,
        1 => DUPLICATION,
        2 => INV_3TO3,
        _ => INV_5TO5,
    })
}

/// Hash under which both mates of one pair collide: the read name combined
/// with the pair's two endpoints in canonical order.
pub fn pair_hash(record: &bam::Record) -> u64 {
    let a = (record.tid(), record.pos());
    let b = (record.mtid(), record.mpos());
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    let mut hasher = DefaultHasher::new();
    record.qname().hash(&mut hasher);
    lo.hash(&mut hasher);
    hi.hash(&mut hasher);
    hasher.finish()
}

/// Deterministic first-mate predicate: the lower reference-then-position
/// side of the pair counts as first. For pairs mapped to one position the
/// position-local dedup set breaks the tie.
pub fn is_first_pair_obs(record: &bam::Record, last_pos_reads: &HashSet<u64>) -> bool {
    if record.tid() == record.mtid() {
        record.pos() < record.mpos()
            || (record.pos() == record.mpos()
                && !last_pos_reads.contains(&hash_read_name(record.qname())))
    } else {
        (record.tid(), record.pos()) < (record.mtid(), record.mpos())
    }
}

/// First-mate store of one reconciliation scope, keyed by [`pair_hash`].
///
/// Consuming an entry zeroes its stored quality instead of removing it, so
/// duplicate read ids at identical positions cannot emit a second pair.
#[derive(Debug, Default)]
pub struct MateMap {
    inner: HashMap<u64, (u8, i32)>,
}

impl MateMap {
    pub fn clear(&mut self) {
        self.inner.clear();
    }

    pub fn store(&mut self, key: u64, qual: u8, alen: i32) {
        self.inner.insert(key, (qual, alen));
    }

    pub fn consume(&mut self, key: u64) -> Option<(u8, i32)> {
        match self.inner.get_mut(&key) {
            Some(entry) if entry.0 > 0 => {
                let found = *entry;
                entry.0 = 0;
                Some(found)
            }
            _ => None,
        }
    }
}
