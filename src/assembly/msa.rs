// Copyright 2021 svelt developers.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Consensus from supporting read sequences.
//!
//! Star alignment against the longest sequence: every other read is aligned
//! semiglobally onto the center and votes per center column; the consensus
//! keeps the majority base of every sufficiently covered column. The result
//! is deterministic for a fixed input order, callers sort their sequences
//! before invoking.

use std::cmp::Reverse;
use std::collections::HashMap;

use bio::alignment::pairwise::Aligner;
use bio::alignment::AlignmentOperation;

const MATCH_SCORE: i32 = 5;
const MISMATCH_SCORE: i32 = -4;
const GAP_OPEN: i32 = -10;
const GAP_EXTEND: i32 = -1;

const GAP_VOTE: u8 = b'-';

/// Majority consensus of at least two sequences; `None` otherwise.
pub fn consensus(seqs: &[Vec<u8>]) -> Option<Vec<u8>> {
    if seqs.len() < 2 {
        return None;
    }
    let center = seqs
        .iter()
        .max_by(|a, b| a.len().cmp(&b.len()).then_with(|| b.cmp(a)))
        .unwrap();

    let mut votes: Vec<HashMap<u8, u32>> = vec![HashMap::new(); center.len()];
    for (column, base) in votes.iter_mut().zip(center.iter()) {
        *column.entry(*base).or_insert(0) += 1;
    }

    let score = |a: u8, b: u8| {
        if a == b {
            MATCH_SCORE
        } else {
            MISMATCH_SCORE
        }
    };
    let mut center_seen = false;
    for seq in seqs {
        if !center_seen && seq == center {
            // The center votes once through its own bases above.
            center_seen = true;
            continue;
        }
        let mut aligner = Aligner::with_capacity(seq.len(), center.len(), GAP_OPEN, GAP_EXTEND, &score);
        let alignment = aligner.semiglobal(seq, center);
        let mut xi = alignment.xstart;
        let mut yj = alignment.ystart;
        for op in &alignment.operations {
            match op {
                AlignmentOperation::Match | AlignmentOperation::Subst => {
                    *votes[yj].entry(seq[xi]).or_insert(0) += 1;
                    xi += 1;
                    yj += 1;
                }
                AlignmentOperation::Ins => {
                    xi += 1;
                }
                AlignmentOperation::Del => {
                    *votes[yj].entry(GAP_VOTE).or_insert(0) += 1;
                    yj += 1;
                }
                AlignmentOperation::Xclip(n) => {
                    xi += n;
                }
                AlignmentOperation::Yclip(n) => {
                    yj += n;
                }
            }
        }
    }

    let total_rows = seqs.len() as u32;
    let mut cons = Vec::with_capacity(center.len());
    for column in &votes {
        let coverage: u32 = column.values().sum();
        if 2 * coverage < total_rows {
            continue;
        }
        let (&winner, _) = column
            .iter()
            .max_by_key(|(base, count)| (**count, Reverse(**base)))
            .unwrap();
        if winner != GAP_VOTE {
            cons.push(winner);
        }
    }
    if cons.is_empty() {
        None
    } else {
        Some(cons)
    }
}
