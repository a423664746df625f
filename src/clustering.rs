// Copyright 2021 svelt developers.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Proximity clustering of breakpoint-pair evidence.
//!
//! Records of one SV type are sorted by (chr, pos, id) and joined by a
//! union-find right sweep: two records connect when both breakpoints agree
//! within the tolerance. Connected components meeting the support threshold
//! become SV candidates and write their id back into every member.

use crate::evidence::{PairRecord, SrBamRecord};
use crate::sv::{is_translocation, StructuralVariantRecord};

/// Breakpoint-pair evidence that can be clustered into SV candidates.
pub trait Evidence {
    fn chr(&self) -> i32;
    fn pos(&self) -> i64;
    fn chr2(&self) -> i32;
    fn pos2(&self) -> i64;
    fn id(&self) -> u64;
    fn set_svid(&mut self, svid: i32);
}

impl Evidence for SrBamRecord {
    fn chr(&self) -> i32 {
        self.chr
    }
    fn pos(&self) -> i64 {
        self.pos
    }
    fn chr2(&self) -> i32 {
        self.chr2
    }
    fn pos2(&self) -> i64 {
        self.pos2
    }
    fn id(&self) -> u64 {
        self.id
    }
    fn set_svid(&mut self, svid: i32) {
        self.svid = svid;
    }
}

impl Evidence for PairRecord {
    fn chr(&self) -> i32 {
        self.chr
    }
    fn pos(&self) -> i64 {
        self.pos
    }
    fn chr2(&self) -> i32 {
        self.chr2
    }
    fn pos2(&self) -> i64 {
        self.pos2
    }
    fn id(&self) -> u64 {
        self.id
    }
    fn set_svid(&mut self, svid: i32) {
        self.svid = svid;
    }
}

/// Which evidence stream a cluster pool holds; decides the support counter
/// and the initial precision of the emitted candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvidenceKind {
    PairedEnd,
    SplitRead,
}

struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        UnionFind {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, i: usize) -> usize {
        let mut root = i;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut cur = i;
        while self.parent[cur] != root {
            let next = self.parent[cur];
            self.parent[cur] = root;
            cur = next;
        }
        root
    }

    fn union(&mut self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            // Anchor on the smaller index to keep component order stable.
            let (lo, hi) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[hi] = lo;
        }
    }
}

/// Cluster one svt's records, appending accepted candidates to `svs`.
pub fn cluster<E: Evidence>(
    records: &mut [E],
    svs: &mut Vec<StructuralVariantRecord>,
    tolerance: i64,
    svt: u8,
    min_support: usize,
    kind: EvidenceKind,
) {
    if records.is_empty() {
        return;
    }
    records.sort_by_key(|r| (r.chr(), r.pos(), r.id()));

    let n = records.len();
    let mut components = UnionFind::new(n);
    for i in 0..n {
        for j in i + 1..n {
            if records[j].chr() != records[i].chr()
                || records[j].pos() - records[i].pos() > tolerance
            {
                break;
            }
            if records[j].chr2() == records[i].chr2()
                && (records[j].pos2() - records[i].pos2()).abs() <= tolerance
            {
                components.union(i, j);
            }
        }
    }

    // Members per component root, in sort order.
    let mut member_lists: Vec<(usize, Vec<usize>)> = Vec::new();
    for i in 0..n {
        let root = components.find(i);
        match member_lists.iter_mut().find(|(r, _)| *r == root) {
            Some((_, members)) => members.push(i),
            None => member_lists.push((root, vec![i])),
        }
    }

    for (_, members) in member_lists {
        if members.len() < min_support {
            continue;
        }
        let id = svs.len() as i32;
        let mut sv = StructuralVariantRecord::new(id, svt);
        sv.chr = records[members[0]].chr();
        sv.chr2 = records[members[0]].chr2();
        sv.sv_start = members.iter().map(|&i| records[i].pos()).min().unwrap();
        sv.sv_end = members.iter().map(|&i| records[i].pos2()).max().unwrap();
        let start_spread = members.iter().map(|&i| records[i].pos()).max().unwrap() - sv.sv_start;
        let end_spread = sv.sv_end - members.iter().map(|&i| records[i].pos2()).min().unwrap();
        sv.ci_pos = (0, start_spread);
        sv.ci_end = (-end_spread, 0);
        match kind {
            EvidenceKind::PairedEnd => {
                sv.pe_support = members.len() as u32;
                sv.precise = false;
            }
            EvidenceKind::SplitRead => {
                sv.sr_support = members.len() as u32;
                // Translocation consensus work is skipped downstream, so
                // those candidates can never become base-pair precise.
                sv.precise = !is_translocation(svt);
            }
        }
        for &i in &members {
            records[i].set_svid(id);
        }
        svs.push(sv);
    }
}
