// Copyright 2021 svelt developers.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Split-read junction extraction from per-read alignment operations.

use log::warn;
use rust_htslib::bam;
use rust_htslib::bam::record::Cigar;

use crate::evidence::Junction;

/// Read length in full-read coordinates, hard clips included, so that
/// offsets agree between a soft-clipped primary and a hard-clipped
/// supplementary alignment of the same read.
pub fn read_length(record: &bam::Record) -> i64 {
    record
        .cigar()
        .iter()
        .map(|c| match c {
            Cigar::Match(l)
            | Cigar::Ins(l)
            | Cigar::SoftClip(l)
            | Cigar::HardClip(l)
            | Cigar::Equal(l)
            | Cigar::Diff(l) => i64::from(*l),
            _ => 0,
        })
        .sum()
}

/// Walk one record's CIGAR and append a junction for every internal gap of
/// at least `min_ref_sep` and every clip of at least `min_clip`.
///
/// Internal deletions emit the two junctions bracketing the gap; a leading
/// clip records the offset past the clip with the clipped part on the left
/// of the anchor. Offsets are mirrored onto the original sequencing strand
/// for reverse alignments.
pub fn extract_junctions(
    record: &bam::Record,
    min_ref_sep: u32,
    min_clip: u32,
    out: &mut Vec<Junction>,
) {
    let fw = !record.is_reverse();
    let refidx = record.tid();
    let seqlen = read_length(record);
    let seqpos = |sp: i64| if fw { sp } else { seqlen - sp };

    let mut rp = record.pos();
    let mut sp: i64 = 0;
    for c in record.cigar().iter() {
        match *c {
            Cigar::Match(l) | Cigar::Equal(l) | Cigar::Diff(l) => {
                sp += i64::from(l);
                rp += i64::from(l);
            }
            Cigar::Del(l) => {
                if l >= min_ref_sep {
                    out.push(Junction {
                        fw,
                        scleft: false,
                        refidx,
                        refpos: rp,
                        seqpos: seqpos(sp),
                    });
                }
                rp += i64::from(l);
                if l >= min_ref_sep {
                    out.push(Junction {
                        fw,
                        scleft: true,
                        refidx,
                        refpos: rp,
                        seqpos: seqpos(sp),
                    });
                }
            }
            Cigar::Ins(l) => {
                sp += i64::from(l);
            }
            Cigar::SoftClip(l) | Cigar::HardClip(l) => {
                let mut finalsp = sp;
                let mut scleft = false;
                if sp == 0 {
                    // Leading clip: the anchor starts after it.
                    finalsp += i64::from(l);
                    scleft = true;
                }
                sp += i64::from(l);
                if l >= min_clip {
                    out.push(Junction {
                        fw,
                        scleft,
                        refidx,
                        refpos: rp,
                        seqpos: seqpos(finalsp),
                    });
                }
            }
            Cigar::RefSkip(l) => {
                rp += i64::from(l);
            }
            Cigar::Pad(_) => {
                warn!("unknown CIGAR operation, skipping");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_htslib::bam::record::CigarString;

    fn record(cigar: Vec<Cigar>, pos: i64, reverse: bool) -> bam::Record {
        let read_len: u32 = cigar
            .iter()
            .map(|c| match c {
                Cigar::Match(l) | Cigar::Ins(l) | Cigar::SoftClip(l) => *l,
                _ => 0,
            })
            .sum();
        let seq = vec![b'A'; read_len as usize];
        let qual = vec![30u8; read_len as usize];
        let mut rec = bam::Record::new();
        rec.set(b"read1", Some(&CigarString(cigar)), &seq, &qual);
        rec.set_tid(0);
        rec.set_pos(pos);
        if reverse {
            rec.set_flags(0x10);
        }
        rec
    }

    #[test]
    fn test_deletion_gap_at_threshold() {
        let rec = record(vec![Cigar::Match(10), Cigar::Del(5), Cigar::Match(10)], 100, false);
        let mut out = Vec::new();
        extract_junctions(&rec, 5, 25, &mut out);
        assert_eq!(out.len(), 2);
        assert_eq!((out[0].refpos, out[0].seqpos, out[0].scleft), (110, 10, false));
        assert_eq!((out[1].refpos, out[1].seqpos, out[1].scleft), (115, 10, true));
    }

    #[test]
    fn test_deletion_gap_below_threshold() {
        let rec = record(vec![Cigar::Match(10), Cigar::Del(4), Cigar::Match(10)], 100, false);
        let mut out = Vec::new();
        extract_junctions(&rec, 5, 25, &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn test_leading_clip_offsets_past_clip() {
        let rec = record(vec![Cigar::SoftClip(30), Cigar::Match(70)], 500, false);
        let mut out = Vec::new();
        extract_junctions(&rec, 25, 25, &mut out);
        assert_eq!(out.len(), 1);
        assert!(out[0].scleft);
        assert_eq!(out[0].refpos, 500);
        assert_eq!(out[0].seqpos, 30);
    }

    #[test]
    fn test_clip_below_threshold() {
        let rec = record(vec![Cigar::SoftClip(24), Cigar::Match(76)], 500, false);
        let mut out = Vec::new();
        extract_junctions(&rec, 25, 25, &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn test_trailing_clip() {
        let rec = record(vec![Cigar::Match(70), Cigar::SoftClip(30)], 500, false);
        let mut out = Vec::new();
        extract_junctions(&rec, 25, 25, &mut out);
        assert_eq!(out.len(), 1);
        assert!(!out[0].scleft);
        assert_eq!(out[0].refpos, 570);
        assert_eq!(out[0].seqpos, 70);
    }

    #[test]
    fn test_reverse_strand_mirrors_offset() {
        let rec = record(vec![Cigar::SoftClip(30), Cigar::Match(70)], 500, true);
        let mut out = Vec::new();
        extract_junctions(&rec, 25, 25, &mut out);
        assert_eq!(out.len(), 1);
        assert!(!out[0].fw);
        assert_eq!(out[0].seqpos, 70);
    }

    #[test]
    fn test_hard_clip_counts_like_soft_clip() {
        let rec = record(vec![Cigar::HardClip(40), Cigar::Match(60)], 500, false);
        let mut out = Vec::new();
        extract_junctions(&rec, 25, 25, &mut out);
        assert_eq!(out.len(), 1);
        assert!(out[0].scleft);
        assert_eq!(out[0].seqpos, 40);
    }

    #[test]
    fn test_extraction_deterministic() {
        let rec = record(
            vec![Cigar::SoftClip(30), Cigar::Match(40), Cigar::Del(30), Cigar::Match(30)],
            1000,
            false,
        );
        let mut first = Vec::new();
        extract_junctions(&rec, 25, 25, &mut first);
        let mut second = Vec::new();
        extract_junctions(&rec, 25, 25, &mut second);
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
    }
}
