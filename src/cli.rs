// Copyright 2021 svelt developers.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::Result;
use structopt::StructOpt;

use crate::config::DiscoverConfig;
use crate::discovery::discover;
use crate::errors::Error;
use crate::output::write_svs;
use crate::sv::{DELETION, DUPLICATION, INSERTION, INV_3TO3, INV_5TO5, TRA_BASE};

#[derive(Debug, StructOpt)]
#[structopt(
    name = "svelt",
    about = "Structural variant discovery by integrated paired-end mapping and split-read analysis.",
    setting = structopt::clap::AppSettings::ColoredHelp,
)]
pub enum Svelt {
    #[structopt(
        name = "discover",
        about = "Discover structural variants in one or more samples.",
        setting = structopt::clap::AppSettings::ColoredHelp,
    )]
    Discover {
        #[structopt(
            long,
            short = "g",
            parse(from_os_str),
            help = "Reference genome (FASTA, indexed with samtools faidx)."
        )]
        genome: PathBuf,
        #[structopt(
            long,
            short = "x",
            parse(from_os_str),
            help = "BED file with regions to exclude from scanning."
        )]
        exclude: Option<PathBuf>,
        #[structopt(
            long,
            short = "o",
            parse(from_os_str),
            help = "Output table (stdout if omitted)."
        )]
        outfile: Option<PathBuf>,
        #[structopt(long, default_value = "1", help = "Minimum mapping quality.")]
        min_map_qual: u8,
        #[structopt(
            long,
            default_value = "20",
            help = "Minimum mapping quality for translocation pairs."
        )]
        min_tra_qual: u8,
        #[structopt(
            long,
            default_value = "25",
            help = "Minimum clip length yielding a split-read junction."
        )]
        min_clip: u32,
        #[structopt(
            long,
            default_value = "25",
            help = "Minimum reference gap treated as an SV signal."
        )]
        min_ref_sep: u32,
        #[structopt(
            long,
            default_value = "40",
            help = "Split-read clustering tolerance in bp."
        )]
        max_read_sep: i64,
        #[structopt(
            long,
            default_value = "2",
            help = "Minimum supporting evidence per SV candidate."
        )]
        min_support: usize,
        #[structopt(
            long,
            short = "t",
            default_value = "ALL",
            help = "SV types to discover, comma separated (DEL,DUP,INV,INS,BND or ALL)."
        )]
        svtypes: String,
        #[structopt(long, help = "Emit PE and SR candidates without merging.")]
        no_merge: bool,
        #[structopt(
            parse(from_os_str),
            required = true,
            help = "Position-sorted, indexed alignment files, one per sample."
        )]
        input: Vec<PathBuf>,
    },
}

/// Parse the type allow-list; `None` means everything is admitted.
pub fn parse_svtypes(selection: &str) -> Result<Option<HashSet<u8>>> {
    let mut allowed = HashSet::new();
    for name in selection.split(',') {
        let name = name.trim();
        match name.to_ascii_uppercase().as_str() {
            "ALL" => return Ok(None),
            "DEL" => {
                allowed.insert(DELETION);
            }
            "DUP" => {
                allowed.insert(DUPLICATION);
            }
            "INV" => {
                allowed.insert(INV_3TO3);
                allowed.insert(INV_5TO5);
            }
            "INS" => {
                allowed.insert(INSERTION);
            }
            "BND" => {
                for sub in 0..4 {
                    allowed.insert(TRA_BASE + sub);
                }
            }
            _ => {
                return Err(Error::InvalidSvTypeSelector {
                    name: name.to_owned(),
                }
                .into())
            }
        }
    }
    Ok(Some(allowed))
}

pub fn run(options: Svelt) -> Result<()> {
    match options {
        Svelt::Discover {
            genome,
            exclude,
            outfile,
            min_map_qual,
            min_tra_qual,
            min_clip,
            min_ref_sep,
            max_read_sep,
            min_support,
            svtypes,
            no_merge,
            input,
        } => {
            let config = DiscoverConfig {
                bams: input,
                genome,
                exclude,
                outfile: outfile.clone(),
                min_map_qual,
                min_tra_qual,
                min_clip,
                min_ref_sep,
                max_read_sep,
                min_cluster_size: min_support,
                svt_allowed: parse_svtypes(&svtypes)?,
                merge: !no_merge,
                ..DiscoverConfig::default()
            };
            let discovery = discover(&config)?;
            write_svs(
                config.outfile.as_deref(),
                &discovery.svs,
                &discovery.target_names,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_svtypes() {
        assert_eq!(parse_svtypes("ALL").unwrap(), None);
        let set = parse_svtypes("DEL,BND").unwrap().unwrap();
        assert!(set.contains(&DELETION));
        assert!(set.contains(&(TRA_BASE + 3)));
        assert!(!set.contains(&DUPLICATION));
        assert!(parse_svtypes("SNV").is_err());
    }
}
