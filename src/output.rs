//! Tab-separated SV table. VCF serialisation is an external concern; this
//! surface exists so the binary has something to print.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use anyhow::Result;

use crate::sv::{base_label, connector_label, StructuralVariantRecord};

pub fn write_sv_table<W: Write>(
    mut out: W,
    svs: &[StructuralVariantRecord],
    target_names: &[String],
) -> Result<()> {
    writeln!(
        out,
        "chrom\tstart\tchrom2\tend\tid\ttype\tconnector\tprecise\tpe\tsr\tsrq\tconsensus"
    )?;
    for sv in svs {
        let name = |tid: i32| {
            target_names
                .get(tid as usize)
                .map(|n| n.as_str())
                .unwrap_or("*")
        };
        writeln!(
            out,
            "{}\t{}\t{}\t{}\t{}{:08}\t{}\t{}\t{}\t{}\t{}\t{:.2}\t{}",
            name(sv.chr),
            sv.sv_start,
            name(sv.chr2),
            sv.sv_end,
            base_label(sv.svt),
            sv.id,
            base_label(sv.svt),
            connector_label(sv.svt),
            if sv.precise { 1 } else { 0 },
            sv.pe_support,
            sv.sr_support,
            sv.sr_align_quality,
            String::from_utf8_lossy(&sv.consensus),
        )?;
    }
    Ok(())
}

/// Write the table to a path, or stdout when none is given.
pub fn write_svs(
    outfile: Option<&Path>,
    svs: &[StructuralVariantRecord],
    target_names: &[String],
) -> Result<()> {
    match outfile {
        Some(path) => write_sv_table(BufWriter::new(File::create(path)?), svs, target_names),
        None => write_sv_table(io::stdout().lock(), svs, target_names),
    }
}
