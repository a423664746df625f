use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("no alignment files given")]
    EmptySampleSet,
    #[error("invalid exclude file path (expected .bed extension): {path}")]
    InvalidBedFile { path: PathBuf },
    #[error("alignment file {path} has no usable index; create one with samtools index")]
    MissingAlignmentIndex { path: PathBuf },
    #[error("reference {path} is not indexed; create a .fai with samtools faidx")]
    MissingReferenceIndex { path: PathBuf },
    #[error("unknown SV type selector {name}; expected DEL, DUP, INV, INS, BND or ALL")]
    InvalidSvTypeSelector { name: String },
}
