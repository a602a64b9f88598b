//! Zip bundling of decoded files.

use std::collections::HashSet;
use std::io::{self, Seek, Write};
use std::path::Path;

use thiserror::Error;
use zip::write::FileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use crate::category::FileCategory;
use crate::finalize::write_atomically;

#[derive(Error, Debug)]
pub enum BundleError {
    #[error("Archive I/O failure: {0}")]
    IoFailure(#[from] io::Error),
}

impl From<zip::result::ZipError> for BundleError {
    fn from(e: zip::result::ZipError) -> Self {
        match e {
            zip::result::ZipError::Io(io) => BundleError::IoFailure(io),
            other => BundleError::IoFailure(io::Error::new(io::ErrorKind::Other, other)),
        }
    }
}

/// A decoded payload and the name it will carry inside the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFile {
    pub name:  String,
    pub bytes: Vec<u8>,
}

impl DecodedFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self { name: name.into(), bytes }
    }

    /// `decrypted_<page>_<position>.<ext>`, extension sniffed from content.
    pub fn for_extracted(page_index: usize, position: usize, bytes: Vec<u8>) -> Self {
        let ext = FileCategory::sniff(&bytes);
        Self { name: format!("decrypted_{page_index}_{position}.{ext}"), bytes }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleSummary {
    /// Entry names in archive order.
    pub entries: Vec<String>,
}

/// Final entry names, one per file, in input order.
///
/// A name already taken gets `-<input index>` inserted before its extension;
/// the step repeats until the name is free.
pub fn resolve_names(files: &[DecodedFile]) -> Vec<String> {
    let mut taken: HashSet<String> = HashSet::with_capacity(files.len());
    let mut names = Vec::with_capacity(files.len());
    for (index, file) in files.iter().enumerate() {
        let mut candidate = file.name.clone();
        while taken.contains(&candidate) {
            candidate = with_suffix(&candidate, index);
        }
        taken.insert(candidate.clone());
        names.push(candidate);
    }
    names
}

fn with_suffix(name: &str, index: usize) -> String {
    match name.rfind('.') {
        Some(dot) if dot > 0 => format!("{}-{}{}", &name[..dot], index, &name[dot..]),
        _ => format!("{name}-{index}"),
    }
}

pub struct ArchiveBundler;

impl ArchiveBundler {
    /// Write one Deflate entry per file into `writer`. Entry timestamps are
    /// fixed so identical input yields identical bytes.
    pub fn write_to<W: Write + Seek>(files: &[DecodedFile], writer: W) -> Result<BundleSummary, BundleError> {
        let names = resolve_names(files);
        let options = FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(DateTime::default());

        let mut zip = ZipWriter::new(writer);
        for (name, file) in names.iter().zip(files) {
            zip.start_file(name.as_str(), options)?;
            zip.write_all(&file.bytes)?;
        }
        zip.finish()?;
        Ok(BundleSummary { entries: names })
    }

    /// Write the archive to `dest`; nothing is left at `dest` on failure.
    pub fn bundle(files: &[DecodedFile], dest: &Path) -> Result<BundleSummary, BundleError> {
        let mut summary = BundleSummary { entries: Vec::new() };
        write_atomically(dest, |file| {
            summary = Self::write_to(files, file)?;
            Ok::<(), BundleError>(())
        })?;
        log::debug!("bundled {} entr(ies) into {}", summary.entries.len(), dest.display());
        Ok(summary)
    }
}
