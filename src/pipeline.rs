//! Batch orchestration: encrypt (files → images → PDF) and decrypt
//! (PDF → images → files → zip).
//!
//! # Failure policy
//! Items fail alone.  A file that cannot be encoded, or an image that cannot
//! be decoded, is recorded as [`Skipped`] and the batch carries on with the
//! rest.  Only the final write of the document or archive (or an unreadable
//! input document) aborts the batch, and those writes are all-or-nothing.
//!
//! # Ordering
//! Items may be processed on the Rayon pool (`parallel` feature), but every
//! result carries its input index and is put back in input order before the
//! single pack/bundle call.

use std::path::{Path, PathBuf};

use thiserror::Error;
use uuid::Uuid;

use crate::bundle::{ArchiveBundler, BundleError, DecodedFile};
use crate::codec::{ByteImageCodec, EncodedImage};
use crate::config::PipelineOptions;
use crate::pdf::{ExtractError, ExtractedImage, ImageExtractor, PackError, PagePacker};

// ── Inputs and reports ───────────────────────────────────────────────────────

/// One input file of an encrypt batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub name:  String,
    pub bytes: Vec<u8>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self { name: name.into(), bytes }
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

/// An item dropped from a batch, with the reason it failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skipped {
    /// Position in the batch input (files for encrypt, extracted images for
    /// decrypt).
    pub index:  usize,
    pub name:   String,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct EncryptReport {
    pub batch_id: Uuid,
    pub document: PathBuf,
    /// Names of the packed inputs, in page order.
    pub packed:   Vec<String>,
    pub skipped:  Vec<Skipped>,
}

impl EncryptReport {
    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }
}

#[derive(Debug, Clone)]
pub struct DecryptReport {
    pub batch_id: Uuid,
    pub archive:  PathBuf,
    /// Archive entry names, in extraction order.
    pub bundled:  Vec<String>,
    pub skipped:  Vec<Skipped>,
}

impl DecryptReport {
    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Packing failed after {processed} encoded item(s): {source}")]
    Pack { source: PackError, processed: usize },
    #[error("Extraction failed: {0}")]
    Extract(#[from] ExtractError),
    #[error("Bundling failed after {processed} decoded item(s): {source}")]
    Bundle { source: BundleError, processed: usize },
}

// ── Pipeline ─────────────────────────────────────────────────────────────────

/// Self-contained orchestrator; holds no state between batches.
#[derive(Debug, Clone)]
pub struct Pipeline {
    codec:    ByteImageCodec,
    parallel: bool,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(&PipelineOptions::default())
    }
}

impl Pipeline {
    pub fn new(opts: &PipelineOptions) -> Self {
        Self {
            codec:    ByteImageCodec::new(opts.max_payload_bytes),
            parallel: opts.parallel,
        }
    }

    pub fn codec(&self) -> &ByteImageCodec {
        &self.codec
    }

    /// Encode every file independently. Successes come back with their
    /// input index, in input order.
    pub fn encode_batch(&self, files: &[SourceFile]) -> (Vec<(usize, EncodedImage)>, Vec<Skipped>) {
        let results = self.map_indexed(files, |f| self.codec.encode(&f.bytes));
        let mut images = Vec::with_capacity(files.len());
        let mut skipped = Vec::new();
        for (index, result) in results {
            match result {
                Ok(img) => images.push((index, img)),
                Err(e) => {
                    log::warn!("skipping {} (#{index}): {e}", files[index].name);
                    skipped.push(Skipped { index, name: files[index].name.clone(), reason: e.to_string() });
                }
            }
        }
        (images, skipped)
    }

    /// Decode every extracted image independently and name the results
    /// `decrypted_<page>_<position>.<ext>`.
    pub fn decode_batch(&self, images: &[ExtractedImage]) -> (Vec<DecodedFile>, Vec<Skipped>) {
        let results = self.map_indexed(images, |img| self.codec.decode(&img.pixels));
        let mut files = Vec::with_capacity(images.len());
        let mut skipped = Vec::new();
        for (index, result) in results {
            let img = &images[index];
            match result {
                Ok(bytes) => files.push(DecodedFile::for_extracted(img.page_index, img.position, bytes)),
                Err(e) => {
                    let name = format!("page {} image {}", img.page_index, img.position);
                    log::warn!("skipping {name}: {e}");
                    skipped.push(Skipped { index, name, reason: e.to_string() });
                }
            }
        }
        (files, skipped)
    }

    pub fn encrypt(&self, files: &[SourceFile], dest: &Path) -> Result<EncryptReport, PipelineError> {
        let batch_id = Uuid::new_v4();
        log::info!(
            "batch {batch_id}: encrypting {} file(s) (parallel: {})",
            files.len(),
            self.parallel
        );

        let (encoded, skipped) = self.encode_batch(files);
        let packed: Vec<String> = encoded.iter().map(|(i, _)| files[*i].name.clone()).collect();
        let images: Vec<EncodedImage> = encoded.into_iter().map(|(_, img)| img).collect();

        PagePacker::pack(&images, dest)
            .map_err(|source| PipelineError::Pack { source, processed: images.len() })?;

        log::info!(
            "batch {batch_id}: packed {} page(s) into {}, skipped {}",
            images.len(),
            dest.display(),
            skipped.len()
        );
        Ok(EncryptReport { batch_id, document: dest.to_path_buf(), packed, skipped })
    }

    pub fn decrypt(&self, document: &Path, dest: &Path) -> Result<DecryptReport, PipelineError> {
        let batch_id = Uuid::new_v4();
        log::info!("batch {batch_id}: decrypting {}", document.display());

        let images = ImageExtractor::scan_path(document)?;
        let (files, skipped) = self.decode_batch(&images);

        let summary = ArchiveBundler::bundle(&files, dest)
            .map_err(|source| PipelineError::Bundle { source, processed: files.len() })?;

        log::info!(
            "batch {batch_id}: bundled {} file(s) into {}, skipped {}",
            summary.entries.len(),
            dest.display(),
            skipped.len()
        );
        Ok(DecryptReport { batch_id, archive: dest.to_path_buf(), bundled: summary.entries, skipped })
    }

    /// Apply `f` to every item, returning `(input index, result)` pairs
    /// sorted by input index.
    fn map_indexed<T, U, F>(&self, items: &[T], f: F) -> Vec<(usize, U)>
    where
        T: Sync,
        U: Send,
        F: Fn(&T) -> U + Sync + Send,
    {
        #[cfg(feature = "parallel")]
        {
            if self.parallel {
                use rayon::prelude::*;

                let mut out: Vec<(usize, U)> = items
                    .par_iter()
                    .enumerate()
                    .map(|(i, item)| (i, f(item)))
                    .collect();
                out.sort_by_key(|(i, _)| *i);
                return out;
            }
        }
        items.iter().enumerate().map(|(i, item)| (i, f(item))).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipeline(max: usize, parallel: bool) -> Pipeline {
        Pipeline::new(&PipelineOptions { max_payload_bytes: max, parallel, ..PipelineOptions::default() })
    }

    #[test]
    fn oversized_file_is_skipped_not_fatal() {
        let files = vec![
            SourceFile::new("a.txt", b"small".to_vec()),
            SourceFile::new("b.bin", vec![1u8; 64]),
            SourceFile::new("c.txt", b"tiny".to_vec()),
        ];
        for parallel in [false, true] {
            let (images, skipped) = pipeline(16, parallel).encode_batch(&files);
            assert_eq!(images.iter().map(|(i, _)| *i).collect::<Vec<_>>(), vec![0, 2]);
            assert_eq!(skipped.len(), 1);
            assert_eq!(skipped[0].index, 1);
            assert_eq!(skipped[0].name, "b.bin");
        }
    }

    #[test]
    fn parallel_and_sequential_agree() {
        let files: Vec<SourceFile> = (0..40)
            .map(|i| SourceFile::new(format!("f{i}"), vec![i as u8; i * 37]))
            .collect();
        let (seq, _) = pipeline(1 << 20, false).encode_batch(&files);
        let (par, _) = pipeline(1 << 20, true).encode_batch(&files);
        assert_eq!(seq, par);
    }

    #[test]
    fn undecodable_image_is_skipped() {
        let codec = ByteImageCodec::default();
        let good = codec.encode(b"fine").unwrap();
        let images = vec![
            ExtractedImage {
                page_index: 0, position: 0, identity: (1, 0),
                width: good.width, height: good.height, channels: 3, pixels: good.pixels.clone(),
            },
            ExtractedImage {
                page_index: 1, position: 0, identity: (2, 0),
                width: 2, height: 2, channels: 3, pixels: vec![0xAB; 12],
            },
        ];
        let (files, skipped) = Pipeline::default().decode_batch(&images);
        assert_eq!(files, vec![DecodedFile::new("decrypted_0_0.txt", b"fine".to_vec())]);
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].index, 1);
    }
}
