//! Upload-facing flows: classify, store, run the pipeline, record activity.
//!
//! Batches can take a while for large inputs.  Callers serving requests
//! should run these methods off their request-handling threads.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::activity::{Action, ActivityEvent, ActivityLog};
use crate::category::FileCategory;
use crate::config::{Config, PipelineOptions, ServiceOptions};
use crate::pipeline::{DecryptReport, EncryptReport, Pipeline, PipelineError, Skipped, SourceFile};
use crate::store::FileStore;

/// An authenticated principal. How it was authenticated is not this
/// crate's concern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    user: String,
}

impl Session {
    pub fn new(user: impl Into<String>) -> Self {
        Self { user: user.into() }
    }

    pub fn user(&self) -> &str {
        &self.user
    }
}

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("'{name}' is a {} file; expected {expected}", .category.name())]
    Rejected { name: String, category: FileCategory, expected: &'static str },
    #[error("Storage error: {0}")]
    Storage(#[from] io::Error),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

/// One uploaded file.
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub bytes:    Vec<u8>,
}

impl Upload {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self { filename: filename.into(), bytes }
    }
}

pub struct Service<S: FileStore, L: ActivityLog> {
    store:            S,
    activity:         L,
    pipeline:         Pipeline,
    pipeline_options: PipelineOptions,
    options:          ServiceOptions,
}

impl<S: FileStore, L: ActivityLog> Service<S, L> {
    pub fn new(store: S, activity: L, config: &Config) -> Self {
        Self {
            store,
            activity,
            pipeline: Pipeline::new(&config.pipeline),
            pipeline_options: config.pipeline.clone(),
            options: config.service.clone(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn activity(&self) -> &L {
        &self.activity
    }

    /// Encrypt a batch of uploads into one document in the store.
    ///
    /// Uploads whose category is not accepted are reported as skips next to
    /// the codec failures; indices refer to `uploads`.
    pub fn encrypt(&self, session: &Session, uploads: Vec<Upload>) -> Result<EncryptReport, ServiceError> {
        let mut rejected = Vec::new();
        let mut accepted = Vec::with_capacity(uploads.len());
        let mut origin = Vec::with_capacity(uploads.len());

        for (index, upload) in uploads.into_iter().enumerate() {
            let category = FileCategory::from_filename(&upload.filename);
            if !self.options.encrypt_categories.contains(&category) {
                log::warn!("{}: rejecting {} ({})", session.user(), upload.filename, category.name());
                rejected.push(Skipped {
                    index,
                    name:   upload.filename,
                    reason: format!("{} files are not accepted", category.name()),
                });
                continue;
            }
            let path = self.store.save(&upload.filename, &upload.bytes)?;
            log::debug!("stored upload {}", path.display());
            accepted.push(SourceFile::new(upload.filename, upload.bytes));
            origin.push(index);
        }

        let dest = self.store.path_for(&self.pipeline_options.document_name);
        let mut report = self.pipeline.encrypt(&accepted, &dest)?;

        for skip in &mut report.skipped {
            skip.index = origin[skip.index];
        }
        report.skipped.extend(rejected);
        report.skipped.sort_by_key(|s| s.index);

        for name in &report.packed {
            self.notify(session, Action::Encrypt, name);
        }
        Ok(report)
    }

    /// Decrypt an uploaded document into one archive in the store.
    pub fn decrypt(&self, session: &Session, upload: Upload) -> Result<DecryptReport, ServiceError> {
        let category = FileCategory::from_filename(&upload.filename);
        if category != FileCategory::Pdf {
            return Err(ServiceError::Rejected { name: upload.filename, category, expected: "pdf" });
        }
        let document = self.store.save(&upload.filename, &upload.bytes)?;
        let dest = self.store.path_for(&self.pipeline_options.archive_name);
        let report = self.pipeline.decrypt(&document, &dest)?;
        self.notify(session, Action::Decrypt, &upload.filename);
        Ok(report)
    }

    pub fn document_path(&self) -> PathBuf {
        self.store.path_for(&self.pipeline_options.document_name)
    }

    pub fn archive_path(&self) -> PathBuf {
        self.store.path_for(&self.pipeline_options.archive_name)
    }

    fn notify(&self, session: &Session, action: Action, filename: &str) {
        let event = ActivityEvent::now(session.user(), action, filename);
        if let Err(e) = self.activity.record(&event) {
            log::warn!("activity log write failed for {}: {e}", session.user());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::MemoryActivityLog;
    use crate::store::LocalFileStore;

    fn service(dir: &std::path::Path, config: Config) -> Service<LocalFileStore, MemoryActivityLog> {
        let store = LocalFileStore::new(dir).unwrap();
        Service::new(store, MemoryActivityLog::default(), &config)
    }

    #[test]
    fn rejected_categories_become_skips() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.service.encrypt_categories = vec![FileCategory::Text];
        let svc = service(dir.path(), config);
        let session = Session::new("ada");

        let report = svc
            .encrypt(&session, vec![
                Upload::new("photo.png", vec![1, 2, 3]),
                Upload::new("notes.txt", b"notes".to_vec()),
            ])
            .unwrap();

        assert_eq!(report.packed, vec!["notes.txt"]);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].index, 0);
        assert!(svc.document_path().exists());

        let events = svc.activity().events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].user, "ada");
        assert_eq!(events[0].action, Action::Encrypt);
        assert_eq!(events[0].filename, "notes.txt");
    }

    #[test]
    fn codec_skips_keep_upload_indices() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.pipeline.max_payload_bytes = 4;
        config.service.encrypt_categories = vec![FileCategory::Text];
        let svc = service(dir.path(), config);

        let report = svc
            .encrypt(&Session::new("bo"), vec![
                Upload::new("skip.exe", vec![0]),
                Upload::new("ok.txt", b"ok".to_vec()),
                Upload::new("big.txt", b"too big".to_vec()),
            ])
            .unwrap();
        assert_eq!(report.packed, vec!["ok.txt"]);
        assert_eq!(report.skipped.iter().map(|s| s.index).collect::<Vec<_>>(), vec![0, 2]);
    }

    #[test]
    fn decrypt_requires_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path(), Config::default());
        let err = svc.decrypt(&Session::new("cy"), Upload::new("x.zip", vec![])).unwrap_err();
        assert!(matches!(err, ServiceError::Rejected { category: FileCategory::Other, .. }));
        assert!(svc.activity().events().is_empty());
    }

    #[test]
    fn encrypt_then_decrypt_through_store() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path(), Config::default());
        let session = Session::new("di");

        svc.encrypt(&session, vec![Upload::new("a.md", b"# title".to_vec())]).unwrap();
        let pdf = svc.store().open(&svc.document_path()).unwrap();

        let report = svc.decrypt(&session, Upload::new("back.pdf", pdf)).unwrap();
        assert_eq!(report.bundled, vec!["decrypted_0_0.txt"]);
        assert!(svc.archive_path().exists());
        assert_eq!(svc.activity().events().last().unwrap().action, Action::Decrypt);
    }
}
