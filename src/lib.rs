pub mod header;
pub mod codec;
pub mod category;
pub mod pdf;
pub mod bundle;
pub mod pipeline;
pub mod config;
pub mod store;
pub mod activity;
pub mod service;
mod finalize;

pub use codec::{ByteImageCodec, CodecError, EncodedImage};
pub use category::FileCategory;
pub use pdf::{ExtractError, ExtractedImage, ImageExtractor, PackError, PagePacker, ScanContext};
pub use bundle::{ArchiveBundler, BundleError, DecodedFile};
pub use pipeline::{DecryptReport, EncryptReport, Pipeline, PipelineError, Skipped, SourceFile};
pub use config::{Config, PipelineOptions};
