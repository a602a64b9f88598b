use std::io::{self, Write};
use std::path::Path;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use thiserror::Error;

use super::{color_space, IMAGE_RESOURCE};
use crate::codec::EncodedImage;
use crate::finalize::write_atomically;

#[derive(Error, Debug)]
pub enum PackError {
    #[error("Document I/O failure: {0}")]
    IoFailure(#[from] io::Error),
}

fn pdf_failure(e: lopdf::Error) -> PackError {
    PackError::IoFailure(io::Error::new(io::ErrorKind::Other, e.to_string()))
}

/// What [`PagePacker::pack`] wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackSummary {
    pub pages: usize,
}

/// Builds a multi-page PDF with one image per page.
///
/// Every page's MediaBox is exactly `width × height` units and the image is
/// drawn with a `width 0 0 height 0 0 cm` transform, so a viewer maps one
/// pixel to one unit.  The XObject stores the pixel buffer verbatim behind
/// a Flate filter; nothing is resampled.
pub struct PagePacker;

impl PagePacker {
    /// Assemble the in-memory document. Pages follow `images` order.
    pub fn build(images: &[EncodedImage]) -> Result<Document, PackError> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let mut kids: Vec<Object> = Vec::with_capacity(images.len());
        for image in images {
            let page_id = add_page(&mut doc, pages_id, image)?;
            kids.push(page_id.into());
        }

        let page_count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type"  => "Pages",
                "Kids"  => kids,
                "Count" => page_count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type"  => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        Ok(doc)
    }

    /// Serialize the document for `images` into `writer`.
    pub fn write_to<W: Write>(images: &[EncodedImage], writer: &mut W) -> Result<PackSummary, PackError> {
        let mut doc = Self::build(images)?;
        doc.save_to(writer)?;
        Ok(PackSummary { pages: images.len() })
    }

    /// Write the document to `dest` atomically.
    pub fn pack(images: &[EncodedImage], dest: &Path) -> Result<PackSummary, PackError> {
        let mut summary = PackSummary { pages: 0 };
        write_atomically(dest, |file| {
            let mut out = io::BufWriter::new(file);
            summary = Self::write_to(images, &mut out)?;
            out.flush()?;
            Ok::<(), PackError>(())
        })?;
        log::debug!("packed {} page(s) into {}", summary.pages, dest.display());
        Ok(summary)
    }
}

fn add_page(doc: &mut Document, pages_id: ObjectId, image: &EncodedImage) -> Result<ObjectId, PackError> {
    let width = i64::from(image.width);
    let height = i64::from(image.height);

    let xobject_id = doc.add_object(image_xobject(image)?);

    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new("cm", vec![
                width.into(), 0i64.into(), 0i64.into(), height.into(), 0i64.into(), 0i64.into(),
            ]),
            Operation::new("Do", vec![Object::Name(IMAGE_RESOURCE.as_bytes().to_vec())]),
            Operation::new("Q", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().map_err(pdf_failure)?));

    Ok(doc.add_object(dictionary! {
        "Type"      => "Page",
        "Parent"    => pages_id,
        "MediaBox"  => vec![Object::Integer(0), Object::Integer(0), Object::Integer(width), Object::Integer(height)],
        "Resources" => dictionary! {
            "XObject" => dictionary! { IMAGE_RESOURCE => xobject_id },
        },
        "Contents"  => content_id,
    }))
}

fn image_xobject(image: &EncodedImage) -> Result<Stream, PackError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&image.pixels)?;
    let data = encoder.finish()?;

    Ok(Stream::new(
        dictionary! {
            "Type"             => "XObject",
            "Subtype"          => "Image",
            "Width"            => i64::from(image.width),
            "Height"           => i64::from(image.height),
            "ColorSpace"       => color_space(image.channels),
            "BitsPerComponent" => 8i64,
            "Filter"           => "FlateDecode",
        },
        data,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::ByteImageCodec;

    #[test]
    fn page_geometry_matches_pixels() {
        let img = ByteImageCodec::default().encode(&[7u8; 1000]).unwrap();
        let doc = PagePacker::build(std::slice::from_ref(&img)).unwrap();
        let pages = doc.get_pages();
        assert_eq!(pages.len(), 1);

        let page_id = *pages.values().next().unwrap();
        let page = doc.get_dictionary(page_id).unwrap();
        let media_box = page.get(b"MediaBox").unwrap().as_array().unwrap();
        let dims: Vec<i64> = media_box.iter().map(|o| o.as_i64().unwrap()).collect();
        assert_eq!(dims, vec![0, 0, i64::from(img.width), i64::from(img.height)]);
    }

    #[test]
    fn empty_batch_is_valid_document() {
        let mut out = Vec::new();
        let summary = PagePacker::write_to(&[], &mut out).unwrap();
        assert_eq!(summary.pages, 0);
        let doc = Document::load_mem(&out).unwrap();
        assert!(doc.get_pages().is_empty());
    }

    #[test]
    fn unwritable_destination_is_io_failure() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("missing").join("out.pdf");
        assert!(matches!(PagePacker::pack(&[], &dest), Err(PackError::IoFailure(_))));
        assert!(!dest.exists());
    }
}
