//! Embedded image extraction and the image catalog.
//!
//! JPEG and JPEG 2000 streams are written as `.jpg` / `.jp2`; raw bitmaps are
//! re-encoded as `.png` (see [`super::bitmap`]). CCITT and JBIG2 images are
//! skipped.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use lopdf::{Dictionary, Document, Object, ObjectId};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::bitmap::{decode_image, DecodedImage};
use crate::error::Result;

/// Bound on `Parent` hops when looking for inherited resources.
const MAX_PAGE_TREE_DEPTH: usize = 32;

/// Catalog entry for an extracted image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub document: String,
    pub page: u32,
    pub path: String,
    pub index: usize,
}

/// Filename to record map, persisted as the image metadata JSON file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageCatalog {
    entries: BTreeMap<String, ImageRecord>,
}

impl ImageCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, filename: impl Into<String>, record: ImageRecord) {
        self.entries.insert(filename.into(), record);
    }

    pub fn extend(&mut self, other: ImageCatalog) {
        self.entries.extend(other.entries);
    }

    pub fn get(&self, filename: &str) -> Option<&ImageRecord> {
        self.entries.get(filename)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write the catalog as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Load a catalog; a missing file is an empty catalog.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// `<stem>_p<page>_img<index>.<ext>`
pub fn image_filename(stem: &str, page: u32, index: usize, extension: &str) -> String {
    format!("{}_p{}_img{}.{}", stem, page, index, extension)
}

fn resolve<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Object> {
    match object {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

fn resolve_dict<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Dictionary> {
    resolve(doc, object).and_then(|o| o.as_dict().ok())
}

/// Resources dictionary of a page, following `Parent` links when the page
/// inherits them.
fn page_resources(doc: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_PAGE_TREE_DEPTH {
        if let Ok(resources) = node.get(b"Resources") {
            return resolve_dict(doc, resources);
        }
        let parent = node.get(b"Parent").ok()?;
        node = resolve_dict(doc, parent)?;
    }
    None
}

/// Collect the image XObjects of one page in resource order.
pub fn extract_page_images(doc: &Document, page_id: ObjectId) -> Vec<DecodedImage> {
    let Some(resources) = page_resources(doc, page_id) else {
        return Vec::new();
    };
    let Some(xobjects) = resources
        .get(b"XObject")
        .ok()
        .and_then(|x| resolve_dict(doc, x))
    else {
        return Vec::new();
    };

    let mut images = Vec::new();
    for (name, object) in xobjects.iter() {
        let Some(stream) = resolve(doc, object).and_then(|o| o.as_stream().ok()) else {
            continue;
        };
        let is_image = matches!(
            stream.dict.get(b"Subtype"),
            Ok(Object::Name(subtype)) if subtype.as_slice() == b"Image"
        );
        if !is_image {
            continue;
        }
        match decode_image(doc, stream) {
            Ok(image) => images.push(image),
            Err(e) => debug!(
                xobject = %String::from_utf8_lossy(name),
                "Skipping image: {}", e
            ),
        }
    }
    images
}

/// Write a page's images to `images_dir` and record them in `catalog`.
/// Returns the written paths; failures are logged and skipped.
pub fn save_page_images(
    images: Vec<DecodedImage>,
    images_dir: &Path,
    stem: &str,
    page: u32,
    catalog: &mut ImageCatalog,
) -> Vec<PathBuf> {
    let mut saved = Vec::new();
    for (index, image) in images.into_iter().enumerate() {
        let filename = image_filename(stem, page, index, image.extension);
        let path = images_dir.join(&filename);
        if let Err(e) = fs::write(&path, &image.data) {
            warn!(page, index, "Failed to write image {}: {}", path.display(), e);
            continue;
        }
        catalog.insert(
            filename,
            ImageRecord {
                document: stem.to_string(),
                page,
                path: path.to_string_lossy().into_owned(),
                index,
            },
        );
        saved.push(path);
    }
    saved
}
