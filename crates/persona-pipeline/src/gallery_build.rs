//! One-time identity gallery construction from a directory of labelled
//! reference images.
//!
//! Layout: one subdirectory per identity label under the gallery root,
//! each holding one or more stills of that identity. Every still runs
//! through the full detect → landmark → align → embed chain.

use crate::face::{FaceStageError, FaceStages};
use persona_core::gallery::Gallery;
use persona_source::Frame;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GalleryError {
    #[error("gallery directory unreadable: {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("reference image unreadable: {path}: {message}")]
    BadImage { path: String, message: String },
    /// A reference image with no detectable face would silently thin
    /// the gallery and cause misidentification later, so the build
    /// fails instead of skipping.
    #[error("no face detected in reference image: {0}")]
    NoFaceInImage(String),
    #[error("stage failure while embedding {path}: {source}")]
    Stage {
        path: String,
        #[source]
        source: FaceStageError,
    },
}

/// Build the gallery by embedding every reference image.
///
/// Entries within an identity are added in sorted filename order;
/// identities themselves are also sorted, which keeps repeated builds
/// deterministic on any platform. Images with more than one face use
/// the first detection and log a warning.
pub(crate) fn build_gallery(root: &Path, stages: &FaceStages) -> Result<Gallery, GalleryError> {
    let mut gallery = Gallery::new();

    for identity_dir in sorted_entries(root)? {
        if !identity_dir.is_dir() {
            continue;
        }
        let label = identity_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        for image_path in sorted_entries(&identity_dir)? {
            if !image_path.is_file() {
                continue;
            }
            let embedding = embed_reference(stages, &image_path)?;
            gallery.push(label.clone(), embedding);
            tracing::debug!(label = %label, path = %image_path.display(), "reference embedded");
        }
    }

    tracing::info!(
        root = %root.display(),
        entries = gallery.len(),
        identities = gallery.label_count(),
        "gallery build complete"
    );
    Ok(gallery)
}

fn sorted_entries(dir: &Path) -> Result<Vec<std::path::PathBuf>, GalleryError> {
    let read = fs::read_dir(dir).map_err(|e| GalleryError::Io {
        path: dir.display().to_string(),
        source: e,
    })?;

    let mut entries = Vec::new();
    for entry in read {
        let entry = entry.map_err(|e| GalleryError::Io {
            path: dir.display().to_string(),
            source: e,
        })?;
        entries.push(entry.path());
    }
    entries.sort();
    Ok(entries)
}

/// Run one reference still through the full chain.
fn embed_reference(
    stages: &FaceStages,
    path: &Path,
) -> Result<persona_core::Embedding, GalleryError> {
    let frame = load_reference(path)?;
    let display = path.display().to_string();

    let stage_err = |source: FaceStageError| GalleryError::Stage {
        path: display.clone(),
        source,
    };

    let boxes = stages.detect(&frame).map_err(stage_err)?;
    let bbox = match boxes.as_slice() {
        [] => return Err(GalleryError::NoFaceInImage(display.clone())),
        [only] => *only,
        [first, ..] => {
            tracing::warn!(
                path = %display,
                faces = boxes.len(),
                "multiple faces in reference image; using the first"
            );
            *first
        }
    };

    let landmarks = stages.landmarks(&frame, &bbox).map_err(stage_err)?;
    stages.embed(&frame, &landmarks).map_err(stage_err)
}

fn load_reference(path: &Path) -> Result<Frame, GalleryError> {
    let decoded = image::open(path).map_err(|e| GalleryError::BadImage {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    let rgb = decoded.to_rgb8();
    let (width, height) = rgb.dimensions();
    Ok(Frame {
        data: rgb.into_raw(),
        width,
        height,
    })
}
