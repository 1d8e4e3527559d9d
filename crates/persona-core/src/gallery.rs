//! Identity gallery and nearest-neighbor matching.
//!
//! Built once at startup from the reference images; read-only for the
//! rest of the run.

use crate::types::Embedding;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A query closer than this (scaled cosine distance) to its nearest
/// gallery entry takes that entry's label. Fixed policy constant.
pub const MATCH_THRESHOLD: f32 = 0.25;

/// One reference embedding with its identity label. Immutable once
/// loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GalleryEntry {
    pub label: String,
    pub embedding: Embedding,
}

/// Ordered sequence of reference entries. Order is load order; ties in
/// matching resolve to the earliest entry.
#[derive(Debug, Clone, Default)]
pub struct Gallery {
    entries: Vec<GalleryEntry>,
}

/// Outcome of matching one query embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    pub identity: Identity,
    /// Distance to the nearest entry; 1.0 when the gallery is empty.
    pub distance: f32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Known(String),
    Unknown,
}

impl Gallery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, label: impl Into<String>, embedding: Embedding) {
        self.entries.push(GalleryEntry {
            label: label.into(),
            embedding,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of distinct identity labels.
    pub fn label_count(&self) -> usize {
        self.entries
            .iter()
            .map(|e| e.label.as_str())
            .collect::<BTreeSet<_>>()
            .len()
    }

    pub fn entries(&self) -> &[GalleryEntry] {
        &self.entries
    }

    /// Nearest-neighbor lookup by scaled cosine distance.
    ///
    /// The strict `<` scan keeps the earliest entry on ties, so repeated
    /// queries against the same gallery are fully deterministic. Below
    /// [`MATCH_THRESHOLD`] the nearest label wins; at or above it the
    /// query is unknown. An empty gallery matches nothing.
    pub fn identify(&self, probe: &Embedding) -> Match {
        let mut best: Option<(usize, f32)> = None;

        for (i, entry) in self.entries.iter().enumerate() {
            let distance = probe.cosine_distance(&entry.embedding);
            if best.map_or(true, |(_, d)| distance < d) {
                best = Some((i, distance));
            }
        }

        match best {
            Some((i, distance)) if distance < MATCH_THRESHOLD => Match {
                identity: Identity::Known(self.entries[i].label.clone()),
                distance,
            },
            Some((_, distance)) => Match {
                identity: Identity::Unknown,
                distance,
            },
            None => Match {
                identity: Identity::Unknown,
                distance: 1.0,
            },
        }
    }
}
