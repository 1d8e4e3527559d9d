//! persona-core — data model and algorithms for face identification.
//!
//! Pure code only: coordinate mapping, detector output parsing, landmark
//! parsing, similarity-transform alignment, and gallery matching.
//! Inference, devices, and I/O live in the sibling crates.

pub mod alignment;
pub mod detect;
pub mod gallery;
pub mod landmarks;
pub mod mapper;
pub mod types;

pub use gallery::{Gallery, GalleryEntry, Identity, Match};
pub use types::{DetectionBox, Embedding, LandmarkSet, Point};
