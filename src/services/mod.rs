// src/services/mod.rs
pub mod gallery;

pub use gallery::{GalleryService, VideoPayload};
