//! Decoded EXIF metadata model.
//!
//! This crate only describes what a decoded tag set looks like. Reading tag
//! bytes out of an image container is somebody else's job; the caches store
//! and hand back [`ExifTagSet`]s exactly as they were given.

pub mod error;
pub mod models;

pub use crate::models::{ByteOrder, ExifTag, ExifTagSet, Ifd, ValueType};
