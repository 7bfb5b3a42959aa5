//! Upload pipeline
//!
//! Sources produce image items; the batcher groups them and hands each batch to
//! a `Deliver` implementation.

pub mod batcher;
pub mod source;

pub use batcher::{BatchConfig, Batch, Batcher, Deliver, PipelineReport};
pub use source::{
    filter_images, is_image_name, ArchiveSource, DirectorySource, MediaItem, MediaSource,
    IMAGE_EXTENSIONS,
};
