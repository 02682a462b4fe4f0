//! imgcheck library
//!
//! Two independent halves: [`loader`] finds check classes in `*.check`
//! units and indexes them by name, [`image`] turns an image reference or
//! archive into a staged, inspectable filesystem with metadata.

pub mod cli;
pub mod config;
pub mod error;
pub mod image;
pub mod loader;
pub mod logging;
pub mod process;

pub use config::ToolConfig;
pub use error::{ImageError, LoaderError, ProcessError, Result};
pub use image::{Image, ImageOptions, ImageReference};
pub use loader::{CheckClass, CheckLoader};
pub use logging::Logger;
