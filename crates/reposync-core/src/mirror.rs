//! Destination mapping and mirror cleaning
//!
//! Mirrored content lives below `destination/<marker>/`, keeping it apart
//! from whatever the destination already holds.

mod cleaner;
mod mapping;

pub use cleaner::{CleanReport, MirrorCleaner};
pub use mapping::DestinationMapping;
