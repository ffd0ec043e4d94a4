//! Patch levels and the face-centered data they carry.

pub mod patch;
pub mod side_data;

pub use patch::{Patch, PatchId, PatchLevel};
pub use side_data::{LevelData, SideData};
