// src/labeling/mod.rs
//! Frame-indexed annotations painted onto the trial timeline

pub mod annotations;
pub mod labeler;

pub use annotations::*;
pub use labeler::*;
