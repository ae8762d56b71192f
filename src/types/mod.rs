//! Core value types shared by the readers.

pub mod vector;
pub mod version;

pub use vector::{Vector2, Vector3};
pub use version::{DwgVersion, Generation};
