/// Shared data structures for the dataset table
///
/// These structs represent one row of the dataset as it flows from the
/// manifest, through the metadata probe, into the statistics layer.

use serde::{Deserialize, Serialize};

/// Image shape reported by the codec
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shape {
    /// Rows of pixels
    pub height: u32,
    /// Columns of pixels
    pub width: u32,
    /// Channel count (1 = gray, 3 = RGB, 4 = RGBA, ...)
    pub depth: u8,
}

impl Shape {
    pub fn new(height: u32, width: u32, depth: u8) -> Self {
        Self { height, width, depth }
    }

    /// Pixel count, computed in u64 so 65535x65535 images cannot overflow
    pub fn area(&self) -> u64 {
        u64::from(self.height) * u64::from(self.width)
    }
}

/// Represents a single image in the dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Full path to the image file (unique key)
    pub absolute_path: String,
    /// Path relative to the base chosen when the manifest was generated
    pub relative_path: String,
    /// None until probed, and None after probing if the image is unreadable
    pub shape: Option<Shape>,
    /// height * width, only set by `DatasetTable::add_area`
    pub area: Option<u64>,
}

impl Record {
    pub fn new(absolute_path: impl Into<String>, relative_path: impl Into<String>) -> Self {
        Self {
            absolute_path: absolute_path.into(),
            relative_path: relative_path.into(),
            shape: None,
            area: None,
        }
    }

    pub fn height(&self) -> Option<u32> {
        self.shape.map(|s| s.height)
    }

    pub fn width(&self) -> Option<u32> {
        self.shape.map(|s| s.width)
    }

    pub fn depth(&self) -> Option<u8> {
        self.shape.map(|s| s.depth)
    }
}
