use glam::UVec2;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::SegboxError;

/// A 2D axis-aligned bounding box in pixel coordinates of one slice.
///
/// Both corners are inclusive: `x` is the column and `y` the row, so a box
/// around a single labeled pixel has `min == max`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SliceBox {
    /// Top-left corner (minimum column, minimum row).
    pub min: UVec2,
    /// Bottom-right corner (maximum column, maximum row).
    pub max: UVec2,
}

impl SliceBox {
    /// Creates a bounding box from its inclusive corners.
    ///
    /// # Example
    /// ```
    /// use glam::UVec2;
    /// use segbox_core::analysis::bbox::SliceBox;
    /// let bbox = SliceBox::new(UVec2::new(3, 2), UVec2::new(7, 5));
    /// assert_eq!(bbox.to_array(), [3, 2, 7, 5]);
    /// ```
    pub fn new(min: UVec2, max: UVec2) -> Self {
        Self { min, max }
    }

    /// Creates the degenerate box covering exactly one pixel.
    pub fn from_pixel(col: u32, row: u32) -> Self {
        let point = UVec2::new(col, row);
        Self {
            min: point,
            max: point,
        }
    }

    /// Builds a box from `[min_col, min_row, max_col, max_row]`.
    ///
    /// Fails with [`SegboxError::InvalidBox`] when a minimum exceeds its maximum.
    pub fn try_from_array(values: [u32; 4]) -> Result<Self, SegboxError> {
        let [min_col, min_row, max_col, max_row] = values;
        if min_col > max_col || min_row > max_row {
            return Err(SegboxError::InvalidBox { values });
        }
        Ok(Self::new(
            UVec2::new(min_col, min_row),
            UVec2::new(max_col, max_row),
        ))
    }

    /// Returns `[min_col, min_row, max_col, max_row]`.
    pub fn to_array(&self) -> [u32; 4] {
        [self.min.x, self.min.y, self.max.x, self.max.y]
    }

    /// Grows the box so that it covers the given pixel.
    pub fn include(&mut self, col: u32, row: u32) {
        let point = UVec2::new(col, row);
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    /// Number of columns covered, inclusive of both edges.
    pub fn width(&self) -> u32 {
        self.max.x - self.min.x + 1
    }

    /// Number of rows covered, inclusive of both edges.
    pub fn height(&self) -> u32 {
        self.max.y - self.min.y + 1
    }

    /// Checks whether the box fits inside an image of `width` x `height` pixels.
    pub fn fits_within(&self, width: usize, height: usize) -> bool {
        (self.max.x as usize) < width && (self.max.y as usize) < height
    }
}

impl Serialize for SliceBox {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_array().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SliceBox {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let values = <[u32; 4]>::deserialize(deserializer)?;
        SliceBox::try_from_array(values).map_err(serde::de::Error::custom)
    }
}
