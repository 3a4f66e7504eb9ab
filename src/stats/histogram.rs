/// Histogram binning
///
/// Two histograms live here:
/// - `AreaHistogram`: equal-width buckets over the dataset's area column
/// - `ChannelHistogram`: 256-level intensity counts per channel of one image
///
/// Both are plain numbers; drawing them is the plot module's job.

use image::DynamicImage;
use serde::Serialize;

use crate::error::{PipelineError, Result};
use crate::state::table::DatasetTable;

/// One bucket of the area histogram.
/// Covers `[lower, upper)`, except the last bucket which also includes `upper`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

/// Area distribution of a dataset
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AreaHistogram {
    pub bins: Vec<Bin>,
}

impl AreaHistogram {
    /// Bucket raw area values into `bin_count` equal-width bins
    ///
    /// # Returns
    /// * No bins when `values` is empty
    /// * A single `[v, v]` bin when every value is the same
    /// * Otherwise exactly `bin_count` bins spanning `[min, max]`
    pub fn from_values(values: &[u64], bin_count: usize) -> Result<Self> {
        if bin_count == 0 {
            return Err(PipelineError::Config("bin count must be at least 1".to_string()));
        }

        let (min, max) = match (values.iter().min(), values.iter().max()) {
            (Some(&min), Some(&max)) => (min, max),
            _ => return Ok(Self::default()),
        };

        if min == max {
            return Ok(Self {
                bins: vec![Bin {
                    lower: min as f64,
                    upper: max as f64,
                    count: values.len(),
                }],
            });
        }

        let lo = min as f64;
        let span = (max - min) as f64;
        // Edge i of bin_count + 1; bins and value placement share these exact floats
        let edge = |i: usize| {
            if i == bin_count {
                max as f64
            } else {
                lo + span * i as f64 / bin_count as f64
            }
        };

        let mut bins: Vec<Bin> = (0..bin_count)
            .map(|i| Bin {
                lower: edge(i),
                upper: edge(i + 1),
                count: 0,
            })
            .collect();

        for &value in values {
            let v = value as f64;
            let estimate = (value - min) as f64 * bin_count as f64 / span;
            let mut index = (estimate as usize).min(bin_count - 1);
            // The estimate can be one off where rounding lands on an edge
            while index > 0 && v < bins[index].lower {
                index -= 1;
            }
            while index + 1 < bin_count && v >= bins[index + 1].lower {
                index += 1;
            }
            bins[index].count += 1;
        }

        Ok(Self { bins })
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    /// Total number of values counted
    pub fn total(&self) -> usize {
        self.bins.iter().map(|b| b.count).sum()
    }

    /// Largest single bin count
    pub fn peak(&self) -> usize {
        self.bins.iter().map(|b| b.count).max().unwrap_or(0)
    }
}

/// Bucket the non-null areas of `table`
pub fn histogram(table: &DatasetTable, bin_count: usize) -> Result<AreaHistogram> {
    AreaHistogram::from_values(&table.areas(), bin_count)
}

/// Per-channel intensity histogram of a single image: [R[256], G[256], B[256]]
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelHistogram {
    pub data: Vec<[u32; 256]>,
}

impl ChannelHistogram {
    /// Count 8-bit intensities per color channel (alpha ignored, gray expanded)
    pub fn from_image(img: &DynamicImage) -> Self {
        let rgb = img.to_rgb8();
        let mut data = vec![[0u32; 256]; 3];

        for pixel in rgb.pixels() {
            for (channel, &value) in pixel.0.iter().enumerate() {
                data[channel][value as usize] += 1;
            }
        }

        Self { data }
    }

    /// Maximum value across all channels, used for normalization
    pub fn peak(&self) -> u32 {
        self.data
            .iter()
            .flat_map(|channel| channel.iter())
            .copied()
            .max()
            .unwrap_or(0)
    }
}
