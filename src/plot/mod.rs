/// Plot output module
///
/// The pipeline hands its numeric results to a `PlotSink` and never draws
/// anything itself. Two sinks exist:
/// - `svg.rs` - bar/line charts written as SVG files
/// - `report.rs` - machine-readable JSON report

pub mod report;
pub mod svg;

use crate::error::Result;
use crate::stats::{AreaHistogram, StatisticsSummary};

pub use report::JsonReport;
pub use svg::SvgChart;

/// Receiver of analysis results for rendering or export
pub trait PlotSink {
    /// Render or store the area distribution
    fn area_histogram(&mut self, hist: &AreaHistogram) -> Result<()>;

    /// Render or store the dimension statistics; ignored unless overridden
    fn summary(&mut self, _summary: &StatisticsSummary) -> Result<()> {
        Ok(())
    }

    /// Called once all results have been handed over
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}
