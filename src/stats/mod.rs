/// Descriptive statistics over the dataset table
///
/// `summarize` is the only place numeric aggregation happens. Each of
/// height, width and depth is described independently over its non-null
/// values, the same eight figures a data-frame `describe()` would print.

pub mod histogram;

use serde::Serialize;
use std::fmt;

use crate::state::table::DatasetTable;

pub use histogram::{histogram, AreaHistogram, ChannelHistogram};

/// Eight-number description of one column.
/// Undefined figures (empty column, std with fewer than two values) are None.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ColumnSummary {
    pub count: usize,
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub min: Option<f64>,
    #[serde(rename = "25%")]
    pub q25: Option<f64>,
    #[serde(rename = "50%")]
    pub q50: Option<f64>,
    #[serde(rename = "75%")]
    pub q75: Option<f64>,
    pub max: Option<f64>,
}

impl ColumnSummary {
    /// Describe a column of values (order does not matter)
    pub fn describe(mut values: Vec<f64>) -> Self {
        let count = values.len();
        if count == 0 {
            return Self {
                count,
                mean: None,
                std: None,
                min: None,
                q25: None,
                q50: None,
                q75: None,
                max: None,
            };
        }

        values.sort_by(|a, b| a.total_cmp(b));

        let n = count as f64;
        let mean = values.iter().sum::<f64>() / n;
        // Sample standard deviation (n - 1 denominator)
        let std = if count < 2 {
            None
        } else {
            let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
            Some((ss / (n - 1.0)).sqrt())
        };

        Self {
            count,
            mean: Some(mean),
            std,
            min: Some(values[0]),
            q25: Some(quantile(&values, 0.25)),
            q50: Some(quantile(&values, 0.50)),
            q75: Some(quantile(&values, 0.75)),
            max: Some(values[count - 1]),
        }
    }
}

/// Linear-interpolation quantile of sorted, non-empty data
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * frac
}

/// Per-column statistics for height, width and depth
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StatisticsSummary {
    pub height: ColumnSummary,
    pub width: ColumnSummary,
    pub depth: ColumnSummary,
}

/// Describe the shape columns of `table`
pub fn summarize(table: &DatasetTable) -> StatisticsSummary {
    let column = |pick: fn(&crate::state::Record) -> Option<f64>| {
        ColumnSummary::describe(table.iter().filter_map(pick).collect())
    };

    StatisticsSummary {
        height: column(|r| r.height().map(f64::from)),
        width: column(|r| r.width().map(f64::from)),
        depth: column(|r| r.depth().map(f64::from)),
    }
}

fn stat_cell(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.6}", v),
        None => "NaN".to_string(),
    }
}

/// Rows are statistics, columns are height/width/depth
impl fmt::Display for StatisticsSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let columns = [&self.height, &self.width, &self.depth];
        let rows: [(&str, [String; 3]); 8] = [
            ("count", columns.map(|c| format!("{:.6}", c.count as f64))),
            ("mean", columns.map(|c| stat_cell(c.mean))),
            ("std", columns.map(|c| stat_cell(c.std))),
            ("min", columns.map(|c| stat_cell(c.min))),
            ("25%", columns.map(|c| stat_cell(c.q25))),
            ("50%", columns.map(|c| stat_cell(c.q50))),
            ("75%", columns.map(|c| stat_cell(c.q75))),
            ("max", columns.map(|c| stat_cell(c.max))),
        ];

        let width = rows
            .iter()
            .flat_map(|(_, cells)| cells.iter().map(|c| c.len()))
            .chain(["height".len(), "width".len(), "depth".len()])
            .max()
            .unwrap_or(0);

        write!(f, "{:<5}", "")?;
        for name in ["height", "width", "depth"] {
            write!(f, "  {:>width$}", name, width = width)?;
        }
        for (label, cells) in &rows {
            writeln!(f)?;
            write!(f, "{:<5}", label)?;
            for cell in cells {
                write!(f, "  {:>width$}", cell, width = width)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::record::{Record, Shape};

    fn table_with(shapes: &[Option<Shape>]) -> DatasetTable {
        let records = shapes
            .iter()
            .enumerate()
            .map(|(i, shape)| {
                let mut record = Record::new(format!("/img/{}.png", i), format!("{}.png", i));
                record.shape = *shape;
                record
            })
            .collect();
        DatasetTable::from_records(records).unwrap()
    }

    fn close(a: Option<f64>, b: f64) -> bool {
        a.map(|a| (a - b).abs() < 1e-9).unwrap_or(false)
    }

    #[test]
    fn test_describe_known_values() {
        let summary = ColumnSummary::describe(vec![4.0, 1.0, 3.0, 2.0]);
        assert_eq!(summary.count, 4);
        assert!(close(summary.mean, 2.5));
        // sample variance = 5/3
        assert!(close(summary.std, (5.0f64 / 3.0).sqrt()));
        assert!(close(summary.min, 1.0));
        assert!(close(summary.q25, 1.75));
        assert!(close(summary.q50, 2.5));
        assert!(close(summary.q75, 3.25));
        assert!(close(summary.max, 4.0));
    }

    #[test]
    fn test_describe_constant_column() {
        let summary = ColumnSummary::describe(vec![7.0; 5]);
        assert_eq!(summary.mean, Some(7.0));
        assert_eq!(summary.std, Some(0.0));
        assert_eq!(summary.min, Some(7.0));
        assert_eq!(summary.max, Some(7.0));
        assert_eq!(summary.q50, Some(7.0));
    }

    #[test]
    fn test_describe_single_value_has_no_std() {
        let summary = ColumnSummary::describe(vec![42.0]);
        assert_eq!(summary.count, 1);
        assert_eq!(summary.mean, Some(42.0));
        assert_eq!(summary.std, None);
        assert_eq!(summary.q25, Some(42.0));
        assert_eq!(summary.q75, Some(42.0));
    }

    #[test]
    fn test_summarize_skips_nulls() {
        let table = table_with(&[
            Some(Shape::new(100, 200, 3)),
            None,
            Some(Shape::new(300, 400, 1)),
        ]);
        let summary = summarize(&table);

        assert_eq!(summary.height.count, 2);
        assert!(close(summary.height.mean, 200.0));
        assert!(close(summary.width.q50, 300.0));
        assert!(close(summary.depth.min, 1.0));
        assert!(close(summary.depth.max, 3.0));
    }

    #[test]
    fn test_summarize_empty_table_is_undefined() {
        let summary = summarize(&DatasetTable::default());
        for column in [summary.height, summary.width, summary.depth] {
            assert_eq!(column.count, 0);
            assert_eq!(column.mean, None);
            assert_eq!(column.std, None);
            assert_eq!(column.min, None);
            assert_eq!(column.max, None);
        }
        assert!(summary.to_string().contains("NaN"));
    }

    #[test]
    fn test_summarize_all_unreadable() {
        let summary = summarize(&table_with(&[None, None]));
        assert_eq!(summary.width.count, 0);
        assert_eq!(summary.width.q50, None);
    }

    #[test]
    fn test_display_layout() {
        let table = table_with(&[Some(Shape::new(10, 20, 3)), Some(Shape::new(30, 40, 3))]);
        let text = summarize(&table).to_string();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 9);
        assert!(lines[0].contains("height") && lines[0].contains("depth"));
        assert!(lines[1].starts_with("count"));
        assert!(lines[8].starts_with("max"));
        assert!(lines[2].contains("20.000000"));
    }

    #[test]
    fn test_json_uses_percentile_keys() {
        let summary = summarize(&table_with(&[Some(Shape::new(1, 1, 1))]));
        let json = serde_json::to_value(summary).unwrap();
        assert!(json["height"]["25%"].is_number());
        assert!(json["height"]["std"].is_null());
    }
}
