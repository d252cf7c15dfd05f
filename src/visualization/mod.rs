//! Evaluation charts
//!
//! Charts are written as SVG files; a batch CLI has no window to show
//! them in. Callers treat a render failure as a warning, the metrics of a
//! run stay valid without the pictures.

use crate::error::{PipelineError, Result};
use crate::schema;
use plotters::prelude::*;
use std::path::Path;
use tracing::info;

const CAPTION_FONT: (&str, u32) = ("sans-serif", 22);
const LABEL_FONT: (&str, u32) = ("sans-serif", 13);

fn render_err<E: std::error::Error + Send + Sync>(err: DrawingAreaErrorKind<E>) -> PipelineError {
    PipelineError::Render(err.to_string())
}

/// Latin chart label for a feature column
pub fn display_label(column: &str) -> String {
    match column {
        schema::AREA => "Area (m2)".to_string(),
        schema::FLOOR => "Floor".to_string(),
        schema::BUILD_YEAR => "Build year".to_string(),
        schema::PROPERTY_AGE => "Age".to_string(),
        schema::DISTRICT_CODE => "District code".to_string(),
        schema::COMPLEX_CODE => "Complex code".to_string(),
        schema::UNIFIED_VALUE => "Lease-equivalent".to_string(),
        other => other.to_string(),
    }
}

/// Scatter of held-out actual vs predicted values with a y = x reference
pub fn render_actual_vs_predicted(
    actual: &[f64],
    predicted: &[f64],
    path: impl AsRef<Path>,
) -> Result<()> {
    let path = path.as_ref();
    if actual.is_empty() || actual.len() != predicted.len() {
        return Err(PipelineError::Render(format!(
            "need matching non-empty series, got {} actual and {} predicted",
            actual.len(),
            predicted.len()
        )));
    }

    let (mut lo, mut hi) = actual
        .iter()
        .chain(predicted)
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let pad = ((hi - lo).abs() * 0.05).max(1.0);
    lo -= pad;
    hi += pad;

    let root = SVGBackend::new(path, (900, 800)).into_drawing_area();
    root.fill(&WHITE).map_err(render_err)?;

    let mut chart = ChartBuilder::on(&root)
        .margin(12)
        .caption("Actual vs Predicted (10k KRW)", CAPTION_FONT)
        .x_label_area_size(40)
        .y_label_area_size(70)
        .build_cartesian_2d(lo..hi, lo..hi)
        .map_err(render_err)?;

    chart
        .configure_mesh()
        .x_desc("Actual")
        .y_desc("Predicted")
        .x_label_formatter(&|v| format!("{:.0}", v))
        .y_label_formatter(&|v| format!("{:.0}", v))
        .light_line_style(BLACK.mix(0.06))
        .label_style(LABEL_FONT)
        .draw()
        .map_err(render_err)?;

    chart
        .draw_series(
            actual
                .iter()
                .zip(predicted)
                .map(|(&a, &p)| Circle::new((a, p), 3, BLUE.mix(0.5).filled())),
        )
        .map_err(render_err)?;

    chart
        .draw_series(LineSeries::new(vec![(lo, lo), (hi, hi)], RED.stroke_width(2)))
        .map_err(render_err)?
        .label("y = x")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RED));

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(render_err)?;

    root.present().map_err(render_err)?;
    info!(path = %path.display(), points = actual.len(), "Rendered actual-vs-predicted chart");
    Ok(())
}

/// Horizontal bars of feature importances, largest at the top
pub fn render_feature_importances(
    names: &[String],
    importances: &[f64],
    path: impl AsRef<Path>,
) -> Result<()> {
    let path = path.as_ref();
    if names.is_empty() || names.len() != importances.len() {
        return Err(PipelineError::Render(format!(
            "need one importance per feature, got {} names and {} values",
            names.len(),
            importances.len()
        )));
    }

    let mut bars: Vec<(String, f64)> = names
        .iter()
        .map(|n| display_label(n))
        .zip(importances.iter().copied())
        .collect();
    bars.sort_by(|a, b| a.1.total_cmp(&b.1));

    let n = bars.len();
    let x_max = bars.iter().map(|b| b.1).fold(0.0f64, f64::max).max(1e-9) * 1.1;
    let height = 120 + 40 * n as u32;

    let root = SVGBackend::new(path, (900, height)).into_drawing_area();
    root.fill(&WHITE).map_err(render_err)?;

    let mut chart = ChartBuilder::on(&root)
        .margin(12)
        .caption("Feature importance", CAPTION_FONT)
        .x_label_area_size(40)
        .y_label_area_size(140)
        .build_cartesian_2d(0.0..x_max, (0..n).into_segmented())
        .map_err(render_err)?;

    chart
        .configure_mesh()
        .disable_y_mesh()
        .y_labels(n)
        .y_label_formatter(&|v| match v {
            SegmentValue::CenterOf(i) => bars.get(*i).map(|b| b.0.clone()).unwrap_or_default(),
            _ => String::new(),
        })
        .x_desc("Importance")
        .x_label_formatter(&|v| format!("{:.2}", v))
        .label_style(LABEL_FONT)
        .draw()
        .map_err(render_err)?;

    chart
        .draw_series(bars.iter().enumerate().map(|(i, (_, value))| {
            Rectangle::new(
                [(0.0, SegmentValue::Exact(i)), (*value, SegmentValue::Exact(i + 1))],
                BLUE.mix(0.7).filled(),
            )
        }))
        .map_err(render_err)?;

    root.present().map_err(render_err)?;
    info!(path = %path.display(), features = n, "Rendered feature importance chart");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_label() {
        assert_eq!(display_label("전용면적(㎡)"), "Area (m2)");
        assert_eq!(display_label("unknown"), "unknown");
    }

    #[test]
    fn test_rejects_mismatched_input() {
        let dir = tempfile::tempdir().unwrap();
        let err = render_actual_vs_predicted(&[1.0], &[], dir.path().join("a.svg")).unwrap_err();
        assert!(matches!(err, PipelineError::Render(_)));
        let err = render_feature_importances(&[], &[], dir.path().join("b.svg")).unwrap_err();
        assert!(matches!(err, PipelineError::Render(_)));
    }
}
