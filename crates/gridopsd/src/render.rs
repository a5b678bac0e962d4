//! Chart rendering collaborator.

use gridops_shared::{ChartKind, Insight, ResultTable};
use serde_json::json;

pub trait ChartRenderer: Send + Sync {
    /// A chart document for `table`, or `None` when inputs are insufficient.
    fn render(&self, table: &ResultTable, insight: &Insight) -> Option<String>;
}

/// Plotly figure JSON with a single trace on a dark template
#[derive(Debug, Clone, Default)]
pub struct PlotlyRenderer;

impl ChartRenderer for PlotlyRenderer {
    fn render(&self, table: &ResultTable, insight: &Insight) -> Option<String> {
        if table.is_empty() {
            return None;
        }
        let (x_col, y_col) = insight.axes()?;
        let xs = table.column_values(x_col)?;
        let ys = table.column_values(y_col)?;

        let trace = match insight.chart_kind {
            ChartKind::Line => json!({
                "type": "scatter",
                "mode": "lines",
                "x": xs,
                "y": ys,
                "name": y_col,
            }),
            ChartKind::Bar => json!({
                "type": "bar",
                "x": xs,
                "y": ys,
                "name": y_col,
            }),
            ChartKind::Table | ChartKind::None => return None,
        };

        let figure = json!({
            "data": [trace],
            "layout": {
                "template": "plotly_dark",
                "xaxis": { "title": { "text": x_col } },
                "yaxis": { "title": { "text": y_col } },
            }
        });
        Some(figure.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn table() -> ResultTable {
        ResultTable::new(vec!["date".into(), "value".into()])
            .with_row(vec![json!("2025-06-02"), json!(1234.5)])
    }

    #[test]
    fn test_line_chart() {
        let insight = Insight::chart("s", ChartKind::Line, "date", "value");
        let doc = PlotlyRenderer.render(&table(), &insight).unwrap();
        let v: Value = serde_json::from_str(&doc).unwrap();
        assert_eq!(v["data"][0]["type"], "scatter");
        assert_eq!(v["data"][0]["mode"], "lines");
        assert_eq!(v["data"][0]["y"][0], 1234.5);
        assert_eq!(v["layout"]["template"], "plotly_dark");
    }

    #[test]
    fn test_bar_chart() {
        let insight = Insight::chart("s", ChartKind::Bar, "date", "value");
        let v: Value = serde_json::from_str(&PlotlyRenderer.render(&table(), &insight).unwrap()).unwrap();
        assert_eq!(v["data"][0]["type"], "bar");
    }

    #[test]
    fn test_insufficient_inputs() {
        let line = Insight::chart("s", ChartKind::Line, "date", "value");
        assert!(PlotlyRenderer
            .render(&ResultTable::new(vec!["date".into(), "value".into()]), &line)
            .is_none());

        let missing = Insight::chart("s", ChartKind::Line, "date", "revenue");
        assert!(PlotlyRenderer.render(&table(), &missing).is_none());

        let tbl = Insight::chart("s", ChartKind::Table, "date", "value");
        assert!(PlotlyRenderer.render(&table(), &tbl).is_none());
    }
}
