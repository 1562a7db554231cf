// Column chart rendering payload (Highcharts options) and script embedding
use crate::domain::chart::ChartPoint;
use serde::Serialize;

pub const RENDER_TO: &str = "chart_container";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnChartOptions {
    pub chart: ChartSection,
    pub title: Title,
    pub x_axis: XAxis,
    pub y_axis: YAxis,
    pub series: Vec<Series>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartSection {
    pub render_to: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct Title {
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct XAxis {
    pub title: Title,
    pub categories: Vec<Option<String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct YAxis {
    pub title: Title,
}

#[derive(Debug, Clone, Serialize)]
pub struct Series {
    pub name: String,
    pub data: Vec<Option<f64>>,
}

impl ColumnChartOptions {
    pub fn new(
        title: &str,
        x_axis_title: &str,
        y_axis_title: &str,
        series_name: String,
        points: Vec<ChartPoint>,
    ) -> Self {
        let (categories, data) = points.into_iter().map(|p| (p.category, p.value)).unzip();

        Self {
            chart: ChartSection {
                render_to: RENDER_TO.to_string(),
                kind: "column",
            },
            title: Title {
                text: title.to_string(),
            },
            x_axis: XAxis {
                title: Title {
                    text: x_axis_title.to_string(),
                },
                categories,
            },
            y_axis: YAxis {
                title: Title {
                    text: y_axis_title.to_string(),
                },
            },
            series: vec![Series {
                name: series_name,
                data,
            }],
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// JSON safe to place inside a `<script>` element.
    pub fn to_embeddable_json(&self) -> serde_json::Result<String> {
        Ok(escape_for_script(&self.to_json()?))
    }

    pub fn to_script(&self) -> serde_json::Result<String> {
        Ok(format!(
            "<script type=\"text/javascript\">\nvar chart_options = {};\n</script>\n",
            self.to_embeddable_json()?
        ))
    }
}

/// Escape characters that could end the script element or break JS parsing.
/// The output is still valid JSON with the same value.
fn escape_for_script(json: &str) -> String {
    let mut escaped = String::with_capacity(json.len());
    for c in json.chars() {
        match c {
            '<' => escaped.push_str("\\u003c"),
            '>' => escaped.push_str("\\u003e"),
            '&' => escaped.push_str("\\u0026"),
            '\u{2028}' => escaped.push_str("\\u2028"),
            '\u{2029}' => escaped.push_str("\\u2029"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn options(title: &str) -> ColumnChartOptions {
        ColumnChartOptions::new(
            title,
            "region",
            "amount",
            "sum(amount)".to_string(),
            vec![
                ChartPoint::new(Some("east".to_string()), Some(7.0)),
                ChartPoint::new(Some("west".to_string()), Some(15.0)),
            ],
        )
    }

    #[test]
    fn test_options_shape() {
        let value: Value = serde_json::from_str(&options("Revenue").to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "chart": {"renderTo": RENDER_TO, "type": "column"},
                "title": {"text": "Revenue"},
                "xAxis": {"title": {"text": "region"}, "categories": ["east", "west"]},
                "yAxis": {"title": {"text": "amount"}},
                "series": [{"name": "sum(amount)", "data": [7.0, 15.0]}]
            })
        );
    }

    #[test]
    fn test_null_category_serializes_as_null() {
        let options = ColumnChartOptions::new(
            "Revenue",
            "region",
            "amount",
            "sum(amount)".to_string(),
            vec![
                ChartPoint::new(None, Some(4.0)),
                ChartPoint::new(Some("east".to_string()), None),
            ],
        );
        let value: Value = serde_json::from_str(&options.to_json().unwrap()).unwrap();
        assert_eq!(value["xAxis"]["categories"], json!([null, "east"]));
        assert_eq!(value["series"][0]["data"], json!([4.0, null]));
    }

    #[test]
    fn test_embedding_escapes_user_text() {
        let title = "</script><script>alert('x')</script> & \u{2028}";
        let embedded = options(title).to_embeddable_json().unwrap();

        assert!(!embedded.contains('<'));
        assert!(!embedded.contains('>'));
        assert!(!embedded.contains('&'));
        assert!(!embedded.contains('\u{2028}'));

        let value: Value = serde_json::from_str(&embedded).unwrap();
        assert_eq!(value["title"]["text"], title);
    }

    #[test]
    fn test_script_wraps_options() {
        let script = options("Revenue").to_script().unwrap();
        assert!(script.starts_with("<script type=\"text/javascript\">\nvar chart_options = {"));
        assert!(script.ends_with(";\n</script>\n"));
    }
}
