//! gviz response handling
//!
//! The tabular-query endpoint answers with JSON wrapped in a JavaScript
//! callback, e.g.
//!
//! ```text
//! /*O_o*/
//! google.visualization.Query.setResponse({"version":"0.6","status":"ok","table":{...}});
//! ```
//!
//! Only the text between the first `{` and the last `}` is JSON.

use super::error::{Result, SheetError};
use serde::Deserialize;

/// Slice out the JSON object embedded in a wrapped response body
///
/// Returns the substring from the first `{` to the last `}`, inclusive.
pub fn extract_json_object(body: &str) -> Result<&str> {
    let start = body.find('{');
    let end = body.rfind('}');

    match (start, end) {
        (Some(start), Some(end)) if start < end => Ok(&body[start..=end]),
        _ => Err(SheetError::MalformedResponse(format!(
            "no JSON object found in response ({} bytes)",
            body.len()
        ))),
    }
}

/// Top-level gviz payload
#[derive(Debug, Clone, Deserialize)]
pub struct GvizResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub table: Option<GvizTable>,
    #[serde(default)]
    pub errors: Vec<GvizError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GvizError {
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub detailed_message: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GvizTable {
    #[serde(default)]
    pub cols: Vec<GvizColumn>,
    #[serde(default)]
    pub rows: Vec<GvizRow>,
    /// Leading sheet rows the endpoint consumed as column labels
    #[serde(rename = "parsedNumHeaders", default)]
    pub parsed_num_headers: Option<usize>,
}

/// Column descriptor as reported by the endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GvizColumn {
    /// Column letter ("A", "B", ...)
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GvizRow {
    /// Cells; `null` entries are empty trailing cells
    #[serde(default)]
    pub c: Option<Vec<Option<GvizCell>>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GvizCell {
    /// Raw value
    #[serde(default)]
    pub v: Option<serde_json::Value>,
    /// Formatted value
    #[serde(default)]
    pub f: Option<String>,
}

impl GvizCell {
    /// Display value: formatted slot first, then raw, else empty
    pub fn display_value(&self) -> String {
        if let Some(formatted) = &self.f {
            return formatted.clone();
        }
        match &self.v {
            None | Some(serde_json::Value::Null) => String::new(),
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(serde_json::Value::Number(n)) => n.to_string(),
            Some(serde_json::Value::Bool(b)) => b.to_string(),
            Some(other) => other.to_string(),
        }
    }
}

impl GvizRow {
    /// Display values of the row's cells in positional order
    pub fn display_values(&self) -> Vec<String> {
        self.c
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|cell| cell.as_ref().map(GvizCell::display_value).unwrap_or_default())
            .collect()
    }
}

/// Extract and parse a wrapped gviz body
pub fn parse_response(body: &str) -> Result<GvizResponse> {
    let json = extract_json_object(body)?;
    serde_json::from_str(json)
        .map_err(|e| SheetError::MalformedResponse(format!("invalid gviz JSON: {}", e)))
}

/// Parse a wrapped gviz body and return its table
///
/// A payload with `status: "error"` or without a table is reported as a
/// malformed response carrying the endpoint's own error text.
pub fn parse_table(body: &str) -> Result<GvizTable> {
    let response = parse_response(body)?;

    if let Some(table) = response.table {
        return Ok(table);
    }

    let detail = response
        .errors
        .iter()
        .filter_map(|e| {
            e.detailed_message
                .as_deref()
                .or(e.message.as_deref())
                .or(e.reason.as_deref())
        })
        .collect::<Vec<_>>()
        .join("; ");

    Err(SheetError::MalformedResponse(format!(
        "response has no table (status: {}){}",
        response.status.as_deref().unwrap_or("unknown"),
        if detail.is_empty() {
            String::new()
        } else {
            format!(": {}", detail)
        }
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    const WRAPPED: &str = r#"/*O_o*/
google.visualization.Query.setResponse({"version":"0.6","reqId":"0","status":"ok","sig":"1","table":{"cols":[{"id":"A","label":"Dealer Code","type":"string"},{"id":"B","label":"","type":"number","pattern":"General"}],"rows":[{"c":[{"v":"D-001"},{"v":1234.5,"f":"1,234.50"}]},{"c":[{"v":"D-002"},null]},{"c":null}],"parsedNumHeaders":1}});"#;

    #[test]
    fn test_extract_ignores_prefix_and_suffix() {
        let json = extract_json_object("garbage({\"a\":{\"b\":1}});trailing").unwrap();
        assert_eq!(json, "{\"a\":{\"b\":1}}");

        let json = extract_json_object("{}").unwrap();
        assert_eq!(json, "{}");
    }

    #[test]
    fn test_extract_missing_braces() {
        assert!(matches!(
            extract_json_object("no json here"),
            Err(SheetError::MalformedResponse(_))
        ));
        assert!(matches!(
            extract_json_object("only { open"),
            Err(SheetError::MalformedResponse(_))
        ));
        assert!(matches!(
            extract_json_object("} backwards {"),
            Err(SheetError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_parse_wrapped_table() {
        let table = parse_table(WRAPPED).unwrap();
        assert_eq!(table.cols.len(), 2);
        assert_eq!(table.cols[0].label.as_deref(), Some("Dealer Code"));
        assert_eq!(table.rows.len(), 3);

        assert_eq!(table.rows[0].display_values(), vec!["D-001", "1,234.50"]);
        assert_eq!(table.rows[1].display_values(), vec!["D-002", ""]);
        assert!(table.rows[2].display_values().is_empty());
    }

    #[test]
    fn test_invalid_json_between_braces() {
        assert!(matches!(
            parse_response("setResponse({not json});"),
            Err(SheetError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_error_status_reports_detail() {
        let body = r#"setResponse({"status":"error","errors":[{"reason":"invalid_query","message":"INVALID_QUERY","detailed_message":"Invalid sheet"}]});"#;
        match parse_table(body) {
            Err(SheetError::MalformedResponse(msg)) => {
                assert!(msg.contains("status: error"));
                assert!(msg.contains("Invalid sheet"));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_cell_value_preference() {
        let cell = GvizCell {
            v: Some(serde_json::json!("Date(2024,0,15)")),
            f: Some("15/01/2024".into()),
        };
        assert_eq!(cell.display_value(), "15/01/2024");

        let cell = GvizCell {
            v: Some(serde_json::json!(42)),
            f: None,
        };
        assert_eq!(cell.display_value(), "42");

        let cell = GvizCell {
            v: Some(serde_json::json!(true)),
            f: None,
        };
        assert_eq!(cell.display_value(), "true");

        assert_eq!(GvizCell::default().display_value(), "");
    }
}
