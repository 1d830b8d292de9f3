//! Sheet layouts with defaults from layouts.json
//!
//! Each dashboard view reads one sheet with its own conventions: which tab,
//! which physical row the data starts on, how repeated headers are skipped,
//! which columns mean what. Those conventions live in `layouts.json`, embedded
//! at compile time, so they are defined in one place and named rather than
//! scattered through call sites as literal column numbers.

use super::client::SheetRef;
use super::columns::ColumnMap;
use super::error::{Result, SheetError};
use super::filter::{ColumnFilter, FilterCriteria};
use super::reader::ReadOptions;
use super::row::{HeaderSkip, Row};
use super::validation::{FormValues, Rule};
use super::writer::WriteRequest;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// layouts.json embedded at compile time
const LAYOUTS_JSON: &str = include_str!("../../layouts.json");

fn default_insert_action() -> String {
    "insert".to_string()
}

fn default_true() -> bool {
    true
}

/// Conventions for one view's sheet
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetLayout {
    pub name: String,
    #[serde(default)]
    pub sheet_name: Option<String>,
    #[serde(default)]
    pub gid: Option<u64>,
    /// 1-based physical row of the first gviz row; when unset it follows
    /// the header count the endpoint reports
    #[serde(default)]
    pub first_data_row: Option<usize>,
    #[serde(default)]
    pub header_skip: HeaderSkip,
    pub columns: ColumnMap,
    #[serde(default)]
    pub displayed: Vec<String>,
    /// A row is kept if any of these fields has data
    #[serde(default)]
    pub required: Vec<String>,
    #[serde(default)]
    pub search: Vec<String>,
    /// Fields offered as column filters (at most two)
    #[serde(default)]
    pub filters: Vec<String>,
    /// Business key used to address updates
    #[serde(default)]
    pub key_field: Option<String>,
    /// Form parameter carrying the key (defaults to the key field name)
    #[serde(default)]
    pub key_param: Option<String>,
    #[serde(default)]
    pub update_action: Option<String>,
    #[serde(default = "default_insert_action")]
    pub insert_action: String,
    /// Check the column map against reported headers on first load
    #[serde(default = "default_true")]
    pub validate_headers: bool,
    #[serde(default)]
    pub rules: BTreeMap<String, Vec<Rule>>,
}

impl SheetLayout {
    /// Check internal consistency; every field name must be mapped
    pub fn check(&self) -> Result<()> {
        let err = |msg: String| SheetError::Config(format!("layout '{}': {}", self.name, msg));

        if self.sheet_name.as_deref().map(str::trim).unwrap_or("").is_empty() && self.gid.is_none()
        {
            return Err(err("needs a sheetName or a gid".into()));
        }
        if self.first_data_row == Some(0) {
            return Err(err("firstDataRow is 1-based".into()));
        }
        if self.filters.len() > 2 {
            return Err(err(format!(
                "at most two filter fields, got {}",
                self.filters.len()
            )));
        }

        let named = self
            .displayed
            .iter()
            .chain(&self.required)
            .chain(&self.search)
            .chain(&self.filters)
            .chain(self.key_field.iter())
            .chain(self.rules.keys());
        for field in named {
            if self.columns.get(field).is_none() {
                return Err(err(format!("field '{}' is not in the column map", field)));
            }
        }

        if self.key_field.is_some() && self.update_action.is_none() {
            return Err(err("keyField needs an updateAction".into()));
        }

        Ok(())
    }

    pub fn sheet_ref(&self) -> Result<SheetRef> {
        match (&self.sheet_name, self.gid) {
            (Some(name), _) if !name.trim().is_empty() => Ok(SheetRef::Name(name.clone())),
            (_, Some(gid)) => Ok(SheetRef::Gid(gid)),
            _ => Err(SheetError::Config(format!(
                "layout '{}' has no sheet",
                self.name
            ))),
        }
    }

    /// Tab name used by the write endpoint
    pub fn write_sheet_name(&self) -> Result<&str> {
        self.sheet_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| {
                SheetError::Config(format!(
                    "layout '{}' has no sheetName; writes need one",
                    self.name
                ))
            })
    }

    pub fn read_options(&self) -> Result<ReadOptions> {
        Ok(ReadOptions {
            displayed: self.columns.indices_of(&self.displayed)?,
            required: self.columns.indices_of(&self.required)?,
            skip: self.header_skip.clone(),
            first_data_row: self.first_data_row,
            header_hints: self.columns.header_hints(),
        })
    }

    /// Search over the layout's search fields plus up to two named filters
    pub fn criteria(&self, search: &str, filters: &[(String, String)]) -> Result<FilterCriteria> {
        let mut criteria =
            FilterCriteria::new(self.columns.indices_of(&self.search)?).with_search(search);

        for (field, needle) in filters {
            let column = self.filter_column(field)?;
            if !criteria.push_filter(ColumnFilter::new(column, needle.clone())) {
                return Err(SheetError::Config(format!(
                    "at most two column filters, got {}",
                    filters.len()
                )));
            }
        }

        Ok(criteria)
    }

    /// Column of a field offered as a filter
    pub fn filter_column(&self, field: &str) -> Result<usize> {
        if !self.filters.iter().any(|f| f == field) {
            return Err(SheetError::Config(format!(
                "'{}' is not a filter of {} (filters: {})",
                field,
                self.name,
                self.filters.join(", ")
            )));
        }
        self.columns.index_of(field)
    }

    /// Insert request for a named form
    pub fn insert_request(&self, form: &FormValues) -> Result<WriteRequest> {
        let row = self.columns.layout_row(form)?;
        WriteRequest::with_row(self.write_sheet_name()?, self.insert_action.clone(), &row)
    }

    /// Update request for an existing row
    ///
    /// Addressed by business key when the layout has one, otherwise by the
    /// row's reconstructed index.
    pub fn update_request(&self, row: &Row, changes: &FormValues) -> Result<WriteRequest> {
        for field in changes.keys() {
            self.columns.index_of(field)?;
        }

        let sheet = self.write_sheet_name()?;

        match (&self.key_field, &self.update_action) {
            (Some(key_field), Some(action)) => {
                let key = self.columns.value(row, key_field)?.trim();
                if key.is_empty() {
                    return Err(SheetError::Config(format!(
                        "row {} has no {}",
                        row.row_index, key_field
                    )));
                }
                let param = self.key_param.as_deref().unwrap_or(key_field);
                WriteRequest::update_by_key(sheet, action.clone(), param, key, changes)
            }
            _ => WriteRequest::update_row(sheet, row.row_index, changes),
        }
    }
}

#[derive(Deserialize)]
struct LayoutFile {
    layouts: Vec<SheetLayout>,
}

/// Named layouts
#[derive(Debug, Clone, Default)]
pub struct LayoutRegistry {
    layouts: BTreeMap<String, SheetLayout>,
}

impl LayoutRegistry {
    /// Parse a `{"layouts": [...]}` document
    pub fn from_json(json: &str) -> Result<Self> {
        let file: LayoutFile = serde_json::from_str(json)
            .map_err(|e| SheetError::Config(format!("invalid layouts: {}", e)))?;
        Self::from_layouts(file.layouts)
    }

    pub fn from_layouts(layouts: Vec<SheetLayout>) -> Result<Self> {
        let mut registry = LayoutRegistry::default();
        for layout in layouts {
            if registry.layouts.contains_key(&layout.name) {
                return Err(SheetError::Config(format!(
                    "layout '{}' defined twice",
                    layout.name
                )));
            }
            registry.insert(layout)?;
        }
        Ok(registry)
    }

    /// Add or replace a layout
    pub fn insert(&mut self, layout: SheetLayout) -> Result<()> {
        layout.check()?;
        self.layouts.insert(layout.name.clone(), layout);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&SheetLayout> {
        self.layouts.get(name).ok_or_else(|| {
            SheetError::Config(format!(
                "unknown view '{}' (known: {})",
                name,
                self.names().collect::<Vec<_>>().join(", ")
            ))
        })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.layouts.keys().map(String::as_str)
    }
}

/// Layouts compiled into the binary
static REGISTRY: OnceLock<LayoutRegistry> = OnceLock::new();

/// Get the embedded layout registry
///
/// Panics if layouts.json is malformed, which the tests rule out.
pub fn embedded() -> &'static LayoutRegistry {
    REGISTRY.get_or_init(|| LayoutRegistry::from_json(LAYOUTS_JSON).expect("layouts.json is valid"))
}

#[cfg(test)]
mod tests {
    use super::super::gviz::parse_table;
    use super::super::reader::project;
    use super::*;

    #[test]
    fn test_embedded_layouts_load() {
        let reg = embedded();
        let names: Vec<&str> = reg.names().collect();
        assert_eq!(
            names,
            vec!["attendance", "dealers", "interactions", "sales", "users"]
        );
    }

    #[test]
    fn test_dealers_layout() {
        let dealers = embedded().get("dealers").unwrap();
        assert_eq!(dealers.sheet_ref().unwrap(), SheetRef::Name("Dealers".into()));
        assert_eq!(dealers.first_data_row, Some(2));

        let opts = dealers.read_options().unwrap();
        assert_eq!(opts.required, vec![1, 2]);
        assert_eq!(opts.displayed[0], 1);
        assert_eq!(opts.header_hints.get(&1).map(String::as_str), Some("Dealer Code"));
    }

    #[test]
    fn test_sales_layout_uses_heuristic() {
        let sales = embedded().get("sales").unwrap();
        assert_eq!(sales.header_skip, HeaderSkip::Heuristic);
        assert_eq!(sales.first_data_row, None);
        assert!(!sales.validate_headers);
    }

    #[test]
    fn test_sales_rows_follow_consumed_header() {
        let sales = embedded().get("sales").unwrap();
        let body = r#"({"table":{"cols":[{"id":"A","label":"Date"},{"id":"B","label":"Dealer Code"},{"id":"C","label":"Dealer Name"},{"id":"D","label":"City"},{"id":"E","label":"Product"},{"id":"F","label":"Quantity"},{"id":"G","label":"Sales"},{"id":"H","label":"Employee"}],"rows":[{"c":[{"v":"2024-01-05"},{"v":"D-1"},{"v":"Acme"},{"v":"Pune"},{"v":"Tiles"},{"v":"3"},{"v":"1200"},{"v":"asha"}]}],"parsedNumHeaders":1}})"#;
        let table = parse_table(body).unwrap();
        let data = project(&table, &sales.read_options().unwrap());

        assert_eq!(data.rows.len(), 1);
        assert_eq!(data.rows[0].row_index, 2);

        let mut changes = FormValues::new();
        changes.insert("sales".into(), "1300".into());
        let request = sales.update_request(&data.rows[0], &changes).unwrap();
        assert_eq!(request.params[0], ("rowIndex".to_string(), "2".to_string()));
    }

    #[test]
    fn test_check_rejects_zero_first_data_row() {
        let json = r#"{"layouts":[{"name":"x","sheetName":"X","firstDataRow":0,"columns":[{"field":"a","index":0}]}]}"#;
        assert!(LayoutRegistry::from_json(json).is_err());
    }

    #[test]
    fn test_unknown_view() {
        assert!(matches!(embedded().get("payroll"), Err(SheetError::Config(_))));
    }

    #[test]
    fn test_check_rejects_unmapped_field() {
        let json = r#"{"layouts":[{"name":"x","sheetName":"X","columns":[{"field":"a","index":0}],"displayed":["b"]}]}"#;
        assert!(LayoutRegistry::from_json(json).is_err());
    }

    #[test]
    fn test_check_rejects_missing_sheet() {
        let json = r#"{"layouts":[{"name":"x","columns":[{"field":"a","index":0}]}]}"#;
        assert!(LayoutRegistry::from_json(json).is_err());
    }

    #[test]
    fn test_gid_only_layout_cannot_write() {
        let json = r#"{"layouts":[{"name":"x","gid":7,"columns":[{"field":"a","index":0}]}]}"#;
        let reg = LayoutRegistry::from_json(json).unwrap();
        let layout = reg.get("x").unwrap();
        assert_eq!(layout.sheet_ref().unwrap(), SheetRef::Gid(7));
        assert!(layout.write_sheet_name().is_err());
    }

    #[test]
    fn test_criteria_from_field_names() {
        let dealers = embedded().get("dealers").unwrap();
        let criteria = dealers
            .criteria("acme", &[("city".to_string(), "delhi".to_string())])
            .unwrap();
        assert_eq!(criteria.search_columns, vec![1, 2, 3, 4]);
        assert_eq!(criteria.column_filters[0], Some(ColumnFilter::new(6, "delhi")));

        let three = vec![
            ("city".to_string(), "a".to_string()),
            ("state".to_string(), "b".to_string()),
            ("category".to_string(), "c".to_string()),
        ];
        assert!(dealers.criteria("", &three).is_err());
        assert!(dealers
            .criteria("", &[("nope".to_string(), "x".to_string())])
            .is_err());
    }

    #[test]
    fn test_criteria_only_accepts_filter_fields() {
        let dealers = embedded().get("dealers").unwrap();
        assert_eq!(dealers.filter_column("state").unwrap(), 7);
        // Mapped, but not offered as a filter
        assert!(matches!(
            dealers.criteria("", &[("category".to_string(), "retail".to_string())]),
            Err(SheetError::Config(_))
        ));
    }

    #[test]
    fn test_insert_request_lays_out_row() {
        let interactions = embedded().get("interactions").unwrap();
        let mut form = FormValues::new();
        form.insert("dealerCode".into(), "D-1".into());
        form.insert("notes".into(), "Visited".into());

        let request = interactions.insert_request(&form).unwrap();
        assert_eq!(request.action, "add");
        assert_eq!(request.sheet_name, "Interactions");
        assert_eq!(
            request.params[0].1,
            r#"["","D-1","","","","","","Visited","",""]"#
        );
    }

    #[test]
    fn test_update_prefers_business_key() {
        let dealers = embedded().get("dealers").unwrap();
        let mut row = Row::new(9, vec![]);
        row.set(1, "D-042");
        let mut changes = FormValues::new();
        changes.insert("phone".into(), "9999999999".into());

        let request = dealers.update_request(&row, &changes).unwrap();
        assert_eq!(request.action, "updateByDealerCode");
        assert_eq!(request.params[0], ("dealerCode".to_string(), "D-042".to_string()));

        let blank = Row::new(10, vec![]);
        assert!(dealers.update_request(&blank, &changes).is_err());
    }

    #[test]
    fn test_update_falls_back_to_row_index() {
        let attendance = embedded().get("attendance").unwrap();
        let row = Row::new(12, vec![]);
        let mut changes = FormValues::new();
        changes.insert("checkOut".into(), "18:05".into());

        let request = attendance.update_request(&row, &changes).unwrap();
        assert_eq!(request.action, "update");
        assert_eq!(request.params[0], ("rowIndex".to_string(), "12".to_string()));

        changes.insert("bogus".into(), "x".into());
        assert!(attendance.update_request(&row, &changes).is_err());
    }
}
