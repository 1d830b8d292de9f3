//! Sales and attendance aggregations
//!
//! Amount cells go through [`parse_amount`], so blank, non-numeric and
//! non-positive values simply do not contribute. Rows whose date does not
//! parse are left out of the monthly figures.

use crate::gsheets::error::Result;
use crate::gsheets::layouts::{LayoutRegistry, SheetLayout};
use crate::gsheets::reader::SheetData;
use crate::gsheets::row::Row;
use crate::gsheets::values::{format_date, month_label, parse_amount, parse_sheet_date};
use crate::gsheets::SheetsClient;
use chrono::{Datelike, NaiveDate};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::info;

/// Sum of an amount column
pub fn total_amount<'a, I>(rows: I, amount_col: usize) -> f64
where
    I: IntoIterator<Item = &'a Row>,
{
    rows.into_iter()
        .filter_map(|row| parse_amount(row.get(amount_col)))
        .sum()
}

#[derive(Debug, Clone, PartialEq)]
pub struct KeyTotal {
    pub key: String,
    pub total: f64,
    /// Rows that contributed
    pub count: usize,
}

/// Totals per distinct key, largest first
///
/// Keys are trimmed; blank keys are skipped. Equal totals keep key order.
pub fn totals_by_key<'a, I>(rows: I, key_col: usize, amount_col: usize) -> Vec<KeyTotal>
where
    I: IntoIterator<Item = &'a Row>,
{
    let mut totals: BTreeMap<String, (f64, usize)> = BTreeMap::new();
    for row in rows {
        let key = row.get(key_col).trim();
        if key.is_empty() {
            continue;
        }
        if let Some(amount) = parse_amount(row.get(amount_col)) {
            let entry = totals.entry(key.to_string()).or_insert((0.0, 0));
            entry.0 += amount;
            entry.1 += 1;
        }
    }

    let mut out: Vec<KeyTotal> = totals
        .into_iter()
        .map(|(key, (total, count))| KeyTotal { key, total, count })
        .collect();
    out.sort_by(|a, b| b.total.total_cmp(&a.total));
    out
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonthTotal {
    /// First day of the month
    pub month: NaiveDate,
    /// "January 2024"
    pub label: String,
    pub total: f64,
}

fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Totals per calendar month, oldest first
pub fn totals_by_month<'a, I>(rows: I, date_col: usize, amount_col: usize) -> Vec<MonthTotal>
where
    I: IntoIterator<Item = &'a Row>,
{
    let mut totals: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for row in rows {
        let (Some(date), Some(amount)) = (
            parse_sheet_date(row.get(date_col)),
            parse_amount(row.get(amount_col)),
        ) else {
            continue;
        };
        *totals.entry(month_start(date)).or_insert(0.0) += amount;
    }

    totals
        .into_iter()
        .map(|(month, total)| MonthTotal {
            month,
            label: month_label(month),
            total,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendanceCount {
    pub person: String,
    pub month: NaiveDate,
    pub label: String,
    /// Distinct days with at least one record
    pub days: usize,
}

/// Days present per person per month
///
/// Several records on the same day count once. Ordered by person, then month.
pub fn attendance_by_month<'a, I>(rows: I, person_col: usize, date_col: usize) -> Vec<AttendanceCount>
where
    I: IntoIterator<Item = &'a Row>,
{
    let mut days: BTreeMap<(String, NaiveDate), BTreeSet<NaiveDate>> = BTreeMap::new();
    for row in rows {
        let person = row.get(person_col).trim();
        if person.is_empty() {
            continue;
        }
        if let Some(date) = parse_sheet_date(row.get(date_col)) {
            days.entry((person.to_string(), month_start(date)))
                .or_default()
                .insert(date);
        }
    }

    days.into_iter()
        .map(|((person, month), dates)| AttendanceCount {
            person,
            month,
            label: month_label(month),
            days: dates.len(),
        })
        .collect()
}

/// Figures for the reports view
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardReport {
    pub sales_rows: usize,
    pub total_sales: f64,
    pub by_dealer: Vec<KeyTotal>,
    pub by_month: Vec<MonthTotal>,
    pub attendance: Vec<AttendanceCount>,
    /// Most recent attendance date seen
    pub last_attendance: Option<NaiveDate>,
}

impl DashboardReport {
    /// Aggregate already-loaded sales and attendance data
    pub fn build(
        sales_layout: &SheetLayout,
        sales: &SheetData,
        attendance_layout: &SheetLayout,
        attendance: &SheetData,
    ) -> Result<Self> {
        let sales_cols = &sales_layout.columns;
        let amount = sales_cols.index_of("sales")?;
        let dealer = sales_cols.index_of("dealerName")?;
        let sale_date = sales_cols.index_of("date")?;

        let att_cols = &attendance_layout.columns;
        let person = att_cols.index_of("employee")?;
        let att_date = att_cols.index_of("date")?;

        Ok(DashboardReport {
            sales_rows: sales.rows.len(),
            total_sales: total_amount(&sales.rows, amount),
            by_dealer: totals_by_key(&sales.rows, dealer, amount),
            by_month: totals_by_month(&sales.rows, sale_date, amount),
            attendance: attendance_by_month(&attendance.rows, person, att_date),
            last_attendance: attendance
                .rows
                .iter()
                .filter_map(|r| parse_sheet_date(r.get(att_date)))
                .max(),
        })
    }
}

/// Fetch the sales and attendance sheets concurrently and aggregate them
pub async fn load_dashboard_report(
    client: &SheetsClient,
    layouts: &LayoutRegistry,
) -> Result<DashboardReport> {
    let sales_layout = layouts.get("sales")?;
    let attendance_layout = layouts.get("attendance")?;

    let sales_ref = sales_layout.sheet_ref()?;
    let sales_opts = sales_layout.read_options()?;
    let attendance_ref = attendance_layout.sheet_ref()?;
    let attendance_opts = attendance_layout.read_options()?;

    let reader = client.reader();
    let (sales, attendance) = futures::future::try_join(
        reader.read(&sales_ref, &sales_opts),
        reader.read(&attendance_ref, &attendance_opts),
    )
    .await?;

    let report = DashboardReport::build(sales_layout, &sales, attendance_layout, &attendance)?;
    info!(
        sales_rows = report.sales_rows,
        attendance_rows = attendance.rows.len(),
        "report built"
    );
    Ok(report)
}

impl fmt::Display for DashboardReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total sales: {:.2} ({} rows)", self.total_sales, self.sales_rows)?;

        writeln!(f, "\nSales by dealer:")?;
        for t in &self.by_dealer {
            writeln!(f, "  {:<32} {:>14.2}  ({} entries)", t.key, t.total, t.count)?;
        }

        writeln!(f, "\nSales by month:")?;
        for m in &self.by_month {
            writeln!(f, "  {:<16} {:>14.2}", m.label, m.total)?;
        }

        writeln!(f, "\nAttendance (days present):")?;
        for a in &self.attendance {
            writeln!(f, "  {:<24} {:<16} {:>3}", a.person, a.label, a.days)?;
        }

        if let Some(last) = self.last_attendance {
            writeln!(f, "\nLast attendance record: {}", format_date(last))?;
        }
        Ok(())
    }
}
