use super::error::{Result, SheetError};
use super::row::{ColumnDescriptor, Row};
use std::path::Path;
use tracing::info;

fn csv_error(e: csv::Error) -> SheetError {
    SheetError::Io(e.into())
}

/// Serialize headers and rows as CSV text
///
/// The first record holds the header labels; each following record holds a
/// row's values for the header columns, in header order. A field is quoted
/// (with embedded quotes doubled) when it contains a comma, a quote or a line
/// break. A record holding one blank field is written as `""` so it is not
/// read back as an empty line.
pub fn to_csv<'a, I>(headers: &[ColumnDescriptor], rows: I) -> Result<String>
where
    I: IntoIterator<Item = &'a Row>,
{
    if headers.is_empty() {
        return Ok(String::new());
    }

    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Necessary)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer
        .write_record(headers.iter().map(|h| h.label.as_str()))
        .map_err(csv_error)?;

    for row in rows {
        writer
            .write_record(headers.iter().map(|h| row.get(h.index)))
            .map_err(csv_error)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| {
            SheetError::Io(std::io::Error::new(e.error().kind(), e.error().to_string()))
        })?;

    String::from_utf8(bytes).map_err(|e| {
        SheetError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    })
}

/// Write the CSV document to a file
pub fn write_csv_file<'a, I>(path: &Path, headers: &[ColumnDescriptor], rows: I) -> Result<usize>
where
    I: IntoIterator<Item = &'a Row>,
{
    let rows: Vec<&Row> = rows.into_iter().collect();
    let records = rows.len();
    let document = to_csv(headers, rows)?;
    std::fs::write(path, &document)?;

    info!(path = %path.display(), records, "exported CSV");
    Ok(records)
}
