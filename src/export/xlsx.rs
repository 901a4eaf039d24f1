//! `.xlsx` rendering of an [`ExportTable`].

use super::table::{Cell, ExportTable};
use crate::error::ExportError;
use crate::model::InvoiceDocument;
use chrono::{Datelike, NaiveDate};
use rust_xlsxwriter::{Color, ExcelDateTime, Format, FormatAlign, Workbook};
use std::path::Path;
use tracing::{debug, info};

/// Name of the single worksheet.
pub const SHEET_NAME: &str = "Faktura";

const HEADER_FILL: u32 = 0x4472C4;
const MONEY_FORMAT: &str = "#,##0.00";
const DATE_FORMAT: &str = "yyyy-mm-dd";
const MAX_COLUMN_WIDTH: usize = 50;

/// Render `doc` as an `.xlsx` workbook in memory.
pub fn to_xlsx_bytes(doc: &InvoiceDocument) -> Result<Vec<u8>, ExportError> {
    table_to_xlsx(&ExportTable::from_document(doc)?)
}

/// Render an already flattened table.
pub fn table_to_xlsx(table: &ExportTable) -> Result<Vec<u8>, ExportError> {
    if table.is_empty() {
        return Err(ExportError::EmptyDocument);
    }

    let header = Format::new()
        .set_bold()
        .set_font_color(Color::White)
        .set_background_color(Color::RGB(HEADER_FILL))
        .set_align(FormatAlign::Center);
    let text = Format::new();
    let number = Format::new().set_align(FormatAlign::Right);
    let money = Format::new()
        .set_align(FormatAlign::Right)
        .set_num_format(MONEY_FORMAT);
    let date = Format::new().set_num_format(DATE_FORMAT);

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;

    for (c, column) in table.columns().iter().enumerate() {
        sheet.write_string_with_format(0, c as u16, column.label(), &header)?;
    }

    for (r, row) in table.rows().iter().enumerate() {
        let r = (r + 1) as u32;
        for (c, (cell, &column)) in row.iter().zip(table.columns()).enumerate() {
            let c = c as u16;
            match cell {
                Cell::Text(s) => {
                    sheet.write_string_with_format(r, c, s.as_str(), &text)?;
                }
                Cell::Number(n) => {
                    let fmt = if column.is_money() { &money } else { &number };
                    sheet.write_number_with_format(r, c, *n, fmt)?;
                }
                Cell::Date(d) => match excel_date(*d) {
                    Some(dt) => {
                        sheet.write_datetime_with_format(r, c, &dt, &date)?;
                    }
                    None => {
                        let iso = d.format("%Y-%m-%d").to_string();
                        sheet.write_string_with_format(r, c, iso.as_str(), &text)?;
                    }
                },
                Cell::Empty => {}
            }
        }
    }

    for (c, width) in table.content_widths().into_iter().enumerate() {
        let width = (width + 2).min(MAX_COLUMN_WIDTH);
        sheet.set_column_width(c as u16, width as f64)?;
    }
    sheet.set_freeze_panes(1, 0)?;

    let bytes = workbook.save_to_buffer()?;
    debug!("Rendered {} row(s) → {} bytes xlsx", table.len(), bytes.len());
    Ok(bytes)
}

/// Excel serial dates cover 1900-01-01 to 9999-12-31; anything else is
/// written as ISO text.
fn excel_date(d: NaiveDate) -> Option<ExcelDateTime> {
    let year = u16::try_from(d.year()).ok()?;
    ExcelDateTime::from_ymd(year, d.month() as u8, d.day() as u8).ok()
}

/// `faktura_<invoice number>.xlsx`, with `/` replaced by `_`.
pub fn suggested_file_name(doc: &InvoiceDocument) -> String {
    format!("faktura_{}.xlsx", doc.invoice_number().replace('/', "_"))
}

/// Write the workbook for `doc` to `path`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn write_xlsx(doc: &InvoiceDocument, path: impl AsRef<Path>) -> Result<(), ExportError> {
    let bytes = to_xlsx_bytes(doc)?;
    let path = path.as_ref();
    let write_failed = |source| ExportError::WriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_failed)?;
    }

    let tmp_path = path.with_extension("xlsx.tmp");
    tokio::fs::write(&tmp_path, &bytes)
        .await
        .map_err(write_failed)?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(write_failed)?;

    info!("Wrote {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}
