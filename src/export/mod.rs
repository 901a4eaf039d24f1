//! Tabular export of a validated invoice.
//!
//! [`table`] flattens the document into one row per line item with the
//! header fields repeated; [`xlsx`] renders those rows as a styled workbook.

pub mod table;
pub mod xlsx;

pub use table::{Cell, Column, ExportTable};
pub use xlsx::{suggested_file_name, table_to_xlsx, to_xlsx_bytes, write_xlsx, SHEET_NAME};
