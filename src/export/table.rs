//! Row-per-item flattening of an invoice.

use crate::error::ExportError;
use crate::model::{InvoiceDocument, LineItem};
use chrono::NaiveDate;

/// Export columns, in output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    InvoiceNumber,
    IssueDate,
    SellerName,
    SellerNip,
    BuyerName,
    Description,
    Quantity,
    UnitPriceNet,
    VatRate,
    TotalGross,
    Category,
    Currency,
    TotalNetSum,
    TotalGrossSum,
}

impl Column {
    pub const ALL: [Column; 14] = [
        Column::InvoiceNumber,
        Column::IssueDate,
        Column::SellerName,
        Column::SellerNip,
        Column::BuyerName,
        Column::Description,
        Column::Quantity,
        Column::UnitPriceNet,
        Column::VatRate,
        Column::TotalGross,
        Column::Category,
        Column::Currency,
        Column::TotalNetSum,
        Column::TotalGrossSum,
    ];

    /// Header label shown in the spreadsheet.
    pub fn label(self) -> &'static str {
        match self {
            Column::InvoiceNumber => "Numer faktury",
            Column::IssueDate => "Data wystawienia",
            Column::SellerName => "Sprzedawca",
            Column::SellerNip => "NIP sprzedawcy",
            Column::BuyerName => "Nabywca",
            Column::Description => "Opis pozycji",
            Column::Quantity => "Ilość",
            Column::UnitPriceNet => "Cena jedn. netto",
            Column::VatRate => "VAT %",
            Column::TotalGross => "Wartość brutto",
            Column::Category => "Kategoria",
            Column::Currency => "Waluta",
            Column::TotalNetSum => "Suma netto",
            Column::TotalGrossSum => "Suma brutto",
        }
    }

    /// Right-aligned numeric column.
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            Column::Quantity
                | Column::UnitPriceNet
                | Column::VatRate
                | Column::TotalGross
                | Column::TotalNetSum
                | Column::TotalGrossSum
        )
    }

    /// Money column, shown with two decimals.
    pub fn is_money(self) -> bool {
        matches!(
            self,
            Column::UnitPriceNet | Column::TotalGross | Column::TotalNetSum | Column::TotalGrossSum
        )
    }
}

/// One spreadsheet cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(f64),
    Date(NaiveDate),
    Empty,
}

impl Cell {
    /// The value as it reads on screen, used for sizing columns.
    pub fn display(&self, column: Column) -> String {
        match self {
            Cell::Text(s) => s.clone(),
            Cell::Number(n) if column.is_money() => format_money(*n),
            Cell::Number(n) => n.to_string(),
            Cell::Date(d) => d.format("%Y-%m-%d").to_string(),
            Cell::Empty => String::new(),
        }
    }
}

/// `1234567.5` → `1,234,567.50`, matching the `#,##0.00` cell format.
fn format_money(n: f64) -> String {
    let fixed = format!("{:.2}", n.abs());
    let (int_part, frac) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let sign = if n < 0.0 { "-" } else { "" };
    format!("{sign}{grouped}.{frac}")
}

/// An invoice as rows of cells, one row per line item, in item order.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportTable {
    rows: Vec<Vec<Cell>>,
}

impl ExportTable {
    /// Flatten `doc`, repeating the header fields on every row.
    pub fn from_document(doc: &InvoiceDocument) -> Result<Self, ExportError> {
        Self::build(doc, doc.items())
    }

    fn build(doc: &InvoiceDocument, items: &[LineItem]) -> Result<Self, ExportError> {
        if items.is_empty() {
            return Err(ExportError::EmptyDocument);
        }

        let rows = items
            .iter()
            .map(|item| {
                Column::ALL
                    .iter()
                    .map(|&col| cell_for(doc, item, col))
                    .collect()
            })
            .collect();

        Ok(Self { rows })
    }

    pub fn columns(&self) -> &'static [Column] {
        &Column::ALL
    }

    /// Data rows, without the header.
    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Widest rendered value per column, header label included, in chars.
    pub fn content_widths(&self) -> Vec<usize> {
        Column::ALL
            .iter()
            .enumerate()
            .map(|(i, &col)| {
                self.rows
                    .iter()
                    .map(|row| row[i].display(col).chars().count())
                    .chain(std::iter::once(col.label().chars().count()))
                    .max()
                    .unwrap_or(0)
            })
            .collect()
    }
}

fn cell_for(doc: &InvoiceDocument, item: &LineItem, column: Column) -> Cell {
    match column {
        Column::InvoiceNumber => Cell::Text(doc.invoice_number().to_string()),
        Column::IssueDate => Cell::Date(doc.issue_date()),
        Column::SellerName => Cell::Text(doc.seller_name().to_string()),
        Column::SellerNip => Cell::Text(doc.seller_nip().to_string()),
        Column::BuyerName => Cell::Text(doc.buyer_name().to_string()),
        Column::Description => Cell::Text(item.description().to_string()),
        Column::Quantity => Cell::Number(item.quantity()),
        Column::UnitPriceNet => Cell::Number(item.unit_price_net()),
        Column::VatRate => Cell::Number(f64::from(item.vat_rate())),
        Column::TotalGross => Cell::Number(item.total_gross()),
        Column::Category => item
            .category()
            .map(|c| Cell::Text(c.to_string()))
            .unwrap_or(Cell::Empty),
        Column::Currency => Cell::Text(doc.currency().code().to_string()),
        Column::TotalNetSum => Cell::Number(doc.total_net_sum()),
        Column::TotalGrossSum => Cell::Number(doc.total_gross_sum()),
    }
}
