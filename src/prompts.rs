//! Extraction instruction sent ahead of the invoice images.
//!
//! Callers can override it via [`crate::config::ExtractionConfig::system_prompt`].

/// Default instruction for reading a Polish invoice into the reply schema.
///
/// The JSON keys named here are the ones [`crate::model::InvoiceDraft`]
/// decodes; keep the two in step.
pub const INVOICE_EXTRACTION_PROMPT: &str = r#"You extract structured data from invoice images. The images are the pages of ONE invoice, in page order.

Reply with a single JSON object of exactly this shape:

{
  "invoice_number": "string, spaces removed, e.g. FV001/2025",
  "issue_date": "YYYY-MM-DD",
  "seller_name": "string, full company name",
  "seller_nip": "string, exactly 10 digits",
  "buyer_name": "string, full company name",
  "items": [
    {
      "description": "string, product or service name",
      "quantity": number,
      "unit_price_net": number, price per unit without VAT,
      "vat_rate": integer percent, e.g. 0, 5, 8, 23,
      "total_gross": number, gross value of the whole line,
      "category": "string or null"
    }
  ],
  "total_net_sum": number,
  "total_gross_sum": number, the amount to pay,
  "currency": "PLN, EUR or USD"
}

Rules:

1. NIP: keep digits only. "PL 123-456-78-90" becomes "1234567890".
2. Dates: always YYYY-MM-DD. "15.01.2025" becomes "2025-01-15".
3. Invoice number: remove every space. "FV 001 / 2025" becomes "FV001/2025".
4. Category: infer from the description. Use Paliwo for fuel, Biuro for office supplies, IT for hardware and software, Transport for transport services, Catering for food, Inne for anything else.
5. Money values are numbers, never strings. The VAT rate is an integer.
6. List every line item from every page. There is always at least one.
7. total_gross_sum must match the "Do zapłaty" or "Razem" amount printed on the invoice.
8. Output the JSON object only. No markdown fences, no commentary."#;
