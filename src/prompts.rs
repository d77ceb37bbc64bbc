//! Fixed prompts sent with every batch.
//!
//! Callers can override either text via
//! [`crate::config::ConversionConfig::system_prompt`] and
//! [`crate::config::ConversionConfig::user_prompt`]; the constants here are
//! used only when no override is provided.

/// System turn: invoice-specialised OCR, Markdown only, tables for line items.
pub const SYSTEM_PROMPT: &str = "You are an expert OCR system specialized in invoices. \n\
Extract ALL text with perfect accuracy. Preserve exact structure:\n\
- Invoice number, date, supplier name, VAT number\n\
- All line items (description, quantity, unit price, total)\n\
- Totals, VAT, grand total\n\
Output ONLY clean Markdown. Use tables for line items. Never add explanations.";

/// Text part of the user turn, placed before the page images.
pub const USER_INSTRUCTION: &str = "OCR these invoice pages and return perfect Markdown.";
