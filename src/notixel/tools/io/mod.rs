//! Local workbook access.

pub mod excel_read;
