//! XLSX employee roster reading.
//!
//! Only what the roster needs is read: the first worksheet's cell text
//! (shared strings, inline strings, numbers and booleans).
//!
//! # Example
//!
//! ```no_run
//! let employees = reportdeck::xlsx::load_employees("roster.xlsx")?;
//! for e in &employees {
//!     println!("{} (row {})", e.name, e.row);
//! }
//! # Ok::<(), reportdeck::Error>(())
//! ```

mod employees;
mod shared_strings;
mod sheet;

pub use employees::{
    employees_from_sheet, excel_serial_date, load_employees, load_employees_from_bytes,
    normalize_date,
};
pub use shared_strings::SharedStrings;
pub use sheet::{column_index, SheetRow, Workbook, Worksheet};
