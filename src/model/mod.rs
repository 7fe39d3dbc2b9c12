//! Workflow data model.
//!
//! Employees come from the roster spreadsheet, attachments from the
//! attachment directory; both are plain data passed between the workflow
//! stages.

mod asset;
mod employee;

pub use asset::*;
pub use employee::*;
