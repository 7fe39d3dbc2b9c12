//! Report file names.

use crate::model::Employee;
use std::collections::HashMap;

/// Characters not allowed in file names on common platforms.
const FORBIDDEN: [char; 9] = ['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Replace characters unusable in file names and trim dots and spaces.
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if FORBIDDEN.contains(&c) || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();
    let trimmed = cleaned.trim_matches(|c: char| c == '.' || c.is_whitespace());
    if trimmed.is_empty() {
        "report".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Assigns `<name>[_<id>][ (n)]` stems in input order.
///
/// The first holder of a stem gets it bare; later ones get ` (2)`,
/// ` (3)` and so on.
#[derive(Debug, Default)]
pub struct FileNamer {
    append_id: bool,
    seen: HashMap<String, usize>,
}

impl FileNamer {
    pub fn new(append_id: bool) -> Self {
        Self {
            append_id,
            seen: HashMap::new(),
        }
    }

    /// Next unused stem for `employee` (no extension).
    pub fn stem_for(&mut self, employee: &Employee) -> String {
        let mut base = employee.name.trim().to_string();
        if self.append_id {
            if let Some(id) = employee.id() {
                base = format!("{}_{}", base, id);
            }
        }
        let base = sanitize_file_name(&base);

        let count = self.seen.entry(base.to_lowercase()).or_insert(0);
        *count += 1;
        if *count == 1 {
            base
        } else {
            format!("{} ({})", base, count)
        }
    }

    /// Stems for a whole roster, in order.
    pub fn assign(append_id: bool, employees: &[Employee]) -> Vec<String> {
        let mut namer = Self::new(append_id);
        employees.iter().map(|e| namer.stem_for(e)).collect()
    }
}
