//! Employee roster loading.

use super::sheet::{SheetRow, Workbook, Worksheet};
use crate::error::{Error, Result};
use crate::model::Employee;
use chrono::{Duration, NaiveDate};
use std::path::Path;
use tracing::{debug, warn};

/// Roster field a header column maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Name,
    Gender,
    Age,
    IdNumber,
    ExamDate,
}

impl Field {
    fn from_header(header: &str) -> Option<Self> {
        let key: String = header
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '*' && *c != ':' && *c != '：')
            .collect::<String>()
            .to_lowercase();
        match key.as_str() {
            "姓名" | "name" => Some(Field::Name),
            "性别" | "gender" | "sex" => Some(Field::Gender),
            "年龄" | "age" => Some(Field::Age),
            "身份证号" | "身份证号码" | "证件号" | "证件号码" | "id" | "idnumber" => {
                Some(Field::IdNumber)
            }
            "体检日期" | "日期" | "date" | "examdate" => Some(Field::ExamDate),
            _ => None,
        }
    }
}

/// Column positions resolved from the header row.
#[derive(Debug, Default)]
struct Columns {
    name: Option<usize>,
    gender: Option<usize>,
    age: Option<usize>,
    id_number: Option<usize>,
    exam_date: Option<usize>,
}

impl Columns {
    fn from_header(row: &SheetRow) -> Self {
        let mut columns = Columns::default();
        for (index, text) in row.cells.iter().enumerate() {
            let slot = match Field::from_header(text) {
                Some(Field::Name) => &mut columns.name,
                Some(Field::Gender) => &mut columns.gender,
                Some(Field::Age) => &mut columns.age,
                Some(Field::IdNumber) => &mut columns.id_number,
                Some(Field::ExamDate) => &mut columns.exam_date,
                None => continue,
            };
            slot.get_or_insert(index);
        }
        columns
    }
}

/// Load employees from the first worksheet of an XLSX roster.
pub fn load_employees(path: impl AsRef<Path>) -> Result<Vec<Employee>> {
    let path = path.as_ref();
    let workbook = Workbook::open(path)?;
    let employees = employees_from_sheet(&workbook.first_sheet()?)?;
    debug!(path = %path.display(), count = employees.len(), "loaded roster");
    Ok(employees)
}

/// Load employees from XLSX bytes.
pub fn load_employees_from_bytes(data: &[u8]) -> Result<Vec<Employee>> {
    employees_from_sheet(&Workbook::from_bytes(data)?.first_sheet()?)
}

/// Map a worksheet to employees using its first non-blank row as header.
pub fn employees_from_sheet(sheet: &Worksheet) -> Result<Vec<Employee>> {
    let mut rows = sheet.rows.iter().skip_while(|r| r.is_blank());
    let header = rows
        .next()
        .ok_or_else(|| Error::Spreadsheet(format!("sheet '{}' is empty", sheet.name)))?;
    let columns = Columns::from_header(header);
    let name_col = columns.name.ok_or_else(|| {
        Error::Spreadsheet(format!("sheet '{}' has no 姓名/name column", sheet.name))
    })?;

    let mut employees = Vec::new();
    for row in rows {
        if row.is_blank() {
            continue;
        }
        let Some(name) = row.cell(name_col) else {
            warn!(row = row.number, "roster row has no name, skipping");
            continue;
        };
        let pick = |col: Option<usize>| col.and_then(|c| row.cell(c)).map(str::to_string);

        employees.push(Employee {
            name: name.to_string(),
            gender: pick(columns.gender),
            age: pick(columns.age).map(|a| normalize_number(&a)),
            id_number: pick(columns.id_number),
            exam_date: pick(columns.exam_date).map(|d| normalize_date(&d)),
            row: row.number,
        });
    }

    Ok(employees)
}

/// Drop a trailing `.0` from whole numbers stored as floats.
fn normalize_number(value: &str) -> String {
    match value.parse::<f64>() {
        Ok(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", n as i64),
        _ => value.to_string(),
    }
}

/// Render a date cell as `YYYY-MM-DD`.
///
/// Numbers are Excel serial dates (1900 system). Text in `2024/5/1`,
/// `2024.5.1` or `2024年5月1日` form is normalized; anything else is kept.
pub fn normalize_date(value: &str) -> String {
    let value = value.trim();
    if let Ok(serial) = value.parse::<f64>() {
        if let Some(date) = excel_serial_date(serial) {
            return date.format("%Y-%m-%d").to_string();
        }
    }

    let unified: String = value
        .replace(['年', '月', '/', '.'], "-")
        .replace('日', "")
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_string();
    match NaiveDate::parse_from_str(&unified, "%Y-%m-%d") {
        Ok(date) => date.format("%Y-%m-%d").to_string(),
        Err(_) => value.to_string(),
    }
}

/// Convert an Excel serial day number to a date.
pub fn excel_serial_date(serial: f64) -> Option<NaiveDate> {
    if !(1.0..2_958_466.0).contains(&serial) {
        return None;
    }
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    base.checked_add_signed(Duration::days(serial.trunc() as i64))
}
