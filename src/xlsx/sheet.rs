//! Workbook and worksheet cell reading.

use super::shared_strings::SharedStrings;
use crate::container::Package;
use crate::detect::{open_as, FormatType};
use crate::error::{Error, Result};
use crate::rels;
use quick_xml::events::{BytesStart, Event};
use std::path::Path;

const WORKBOOK_PART: &str = "xl/workbook.xml";

/// Sheet info from workbook.xml.
#[derive(Debug, Clone)]
struct SheetInfo {
    name: String,
    rel_id: String,
}

/// One worksheet row with cells placed by column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SheetRow {
    /// 1-based row number
    pub number: usize,
    /// Cell text by 0-based column; gaps are empty strings
    pub cells: Vec<String>,
}

impl SheetRow {
    /// Trimmed cell text, `None` when blank.
    pub fn cell(&self, column: usize) -> Option<&str> {
        self.cells
            .get(column)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }

    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(|c| c.trim().is_empty())
    }
}

/// A parsed worksheet.
#[derive(Debug, Clone, Default)]
pub struct Worksheet {
    pub name: String,
    pub rows: Vec<SheetRow>,
}

/// Read access to an XLSX workbook.
#[derive(Debug)]
pub struct Workbook {
    package: Package,
    shared_strings: SharedStrings,
    sheets: Vec<SheetInfo>,
}

impl Workbook {
    /// Open an XLSX file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_package(open_as(path, FormatType::Xlsx)?)
    }

    /// Read an XLSX workbook from bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Self::from_package(Package::from_bytes(data)?)
    }

    fn from_package(package: Package) -> Result<Self> {
        let shared_strings = match package.get_text("xl/sharedStrings.xml") {
            Some(xml) => SharedStrings::parse(xml)?,
            None => SharedStrings::default(),
        };
        let workbook = package
            .get_text(WORKBOOK_PART)
            .ok_or_else(|| Error::MissingComponent(WORKBOOK_PART.to_string()))?;
        let sheets = parse_workbook(workbook)?;

        Ok(Self {
            package,
            shared_strings,
            sheets,
        })
    }

    /// Get sheet names.
    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }

    /// Parse the sheet at `index` (workbook order).
    pub fn sheet(&self, index: usize) -> Result<Worksheet> {
        let info = self
            .sheets
            .get(index)
            .ok_or_else(|| Error::Spreadsheet(format!("workbook has no sheet {}", index + 1)))?;

        let workbook_rels = self
            .package
            .get_text(&rels::rels_path_for(WORKBOOK_PART))
            .map(rels::parse)
            .transpose()?
            .unwrap_or_default();
        let target = workbook_rels
            .iter()
            .find(|r| r.id == info.rel_id)
            .map(|r| rels::resolve(WORKBOOK_PART, &r.target))
            .ok_or_else(|| {
                Error::Spreadsheet(format!("sheet '{}' has no relationship {}", info.name, info.rel_id))
            })?;
        let xml = self
            .package
            .get_text(&target)
            .ok_or_else(|| Error::MissingComponent(target.clone()))?;

        Ok(Worksheet {
            name: info.name.clone(),
            rows: self.parse_sheet(xml)?,
        })
    }

    /// Parse the first sheet.
    pub fn first_sheet(&self) -> Result<Worksheet> {
        self.sheet(0)
    }

    fn parse_sheet(&self, xml: &str) -> Result<Vec<SheetRow>> {
        let mut rows = Vec::new();
        let mut reader = quick_xml::Reader::from_str(xml);

        let mut buf = Vec::new();
        let mut current: Option<SheetRow> = None;
        let mut cell: Option<PendingCell> = None;
        let mut in_value = false;

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => match e.local_name().as_ref() {
                    b"row" => {
                        let number = attr(&e, b"r")
                            .and_then(|r| r.parse().ok())
                            .unwrap_or(rows.len() + 1);
                        current = Some(SheetRow {
                            number,
                            cells: Vec::new(),
                        });
                    }
                    b"c" => cell = Some(PendingCell::start(&e, current.as_ref())),
                    b"v" | b"t" if cell.is_some() => in_value = true,
                    _ => {}
                },
                Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                    b"row" => {}
                    b"c" => {
                        // Empty cell; keeps column positions only.
                    }
                    _ => {}
                },
                Ok(Event::Text(e)) if in_value => {
                    if let Some(cell) = cell.as_mut() {
                        cell.value.push_str(&e.unescape().unwrap_or_default());
                    }
                }
                Ok(Event::End(e)) => match e.local_name().as_ref() {
                    b"v" | b"t" => in_value = false,
                    b"c" => {
                        if let (Some(done), Some(row)) = (cell.take(), current.as_mut()) {
                            let text = self.resolve_value(&done.value, done.cell_type.as_deref());
                            if row.cells.len() <= done.column {
                                row.cells.resize(done.column + 1, String::new());
                            }
                            row.cells[done.column] = text;
                        }
                    }
                    b"row" => {
                        if let Some(row) = current.take() {
                            rows.push(row);
                        }
                    }
                    _ => {}
                },
                Ok(Event::Eof) => break,
                Err(e) => return Err(Error::XmlParse(e.to_string())),
                _ => {}
            }
            buf.clear();
        }

        Ok(rows)
    }

    /// Resolve a cell value based on its type.
    fn resolve_value(&self, value: &str, cell_type: Option<&str>) -> String {
        match cell_type {
            Some("s") => value
                .trim()
                .parse::<usize>()
                .ok()
                .and_then(|idx| self.shared_strings.get(idx))
                .unwrap_or_default()
                .to_string(),
            Some("b") => if value == "1" { "TRUE" } else { "FALSE" }.to_string(),
            Some("e") => String::new(),
            _ => value.to_string(),
        }
    }
}

/// A `<c>` element being read.
struct PendingCell {
    column: usize,
    cell_type: Option<String>,
    value: String,
}

impl PendingCell {
    fn start(e: &BytesStart<'_>, row: Option<&SheetRow>) -> Self {
        let next = row.map_or(0, |r| r.cells.len());
        let column = attr(e, b"r")
            .and_then(|r| column_index(&r))
            .unwrap_or(next);
        Self {
            column,
            cell_type: attr(e, b"t"),
            value: String::new(),
        }
    }
}

fn attr(e: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == name)
        .map(|a| String::from_utf8_lossy(&a.value).into_owned())
}

/// Parse workbook.xml for sheet info.
fn parse_workbook(xml: &str) -> Result<Vec<SheetInfo>> {
    let mut sheets = Vec::new();
    let mut reader = quick_xml::Reader::from_str(xml);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(e)) | Ok(Event::Start(e)) if e.local_name().as_ref() == b"sheet" => {
                let mut name = String::new();
                let mut rel_id = String::new();
                for a in e.attributes().flatten() {
                    let key = a.key.as_ref();
                    let value = a
                        .unescape_value()
                        .map(|v| v.into_owned())
                        .unwrap_or_else(|_| String::from_utf8_lossy(&a.value).into_owned());
                    if key == b"name" {
                        name = value;
                    } else if key.ends_with(b":id") {
                        rel_id = value;
                    }
                }
                if !name.is_empty() {
                    sheets.push(SheetInfo { name, rel_id });
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(Error::XmlParse(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    Ok(sheets)
}

/// 0-based column of a cell reference such as `AB12`.
pub fn column_index(reference: &str) -> Option<usize> {
    let letters: String = reference
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    if letters.is_empty() {
        return None;
    }
    let n = letters
        .chars()
        .fold(0usize, |acc, c| acc * 26 + (c.to_ascii_uppercase() as usize - 'A' as usize + 1));
    Some(n - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_index() {
        assert_eq!(column_index("A1"), Some(0));
        assert_eq!(column_index("Z9"), Some(25));
        assert_eq!(column_index("AB12"), Some(27));
        assert_eq!(column_index("12"), None);
    }

    #[test]
    fn test_parse_workbook_sheets() {
        let xml = r#"<workbook xmlns:r="r"><sheets><sheet name="名单" sheetId="1" r:id="rId1"/><sheet name="Other" sheetId="2" r:id="rId2"/></sheets></workbook>"#;
        let sheets = parse_workbook(xml).unwrap();
        assert_eq!(sheets.len(), 2);
        assert_eq!(sheets[0].name, "名单");
        assert_eq!(sheets[1].rel_id, "rId2");
    }

    #[test]
    fn test_parse_sheet_places_cells_by_reference() {
        let workbook = Workbook {
            package: Package::new(),
            shared_strings: SharedStrings::parse("<sst><si><t>李雷</t></si></sst>").unwrap(),
            sheets: Vec::new(),
        };
        let xml = r#"<worksheet><sheetData><row r="2"><c r="A2" t="s"><v>0</v></c><c r="C2"><v>45413</v></c><c r="D2" t="inlineStr"><is><t>男</t></is></c><c r="E2" t="b"><v>1</v></c></row></sheetData></worksheet>"#;
        let rows = workbook.parse_sheet(xml).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].number, 2);
        assert_eq!(rows[0].cells, vec!["李雷", "", "45413", "男", "TRUE"]);
        assert_eq!(rows[0].cell(1), None);
        assert_eq!(rows[0].cell(3), Some("男"));
    }
}
