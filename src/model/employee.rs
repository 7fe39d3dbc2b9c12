//! Employee records.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// One row of the employee roster.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    /// Display name
    pub name: String,

    /// Gender as written in the roster
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,

    /// Age as written in the roster
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<String>,

    /// Identity document number
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_number: Option<String>,

    /// Examination date, `YYYY-MM-DD` when recognisable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exam_date: Option<String>,

    /// 1-based spreadsheet row the record came from
    pub row: usize,
}

impl Employee {
    /// Create an employee with only a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set the identity number.
    pub fn with_id_number(mut self, id: impl Into<String>) -> Self {
        self.id_number = Some(id.into());
        self
    }

    /// Set the gender.
    pub fn with_gender(mut self, gender: impl Into<String>) -> Self {
        self.gender = Some(gender.into());
        self
    }

    /// Set the age.
    pub fn with_age(mut self, age: impl Into<String>) -> Self {
        self.age = Some(age.into());
        self
    }

    /// Set the examination date.
    pub fn with_exam_date(mut self, date: impl Into<String>) -> Self {
        self.exam_date = Some(date.into());
        self
    }

    /// Trimmed, non-empty identity number.
    pub fn id(&self) -> Option<&str> {
        self.id_number
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Birth date encoded in an 18-character resident identity number.
    pub fn birth_date(&self) -> Option<NaiveDate> {
        let id = self.id()?;
        if id.chars().count() != 18 || !id.is_ascii() {
            return None;
        }
        NaiveDate::parse_from_str(&id[6..14], "%Y%m%d").ok()
    }

    /// Roster gender, or the one the identity number encodes.
    pub fn effective_gender(&self) -> Option<String> {
        if let Some(gender) = self.gender.as_deref().map(str::trim).filter(|g| !g.is_empty()) {
            return Some(gender.to_string());
        }
        let id = self.id().filter(|id| id.len() == 18 && id.is_ascii())?;
        let digit = id[16..17].parse::<u32>().ok()?;
        Some(if digit % 2 == 1 { "男" } else { "女" }.to_string())
    }

    /// Roster age, or the age on `on` derived from the birth date.
    pub fn effective_age(&self, on: NaiveDate) -> Option<String> {
        if let Some(age) = self.age.as_deref().map(str::trim).filter(|a| !a.is_empty()) {
            return Some(age.to_string());
        }
        let birth = self.birth_date()?;
        let mut years = on.year() - birth.year();
        if (on.month(), on.day()) < (birth.month(), birth.day()) {
            years -= 1;
        }
        (years >= 0).then(|| years.to_string())
    }
}
