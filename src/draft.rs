use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::limits::*;
use crate::model::*;

/// Form fields the booking UI can edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DraftField {
    Hall,
    Date,
    StartTime,
    EndTime,
    BookerName,
    BookerPhone,
    EventName,
    Designation,
    Department,
}

impl DraftField {
    pub fn from_key(key: &str) -> Option<Self> {
        let field = match key {
            "hall" => DraftField::Hall,
            "date" => DraftField::Date,
            "start" => DraftField::StartTime,
            "end" => DraftField::EndTime,
            "name" => DraftField::BookerName,
            "phone" => DraftField::BookerPhone,
            "event" => DraftField::EventName,
            "designation" => DraftField::Designation,
            "department" => DraftField::Department,
            _ => return None,
        };
        Some(field)
    }
}

/// Unvalidated booking form state. Lives from "open booking form" until cancel
/// or a confirmed submission; survives failed submissions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingDraft {
    pub hall: Option<String>,
    pub date: Option<NaiveDate>,
    pub start_time: Option<TimeOfDay>,
    pub end_time: Option<TimeOfDay>,
    pub booker_name: String,
    pub booker_phone: String,
    pub event_name: String,
    pub designation: String,
    pub department: String,
}

impl BookingDraft {
    /// Draft pre-filled from a clicked slot.
    pub fn for_slot(hall: &str, date: NaiveDate, span: Span) -> Self {
        Self {
            hall: Some(hall.to_string()),
            date: Some(date),
            start_time: Some(span.start),
            end_time: Some(span.end),
            ..Self::default()
        }
    }

    pub fn set(&mut self, field: DraftField, value: &str) -> Result<(), ParseError> {
        match field {
            DraftField::Hall => self.hall = Some(value.trim().to_string()),
            DraftField::Date => self.date = Some(parse_date(value)?),
            DraftField::StartTime => self.start_time = Some(value.parse()?),
            DraftField::EndTime => self.end_time = Some(value.parse()?),
            DraftField::BookerName => self.booker_name = value.to_string(),
            DraftField::BookerPhone => self.booker_phone = value.to_string(),
            DraftField::EventName => self.event_name = value.to_string(),
            DraftField::Designation => self.designation = value.to_string(),
            DraftField::Department => self.department = value.to_string(),
        }
        Ok(())
    }

    /// Check the form and produce a store payload. Hall names must come from
    /// `halls`; the interval must be non-empty and inside the operating window.
    pub fn validate(&self, halls: &[String], policy: &SlotPolicy) -> Result<NewBooking, DraftError> {
        let hall = self.hall.as_deref().ok_or(DraftError::Missing("hall"))?;
        if !halls.iter().any(|h| h == hall) {
            return Err(DraftError::UnknownHall(hall.to_string()));
        }
        let date = self.date.ok_or(DraftError::Missing("date"))?;
        let start = self.start_time.ok_or(DraftError::Missing("start time"))?;
        let end = self.end_time.ok_or(DraftError::Missing("end time"))?;
        let span = Span::try_new(start, end).ok_or(DraftError::EmptyInterval { start, end })?;
        if !policy.window().contains_span(&span) {
            return Err(DraftError::OutsideWindow { span, window: policy.window() });
        }
        for (name, value, required) in [
            ("booker name", &self.booker_name, true),
            ("booker phone", &self.booker_phone, true),
            ("event name", &self.event_name, true),
            ("designation", &self.designation, false),
            ("department", &self.department, false),
        ] {
            if required && value.trim().is_empty() {
                return Err(DraftError::Missing(name));
            }
            if value.len() > MAX_FIELD_LEN {
                return Err(DraftError::TooLong(name));
            }
        }

        Ok(NewBooking {
            hall: hall.to_string(),
            date,
            start_time: start,
            end_time: end,
            booker_name: self.booker_name.trim().to_string(),
            booker_phone: self.booker_phone.trim().to_string(),
            event_name: self.event_name.trim().to_string(),
            designation: self.designation.trim().to_string(),
            department: self.department.trim().to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DraftError {
    Missing(&'static str),
    TooLong(&'static str),
    UnknownHall(String),
    EmptyInterval { start: TimeOfDay, end: TimeOfDay },
    OutsideWindow { span: Span, window: Span },
    Parse(ParseError),
}

impl fmt::Display for DraftError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DraftError::Missing(field) => write!(f, "{field} is required"),
            DraftError::TooLong(field) => write!(f, "{field} exceeds {MAX_FIELD_LEN} characters"),
            DraftError::UnknownHall(hall) => write!(f, "unknown hall: {hall}"),
            DraftError::EmptyInterval { start, end } => {
                write!(f, "start time {start} must be before end time {end}")
            }
            DraftError::OutsideWindow { span, window } => {
                write!(f, "{span} is outside opening hours {window}")
            }
            DraftError::Parse(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for DraftError {}

impl From<ParseError> for DraftError {
    fn from(e: ParseError) -> Self {
        DraftError::Parse(e)
    }
}
