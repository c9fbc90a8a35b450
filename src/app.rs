//! Calendar/booking UI state as a plain value. Every interaction is an
//! [`Action`] fed through [`apply`]; nothing here performs I/O.

use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::draft::{BookingDraft, DraftField};
use crate::model::*;
use crate::workflow::SubmitError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViewMode {
    Month,
    Day,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Notice {
    Info(String),
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppState {
    pub today: NaiveDate,
    pub current_date: NaiveDate,
    pub view: ViewMode,
    pub hall: String,
    /// Open booking form, if any.
    pub draft: Option<BookingDraft>,
    /// Submit control disabled while true.
    pub submitting: bool,
    pub notice: Option<Notice>,
}

/// Result of a finished submission, reduced to what the UI keeps.
#[derive(Debug)]
pub enum Finished {
    Confirmed(Booking),
    Failed(SubmitError),
}

#[derive(Debug)]
pub enum Action {
    Today,
    Next,
    Previous,
    SetView(ViewMode),
    /// Clicking a day in the month grid opens that day.
    PickDate(NaiveDate),
    SelectHall(String),
    OpenBooking(Span),
    Edit(DraftField, String),
    Cancel,
    SubmitStarted,
    SubmitFinished(Finished),
}

impl AppState {
    pub fn new(today: NaiveDate, hall: impl Into<String>) -> Self {
        Self {
            today,
            current_date: today,
            view: ViewMode::Month,
            hall: hall.into(),
            draft: None,
            submitting: false,
            notice: None,
        }
    }

    pub fn can_submit(&self) -> bool {
        self.draft.is_some() && !self.submitting
    }
}

pub fn apply(mut state: AppState, action: Action) -> AppState {
    match action {
        Action::Today => state.current_date = state.today,
        Action::Next => state.current_date = step(state.current_date, state.view, true),
        Action::Previous => state.current_date = step(state.current_date, state.view, false),
        Action::SetView(view) => state.view = view,
        Action::PickDate(date) => {
            state.current_date = date;
            state.view = ViewMode::Day;
        }
        Action::SelectHall(hall) => state.hall = hall,
        Action::OpenBooking(span) => {
            if !state.submitting {
                state.draft = Some(BookingDraft::for_slot(&state.hall, state.current_date, span));
                state.notice = None;
            }
        }
        Action::Edit(field, value) => {
            if state.submitting {
                return state;
            }
            if let Some(draft) = state.draft.as_mut()
                && let Err(e) = draft.set(field, &value)
            {
                state.notice = Some(Notice::Error(e.to_string()));
            }
        }
        Action::Cancel => {
            if !state.submitting {
                state.draft = None;
                state.notice = None;
            }
        }
        Action::SubmitStarted => {
            if state.draft.is_some() {
                state.submitting = true;
                state.notice = None;
            }
        }
        Action::SubmitFinished(finished) => {
            state.submitting = false;
            match finished {
                Finished::Confirmed(booking) => {
                    state.draft = None;
                    state.notice = Some(Notice::Info(format!(
                        "booked {} in {} on {} ({})",
                        booking.event_name,
                        booking.hall,
                        booking.date,
                        booking.span()
                    )));
                }
                // A busy rejection means another attempt owns the form; leave it be.
                Finished::Failed(SubmitError::Busy) => {}
                Finished::Failed(e) => {
                    // Keep the draft so the user can change the slot or resubmit.
                    state.notice = Some(Notice::Error(e.to_string()));
                }
            }
        }
    }
    state
}

fn step(date: NaiveDate, view: ViewMode, forward: bool) -> NaiveDate {
    let next = match (view, forward) {
        (ViewMode::Month, true) => date.checked_add_months(Months::new(1)),
        (ViewMode::Month, false) => date.checked_sub_months(Months::new(1)),
        (ViewMode::Day, true) => date.succ_opt(),
        (ViewMode::Day, false) => date.pred_opt(),
    };
    next.unwrap_or(date)
}

/// Every date of the month containing `date`, first to last.
pub fn month_days(date: NaiveDate) -> Vec<NaiveDate> {
    let Some(first) = date.with_day(1) else {
        return Vec::new();
    };
    first
        .iter_days()
        .take_while(|d| d.month() == first.month())
        .collect()
}
