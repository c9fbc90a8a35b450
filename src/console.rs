//! Line-oriented front end: parses commands and drives [`AppState`] and the
//! [`Submitter`].

use std::fmt::{self, Write as _};

use chrono::{Datelike, NaiveDate};

use crate::app::{Action, AppState, Finished, Notice, ViewMode, apply, month_days};
use crate::config::Config;
use crate::draft::{BookingDraft, DraftField};
use crate::model::*;
use crate::workflow::Submitter;

pub const HELP: &str = "\
commands:
  halls                              list configured halls
  hall <name>                        select hall
  date <YYYY-MM-DD> | today          jump to a date
  next | prev                        move one month/day
  view month|day                     switch view
  show                               render the current view
  slots <hall> <date>                slot grid for a hall/date
  free <hall> <date>                 free stretches for a hall/date
  open <start> [end]                 open the booking form on the current day
  set <field> <value>                edit the form (name phone event designation department start end)
  submit | cancel                    submit or discard the form
  book <hall> <date> <start> <end> name=.. phone=.. event=.. [designation=..] [department=..]
  list [date]                        booked events
  export                             all bookings as JSON lines
  quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Quit,
    Halls,
    Hall(String),
    Date(NaiveDate),
    Today,
    Next,
    Prev,
    View(ViewMode),
    Show,
    Slots { hall: String, date: NaiveDate },
    Free { hall: String, date: NaiveDate },
    Open { start: TimeOfDay, end: Option<TimeOfDay> },
    Set { field: DraftField, value: String },
    Submit,
    Cancel,
    Book {
        hall: String,
        date: NaiveDate,
        start: TimeOfDay,
        end: TimeOfDay,
        fields: Vec<(DraftField, String)>,
    },
    List(Option<NaiveDate>),
    Export,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    UnknownCommand(String),
    Usage(&'static str),
    UnterminatedQuote,
    UnknownField(String),
    Parse(ParseError),
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::UnknownCommand(c) => write!(f, "unknown command {c:?}; try `help`"),
            CommandError::Usage(usage) => write!(f, "usage: {usage}"),
            CommandError::UnterminatedQuote => write!(f, "unterminated quote"),
            CommandError::UnknownField(k) => write!(f, "unknown field {k:?}"),
            CommandError::Parse(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for CommandError {}

impl From<ParseError> for CommandError {
    fn from(e: ParseError) -> Self {
        CommandError::Parse(e)
    }
}

/// Split on whitespace; double quotes group words, also inside `key="a b"`.
fn tokenize(line: &str) -> Result<Vec<String>, CommandError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut in_quotes = false;

    for c in line.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                in_token = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            c => {
                current.push(c);
                in_token = true;
            }
        }
    }
    if in_quotes {
        return Err(CommandError::UnterminatedQuote);
    }
    if in_token {
        tokens.push(current);
    }
    Ok(tokens)
}

/// Parse one input line. `Ok(None)` for blank lines.
pub fn parse_line(line: &str) -> Result<Option<Command>, CommandError> {
    let tokens = tokenize(line)?;
    let Some((head, args)) = tokens.split_first() else {
        return Ok(None);
    };
    let args: Vec<&str> = args.iter().map(String::as_str).collect();

    let cmd = match (head.to_lowercase().as_str(), args.as_slice()) {
        ("help" | "?", _) => Command::Help,
        ("quit" | "exit", _) => Command::Quit,
        ("halls", []) => Command::Halls,
        ("hall", [name]) => Command::Hall(name.to_string()),
        ("hall", _) => return Err(CommandError::Usage("hall <name>")),
        ("date", [date]) => Command::Date(parse_date(date)?),
        ("date", _) => return Err(CommandError::Usage("date <YYYY-MM-DD>")),
        ("today", []) => Command::Today,
        ("next", []) => Command::Next,
        ("prev" | "back", []) => Command::Prev,
        ("view", ["month"]) => Command::View(ViewMode::Month),
        ("view", ["day"]) => Command::View(ViewMode::Day),
        ("view", _) => return Err(CommandError::Usage("view month|day")),
        ("show", []) => Command::Show,
        ("slots", [hall, date]) => Command::Slots {
            hall: hall.to_string(),
            date: parse_date(date)?,
        },
        ("slots", _) => return Err(CommandError::Usage("slots <hall> <date>")),
        ("free", [hall, date]) => Command::Free {
            hall: hall.to_string(),
            date: parse_date(date)?,
        },
        ("free", _) => return Err(CommandError::Usage("free <hall> <date>")),
        ("open", [start]) => Command::Open {
            start: start.parse()?,
            end: None,
        },
        ("open", [start, end]) => Command::Open {
            start: start.parse()?,
            end: Some(end.parse()?),
        },
        ("open", _) => return Err(CommandError::Usage("open <start> [end]")),
        ("set", [key, value @ ..]) if !value.is_empty() => Command::Set {
            field: field_for(key)?,
            value: value.join(" "),
        },
        ("set", _) => return Err(CommandError::Usage("set <field> <value>")),
        ("submit", []) => Command::Submit,
        ("cancel", []) => Command::Cancel,
        ("book", [hall, date, start, end, rest @ ..]) => {
            let mut fields = Vec::new();
            for pair in rest {
                let (key, value) = pair
                    .split_once('=')
                    .ok_or(CommandError::Usage("book <hall> <date> <start> <end> key=value..."))?;
                fields.push((field_for(key)?, value.to_string()));
            }
            Command::Book {
                hall: hall.to_string(),
                date: parse_date(date)?,
                start: start.parse()?,
                end: end.parse()?,
                fields,
            }
        }
        ("book", _) => {
            return Err(CommandError::Usage("book <hall> <date> <start> <end> key=value..."));
        }
        ("list", []) => Command::List(None),
        ("list", [date]) => Command::List(Some(parse_date(date)?)),
        ("export", []) => Command::Export,
        (other, _) => return Err(CommandError::UnknownCommand(other.to_string())),
    };
    Ok(Some(cmd))
}

fn field_for(key: &str) -> Result<DraftField, CommandError> {
    DraftField::from_key(key).ok_or_else(|| CommandError::UnknownField(key.to_string()))
}

/// One interactive session: UI state plus the engine handles it drives.
pub struct Session {
    config: Config,
    submitter: Submitter,
    state: AppState,
}

impl Session {
    pub fn new(config: Config, submitter: Submitter, today: NaiveDate) -> Self {
        let hall = config.halls.first().cloned().unwrap_or_default();
        Self {
            config,
            submitter,
            state: AppState::new(today, hall),
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    fn dispatch(&mut self, action: Action) {
        self.state = apply(self.state.clone(), action);
    }

    fn take_notice(&mut self) -> String {
        match self.state.notice.take() {
            Some(Notice::Info(m)) => m,
            Some(Notice::Error(m)) => format!("error: {m}"),
            None => String::new(),
        }
    }

    /// Run a command and return the text to print.
    pub async fn execute(&mut self, cmd: Command) -> String {
        match cmd {
            Command::Help => HELP.to_string(),
            Command::Quit => String::new(),
            Command::Halls => self
                .config
                .halls
                .iter()
                .map(|h| if *h == self.state.hall { format!("* {h}") } else { format!("  {h}") })
                .collect::<Vec<_>>()
                .join("\n"),
            Command::Hall(name) => {
                if !self.config.halls.contains(&name) {
                    return format!("error: unknown hall: {name}");
                }
                self.dispatch(Action::SelectHall(name));
                format!("hall: {}", self.state.hall)
            }
            Command::Date(date) => {
                self.dispatch(Action::PickDate(date));
                self.render().await
            }
            Command::Today => {
                self.dispatch(Action::Today);
                self.render().await
            }
            Command::Next => {
                self.dispatch(Action::Next);
                self.render().await
            }
            Command::Prev => {
                self.dispatch(Action::Previous);
                self.render().await
            }
            Command::View(view) => {
                self.dispatch(Action::SetView(view));
                self.render().await
            }
            Command::Show => self.render().await,
            Command::Slots { hall, date } => self.render_day(&hall, date).await,
            Command::Free { hall, date } => {
                let snapshot = self.submitter.index().snapshot().await;
                let free = snapshot.free_spans(&hall, date, &self.config.policy.window());
                if free.is_empty() {
                    format!("{hall} is fully booked on {date}")
                } else {
                    free.iter().map(Span::to_string).collect::<Vec<_>>().join("\n")
                }
            }
            Command::Open { start, end } => {
                let end = end.or_else(|| start.checked_add_minutes(self.config.policy.step_minutes));
                let Some(span) = end.and_then(|end| Span::try_new(start, end)) else {
                    return "error: end time must be after start time".to_string();
                };
                self.dispatch(Action::OpenBooking(span));
                format!("booking {} on {} at {span}", self.state.hall, self.state.current_date)
            }
            Command::Set { field, value } => {
                if self.state.draft.is_none() {
                    return "error: no booking form open; use `open` first".to_string();
                }
                self.dispatch(Action::Edit(field, value));
                self.take_notice()
            }
            Command::Cancel => {
                self.dispatch(Action::Cancel);
                "booking discarded".to_string()
            }
            Command::Submit => {
                let Some(draft) = self.state.draft.clone().filter(|_| self.state.can_submit()) else {
                    return "error: no booking form open".to_string();
                };
                self.dispatch(Action::SubmitStarted);
                let finished = match self.submitter.submit(&draft).await {
                    Ok(booking) => Finished::Confirmed(booking),
                    Err(e) => Finished::Failed(e),
                };
                self.dispatch(Action::SubmitFinished(finished));
                self.take_notice()
            }
            Command::Book { hall, date, start, end, fields } => {
                let Some(span) = Span::try_new(start, end) else {
                    return format!("error: start time {start} must be before end time {end}");
                };
                let mut draft = BookingDraft::for_slot(&hall, date, span);
                for (field, value) in fields {
                    if let Err(e) = draft.set(field, &value) {
                        return format!("error: {e}");
                    }
                }
                match self.submitter.submit(&draft).await {
                    Ok(b) => format!("booked {} ({}) in {} on {} {}", b.event_name, b.id, b.hall, b.date, b.span()),
                    Err(e) => format!("error: {e}"),
                }
            }
            Command::List(date) => {
                let snapshot = self.submitter.index().snapshot().await;
                let listing = snapshot.listing(date);
                if listing.is_empty() {
                    return "no events booked yet".to_string();
                }
                let mut out = String::new();
                for b in listing {
                    let _ = writeln!(
                        out,
                        "{} {} {:<12} {} | {} ({}, {}) {}",
                        b.date,
                        b.span(),
                        b.hall,
                        b.event_name,
                        b.booker_name,
                        b.designation,
                        b.department,
                        b.booker_phone
                    );
                }
                out.trim_end().to_string()
            }
            Command::Export => {
                let snapshot = self.submitter.index().snapshot().await;
                let mut out = String::new();
                for b in snapshot.listing(None) {
                    match serde_json::to_string(b) {
                        Ok(line) => {
                            out.push_str(&line);
                            out.push('\n');
                        }
                        Err(e) => return format!("error: {e}"),
                    }
                }
                out.trim_end().to_string()
            }
        }
    }

    async fn render(&self) -> String {
        match self.state.view {
            ViewMode::Day => self.render_day(&self.state.hall, self.state.current_date).await,
            ViewMode::Month => self.render_month().await,
        }
    }

    async fn render_day(&self, hall: &str, date: NaiveDate) -> String {
        let snapshot = self.submitter.index().snapshot().await;
        let mut out = format!("{hall}, {}\n", date.format("%A, %B %-d, %Y"));
        for slot in snapshot.slots(hall, date, &self.config.policy) {
            let status = if slot.booked { "booked" } else { "free" };
            let _ = writeln!(out, "  {}  {status}", slot.span);
        }
        out.trim_end().to_string()
    }

    /// Calendar grid, Sunday first. Days with bookings on the current hall get a `*`.
    async fn render_month(&self) -> String {
        let snapshot = self.submitter.index().snapshot().await;
        let days = month_days(self.state.current_date);
        let mut out = format!("{}  ({})\n", self.state.current_date.format("%B %Y"), self.state.hall);
        out.push_str(" Sun  Mon  Tue  Wed  Thu  Fri  Sat\n");
        let Some(first) = days.first() else {
            return out;
        };
        let lead = first.weekday().num_days_from_sunday() as usize;
        out.push_str(&"     ".repeat(lead));
        for (i, day) in days.iter().enumerate() {
            let busy = !snapshot.occupied(&self.state.hall, *day).is_empty();
            let marker = if *day == self.state.today { '>' } else { ' ' };
            let _ = write!(out, "{marker}{:>2}{} ", day.day(), if busy { '*' } else { ' ' });
            if (lead + i + 1) % 7 == 0 {
                out.push('\n');
            }
        }
        out.trim_end().to_string()
    }
}
