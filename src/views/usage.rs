//! Usage screen: daily credit consumption by month.
//!
//! `GET /metering` returns months → days → `{credits, interval, users?}`.
//! Months keep the backend's order and the last one is selected first.
//! Picking a day with non-zero credits reveals its time series and, when the
//! backend sent a per-user breakdown, the share of time per user.

use serde_json::{Map, Value};

use super::{FetchGate, FetchOutcome, FetchTicket, ViewState, apply_error};
use crate::api::{ApiClient, ApiError};
use crate::session::Session;

pub const NO_USAGE_MESSAGE: &str = "There is no usage data to display.";

// ---------------------------------------------------------------------------
// Data
// ---------------------------------------------------------------------------

/// One user's slice of a day.
#[derive(Debug, Clone, PartialEq)]
pub struct UserShare {
    pub user: String,
    /// Percentage of the day's warehouse time.
    pub share: f64,
    /// Time as the backend formats it.
    pub time: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UsageDay {
    pub date: String,
    pub credits: f64,
    /// 24 hourly or 48 half-hourly points.
    pub interval: Vec<f64>,
    pub users: Option<Vec<UserShare>>,
}

impl UsageDay {
    fn from_entry(date: &str, entry: &Value) -> Self {
        let credits = entry.get("credits").and_then(number).unwrap_or(0.0);

        // Either a list or an object keyed by slot; object order is kept.
        let interval = match entry.get("interval") {
            Some(Value::Array(points)) => points.iter().filter_map(number).collect(),
            Some(Value::Object(points)) => ordered_entries(points)
                .into_iter()
                .filter_map(|(_, v)| number(v))
                .collect(),
            _ => Vec::new(),
        };

        let users = entry.get("users").and_then(Value::as_object).map(|users| {
            users
                .iter()
                .map(|(user, detail)| UserShare {
                    user: user.clone(),
                    share: detail.get("share").and_then(number).unwrap_or(0.0),
                    time: match detail.get("time") {
                        Some(Value::String(s)) => s.clone(),
                        Some(Value::Null) | None => String::new(),
                        Some(other) => other.to_string(),
                    },
                })
                .collect()
        });

        Self {
            date: date.to_string(),
            credits,
            interval,
            users,
        }
    }

    /// Zero-credit days have nothing to chart.
    pub fn is_selectable(&self) -> bool {
        self.credits != 0.0
    }

    pub fn has_breakdown(&self) -> bool {
        self.users.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UsageMonth {
    pub name: String,
    pub days: Vec<UsageDay>,
}

impl UsageMonth {
    /// Text before the first comma, e.g. `May` from `May, 2026`.
    pub fn prefix(&self) -> &str {
        self.name.split(',').next().unwrap_or(self.name.as_str())
    }

    pub fn total_credits(&self) -> f64 {
        self.days.iter().map(|d| d.credits).sum()
    }
}

/// Parse the `/metering` payload.
pub fn parse_metering(data: &Value) -> Vec<UsageMonth> {
    let Some(months) = data.as_object() else {
        return Vec::new();
    };
    months
        .iter()
        .map(|(name, days)| UsageMonth {
            name: name.clone(),
            days: days
                .as_object()
                .map(parse_days)
                .unwrap_or_default(),
        })
        .collect()
}

fn parse_days(days: &Map<String, Value>) -> Vec<UsageDay> {
    ordered_entries(days)
        .into_iter()
        .map(|(date, entry)| UsageDay::from_entry(date, entry))
        .collect()
}

/// Object entries in the order a browser enumerates them: canonical integer
/// keys (`"0"`, `"7"`, `"10"`, but not `"07"`) ascending, then every other key
/// in document order.
fn ordered_entries(object: &Map<String, Value>) -> Vec<(&String, &Value)> {
    let (mut indexed, named): (Vec<_>, Vec<_>) = object
        .iter()
        .partition(|(key, _)| index_key(key).is_some());
    indexed.sort_by_key(|(key, _)| index_key(key));
    indexed.extend(named);
    indexed
}

fn index_key(key: &str) -> Option<u32> {
    let n: u32 = key.parse().ok()?;
    (n != u32::MAX && n.to_string() == key).then_some(n)
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Axis labels for a day: `12a, 1 … 11, 12p, 1 … 11`, blank on half hours.
pub fn hour_labels(points: usize) -> Vec<String> {
    let per_hour = (points / 24).max(1);
    (0..points)
        .map(|i| {
            if i % per_hour != 0 {
                return String::new();
            }
            match (i / per_hour) % 24 {
                0 => "12a".to_string(),
                12 => "12p".to_string(),
                h => (h % 12).to_string(),
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Chart data for the selected day.
#[derive(Debug, Clone, PartialEq)]
pub struct DayChart<'a> {
    pub title: String,
    pub labels: Vec<String>,
    pub points: &'a [f64],
    pub shares: Option<&'a [UserShare]>,
}

/// What the day list area should show.
#[derive(Debug, Clone, PartialEq)]
pub enum UsageListing<'a> {
    Loading,
    Error(&'a str),
    Empty,
    Days(&'a UsageMonth),
}

#[derive(Debug, Default)]
pub struct UsageView {
    state: ViewState<Vec<UsageMonth>>,
    selected_month: Option<String>,
    selected_day: Option<String>,
    gate: FetchGate,
}

impl UsageView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &ViewState<Vec<UsageMonth>> {
        &self.state
    }

    /// Fetch the metering data.
    pub fn refresh(&mut self, client: &ApiClient, session: &mut Session) -> FetchOutcome {
        let Some(ticket) = self.begin_refresh() else {
            return FetchOutcome::Busy;
        };
        let result = client.get(session, "/metering", &[]);
        self.complete_refresh(ticket, result)
    }

    pub fn begin_refresh(&mut self) -> Option<FetchTicket> {
        let ticket = self.gate.begin()?;
        self.state = ViewState::Loading;
        Some(ticket)
    }

    /// Replace the data and select the last month.
    pub fn complete_refresh(
        &mut self,
        ticket: FetchTicket,
        result: Result<Value, ApiError>,
    ) -> FetchOutcome {
        if !self.gate.accept(ticket) {
            return FetchOutcome::Stale;
        }

        match result {
            Ok(data) => {
                let months = parse_metering(&data);
                self.selected_month = months.last().map(|m| m.name.clone());
                self.selected_day = None;
                self.state = ViewState::Ready(months);
                FetchOutcome::Updated
            }
            Err(error) => apply_error(&mut self.state, &error),
        }
    }

    pub fn months(&self) -> Vec<&str> {
        self.state
            .ready()
            .map(|months| months.iter().map(|m| m.name.as_str()).collect())
            .unwrap_or_default()
    }

    pub fn selected_month(&self) -> Option<&UsageMonth> {
        let name = self.selected_month.as_deref()?;
        self.state.ready()?.iter().find(|m| m.name == name)
    }

    pub fn selected_day(&self) -> Option<&UsageDay> {
        let date = self.selected_day.as_deref()?;
        self.selected_month()?.days.iter().find(|d| d.date == date)
    }

    /// Switch month; clears the day. Returns `false` for an unknown month.
    pub fn select_month(&mut self, name: &str) -> bool {
        if !self.months().contains(&name) {
            return false;
        }
        self.selected_month = Some(name.to_string());
        self.selected_day = None;
        true
    }

    /// Pick a day in the current month. Zero-credit days are ignored.
    pub fn select_day(&mut self, date: &str) -> bool {
        let selectable = self
            .selected_month()
            .and_then(|m| m.days.iter().find(|d| d.date == date))
            .is_some_and(UsageDay::is_selectable);
        if selectable {
            self.selected_day = Some(date.to_string());
        }
        selectable
    }

    pub fn listing(&self) -> UsageListing<'_> {
        match &self.state {
            ViewState::Loading => UsageListing::Loading,
            ViewState::Error(message) => UsageListing::Error(message),
            ViewState::Ready(_) => match self.selected_month() {
                Some(month) => UsageListing::Days(month),
                None => UsageListing::Empty,
            },
        }
    }

    /// Chart for the selected day, if one is selected.
    pub fn chart(&self) -> Option<DayChart<'_>> {
        let month = self.selected_month()?;
        let day = self.selected_day()?;
        Some(DayChart {
            title: format!("Usage on {} {}", month.prefix(), day.date),
            labels: hour_labels(day.interval.len()),
            points: &day.interval,
            shares: day.users.as_deref(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
