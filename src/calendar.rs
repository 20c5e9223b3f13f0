use chrono::{Datelike, Local, NaiveDate};
use thiserror::Error;

use crate::data_loaders::config::{parse_iso_date, CalendarConfig, Mode, MAX_LIFESPAN, MIN_LIFESPAN};

const DAYS_PER_YEAR: f64 = 365.2425;

const COMPLETED_COLOR: &str = "#cfcfcf";
const CURRENT_COLOR: &str = "#ffffff";
const FUTURE_COLOR: &str = "#3a3a3a";

const DEFAULT_GOAL_TITLE: &str = "GOAL COUNTDOWN";

#[derive(Debug, Error)]
pub enum CalendarError {
    #[error("Invalid date format: {0}. Use YYYY-MM-DD")]
    InvalidDate(String),
    #[error("End date must be after start date")]
    EmptyGoalSpan,
}

/// The three calendar strategies, closed over at construction time. The
/// current date is read on every `calculate()` call, never cached, so a
/// long-lived value keeps tracking the clock.
#[derive(Debug, Clone)]
pub enum CalendarData {
    Life {
        dob: NaiveDate,
        lifespan: u32,
    },
    Year,
    Goal {
        start: NaiveDate,
        end: NaiveDate,
        title: String,
        subtitle: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    pub total_units: u32,
    pub filled_units: u32,
    pub stats_text: String,
}

#[derive(Debug, Clone, Copy)]
pub struct LegendEntry {
    pub color: &'static str,
    pub label: &'static str,
}

impl CalendarData {
    pub fn from_config(config: &CalendarConfig) -> Result<Self, CalendarError> {
        match config.mode {
            Mode::Life => Self::life(&config.dob, config.lifespan),
            Mode::Year => Ok(Self::Year),
            Mode::Goal => Self::goal(
                &config.goal_start,
                &config.goal_end,
                &config.goal_title,
                &config.goal_subtitle,
            ),
        }
    }

    pub fn life(dob: &str, lifespan: u32) -> Result<Self, CalendarError> {
        let dob = parse_iso_date(dob).ok_or_else(|| CalendarError::InvalidDate(dob.to_string()))?;
        Ok(Self::Life {
            dob,
            lifespan: lifespan.clamp(MIN_LIFESPAN, MAX_LIFESPAN),
        })
    }

    pub fn goal(start: &str, end: &str, title: &str, subtitle: &str) -> Result<Self, CalendarError> {
        let start_date =
            parse_iso_date(start).ok_or_else(|| CalendarError::InvalidDate(start.to_string()))?;
        let end_date =
            parse_iso_date(end).ok_or_else(|| CalendarError::InvalidDate(end.to_string()))?;

        if end_date <= start_date {
            return Err(CalendarError::EmptyGoalSpan);
        }

        let title = title.trim();
        Ok(Self::Goal {
            start: start_date,
            end: end_date,
            title: if title.is_empty() {
                DEFAULT_GOAL_TITLE.to_string()
            } else {
                title.to_string()
            },
            subtitle: subtitle.trim().to_string(),
        })
    }

    pub fn mode(&self) -> Mode {
        match self {
            Self::Life { .. } => Mode::Life,
            Self::Year => Mode::Year,
            Self::Goal { .. } => Mode::Goal,
        }
    }

    pub fn calculate(&self) -> Progress {
        let today = Local::now().date_naive();
        match self {
            Self::Life { dob, lifespan } => life_progress(*dob, *lifespan, today),
            // Year mode always tracks the system date, even for callers that
            // would rather inject one.
            Self::Year => year_progress(Local::now().date_naive()),
            Self::Goal { start, end, .. } => goal_progress(*start, *end, today),
        }
    }

    pub fn title(&self) -> String {
        match self {
            Self::Life { .. } => "YOUR LIFE IN WEEKS".to_string(),
            Self::Year => format!("YEAR PROGRESS {}", Local::now().year()),
            Self::Goal { title, .. } => title.to_uppercase(),
        }
    }

    pub fn subtitle(&self) -> &str {
        match self {
            Self::Goal { subtitle, .. } => subtitle,
            _ => "",
        }
    }

    pub fn legend(&self) -> [LegendEntry; 3] {
        let labels: [&'static str; 3] = match self {
            Self::Life { .. } => ["Lived", "Current Week", "Future"],
            Self::Year => ["Passed", "Today", "Remaining"],
            Self::Goal { .. } => ["Completed", "Today", "Remaining"],
        };

        [
            LegendEntry {
                color: COMPLETED_COLOR,
                label: labels[0],
            },
            LegendEntry {
                color: CURRENT_COLOR,
                label: labels[1],
            },
            LegendEntry {
                color: FUTURE_COLOR,
                label: labels[2],
            },
        ]
    }
}

fn life_progress(dob: NaiveDate, lifespan: u32, today: NaiveDate) -> Progress {
    let days_lived = (today - dob).num_days();
    let weeks_lived = days_lived / 7;

    // Truncate the day total before the week division, matching calendar
    // arithmetic on whole days.
    let total_days = (lifespan as f64 * DAYS_PER_YEAR) as i64;
    let total_weeks = (total_days / 7) as u32;

    let weeks_lived = weeks_lived.clamp(0, total_weeks as i64) as u32;

    Progress {
        total_units: total_weeks,
        filled_units: weeks_lived,
        stats_text: format!(
            "Weeks Lived: {} | Remaining: {} | Total: {}",
            weeks_lived,
            total_weeks - weeks_lived,
            total_weeks
        ),
    }
}

fn year_progress(today: NaiveDate) -> Progress {
    let year = today.year();
    let total_days: u32 = if today.leap_year() { 366 } else { 365 };

    // ordinal() is already 1-based (Jan 1 = day 1); the clamp guards the
    // Dec 31 boundary.
    let day_of_year = today.ordinal().min(total_days);

    let percentage = day_of_year as f64 / total_days as f64 * 100.0;

    Progress {
        total_units: total_days,
        filled_units: day_of_year,
        stats_text: format!(
            "Year {} Progress: Day {} of {} ({:.1}%)",
            year, day_of_year, total_days, percentage
        ),
    }
}

fn goal_progress(start: NaiveDate, end: NaiveDate, today: NaiveDate) -> Progress {
    let total_days = (end - start).num_days().max(0) as u32;

    let passed_days = if today < start {
        0
    } else if today > end {
        total_days
    } else {
        (today - start).num_days() as u32
    };

    // Construction forbids an empty span; the guard covers direct callers.
    let percentage = if total_days > 0 {
        passed_days as f64 / total_days as f64 * 100.0
    } else {
        0.0
    };

    Progress {
        total_units: total_days,
        filled_units: passed_days,
        stats_text: format!(
            "Goal Progress: {} of {} days ({:.1}%)",
            passed_days, total_days, percentage
        ),
    }
}
