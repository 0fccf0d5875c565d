// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Clock/trigger evaluation
//!
//! Decides whether a schedule is due at a given instant. This is a pure
//! function of its inputs so the scheduler loop can be replayed in tests.

use crate::schedule::{DayOfWeek, ScheduleKind, TimeOfDay};
use chrono::{DateTime, Datelike, Duration, Utc};
use thiserror::Error;

/// Inputs to a trigger evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerContext {
    pub now: DateTime<Utc>,
    /// When this schedule last dispatched a task in the current scheduler run
    pub last_fired: Option<DateTime<Utc>>,
    /// When the schedule became eligible to fire (scheduler start, creation,
    /// update or re-enable)
    pub armed_at: DateTime<Utc>,
}

/// Result of a trigger evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// The schedule should fire now; `scheduled_for` is the instant it was
    /// due, used for ordering and audit
    Due { scheduled_for: DateTime<Utc> },
    /// Not due; `next` is the next due instant if one is known
    NotDue { next: Option<DateTime<Utc>> },
}

impl Trigger {
    pub fn is_due(&self) -> bool {
        matches!(self, Trigger::Due { .. })
    }
}

/// A schedule whose timing cannot be evaluated
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TriggerError {
    #[error("interval schedule has a non-positive repeat")]
    NonPositiveRepeat,
    #[error("repeat interval {0:?} is out of range")]
    RepeatOutOfRange(std::time::Duration),
}

/// Evaluate whether a schedule of the given kind is due
pub fn evaluate(kind: &ScheduleKind, ctx: &TriggerContext) -> Result<Trigger, TriggerError> {
    match kind {
        ScheduleKind::Startup => Ok(match ctx.last_fired {
            None => Trigger::Due {
                scheduled_for: ctx.armed_at,
            },
            Some(_) => Trigger::NotDue { next: None },
        }),

        ScheduleKind::Manual => Ok(Trigger::NotDue { next: None }),

        ScheduleKind::Interval { repeat } => {
            if repeat.is_zero() {
                return Err(TriggerError::NonPositiveRepeat);
            }
            let step =
                Duration::from_std(*repeat).map_err(|_| TriggerError::RepeatOutOfRange(*repeat))?;
            let Some(last) = ctx.last_fired else {
                return Ok(Trigger::Due {
                    scheduled_for: ctx.now,
                });
            };
            let next = last
                .checked_add_signed(step)
                .ok_or(TriggerError::RepeatOutOfRange(*repeat))?;
            if ctx.now >= next {
                Ok(Trigger::Due {
                    scheduled_for: next,
                })
            } else {
                Ok(Trigger::NotDue { next: Some(next) })
            }
        }

        ScheduleKind::Timed { time, day } => {
            let occurrence = latest_occurrence(*time, *day, ctx.now);
            let fresh = match ctx.last_fired {
                Some(last) => occurrence > last,
                None => occurrence >= ctx.armed_at,
            };
            if fresh {
                Ok(Trigger::Due {
                    scheduled_for: occurrence,
                })
            } else {
                Ok(Trigger::NotDue {
                    next: Some(occurrence + period(*day)),
                })
            }
        }
    }
}

fn period(day: Option<DayOfWeek>) -> Duration {
    match day {
        Some(_) => Duration::days(7),
        None => Duration::days(1),
    }
}

/// Latest instant at or before `now` matching the time (and weekday)
fn latest_occurrence(time: TimeOfDay, day: Option<DayOfWeek>, now: DateTime<Utc>) -> DateTime<Utc> {
    let today = now.date_naive().and_time(time.to_naive_time()).and_utc();
    match day {
        None => {
            if today <= now {
                today
            } else {
                today - Duration::days(1)
            }
        }
        Some(day) => {
            let current = i64::from(now.weekday().num_days_from_monday());
            let target = i64::from(day.weekday().num_days_from_monday());
            let candidate = today - Duration::days((current - target).rem_euclid(7));
            if candidate <= now {
                candidate
            } else {
                candidate - Duration::days(7)
            }
        }
    }
}

#[cfg(test)]
#[path = "trigger_tests.rs"]
mod tests;
