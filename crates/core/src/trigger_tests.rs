// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::TimeZone;
use yare::parameterized;

// 2026-03-02 is a Monday
fn at(day: u32, hour: u32, minute: u32, second: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, day, hour, minute, second)
        .unwrap()
}

fn ctx(now: DateTime<Utc>, last_fired: Option<DateTime<Utc>>, armed_at: DateTime<Utc>) -> TriggerContext {
    TriggerContext {
        now,
        last_fired,
        armed_at,
    }
}

fn interval(secs: u64) -> ScheduleKind {
    ScheduleKind::Interval {
        repeat: std::time::Duration::from_secs(secs),
    }
}

fn timed(hour: u32, minute: u32, day: Option<u8>) -> ScheduleKind {
    ScheduleKind::Timed {
        time: TimeOfDay::hms(hour, minute, 0).unwrap(),
        day: day.map(|d| DayOfWeek::new(d).unwrap()),
    }
}

#[test]
fn startup_is_due_once() {
    let start = at(2, 8, 0, 0);
    let first = evaluate(&ScheduleKind::Startup, &ctx(start, None, start)).unwrap();
    assert_eq!(first, Trigger::Due { scheduled_for: start });

    let later = evaluate(
        &ScheduleKind::Startup,
        &ctx(start + Duration::hours(1), Some(start), start),
    )
    .unwrap();
    assert_eq!(later, Trigger::NotDue { next: None });
}

#[test]
fn manual_is_never_due() {
    let now = at(2, 8, 0, 0);
    let trigger = evaluate(&ScheduleKind::Manual, &ctx(now, None, now)).unwrap();
    assert_eq!(trigger, Trigger::NotDue { next: None });
}

#[test]
fn interval_is_due_immediately_when_never_fired() {
    let now = at(2, 8, 0, 0);
    let trigger = evaluate(&interval(60), &ctx(now, None, now)).unwrap();
    assert_eq!(trigger, Trigger::Due { scheduled_for: now });
}

#[parameterized(
    before_repeat = { 59, false },
    exactly_repeat = { 60, true },
    after_repeat = { 95, true },
)]
fn interval_due_after_repeat(elapsed: i64, due: bool) {
    let last = at(2, 8, 0, 0);
    let now = last + Duration::seconds(elapsed);
    let trigger = evaluate(&interval(60), &ctx(now, Some(last), last)).unwrap();
    assert_eq!(trigger.is_due(), due);
    match trigger {
        Trigger::Due { scheduled_for } => assert_eq!(scheduled_for, last + Duration::seconds(60)),
        Trigger::NotDue { next } => assert_eq!(next, Some(last + Duration::seconds(60))),
    }
}

#[test]
fn interval_with_zero_repeat_is_an_error() {
    let now = at(2, 8, 0, 0);
    let err = evaluate(&interval(0), &ctx(now, None, now)).unwrap_err();
    assert_eq!(err, TriggerError::NonPositiveRepeat);
}

#[test]
fn interval_supports_fractional_repeat() {
    let last = at(2, 8, 0, 0);
    let kind = ScheduleKind::Interval {
        repeat: std::time::Duration::from_millis(1500),
    };
    let not_yet = evaluate(&kind, &ctx(last + Duration::milliseconds(1499), Some(last), last));
    assert!(!not_yet.unwrap().is_due());
    let due = evaluate(&kind, &ctx(last + Duration::milliseconds(1500), Some(last), last));
    assert!(due.unwrap().is_due());
}

#[parameterized(
    before_time = { at(2, 8, 59, 59), false },
    at_time = { at(2, 9, 0, 0), true },
    after_time = { at(2, 13, 0, 0), true },
)]
fn timed_daily_fires_when_time_crosses(now: DateTime<Utc>, due: bool) {
    let armed = at(2, 8, 0, 0);
    let trigger = evaluate(&timed(9, 0, None), &ctx(now, None, armed)).unwrap();
    assert_eq!(trigger.is_due(), due);
}

#[test]
fn timed_does_not_catch_up_on_occurrences_before_arming() {
    let armed = at(2, 10, 0, 0);
    let trigger = evaluate(&timed(9, 0, None), &ctx(armed, None, armed)).unwrap();
    assert_eq!(
        trigger,
        Trigger::NotDue {
            next: Some(at(3, 9, 0, 0))
        }
    );
}

#[test]
fn timed_does_not_refire_for_same_occurrence() {
    let armed = at(2, 8, 0, 0);
    let fired = at(2, 9, 0, 1);
    let trigger = evaluate(&timed(9, 0, None), &ctx(at(2, 18, 0, 0), Some(fired), armed)).unwrap();
    assert_eq!(
        trigger,
        Trigger::NotDue {
            next: Some(at(3, 9, 0, 0))
        }
    );

    let next_day = evaluate(&timed(9, 0, None), &ctx(at(3, 9, 0, 0), Some(fired), armed)).unwrap();
    assert_eq!(
        next_day,
        Trigger::Due {
            scheduled_for: at(3, 9, 0, 0)
        }
    );
}

#[parameterized(
    monday_on_monday = { 1, at(2, 9, 30, 0), true },
    wednesday_on_monday = { 3, at(2, 9, 30, 0), false },
    wednesday_on_wednesday = { 3, at(4, 9, 30, 0), true },
    sunday_on_saturday = { 7, at(7, 23, 0, 0), false },
)]
fn timed_weekly_only_fires_on_its_day(day: u8, now: DateTime<Utc>, due: bool) {
    let armed = at(2, 0, 0, 0);
    let trigger = evaluate(&timed(9, 0, Some(day)), &ctx(now, None, armed)).unwrap();
    assert_eq!(trigger.is_due(), due);
}

#[test]
fn timed_weekly_next_is_a_week_later() {
    let armed = at(2, 0, 0, 0);
    let fired = at(2, 9, 0, 0);
    let trigger = evaluate(&timed(9, 0, Some(1)), &ctx(at(3, 12, 0, 0), Some(fired), armed)).unwrap();
    assert_eq!(
        trigger,
        Trigger::NotDue {
            next: Some(at(9, 9, 0, 0))
        }
    );
}

/// Step a clock through `steps` minutes, recording `last_fired` whenever the
/// evaluator says due; returns the number of fires
fn simulate(kind: &ScheduleKind, start: DateTime<Utc>, steps: i64) -> usize {
    let mut last_fired = None;
    let mut fires = 0;
    for minute in 0..steps {
        let now = start + Duration::minutes(minute);
        if evaluate(kind, &ctx(now, last_fired, start)).unwrap().is_due() {
            fires += 1;
            last_fired = Some(now);
        }
    }
    fires
}

#[test]
fn timed_daily_fires_once_per_day() {
    assert_eq!(simulate(&timed(9, 0, None), at(2, 0, 0, 0), 3 * 24 * 60), 3);
}

#[test]
fn timed_weekly_fires_once_per_week() {
    assert_eq!(simulate(&timed(9, 0, Some(5)), at(2, 0, 0, 0), 14 * 24 * 60), 2);
}

mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn interval_fire_count_matches_elapsed_time(repeat_minutes in 1u64..180, hours in 1i64..48) {
            let kind = interval(repeat_minutes * 60);
            let steps = hours * 60;
            let fires = simulate(&kind, at(2, 0, 0, 0), steps) as i64;
            let repeat = repeat_minutes as i64;
            // First fire is immediate, then every `repeat` minutes
            prop_assert_eq!(fires, (steps - 1) / repeat + 1);
        }

        #[test]
        fn timed_occurrence_is_never_in_the_future(
            seconds in 0u32..86_400,
            offset_minutes in 0i64..(14 * 24 * 60),
            day in proptest::option::of(1u8..=7),
        ) {
            let time = TimeOfDay::new(seconds).unwrap();
            let day = day.map(|d| DayOfWeek::new(d).unwrap());
            let now = at(2, 0, 0, 0) + Duration::minutes(offset_minutes);
            let occurrence = latest_occurrence(time, day, now);
            prop_assert!(occurrence <= now);
            prop_assert!(now - occurrence < period(day));
            if let Some(day) = day {
                prop_assert_eq!(occurrence.weekday(), day.weekday());
            }
        }
    }
}
