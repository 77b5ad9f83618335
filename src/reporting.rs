use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::models::{Course, DashboardStats, Task, TaskStatus};

/// Look-ahead of `/tasks/upcoming` and of the dashboard's upcoming counter.
pub const DEFAULT_UPCOMING_DAYS: i64 = 7;

/// ReportError
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReportError {
    #[error("days must be zero or positive")]
    NegativeDays,
    #[error("month and year are required")]
    MissingPeriod,
    #[error("month must be between 1 and 12")]
    InvalidMonth,
    #[error("year must be between 1 and 9999")]
    InvalidYear,
}

/// completion_rate
///
/// Percentage of completed tasks rounded to one decimal; 0 when there is no task.
pub fn completion_rate(completed: i64, total: i64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (completed as f64 * 1000.0 / total as f64).round() / 10.0
}

/// dashboard_stats
///
/// Aggregates the caller's own `courses` and the `tasks` attached to them. Tasks whose
/// course is not in `courses` are ignored.
pub fn dashboard_stats(courses: &[Course], tasks: &[Task], now: NaiveDateTime) -> DashboardStats {
    let owned: Vec<&Task> = tasks
        .iter()
        .filter(|t| courses.iter().any(|c| c.id == t.course_id))
        .collect();

    let total_tasks = owned.len() as i64;
    let completed_tasks = owned
        .iter()
        .filter(|t| t.status == TaskStatus::Termine)
        .count() as i64;
    let pending_tasks = total_tasks - completed_tasks;

    let horizon = now + Duration::days(DEFAULT_UPCOMING_DAYS);
    let upcoming_deadlines = owned
        .iter()
        .filter(|t| t.status == TaskStatus::AFaire && t.deadline >= now && t.deadline <= horizon)
        .count() as i64;

    let mut courses_by_category = BTreeMap::new();
    for course in courses {
        let key = course.category.clone().unwrap_or_default();
        *courses_by_category.entry(key).or_insert(0) += 1;
    }

    DashboardStats {
        total_courses: courses.len() as i64,
        total_tasks,
        completed_tasks,
        pending_tasks,
        upcoming_deadlines,
        completion_rate: completion_rate(completed_tasks, total_tasks),
        courses_by_category,
    }
}

/// upcoming_window
///
/// `[now, now + days]`, both ends inclusive.
pub fn upcoming_window(
    now: NaiveDateTime,
    days: Option<i64>,
) -> Result<(NaiveDateTime, NaiveDateTime), ReportError> {
    let days = days.unwrap_or(DEFAULT_UPCOMING_DAYS);
    if days < 0 {
        return Err(ReportError::NegativeDays);
    }
    let end = Duration::try_days(days)
        .and_then(|span| now.checked_add_signed(span))
        .unwrap_or(NaiveDateTime::MAX);
    Ok((now, end))
}

/// month_window
///
/// First and last instant of a calendar month, both inclusive.
pub fn month_window(
    month: Option<u32>,
    year: Option<i32>,
) -> Result<(NaiveDateTime, NaiveDateTime), ReportError> {
    let (Some(month), Some(year)) = (month, year) else {
        return Err(ReportError::MissingPeriod);
    };
    if !(1..=12).contains(&month) {
        return Err(ReportError::InvalidMonth);
    }
    if !(1..=9999).contains(&year) {
        return Err(ReportError::InvalidYear);
    }

    let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or(ReportError::InvalidMonth)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .ok_or(ReportError::InvalidYear)?;

    let start = first.and_time(NaiveTime::MIN);
    let end = next.and_time(NaiveTime::MIN) - Duration::microseconds(1);
    Ok((start, end))
}
