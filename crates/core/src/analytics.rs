//! Project analytics computed from plain task rows.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::model::{TaskPriority, TaskStatus};

/// Days ahead of today that count as "due soon".
pub const DUE_SOON_DAYS: i64 = 7;

/// The subset of a task row analytics needs.
#[derive(Debug, Clone)]
pub struct TaskFacts {
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub assignee_id: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub created_on: NaiveDate,
    pub completed_on: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusCount {
    pub status: TaskStatus,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorityCount {
    pub priority: TaskPriority,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workload {
    pub assignee_id: Option<String>,
    pub open: i64,
    pub done: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub created: i64,
    pub completed: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectAnalytics {
    pub total: i64,
    pub by_status: Vec<StatusCount>,
    pub by_priority: Vec<PriorityCount>,
    pub overdue: i64,
    pub due_soon: i64,
    /// Share of tasks that are done, in `0.0..=1.0`.
    pub completion_rate: f64,
    pub workload: Vec<Workload>,
    pub trend: Vec<TrendPoint>,
}

pub fn is_overdue(task: &TaskFacts, today: NaiveDate) -> bool {
    task.status.is_open() && task.due_date.is_some_and(|d| d < today)
}

fn is_due_soon(task: &TaskFacts, today: NaiveDate) -> bool {
    task.status.is_open()
        && task
            .due_date
            .is_some_and(|d| d >= today && d <= today + Duration::days(DUE_SOON_DAYS))
}

/// Compute analytics for one project. `trend_days` consecutive days ending
/// today are reported, oldest first.
pub fn project_analytics(
    tasks: &[TaskFacts],
    today: NaiveDate,
    trend_days: u32,
) -> ProjectAnalytics {
    let total = tasks.len() as i64;

    let by_status = TaskStatus::ALL
        .iter()
        .map(|status| StatusCount {
            status: *status,
            count: tasks.iter().filter(|t| t.status == *status).count() as i64,
        })
        .collect();

    let by_priority = TaskPriority::ALL
        .iter()
        .map(|priority| PriorityCount {
            priority: *priority,
            count: tasks.iter().filter(|t| t.priority == *priority).count() as i64,
        })
        .collect();

    let done = tasks.iter().filter(|t| t.status == TaskStatus::Done).count();
    let completion_rate = if tasks.is_empty() {
        0.0
    } else {
        done as f64 / tasks.len() as f64
    };

    // BTreeMap keeps workload output stable; `None` (unassigned) sorts first.
    let mut workload: BTreeMap<Option<String>, (i64, i64)> = BTreeMap::new();
    for task in tasks {
        let entry = workload.entry(task.assignee_id.clone()).or_default();
        if task.status.is_open() {
            entry.0 += 1;
        } else {
            entry.1 += 1;
        }
    }

    let trend = (0..trend_days as i64)
        .rev()
        .map(|offset| {
            let date = today - Duration::days(offset);
            TrendPoint {
                date,
                created: tasks.iter().filter(|t| t.created_on == date).count() as i64,
                completed: tasks.iter().filter(|t| t.completed_on == Some(date)).count() as i64,
            }
        })
        .collect();

    ProjectAnalytics {
        total,
        by_status,
        by_priority,
        overdue: tasks.iter().filter(|t| is_overdue(t, today)).count() as i64,
        due_soon: tasks.iter().filter(|t| is_due_soon(t, today)).count() as i64,
        completion_rate,
        workload: workload
            .into_iter()
            .map(|(assignee_id, (open, done))| Workload {
                assignee_id,
                open,
                done,
            })
            .collect(),
        trend,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn task(
        status: TaskStatus,
        assignee: Option<&str>,
        due: Option<&str>,
        created: &str,
    ) -> TaskFacts {
        TaskFacts {
            status,
            priority: TaskPriority::Medium,
            assignee_id: assignee.map(String::from),
            due_date: due.map(day),
            created_on: day(created),
            completed_on: (status == TaskStatus::Done).then(|| day(created)),
        }
    }

    #[test]
    fn test_empty_project() {
        let a = project_analytics(&[], day("2026-02-01"), 3);
        assert_eq!(a.total, 0);
        assert_eq!(a.completion_rate, 0.0);
        assert!(a.workload.is_empty());
        assert_eq!(a.trend.len(), 3);
        assert_eq!(a.trend[0].date, day("2026-01-30"));
        assert_eq!(a.trend[2].date, day("2026-02-01"));
    }

    #[test]
    fn test_counts_and_rates() {
        let today = day("2026-02-10");
        let tasks = vec![
            task(TaskStatus::Todo, Some("u1"), Some("2026-02-01"), "2026-02-09"),
            task(TaskStatus::InProgress, Some("u1"), Some("2026-02-12"), "2026-02-10"),
            task(TaskStatus::Done, Some("u2"), Some("2026-02-01"), "2026-02-10"),
            task(TaskStatus::Done, None, None, "2026-01-01"),
        ];
        let a = project_analytics(&tasks, today, 2);

        assert_eq!(a.total, 4);
        assert_eq!(a.overdue, 1, "done tasks are never overdue");
        assert_eq!(a.due_soon, 1);
        assert_eq!(a.completion_rate, 0.5);

        let done = a.by_status.iter().find(|s| s.status == TaskStatus::Done).unwrap();
        assert_eq!(done.count, 2);
        let medium = a
            .by_priority
            .iter()
            .find(|p| p.priority == TaskPriority::Medium)
            .unwrap();
        assert_eq!(medium.count, 4);

        assert_eq!(
            a.workload,
            vec![
                Workload {
                    assignee_id: None,
                    open: 0,
                    done: 1,
                },
                Workload {
                    assignee_id: Some("u1".into()),
                    open: 2,
                    done: 0,
                },
                Workload {
                    assignee_id: Some("u2".into()),
                    open: 0,
                    done: 1,
                },
            ]
        );

        assert_eq!(
            a.trend,
            vec![
                TrendPoint {
                    date: day("2026-02-09"),
                    created: 1,
                    completed: 0,
                },
                TrendPoint {
                    date: day("2026-02-10"),
                    created: 2,
                    completed: 1,
                },
            ]
        );
    }
}
