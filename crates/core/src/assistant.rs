//! Chat assistant helpers: command detection, name resolution and the
//! data digest handed to the language model.
//!
//! Command detection is a fixed, ordered list of regular expressions. The
//! first pattern that matches wins; anything else is free-form chat.

use chrono::NaiveDate;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::sync::LazyLock;

use crate::model::{TaskPriority, TaskStatus};

/// An action recognised in a chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatCommand {
    CreateTask {
        title: String,
        priority: Option<TaskPriority>,
        /// Project named in the message, if any ("... in project Website").
        project: Option<String>,
    },
    UpdateStatus {
        task: String,
        status: TaskStatus,
    },
}

const STATUS_WORDS: &str = r"to\s*do|backlog|in[\s-]+progress|doing|started|in\s+review|review|done|complete|completed|finished";

const CREATE_PATTERNS: &[&str] = &[
    r"(?i)^\s*(?:please\s+)?(?:can\s+you\s+)?(?:create|add|make|new)\s+(?:an?\s+)?(?:new\s+)?(?:(?P<priority>low|medium|high|urgent)(?:[\s-]+priority)?\s+)?task\b(?:\s*:|\s+(?:called|named|titled|to|for)\b)?\s*(?P<title>.+?)(?:\s+(?:in|for|to)\s+(?:the\s+)?project\s+(?P<project>.+?))?\s*[.!?]?\s*$",
];

enum StatusSource {
    /// Status comes from the `status` capture group.
    Captured,
    Fixed(TaskStatus),
}

static CREATE_REGEXES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    CREATE_PATTERNS
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
});

static STATUS_REGEXES: LazyLock<Vec<(Regex, StatusSource)>> = LazyLock::new(|| {
    let patterns = [
        (
            format!(
                r"(?i)^\s*(?:please\s+)?(?:mark|set)\s+(?:the\s+)?(?:status\s+of\s+)?(?:task\s+)?(?P<task>.+?)\s+(?:as|to)\s+(?P<status>{STATUS_WORDS})\s*[.!?]?\s*$"
            ),
            StatusSource::Captured,
        ),
        (
            format!(
                r"(?i)^\s*(?:please\s+)?move\s+(?:the\s+)?(?:task\s+)?(?P<task>.+?)\s+(?:to|into)\s+(?P<status>{STATUS_WORDS})(?:\s+column)?\s*[.!?]?\s*$"
            ),
            StatusSource::Captured,
        ),
        (
            r"(?i)^\s*(?:i\s+|i'm\s+)?(?:have\s+|just\s+)?(?:finish|finished|complete|completed|done\s+with)\s+(?:work(?:ing)?\s+on\s+)?(?:the\s+)?(?:task\s+)?(?P<task>.+?)\s*[.!?]?\s*$"
                .to_string(),
            StatusSource::Fixed(TaskStatus::Done),
        ),
        (
            r"(?i)^\s*(?:i\s+|i'm\s+)?(?:am\s+)?(?:(?:start|starting|started|begin)(?:\s+work(?:ing)?\s+on)?|working\s+on)\s+(?:the\s+)?(?:task\s+)?(?P<task>.+?)\s*[.!?]?\s*$"
                .to_string(),
            StatusSource::Fixed(TaskStatus::InProgress),
        ),
    ];
    patterns
        .into_iter()
        .filter_map(|(p, source)| Regex::new(&p).ok().map(|re| (re, source)))
        .collect()
});

/// Detect a task command in `message`. Creation patterns are tried before
/// status patterns; within each list the first match wins.
pub fn parse_command(message: &str) -> Option<ChatCommand> {
    for re in CREATE_REGEXES.iter() {
        if let Some(caps) = re.captures(message) {
            let title = capture(&caps, "title")?;
            return Some(ChatCommand::CreateTask {
                title,
                priority: caps
                    .name("priority")
                    .and_then(|m| m.as_str().to_lowercase().parse().ok()),
                project: capture(&caps, "project"),
            });
        }
    }

    for (re, source) in STATUS_REGEXES.iter() {
        let Some(caps) = re.captures(message) else {
            continue;
        };
        let Some(task) = capture(&caps, "task") else {
            continue;
        };
        let status = match source {
            StatusSource::Fixed(status) => *status,
            StatusSource::Captured => {
                match caps
                    .name("status")
                    .and_then(|m| status_from_words(m.as_str()))
                {
                    Some(status) => status,
                    None => continue,
                }
            }
        };
        return Some(ChatCommand::UpdateStatus { task, status });
    }

    None
}

fn capture(caps: &Captures<'_>, name: &str) -> Option<String> {
    let value = caps
        .name(name)?
        .as_str()
        .trim()
        .trim_matches(|c| matches!(c, '"' | '\'' | '\u{201c}' | '\u{201d}' | '`'))
        .trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Map free-text status words ("in progress", "finished", ...) to a status.
pub fn status_from_words(words: &str) -> Option<TaskStatus> {
    let normalized = words
        .to_lowercase()
        .split(|c: char| c.is_whitespace() || c == '-' || c == '_')
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    match normalized.as_str() {
        "todo" | "to do" | "backlog" => Some(TaskStatus::Todo),
        "in progress" | "doing" | "started" => Some(TaskStatus::InProgress),
        "review" | "in review" => Some(TaskStatus::Review),
        "done" | "complete" | "completed" | "finished" => Some(TaskStatus::Done),
        _ => None,
    }
}

// ── Name resolution ────────────────────────────────────────────────────────

/// A task or project the user can see, by id and display name.
#[derive(Debug, Clone)]
pub struct NamedRef {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Found(String),
    Ambiguous(Vec<String>),
    NotFound,
}

/// Resolve a user-typed name: exact (case-insensitive) match first, then a
/// unique substring match.
pub fn resolve(candidates: &[NamedRef], query: &str) -> Resolution {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return Resolution::NotFound;
    }

    let exact: Vec<&NamedRef> = candidates
        .iter()
        .filter(|c| c.name.trim().to_lowercase() == needle)
        .collect();
    let hits = if exact.is_empty() {
        candidates
            .iter()
            .filter(|c| c.name.to_lowercase().contains(&needle))
            .collect()
    } else {
        exact
    };

    match hits.as_slice() {
        [] => Resolution::NotFound,
        [one] => Resolution::Found(one.id.clone()),
        many => Resolution::Ambiguous(many.iter().map(|c| c.name.clone()).collect()),
    }
}

// ── Digest for summaries and the LLM prompt ────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct AssistantContext {
    pub user_name: String,
    pub projects: Vec<ProjectDigest>,
}

#[derive(Debug, Clone)]
pub struct ProjectDigest {
    pub name: String,
    pub tasks: Vec<TaskDigest>,
}

#[derive(Debug, Clone)]
pub struct TaskDigest {
    pub title: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: Option<NaiveDate>,
    pub assignee: Option<String>,
}

impl TaskDigest {
    fn is_overdue(&self, today: NaiveDate) -> bool {
        self.status.is_open() && self.due_date.is_some_and(|d| d < today)
    }

    fn is_due_today(&self, today: NaiveDate) -> bool {
        self.status.is_open() && self.due_date == Some(today)
    }
}

impl AssistantContext {
    fn tasks(&self) -> impl Iterator<Item = (&ProjectDigest, &TaskDigest)> {
        self.projects
            .iter()
            .flat_map(|p| p.tasks.iter().map(move |t| (p, t)))
    }
}

/// Plain-text answer used when no language model is configured.
pub fn summarize(ctx: &AssistantContext, message: &str, today: NaiveDate) -> String {
    let lower = message.to_lowercase();
    let mut out = String::new();

    if lower.contains("overdue") || lower.contains("late") {
        let overdue: Vec<_> = ctx.tasks().filter(|(_, t)| t.is_overdue(today)).collect();
        if overdue.is_empty() {
            return "Nothing is overdue.".to_string();
        }
        let _ = writeln!(out, "{} overdue task(s):", overdue.len());
        for (project, task) in overdue {
            let due = task.due_date.map(|d| d.to_string()).unwrap_or_default();
            let _ = writeln!(out, "- {} ({}), due {}", task.title, project.name, due);
        }
        return out.trim_end().to_string();
    }

    if lower.contains("today") {
        let due: Vec<_> = ctx.tasks().filter(|(_, t)| t.is_due_today(today)).collect();
        if due.is_empty() {
            return "Nothing is due today.".to_string();
        }
        let _ = writeln!(out, "{} task(s) due today:", due.len());
        for (project, task) in due {
            let _ = writeln!(out, "- {} ({})", task.title, project.name);
        }
        return out.trim_end().to_string();
    }

    let total = ctx.tasks().count();
    if total == 0 {
        return format!(
            "You have {} project(s) and no tasks yet. Try \"create task <title>\".",
            ctx.projects.len()
        );
    }
    let _ = write!(
        out,
        "You have {total} task(s) across {} project(s):",
        ctx.projects.len()
    );
    for status in TaskStatus::ALL {
        let n = ctx.tasks().filter(|(_, t)| t.status == *status).count();
        let _ = write!(out, " {n} {}", status.label());
        if *status != TaskStatus::Done {
            out.push(',');
        }
    }
    out.push('.');
    let overdue = ctx.tasks().filter(|(_, t)| t.is_overdue(today)).count();
    if overdue > 0 {
        let _ = write!(out, " {overdue} overdue.");
    }
    out
}

/// System prompt describing the user's data for the language model.
pub fn build_system_prompt(ctx: &AssistantContext, today: NaiveDate) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "You are the Taskflow assistant, helping {} manage projects and tasks. Today is {today}.",
        ctx.user_name
    );
    out.push_str(
        "Answer concisely using only the data below. To change data the user can say \
         \"create task <title>\" or \"mark <task> as done\".\n\n",
    );
    for project in &ctx.projects {
        let _ = writeln!(out, "Project: {} ({} tasks)", project.name, project.tasks.len());
        for task in &project.tasks {
            let _ = write!(
                out,
                "- [{}] {} (priority {})",
                task.status, task.title, task.priority
            );
            if let Some(due) = task.due_date {
                let _ = write!(out, ", due {due}");
                if task.is_overdue(today) {
                    out.push_str(" OVERDUE");
                }
            }
            if let Some(assignee) = &task.assignee {
                let _ = write!(out, ", assigned to {assignee}");
            }
            out.push('\n');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create(title: &str, priority: Option<TaskPriority>, project: Option<&str>) -> ChatCommand {
        ChatCommand::CreateTask {
            title: title.to_string(),
            priority,
            project: project.map(String::from),
        }
    }

    fn status(task: &str, status: TaskStatus) -> ChatCommand {
        ChatCommand::UpdateStatus {
            task: task.to_string(),
            status,
        }
    }

    #[test]
    fn test_create_task_variants() {
        assert_eq!(
            parse_command("create task Fix login bug"),
            Some(create("Fix login bug", None, None))
        );
        assert_eq!(
            parse_command("Add a new task called \"Write docs\""),
            Some(create("Write docs", None, None))
        );
        assert_eq!(
            parse_command("please add an urgent task: rotate keys."),
            Some(create("rotate keys", Some(TaskPriority::Urgent), None))
        );
        assert_eq!(
            parse_command("create a high priority task Ship beta in project Website"),
            Some(create("Ship beta", Some(TaskPriority::High), Some("Website")))
        );
    }

    #[test]
    fn test_create_does_not_eat_title_prefix() {
        assert_eq!(
            parse_command("add task todo list cleanup"),
            Some(create("todo list cleanup", None, None))
        );
    }

    #[test]
    fn test_create_requires_title() {
        assert_eq!(parse_command("add task"), None);
    }

    #[test]
    fn test_status_variants() {
        assert_eq!(
            parse_command("mark Fix login bug as done"),
            Some(status("Fix login bug", TaskStatus::Done))
        );
        assert_eq!(
            parse_command("Set task \"Write docs\" to in progress"),
            Some(status("Write docs", TaskStatus::InProgress))
        );
        assert_eq!(
            parse_command("move Ship beta to review"),
            Some(status("Ship beta", TaskStatus::Review))
        );
        assert_eq!(
            parse_command("move the task Ship beta into to do column"),
            Some(status("Ship beta", TaskStatus::Todo))
        );
        assert_eq!(
            parse_command("I finished rotate keys!"),
            Some(status("rotate keys", TaskStatus::Done))
        );
        assert_eq!(
            parse_command("working on the onboarding flow"),
            Some(status("onboarding flow", TaskStatus::InProgress))
        );
    }

    #[test]
    fn test_status_skips_work_on_filler() {
        assert_eq!(
            parse_command("start working on Ship beta"),
            Some(status("Ship beta", TaskStatus::InProgress))
        );
        assert_eq!(
            parse_command("I'm starting work on the task rotate keys"),
            Some(status("rotate keys", TaskStatus::InProgress))
        );
        assert_eq!(
            parse_command("just finished working on Write docs."),
            Some(status("Write docs", TaskStatus::Done))
        );
        assert_eq!(
            parse_command("start onboarding flow"),
            Some(status("onboarding flow", TaskStatus::InProgress))
        );
    }

    #[test]
    fn test_free_text_is_not_a_command() {
        assert_eq!(parse_command("what is overdue?"), None);
        assert_eq!(parse_command("how many tasks do I have"), None);
        assert_eq!(parse_command("mark this"), None);
    }

    #[test]
    fn test_status_from_words() {
        assert_eq!(status_from_words("In-Progress"), Some(TaskStatus::InProgress));
        assert_eq!(status_from_words("to  do"), Some(TaskStatus::Todo));
        assert_eq!(status_from_words("Completed"), Some(TaskStatus::Done));
        assert_eq!(status_from_words("blocked"), None);
    }

    fn refs(names: &[(&str, &str)]) -> Vec<NamedRef> {
        names
            .iter()
            .map(|(id, name)| NamedRef {
                id: id.to_string(),
                name: name.to_string(),
            })
            .collect()
    }

    #[test]
    fn test_resolve_prefers_exact_match() {
        let c = refs(&[("1", "Login"), ("2", "Login page redesign")]);
        assert_eq!(resolve(&c, "login"), Resolution::Found("1".into()));
        assert_eq!(resolve(&c, "redesign"), Resolution::Found("2".into()));
    }

    #[test]
    fn test_resolve_ambiguous_and_missing() {
        let c = refs(&[("1", "Write API docs"), ("2", "Write user docs")]);
        assert_eq!(
            resolve(&c, "docs"),
            Resolution::Ambiguous(vec!["Write API docs".into(), "Write user docs".into()])
        );
        assert_eq!(resolve(&c, "deploy"), Resolution::NotFound);
        assert_eq!(resolve(&c, "  "), Resolution::NotFound);
    }

    fn sample_context() -> AssistantContext {
        let d = |s: &str| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok();
        AssistantContext {
            user_name: "Ada".into(),
            projects: vec![ProjectDigest {
                name: "Website".into(),
                tasks: vec![
                    TaskDigest {
                        title: "Ship beta".into(),
                        status: TaskStatus::InProgress,
                        priority: TaskPriority::High,
                        due_date: d("2026-01-01"),
                        assignee: Some("Ada".into()),
                    },
                    TaskDigest {
                        title: "Write docs".into(),
                        status: TaskStatus::Todo,
                        priority: TaskPriority::Low,
                        due_date: d("2026-01-10"),
                        assignee: None,
                    },
                    TaskDigest {
                        title: "Old thing".into(),
                        status: TaskStatus::Done,
                        priority: TaskPriority::Low,
                        due_date: d("2025-12-01"),
                        assignee: None,
                    },
                ],
            }],
        }
    }

    #[test]
    fn test_summarize_overdue_and_today() {
        let ctx = sample_context();
        let today = NaiveDate::from_ymd_opt(2026, 1, 10).unwrap();
        let overdue = summarize(&ctx, "what's overdue?", today);
        assert!(overdue.starts_with("1 overdue task(s):"));
        assert!(overdue.contains("Ship beta (Website), due 2026-01-01"));
        assert!(!overdue.contains("Old thing"));

        let due_today = summarize(&ctx, "anything due today", today);
        assert!(due_today.contains("Write docs"));
    }

    #[test]
    fn test_summarize_totals() {
        let ctx = sample_context();
        let today = NaiveDate::from_ymd_opt(2026, 1, 10).unwrap();
        let text = summarize(&ctx, "give me a summary", today);
        assert_eq!(
            text,
            "You have 3 task(s) across 1 project(s): 1 to do, 1 in progress, 0 in review, 1 done. 1 overdue."
        );
    }

    #[test]
    fn test_system_prompt_lists_tasks() {
        let ctx = sample_context();
        let today = NaiveDate::from_ymd_opt(2026, 1, 10).unwrap();
        let prompt = build_system_prompt(&ctx, today);
        assert!(prompt.contains("helping Ada"));
        assert!(prompt.contains(
            "- [in_progress] Ship beta (priority high), due 2026-01-01 OVERDUE, assigned to Ada"
        ));
    }
}
