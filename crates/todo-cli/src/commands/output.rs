//! Terminal rendering of tasks.

use colored::Colorize;
use todo_core::task::{Task, timestamp};

pub fn task_line(task: &Task) -> String {
    let mark = if task.is_completed {
        "[x]".green().to_string()
    } else {
        "[ ]".to_string()
    };
    let title = if task.is_completed {
        task.title.strikethrough().to_string()
    } else {
        task.title.clone()
    };
    let due = task
        .due_date
        .map(|date| format!("  due {date}").yellow().to_string())
        .unwrap_or_default();
    format!("{mark} {title}{due}  {}", task.id.dimmed())
}

pub fn print_list(tasks: &[Task]) {
    if tasks.is_empty() {
        println!("{}", "No tasks.".dimmed());
        return;
    }
    for task in tasks {
        println!("{}", task_line(task));
    }
}

pub fn print_detail(task: &Task) {
    println!("{}", task.title.bold());
    println!("  id:          {}", task.id);
    println!("  completed:   {}", if task.is_completed { "yes" } else { "no" });
    if let Some(description) = &task.description {
        println!("  description: {description}");
    }
    if let Some(due) = task.due_date {
        println!("  due:         {due}");
    }
    println!("  created:     {}", timestamp::format(&task.created_at));
    println!("  updated:     {}", timestamp::format(&task.updated_at));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn task() -> Task {
        let at = Utc.with_ymd_and_hms(2030, 1, 1, 9, 0, 0).unwrap();
        Task {
            id: "task-1".to_string(),
            title: "Buy milk".to_string(),
            description: None,
            due_date: NaiveDate::from_ymd_opt(2030, 1, 15),
            is_completed: false,
            created_at: at,
            updated_at: at,
            user_id: "user-1".to_string(),
        }
    }

    #[test]
    fn test_task_line_contents() {
        colored::control::set_override(false);
        let line = task_line(&task());
        assert_eq!(line, "[ ] Buy milk  due 2030-01-15  task-1");
    }
}
