use super::output;
use chrono::NaiveDate;
use colored::Colorize;
use todo_application::TodoContext;
use todo_core::task::{NewTask, TaskFilter, TaskPatch};
use todo_core::{ApiError, Result};

pub async fn list(ctx: &TodoContext, completed: bool, active: bool) -> Result<()> {
    require_session(ctx)?;
    let filter = match (completed, active) {
        (true, _) => TaskFilter::completed(),
        (_, true) => TaskFilter::active(),
        _ => TaskFilter::all(),
    };
    let tasks = ctx.tasks()?.list_tasks(filter).await?;
    output::print_list(&tasks);
    Ok(())
}

pub async fn add(
    ctx: &TodoContext,
    title: String,
    description: Option<String>,
    due: Option<NaiveDate>,
) -> Result<()> {
    require_session(ctx)?;
    let new_task = NewTask {
        title,
        description,
        due_date: due,
        is_completed: None,
    };
    let task = ctx.tasks()?.create_task(new_task).await?;
    println!("{} {}", "Added".green(), output::task_line(&task));
    Ok(())
}

pub async fn show(ctx: &TodoContext, id: &str) -> Result<()> {
    require_session(ctx)?;
    let task = ctx.tasks()?.get_task(id).await?;
    output::print_detail(&task);
    Ok(())
}

pub async fn set_completed(ctx: &TodoContext, id: &str, completed: bool) -> Result<()> {
    require_session(ctx)?;
    let task = ctx
        .tasks()?
        .update_task(id, TaskPatch::completed(completed))
        .await?;
    println!("{}", output::task_line(&task));
    Ok(())
}

pub async fn toggle(ctx: &TodoContext, id: &str) -> Result<()> {
    require_session(ctx)?;
    let task = ctx.tasks()?.toggle_task(id).await?;
    println!("{}", output::task_line(&task));
    Ok(())
}

pub async fn edit(ctx: &TodoContext, id: &str, patch: TaskPatch) -> Result<()> {
    require_session(ctx)?;
    let task = ctx.tasks()?.update_task(id, patch).await?;
    println!("{} {}", "Updated".green(), output::task_line(&task));
    Ok(())
}

pub async fn remove(ctx: &TodoContext, id: &str) -> Result<()> {
    require_session(ctx)?;
    ctx.tasks()?.delete_task(id).await?;
    println!("{} {}", "Deleted".green(), id.dimmed());
    Ok(())
}

/// Maps edit flags onto a patch; `--clear-*` sends an explicit null.
pub fn build_patch(
    title: Option<String>,
    description: Option<String>,
    clear_description: bool,
    due: Option<NaiveDate>,
    clear_due: bool,
) -> TaskPatch {
    TaskPatch {
        title,
        description: if clear_description { Some(None) } else { description.map(Some) },
        due_date: if clear_due { Some(None) } else { due.map(Some) },
        is_completed: None,
    }
}

/// Fails without a request when nobody is signed in.
fn require_session(ctx: &TodoContext) -> Result<()> {
    if ctx.session().is_authenticated() {
        return Ok(());
    }
    Err(ApiError::new(401, "UNAUTHORIZED", "Not signed in").into())
}
