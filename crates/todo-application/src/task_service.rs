//! Task reads and writes through the query cache.

use crate::query_cache::QueryCache;
use todo_core::task::{NewTask, Task, TaskFilter, TaskPatch};
use todo_core::{QueryKey, Result};
use todo_interaction::TodoApi;

/// Reads are cached under [`QueryKey`]s; writes go through the mutation path
/// and then refresh the affected keys.
#[derive(Clone)]
pub struct TaskService {
    api: TodoApi,
    cache: QueryCache,
}

impl TaskService {
    pub fn new(api: TodoApi, cache: QueryCache) -> Self {
        Self { api, cache }
    }

    /// Lists the signed-in user's tasks matching `filter`, in creation order.
    pub async fn list_tasks(&self, filter: TaskFilter) -> Result<Vec<Task>> {
        let api = self.api.clone();
        self.cache
            .query(QueryKey::task_list(filter), move || {
                let api = api.clone();
                async move {
                    let tasks = api.list_tasks().await?;
                    Ok(tasks.into_iter().filter(|task| filter.matches(task)).collect())
                }
            })
            .await
    }

    pub async fn get_task(&self, id: &str) -> Result<Task> {
        let api = self.api.clone();
        let task_id = id.to_string();
        self.cache
            .query(QueryKey::task_detail(id), move || {
                let api = api.clone();
                let task_id = task_id.clone();
                async move { api.get_task(&task_id).await }
            })
            .await
    }

    pub async fn create_task(&self, new_task: NewTask) -> Result<Task> {
        let generation = self.cache.generation();
        let task = self
            .cache
            .mutate("create_task", self.api.create_task(&new_task))
            .await?;

        self.cache.invalidate_where(QueryKey::is_task_list);
        self.cache
            .set_data_in(generation, QueryKey::task_detail(&task.id), task.clone());
        Ok(task)
    }

    pub async fn update_task(&self, id: &str, patch: TaskPatch) -> Result<Task> {
        let generation = self.cache.generation();
        let task = self
            .cache
            .mutate("update_task", self.api.update_task(id, &patch))
            .await?;

        self.cache.invalidate_where(QueryKey::is_task_list);
        self.cache
            .set_data_in(generation, QueryKey::task_detail(&task.id), task.clone());
        Ok(task)
    }

    /// Flips the completion flag of the task as currently known.
    pub async fn toggle_task(&self, id: &str) -> Result<Task> {
        let current = self.get_task(id).await?;
        self.update_task(id, TaskPatch::completed(!current.is_completed))
            .await
    }

    pub async fn delete_task(&self, id: &str) -> Result<()> {
        self.cache
            .mutate("delete_task", self.api.delete_task(id))
            .await?;

        self.cache.invalidate_where(QueryKey::is_task_list);
        self.cache.remove(&QueryKey::task_detail(id));
        Ok(())
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }
}
