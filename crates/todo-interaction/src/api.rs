//! Typed backend endpoints.

use crate::client::{RequestClient, RequestOptions};
use serde::Serialize;
use serde_json::Value;
use todo_core::auth::{AuthResponse, Credentials};
use todo_core::task::{MessageResponse, NewTask, Task, TaskEnvelope, TaskListEnvelope, TaskPatch};
use todo_core::{ApiError, Result};

pub const REGISTER_PATH: &str = "/api/auth/register";
pub const LOGIN_PATH: &str = "/api/auth/login";
pub const LOGOUT_PATH: &str = "/api/auth/logout";
pub const TASKS_PATH: &str = "/api/tasks";

/// The backend's REST surface on top of a [`RequestClient`].
///
/// Task payloads are validated locally before anything is sent.
#[derive(Clone)]
pub struct TodoApi {
    client: RequestClient,
}

impl TodoApi {
    pub fn new(client: RequestClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &RequestClient {
        &self.client
    }

    pub async fn register(&self, credentials: &Credentials) -> Result<AuthResponse> {
        let options = RequestOptions::post(to_json(credentials)?);
        Ok(self.client.request(REGISTER_PATH, options).await?)
    }

    pub async fn login(&self, credentials: &Credentials) -> Result<AuthResponse> {
        let options = RequestOptions::post(to_json(credentials)?);
        Ok(self.client.request(LOGIN_PATH, options).await?)
    }

    /// Revokes `token` on the server.
    ///
    /// The token is sent explicitly, so this works after the local store has
    /// already been cleared or reused by a newer session.
    pub async fn logout(&self, token: &str) -> Result<MessageResponse> {
        let options = RequestOptions::post(Value::Object(Default::default()))
            .header("Authorization", format!("Bearer {token}"));
        Ok(self.client.request(LOGOUT_PATH, options).await?)
    }

    pub async fn list_tasks(&self) -> Result<Vec<Task>> {
        let envelope: TaskListEnvelope = self.client.request(TASKS_PATH, RequestOptions::get()).await?;
        Ok(envelope.tasks)
    }

    pub async fn create_task(&self, task: &NewTask) -> Result<Task> {
        task.validate()?;
        let options = RequestOptions::post(to_json(task)?);
        let envelope: TaskEnvelope = self.client.request(TASKS_PATH, options).await?;
        Ok(envelope.task)
    }

    pub async fn get_task(&self, id: &str) -> Result<Task> {
        let envelope: TaskEnvelope = self
            .client
            .request(&task_path(id)?, RequestOptions::get())
            .await?;
        Ok(envelope.task)
    }

    pub async fn update_task(&self, id: &str, patch: &TaskPatch) -> Result<Task> {
        patch.validate()?;
        let options = RequestOptions::put(to_json(patch)?);
        let envelope: TaskEnvelope = self.client.request(&task_path(id)?, options).await?;
        Ok(envelope.task)
    }

    pub async fn delete_task(&self, id: &str) -> Result<MessageResponse> {
        Ok(self
            .client
            .request(&task_path(id)?, RequestOptions::delete())
            .await?)
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}

/// Task ids are server-issued UUIDs; anything that would escape the path
/// segment is rejected before a request is made.
fn task_path(id: &str) -> Result<String> {
    let valid = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid {
        return Err(ApiError::validation(
            "Invalid task id",
            Value::from(format!("'{id}' is not a task id")),
        )
        .into());
    }
    Ok(format!("{TASKS_PATH}/{id}"))
}
