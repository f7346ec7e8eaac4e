//! Task domain module.
//!
//! # Module Structure
//!
//! - `model`: the server-owned `Task` entity and the wire envelopes around it
//! - `request`: create/update payloads, list filters and client-side validation

mod model;
mod request;

pub use model::{MessageResponse, Task, TaskEnvelope, TaskListEnvelope, timestamp};
pub use request::{
    DESCRIPTION_MAX_LEN, NewTask, TITLE_MAX_LEN, TaskFilter, TaskPatch, double_option,
};
