//! The contest entity type.
//!
//! A contest owns its tasks and its registered users, both as ordered
//! reference lists. Tasks point back at their contest, which makes
//! contest ↔ task the mutual-reference pair the mapper's cycle handling
//! exists for.

use std::sync::Arc;

use serde_json::Value;

use arena_mapper::{
    EntityHandle, MapperError, MapperResult, TypeDescriptor, TypeRegistry,
};
use arena_types::TypeTag;

use crate::task::Task;
use crate::user::User;
use crate::value::{as_i64, as_string};

/// Type tag for contest documents.
pub const CONTEST_TAG: &str = "contest";

/// Field declaration for contests.
pub fn descriptor() -> MapperResult<TypeDescriptor> {
    Ok(TypeDescriptor::builder(TypeTag::new(CONTEST_TAG)?)
        .scalar("name")
        .scalar("description")
        .scalar("start_time")
        .scalar("stop_time")
        .reference_list("tasks")
        .reference_list("users")
        .build()?)
}

/// Typed view over a contest entity.
#[derive(Clone, Debug)]
pub struct Contest {
    entity: EntityHandle,
}

impl Contest {
    /// Create a fresh, unsaved contest.
    pub fn create(registry: &TypeRegistry) -> MapperResult<Self> {
        let tag = TypeTag::new(CONTEST_TAG)?;
        Ok(Self {
            entity: registry.instantiate(&tag)?,
        })
    }

    /// Wrap an existing entity, checking its type tag.
    pub fn attach(entity: EntityHandle) -> MapperResult<Self> {
        if entity.type_tag().as_str() != CONTEST_TAG {
            return Err(MapperError::TypeMismatch {
                expected: TypeTag::new(CONTEST_TAG)?,
                actual: entity.type_tag(),
            });
        }
        Ok(Self { entity })
    }

    /// The underlying managed entity.
    pub fn entity(&self) -> &EntityHandle {
        &self.entity
    }

    pub fn name(&self) -> MapperResult<Option<String>> {
        Ok(as_string(self.entity.scalar("name")?))
    }

    pub fn set_name(&self, name: &str) -> MapperResult<()> {
        self.entity.set_scalar("name", Value::String(name.into()))
    }

    pub fn description(&self) -> MapperResult<Option<String>> {
        Ok(as_string(self.entity.scalar("description")?))
    }

    pub fn set_description(&self, description: &str) -> MapperResult<()> {
        self.entity
            .set_scalar("description", Value::String(description.into()))
    }

    /// Contest start, seconds since the epoch.
    pub fn start_time(&self) -> MapperResult<Option<i64>> {
        Ok(as_i64(self.entity.scalar("start_time")?))
    }

    pub fn set_start_time(&self, start_time: i64) -> MapperResult<()> {
        self.entity.set_scalar("start_time", Value::from(start_time))
    }

    /// Contest end, seconds since the epoch.
    pub fn stop_time(&self) -> MapperResult<Option<i64>> {
        Ok(as_i64(self.entity.scalar("stop_time")?))
    }

    pub fn set_stop_time(&self, stop_time: i64) -> MapperResult<()> {
        self.entity.set_scalar("stop_time", Value::from(stop_time))
    }

    /// The contest's tasks, in contest order.
    pub fn tasks(&self) -> MapperResult<Vec<Task>> {
        self.entity
            .reference_list("tasks")?
            .into_iter()
            .map(Task::attach)
            .collect()
    }

    pub fn set_tasks(&self, tasks: &[Task]) -> MapperResult<()> {
        let handles: Vec<EntityHandle> =
            tasks.iter().map(|task| Arc::clone(task.entity())).collect();
        self.entity.set_reference_list("tasks", &handles)
    }

    /// The contest's registered users.
    pub fn users(&self) -> MapperResult<Vec<User>> {
        self.entity
            .reference_list("users")?
            .into_iter()
            .map(User::attach)
            .collect()
    }

    pub fn set_users(&self, users: &[User]) -> MapperResult<()> {
        let handles: Vec<EntityHandle> =
            users.iter().map(|user| Arc::clone(user.entity())).collect();
        self.entity.set_reference_list("users", &handles)
    }
}
