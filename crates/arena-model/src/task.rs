//! The task entity type.

use serde_json::Value;

use arena_mapper::{
    EntityHandle, MapperError, MapperResult, TypeDescriptor, TypeRegistry,
};
use arena_types::TypeTag;

use crate::contest::Contest;
use crate::value::{as_f64, as_i64, as_string};

/// Type tag for task documents.
pub const TASK_TAG: &str = "task";

/// Field declaration for tasks.
pub fn descriptor() -> MapperResult<TypeDescriptor> {
    Ok(TypeDescriptor::builder(TypeTag::new(TASK_TAG)?)
        .scalar("name")
        .scalar("title")
        .scalar("time_limit")
        .scalar("memory_limit")
        .scalar("task_type")
        .reference("contest")
        .build()?)
}

/// Typed view over a task entity.
#[derive(Clone, Debug)]
pub struct Task {
    entity: EntityHandle,
}

impl Task {
    /// Create a fresh, unsaved task.
    pub fn create(registry: &TypeRegistry) -> MapperResult<Self> {
        let tag = TypeTag::new(TASK_TAG)?;
        Ok(Self {
            entity: registry.instantiate(&tag)?,
        })
    }

    /// Wrap an existing entity, checking its type tag.
    pub fn attach(entity: EntityHandle) -> MapperResult<Self> {
        if entity.type_tag().as_str() != TASK_TAG {
            return Err(MapperError::TypeMismatch {
                expected: TypeTag::new(TASK_TAG)?,
                actual: entity.type_tag(),
            });
        }
        Ok(Self { entity })
    }

    /// The underlying managed entity.
    pub fn entity(&self) -> &EntityHandle {
        &self.entity
    }

    /// Short name of the task, e.g. `"aplusb"`.
    pub fn name(&self) -> MapperResult<Option<String>> {
        Ok(as_string(self.entity.scalar("name")?))
    }

    pub fn set_name(&self, name: &str) -> MapperResult<()> {
        self.entity.set_scalar("name", Value::String(name.into()))
    }

    /// Human-readable title shown to contestants.
    pub fn title(&self) -> MapperResult<Option<String>> {
        Ok(as_string(self.entity.scalar("title")?))
    }

    pub fn set_title(&self, title: &str) -> MapperResult<()> {
        self.entity.set_scalar("title", Value::String(title.into()))
    }

    /// Per-testcase time limit in seconds.
    pub fn time_limit(&self) -> MapperResult<Option<f64>> {
        Ok(as_f64(self.entity.scalar("time_limit")?))
    }

    pub fn set_time_limit(&self, seconds: f64) -> MapperResult<()> {
        self.entity.set_scalar("time_limit", Value::from(seconds))
    }

    /// Per-testcase memory limit in bytes.
    pub fn memory_limit(&self) -> MapperResult<Option<i64>> {
        Ok(as_i64(self.entity.scalar("memory_limit")?))
    }

    pub fn set_memory_limit(&self, bytes: i64) -> MapperResult<()> {
        self.entity.set_scalar("memory_limit", Value::from(bytes))
    }

    /// Name of the task type driving compilation and evaluation.
    pub fn task_type(&self) -> MapperResult<Option<String>> {
        Ok(as_string(self.entity.scalar("task_type")?))
    }

    pub fn set_task_type(&self, task_type: &str) -> MapperResult<()> {
        self.entity
            .set_scalar("task_type", Value::String(task_type.into()))
    }

    /// The contest this task belongs to.
    pub fn contest(&self) -> MapperResult<Option<Contest>> {
        match self.entity.reference("contest")? {
            Some(entity) => Ok(Some(Contest::attach(entity)?)),
            None => Ok(None),
        }
    }

    pub fn set_contest(&self, contest: &Contest) -> MapperResult<()> {
        self.entity.set_reference("contest", contest.entity())
    }
}
