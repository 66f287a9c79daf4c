//! The submission entity type.
//!
//! A submission is the leaf of the reference graph: it points at the user
//! who sent it and the task it answers, and carries the submitted files as
//! a filename → content-digest mapping (a nested document value, not a
//! reference).

use std::collections::BTreeMap;

use serde_json::Value;

use arena_mapper::{
    EntityHandle, MapperError, MapperResult, TypeDescriptor, TypeRegistry,
};
use arena_types::TypeTag;

use crate::task::Task;
use crate::user::User;
use crate::value::{as_i64, as_string};

/// Type tag for submission documents.
pub const SUBMISSION_TAG: &str = "submission";

/// Field declaration for submissions.
pub fn descriptor() -> MapperResult<TypeDescriptor> {
    Ok(TypeDescriptor::builder(TypeTag::new(SUBMISSION_TAG)?)
        .scalar("timestamp")
        .scalar("language")
        .scalar("files")
        .reference("user")
        .reference("task")
        .build()?)
}

/// Typed view over a submission entity.
#[derive(Clone, Debug)]
pub struct Submission {
    entity: EntityHandle,
}

impl Submission {
    /// Create a fresh, unsaved submission.
    pub fn create(registry: &TypeRegistry) -> MapperResult<Self> {
        let tag = TypeTag::new(SUBMISSION_TAG)?;
        Ok(Self {
            entity: registry.instantiate(&tag)?,
        })
    }

    /// Wrap an existing entity, checking its type tag.
    pub fn attach(entity: EntityHandle) -> MapperResult<Self> {
        if entity.type_tag().as_str() != SUBMISSION_TAG {
            return Err(MapperError::TypeMismatch {
                expected: TypeTag::new(SUBMISSION_TAG)?,
                actual: entity.type_tag(),
            });
        }
        Ok(Self { entity })
    }

    /// The underlying managed entity.
    pub fn entity(&self) -> &EntityHandle {
        &self.entity
    }

    /// Submission time, seconds since the epoch.
    pub fn timestamp(&self) -> MapperResult<Option<i64>> {
        Ok(as_i64(self.entity.scalar("timestamp")?))
    }

    pub fn set_timestamp(&self, timestamp: i64) -> MapperResult<()> {
        self.entity.set_scalar("timestamp", Value::from(timestamp))
    }

    /// Programming language code, e.g. `"cpp"`.
    pub fn language(&self) -> MapperResult<Option<String>> {
        Ok(as_string(self.entity.scalar("language")?))
    }

    pub fn set_language(&self, language: &str) -> MapperResult<()> {
        self.entity
            .set_scalar("language", Value::String(language.into()))
    }

    /// Submitted files as a filename → content-digest mapping.
    ///
    /// Entries whose digest is not a string are skipped.
    pub fn files(&self) -> MapperResult<BTreeMap<String, String>> {
        let files = match self.entity.scalar("files")? {
            Some(Value::Object(map)) => map
                .into_iter()
                .filter_map(|(name, digest)| match digest {
                    Value::String(digest) => Some((name, digest)),
                    _ => None,
                })
                .collect(),
            _ => BTreeMap::new(),
        };
        Ok(files)
    }

    pub fn set_files(&self, files: &BTreeMap<String, String>) -> MapperResult<()> {
        let map = files
            .iter()
            .map(|(name, digest)| (name.clone(), Value::String(digest.clone())))
            .collect();
        self.entity.set_scalar("files", Value::Object(map))
    }

    /// The user who sent this submission.
    pub fn user(&self) -> MapperResult<Option<User>> {
        match self.entity.reference("user")? {
            Some(entity) => Ok(Some(User::attach(entity)?)),
            None => Ok(None),
        }
    }

    pub fn set_user(&self, user: &User) -> MapperResult<()> {
        self.entity.set_reference("user", user.entity())
    }

    /// The task this submission answers.
    pub fn task(&self) -> MapperResult<Option<Task>> {
        match self.entity.reference("task")? {
            Some(entity) => Ok(Some(Task::attach(entity)?)),
            None => Ok(None),
        }
    }

    pub fn set_task(&self, task: &Task) -> MapperResult<()> {
        self.entity.set_reference("task", task.entity())
    }
}
