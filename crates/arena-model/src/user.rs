//! The user entity type.

use serde_json::Value;

use arena_mapper::{
    EntityHandle, MapperError, MapperResult, TypeDescriptor, TypeRegistry,
};
use arena_types::TypeTag;

use crate::contest::Contest;
use crate::value::as_string;

/// Type tag for user documents.
pub const USER_TAG: &str = "user";

/// Field declaration for users.
pub fn descriptor() -> MapperResult<TypeDescriptor> {
    Ok(TypeDescriptor::builder(TypeTag::new(USER_TAG)?)
        .scalar("username")
        .scalar("password")
        .scalar("real_name")
        .reference("contest")
        .build()?)
}

/// Typed view over a user entity.
#[derive(Clone, Debug)]
pub struct User {
    entity: EntityHandle,
}

impl User {
    /// Create a fresh, unsaved user.
    pub fn create(registry: &TypeRegistry) -> MapperResult<Self> {
        let tag = TypeTag::new(USER_TAG)?;
        Ok(Self {
            entity: registry.instantiate(&tag)?,
        })
    }

    /// Wrap an existing entity, checking its type tag.
    pub fn attach(entity: EntityHandle) -> MapperResult<Self> {
        if entity.type_tag().as_str() != USER_TAG {
            return Err(MapperError::TypeMismatch {
                expected: TypeTag::new(USER_TAG)?,
                actual: entity.type_tag(),
            });
        }
        Ok(Self { entity })
    }

    /// The underlying managed entity.
    pub fn entity(&self) -> &EntityHandle {
        &self.entity
    }

    pub fn username(&self) -> MapperResult<Option<String>> {
        Ok(as_string(self.entity.scalar("username")?))
    }

    pub fn set_username(&self, username: &str) -> MapperResult<()> {
        self.entity
            .set_scalar("username", Value::String(username.into()))
    }

    pub fn password(&self) -> MapperResult<Option<String>> {
        Ok(as_string(self.entity.scalar("password")?))
    }

    pub fn set_password(&self, password: &str) -> MapperResult<()> {
        self.entity
            .set_scalar("password", Value::String(password.into()))
    }

    pub fn real_name(&self) -> MapperResult<Option<String>> {
        Ok(as_string(self.entity.scalar("real_name")?))
    }

    pub fn set_real_name(&self, real_name: &str) -> MapperResult<()> {
        self.entity
            .set_scalar("real_name", Value::String(real_name.into()))
    }

    /// The contest this user is registered in.
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
