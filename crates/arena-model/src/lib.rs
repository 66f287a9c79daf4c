//! Concrete contest-domain entity types for the arena mapper.
//!
//! This crate is the only place the concrete document types are named; the
//! mapper engine itself stays type-agnostic. Each module declares one
//! entity type — its tag, its field descriptor, and a typed view over the
//! managed entity — and [`register_types`] installs all of them into a
//! [`TypeRegistry`] at process start.
//!
//! # Entity Types
//!
//! - [`Contest`] — a contest, owning ordered lists of tasks and users
//! - [`Task`] — a task, pointing back at its contest
//! - [`User`] — a contestant account, registered in a contest
//! - [`Submission`] — a submitted solution, pointing at its user and task
//!
//! Typed views are thin: they wrap the shared [`EntityHandle`] and go
//! through the entity's declared fields, so every holder of any view over
//! the same document id observes the same state.
//!
//! [`EntityHandle`]: arena_mapper::EntityHandle

pub mod contest;
pub mod submission;
pub mod task;
pub mod user;
mod value;

pub use contest::{Contest, CONTEST_TAG};
pub use submission::{Submission, SUBMISSION_TAG};
pub use task::{Task, TASK_TAG};
pub use user::{User, USER_TAG};

use arena_mapper::{MapperResult, TypeRegistry};

/// Register every concrete entity type. Call once at process start.
pub fn register_types(registry: &TypeRegistry) -> MapperResult<()> {
    registry.register(contest::descriptor()?);
    registry.register(task::descriptor()?);
    registry.register(user::descriptor()?);
    registry.register(submission::descriptor()?);
    Ok(())
}
