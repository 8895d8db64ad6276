//! Identity collaborator: resolves authenticated actor ids to roles

use async_trait::async_trait;
use certflow_types::{Actor, ActorId, WorkflowError, WorkflowResult};
use std::collections::HashMap;

/// Resolves the actor behind a request.
///
/// Roles are never trusted from the request itself; every handler call
/// goes through a provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn resolve(&self, actor_id: &ActorId) -> WorkflowResult<Actor>;
}

/// Fixed actor directory, loaded from configuration
#[derive(Clone, Debug, Default)]
pub struct StaticDirectory {
    actors: HashMap<ActorId, Actor>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_actor(mut self, actor: Actor) -> Self {
        self.insert(actor);
        self
    }

    pub fn insert(&mut self, actor: Actor) {
        self.actors.insert(actor.id.clone(), actor);
    }

    pub fn len(&self) -> usize {
        self.actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }
}

impl FromIterator<Actor> for StaticDirectory {
    fn from_iter<I: IntoIterator<Item = Actor>>(iter: I) -> Self {
        let mut directory = Self::new();
        for actor in iter {
            directory.insert(actor);
        }
        directory
    }
}

#[async_trait]
impl IdentityProvider for StaticDirectory {
    async fn resolve(&self, actor_id: &ActorId) -> WorkflowResult<Actor> {
        self.actors
            .get(actor_id)
            .cloned()
            .ok_or_else(|| WorkflowError::UnknownActor(actor_id.to_string()))
    }
}
