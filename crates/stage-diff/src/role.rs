//! Scoped role switching

use crate::remote::RemoteStage;
use crate::{Error, Result};
use std::ops::{Deref, DerefMut};
use tracing::{debug, error};

/// Holds a stage session on a role and switches back when dropped.
///
/// If the session already acts as the requested role nothing is switched
/// and nothing is restored.
pub struct RoleGuard<'a, S: RemoteStage + ?Sized> {
    stage: &'a mut S,
    role: String,
    previous: Option<String>,
}

impl<'a, S: RemoteStage + ?Sized> RoleGuard<'a, S> {
    pub fn acquire(stage: &'a mut S, role: &str) -> Result<Self> {
        let current = stage.current_role().map_err(|source| Error::Remote {
            operation: "current_role",
            source,
        })?;

        let previous = if current == role {
            None
        } else {
            debug!(from = %current, to = %role, "Switching stage role");
            stage.use_role(role).map_err(|source| Error::Remote {
                operation: "use_role",
                source,
            })?;
            Some(current)
        };

        Ok(Self {
            stage,
            role: role.to_string(),
            previous,
        })
    }

    /// The role operations run under while the guard is held.
    pub fn role(&self) -> &str {
        &self.role
    }
}

impl<S: RemoteStage + ?Sized> Deref for RoleGuard<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        self.stage
    }
}

impl<S: RemoteStage + ?Sized> DerefMut for RoleGuard<'_, S> {
    fn deref_mut(&mut self) -> &mut S {
        self.stage
    }
}

impl<S: RemoteStage + ?Sized> Drop for RoleGuard<'_, S> {
    fn drop(&mut self) {
        let Some(previous) = self.previous.take() else {
            return;
        };
        debug!(role = %previous, "Restoring stage role");
        if let Err(e) = self.stage.use_role(&previous) {
            error!(role = %previous, error = %e, "Failed to restore stage role");
        }
    }
}
