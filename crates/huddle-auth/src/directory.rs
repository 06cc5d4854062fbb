//! Whether an authenticated user may still connect.

use std::collections::HashSet;

use async_trait::async_trait;
use huddle_core::UserId;

/// Source of truth for user activity (backed by the CRUD layer in
/// production).
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Whether `user_id` is active.
    async fn is_active(&self, user_id: &UserId) -> bool;
}

/// Treats every user as active.
#[derive(Clone, Copy, Debug, Default)]
pub struct AllowAllUsers;

#[async_trait]
impl UserDirectory for AllowAllUsers {
    async fn is_active(&self, _user_id: &UserId) -> bool {
        true
    }
}

/// Everyone is active except an explicit disabled set.
#[derive(Clone, Debug, Default)]
pub struct StaticUserDirectory {
    disabled: HashSet<UserId>,
}

impl StaticUserDirectory {
    /// Directory with the given users disabled.
    pub fn with_disabled<I, U>(users: I) -> Self
    where
        I: IntoIterator<Item = U>,
        U: Into<UserId>,
    {
        Self {
            disabled: users.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl UserDirectory for StaticUserDirectory {
    async fn is_active(&self, user_id: &UserId) -> bool {
        !self.disabled.contains(user_id)
    }
}
