use std::collections::HashSet;

use crate::domain::UserId;

// ============== Authorization ==============

/// Reply sent to anyone outside the operator set.
pub const UNAUTHORIZED_REPLY: &str = "Sorry, you are not authorized to use this bot.";

pub fn is_authorized(user_id: Option<UserId>, allowed_users: &HashSet<UserId>) -> bool {
    let Some(user_id) = user_id else {
        return false;
    };
    allowed_users.contains(&user_id)
}

/// Fixed operator allow-list, loaded once at startup.
///
/// An empty set is valid and denies everyone.
#[derive(Clone, Debug, Default)]
pub struct AuthGate {
    allowed: HashSet<UserId>,
}

impl AuthGate {
    pub fn new(ids: impl IntoIterator<Item = i64>) -> Self {
        Self {
            allowed: ids.into_iter().map(UserId).collect(),
        }
    }

    pub fn is_allowed(&self, user_id: Option<UserId>) -> bool {
        is_authorized(user_id, &self.allowed)
    }

    pub fn is_empty(&self) -> bool {
        self.allowed.is_empty()
    }
}
