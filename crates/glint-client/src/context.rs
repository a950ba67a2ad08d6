use glint_shared::UserId;

/// The signed-in user, as established by the (out-of-scope) auth layer.
///
/// Injected into the client at construction; credential and session
/// management never enter this core.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub user_id: UserId,
    pub username: String,
    pub display_name: String,
}

impl SessionContext {
    pub fn new(
        user_id: impl Into<String>,
        username: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            user_id: UserId(user_id.into()),
            username: username.into(),
            display_name: display_name.into(),
        }
    }
}
