use taskboard_core::UserId;

/// Actor identity for a mutating request, taken from the `x-user-id` header.
///
/// Present on every POST/PUT/DELETE request that reaches a handler; the
/// middleware rejects those requests before routing otherwise.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CallerContext {
    user_id: UserId,
}

impl CallerContext {
    pub fn new(user_id: UserId) -> Self {
        Self { user_id }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }
}
