use uuid::Uuid;

/// Authenticated user installed into the shared state by the host.
///
/// The identity provider and the billing provider are external
/// collaborators; the host resolves both and hands the core this value.
/// Durable operations are rejected before any network call when no identity
/// is installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    /// Stable user identifier issued by the identity provider.
    pub user_id: Uuid,
    /// Whether the billing provider reports an active premium entitlement.
    pub premium: bool,
}

impl Identity {
    /// Identity with a standard (non-premium) entitlement.
    pub fn standard(user_id: Uuid) -> Self {
        Self {
            user_id,
            premium: false,
        }
    }

    /// Identity with an active premium entitlement.
    pub fn premium(user_id: Uuid) -> Self {
        Self {
            user_id,
            premium: true,
        }
    }
}
