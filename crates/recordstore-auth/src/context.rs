//! Request context

/// Identity and tenant of the caller, passed to every contract call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    /// Tenant (data partition) the request targets
    pub tenant: String,
    /// Acting user
    pub user: String,
    /// Correlation id propagated to logs and notifications
    pub correlation_id: String,
}

impl RequestContext {
    /// Create a context with a fresh correlation id
    pub fn new(tenant: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            tenant: tenant.into(),
            user: user.into(),
            correlation_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    /// Set the correlation id
    #[must_use]
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = correlation_id.into();
        self
    }

    /// Same caller acting as another user (used for impersonated writes)
    #[must_use]
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }
}
