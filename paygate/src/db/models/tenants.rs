//! Database model for tenants (merchant accounts).

use sqlx::FromRow;

use crate::secrets::tenant_secret_name;
use crate::types::TenantId;

/// A row of the `tenants` table.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Tenant {
    pub tenant_id: TenantId,
    pub merchant_account: String,
    pub secret_name: Option<String>,
}

impl Tenant {
    /// The secret holding this tenant's configuration, falling back to the naming convention
    /// when the row leaves it blank.
    pub fn resolved_secret_name(&self) -> String {
        match self.secret_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => tenant_secret_name(&self.merchant_account),
        }
    }
}
