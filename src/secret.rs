//! Role-gated access to stored secrets.

use std::{collections::HashMap, fmt};

use async_trait::async_trait;

use crate::{DispatchError, Result};

/// Role claim that grants secret access.
pub const SERVICE_ROLE: &str = "service_role";
/// Accounts treated as administrators.
pub const ADMIN_ACCOUNTS: [&str; 2] = ["postgres", "supabase_admin"];

/// Identity of the caller, evaluated on every lookup.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CallerIdentity {
    /// Role claim from the request context, if any.
    pub role: Option<String>,
    /// Database account the caller runs as.
    pub account: String,
}

impl CallerIdentity {
    pub fn new(role: Option<&str>, account: impl Into<String>) -> Self {
        Self {
            role: role.map(str::to_owned),
            account: account.into(),
        }
    }
}

/// Which identities may read secrets.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SecretPolicy {
    pub service_role: String,
    pub admin_accounts: Vec<String>,
}

impl Default for SecretPolicy {
    fn default() -> Self {
        Self {
            service_role: SERVICE_ROLE.to_owned(),
            admin_accounts: ADMIN_ACCOUNTS.iter().map(|account| (*account).to_owned()).collect(),
        }
    }
}

impl SecretPolicy {
    pub fn allows(&self, caller: &CallerIdentity) -> bool {
        caller.role.as_deref() == Some(self.service_role.as_str())
            || self
                .admin_accounts
                .iter()
                .any(|account| account == &caller.account)
    }
}

/// Secret store keyed by exact name.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Returns the decrypted value, or `None` when no secret has this name.
    async fn decrypted_secret(&self, name: &str) -> Result<Option<String>>;
}

/// Gates [`SecretStore`] lookups behind a [`SecretPolicy`].
pub struct SecretAccessor<S> {
    store: S,
    policy: SecretPolicy,
}

impl<S> fmt::Debug for SecretAccessor<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretAccessor")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl<S: SecretStore> SecretAccessor<S> {
    pub fn new(store: S) -> Self {
        Self::with_policy(store, SecretPolicy::default())
    }

    pub fn with_policy(store: S, policy: SecretPolicy) -> Self {
        Self { store, policy }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Looks up `name` for `caller`.
    ///
    /// Unauthorized callers get [`DispatchError::PermissionDenied`] and the
    /// store is not queried. A missing secret is `Ok(None)`.
    pub async fn fetch_secret(&self, caller: &CallerIdentity, name: &str) -> Result<Option<String>> {
        if !self.policy.allows(caller) {
            #[cfg(feature = "tracing")]
            tracing::warn!(
                role = ?caller.role,
                account = %caller.account,
                "secret access denied"
            );
            return Err(DispatchError::PermissionDenied {
                role: caller.role.clone(),
                account: caller.account.clone(),
            });
        }
        self.store.decrypted_secret(name).await
    }
}

/// [`SecretStore`] holding values in memory.
#[derive(Clone, Default)]
pub struct InMemorySecretStore {
    secrets: HashMap<String, String>,
}

impl fmt::Debug for InMemorySecretStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.secrets.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("InMemorySecretStore")
            .field("names", &names)
            .finish()
    }
}

impl InMemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.secrets.insert(name.into(), value.into());
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for InMemorySecretStore {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        Self {
            secrets: iter
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        }
    }
}

#[async_trait]
impl SecretStore for InMemorySecretStore {
    async fn decrypted_secret(&self, name: &str) -> Result<Option<String>> {
        Ok(self.secrets.get(name).cloned())
    }
}
