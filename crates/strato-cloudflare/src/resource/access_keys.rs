//! Access keys configuration
//!
//! An account-lifetime singleton: the key rotation settings exist for as
//! long as the account does. Create only pushes a change when a rotation
//! interval was explicitly declared, and delete is a deliberate no-op that
//! never calls the remote API. The account id doubles as the identity.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::client::Client;
use crate::error::{Error, Result};

/// Error code returned when the account has no Access keys configuration
/// enabled at all.
const CODE_NOT_ENABLED: i32 = 12109;

/// Declared and computed attributes for the keys configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessKeysState {
    pub id: Option<String>,
    pub account_id: String,
    /// Rotation interval in days. `None` means "leave the remote value
    /// alone", which is distinct from explicitly declaring a value.
    pub key_rotation_interval_days: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccessKeysConfig {
    pub key_rotation_interval_days: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccessKeysConfigUpdate {
    pub key_rotation_interval_days: u32,
}

#[async_trait]
pub trait AccessKeysApi: Send + Sync {
    async fn access_keys_config(&self, account_id: &str) -> Result<AccessKeysConfig>;
    async fn update_access_keys_config(
        &self,
        account_id: &str,
        update: &AccessKeysConfigUpdate,
    ) -> Result<AccessKeysConfig>;
}

#[async_trait]
impl AccessKeysApi for Client {
    async fn access_keys_config(&self, account_id: &str) -> Result<AccessKeysConfig> {
        self.get(&format!("/accounts/{account_id}/access/keys")).await
    }

    async fn update_access_keys_config(
        &self,
        account_id: &str,
        update: &AccessKeysConfigUpdate,
    ) -> Result<AccessKeysConfig> {
        self.put(&format!("/accounts/{account_id}/access/keys"), update)
            .await
    }
}

/// Reconciles the account's Access keys configuration.
pub struct AccessKeysReconciler<A> {
    api: A,
}

impl<A: AccessKeysApi> AccessKeysReconciler<A> {
    pub fn new(api: A) -> Self {
        Self { api }
    }

    /// The configuration shares its lifetime with the account, so create is
    /// a read unless a rotation interval was explicitly declared.
    pub async fn create(&self, state: &mut AccessKeysState) -> Result<()> {
        if state.key_rotation_interval_days.is_none() {
            return self.read(state).await;
        }
        self.update(state).await
    }

    pub async fn read(&self, state: &mut AccessKeysState) -> Result<()> {
        let config = match self.api.access_keys_config(&state.account_id).await {
            Ok(config) => config,
            Err(e) if e.has_code(CODE_NOT_ENABLED) || e.is_not_found() => {
                tracing::info!(
                    "access keys configuration not enabled for account {}",
                    state.account_id
                );
                state.id = None;
                return Ok(());
            }
            Err(e) => {
                return Err(e.context(format!(
                    "error finding access keys configuration {}",
                    state.account_id
                )));
            }
        };

        state.id = Some(state.account_id.clone());
        state.key_rotation_interval_days = Some(config.key_rotation_interval_days);
        Ok(())
    }

    pub async fn update(&self, state: &mut AccessKeysState) -> Result<()> {
        let Some(days) = state.key_rotation_interval_days else {
            return Err(Error::InvalidConfig(
                "key_rotation_interval_days is not set".to_string(),
            ));
        };

        self.api
            .update_access_keys_config(
                &state.account_id,
                &AccessKeysConfigUpdate {
                    key_rotation_interval_days: days,
                },
            )
            .await
            .map_err(|e| {
                e.context(format!(
                    "error updating access keys configuration for account {}",
                    state.account_id
                ))
            })?;

        self.read(state).await
    }

    /// The configuration cannot be deleted explicitly; it lives and dies
    /// with the account. Deliberate no-op.
    pub async fn delete(&self, state: &mut AccessKeysState) -> Result<()> {
        state.id = None;
        Ok(())
    }

    /// The import identifier is the bare account id.
    pub async fn import(&self, external_id: &str) -> Result<AccessKeysState> {
        let mut state = AccessKeysState {
            id: Some(external_id.to_string()),
            account_id: external_id.to_string(),
            key_rotation_interval_days: None,
        };
        self.read(&mut state).await?;
        Ok(state)
    }
}
