//! WAF overrides
//!
//! URL-scoped exceptions to the zone's WAF configuration: for the matched
//! URLs, individual rules and rule groups can be forced into a given mode
//! and block responses rewritten to another action. Create and update share
//! one wire shape built from the declared state.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::client::Client;
use crate::error::{Error, Result};
use strato_reconcile::split_import_id;

const IMPORT_FORMAT: &str = "zoneID/overrideID";

/// Declared and computed attributes for one WAF override.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WafOverrideState {
    pub id: Option<String>,
    pub zone_id: String,
    /// URL patterns the override applies to (ordered).
    pub urls: Vec<String>,
    /// Per-rule mode overrides, keyed by rule id.
    pub rules: BTreeMap<String, String>,
    /// Per-group mode overrides, keyed by group id.
    pub groups: BTreeMap<String, String>,
    /// Response action rewrites, e.g. `"block"` to `"challenge"`.
    pub rewrite_action: BTreeMap<String, String>,
    pub paused: Option<bool>,
    pub description: Option<String>,
    pub priority: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WafOverride {
    #[serde(default, skip_serializing)]
    pub id: String,
    pub urls: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub rules: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub groups: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub rewrite_action: BTreeMap<String, String>,
    #[serde(default)]
    pub paused: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
}

#[async_trait]
pub trait WafOverrideApi: Send + Sync {
    async fn create_waf_override(
        &self,
        zone_id: &str,
        override_: &WafOverride,
    ) -> Result<WafOverride>;
    async fn waf_override(&self, zone_id: &str, override_id: &str) -> Result<WafOverride>;
    async fn update_waf_override(
        &self,
        zone_id: &str,
        override_id: &str,
        override_: &WafOverride,
    ) -> Result<WafOverride>;
    async fn delete_waf_override(&self, zone_id: &str, override_id: &str) -> Result<()>;
}

#[async_trait]
impl WafOverrideApi for Client {
    async fn create_waf_override(
        &self,
        zone_id: &str,
        override_: &WafOverride,
    ) -> Result<WafOverride> {
        self.post(&format!("/zones/{zone_id}/firewall/waf/overrides"), override_)
            .await
    }

    async fn waf_override(&self, zone_id: &str, override_id: &str) -> Result<WafOverride> {
        self.get(&format!("/zones/{zone_id}/firewall/waf/overrides/{override_id}"))
            .await
    }

    async fn update_waf_override(
        &self,
        zone_id: &str,
        override_id: &str,
        override_: &WafOverride,
    ) -> Result<WafOverride> {
        self.put(
            &format!("/zones/{zone_id}/firewall/waf/overrides/{override_id}"),
            override_,
        )
        .await
    }

    async fn delete_waf_override(&self, zone_id: &str, override_id: &str) -> Result<()> {
        self.delete(&format!("/zones/{zone_id}/firewall/waf/overrides/{override_id}"))
            .await
    }
}

fn override_from_state(state: &WafOverrideState) -> WafOverride {
    WafOverride {
        id: state.id.clone().unwrap_or_default(),
        urls: state.urls.clone(),
        rules: state.rules.clone(),
        groups: state.groups.clone(),
        rewrite_action: state.rewrite_action.clone(),
        paused: state.paused.unwrap_or_default(),
        description: state.description.clone(),
        priority: state.priority,
    }
}

/// Reconciles declared WAF override state against the remote zone.
pub struct WafOverrideReconciler<A> {
    api: A,
}

impl<A: WafOverrideApi> WafOverrideReconciler<A> {
    pub fn new(api: A) -> Self {
        Self { api }
    }

    pub async fn create(&self, state: &mut WafOverrideState) -> Result<()> {
        let override_ = override_from_state(state);
        tracing::debug!(zone_id = %state.zone_id, "creating WAF override: {override_:?}");

        let created = self
            .api
            .create_waf_override(&state.zone_id, &override_)
            .await
            .map_err(|e| e.context("failed to create WAF override"))?;
        if created.id.is_empty() {
            return Err(Error::MissingId {
                resource: "WAF override",
                op: "create",
            });
        }
        state.id = Some(created.id);

        self.read(state).await
    }

    pub async fn read(&self, state: &mut WafOverrideState) -> Result<()> {
        let Some(id) = state.id.clone() else {
            return Err(Error::InvalidConfig(
                "WAF override id is not set".to_string(),
            ));
        };

        let override_ = match self.api.waf_override(&state.zone_id, &id).await {
            Ok(override_) => override_,
            Err(e) if e.is_not_found() => {
                tracing::info!("WAF override {id} no longer exists");
                state.id = None;
                return Ok(());
            }
            Err(e) => return Err(e.context(format!("failed to find WAF override {id}"))),
        };

        state.urls = override_.urls;
        state.rules = override_.rules;
        state.groups = override_.groups;
        state.rewrite_action = override_.rewrite_action;
        state.paused = Some(override_.paused);
        state.description = override_.description;
        state.priority = override_.priority;
        Ok(())
    }

    pub async fn update(&self, state: &mut WafOverrideState) -> Result<()> {
        let Some(id) = state.id.clone() else {
            return Err(Error::InvalidConfig(
                "WAF override id is not set".to_string(),
            ));
        };

        let override_ = override_from_state(state);
        self.api
            .update_waf_override(&state.zone_id, &id, &override_)
            .await
            .map_err(|e| e.context("failed to update WAF override"))?;

        self.read(state).await
    }

    pub async fn delete(&self, state: &mut WafOverrideState) -> Result<()> {
        let Some(id) = state.id.clone() else {
            return Ok(());
        };
        tracing::info!(zone_id = %state.zone_id, "deleting WAF override {id}");

        self.api
            .delete_waf_override(&state.zone_id, &id)
            .await
            .map_err(|e| e.context(format!("failed to delete WAF override id {id}")))?;
        state.id = None;
        Ok(())
    }

    pub async fn import(&self, external_id: &str) -> Result<WafOverrideState> {
        let [zone_id, override_id] = split_import_id(external_id, IMPORT_FORMAT)?;
        tracing::debug!("importing WAF override {override_id} for zone {zone_id}");

        let mut state = WafOverrideState {
            id: Some(override_id),
            zone_id,
            ..Default::default()
        };
        self.read(&mut state).await?;
        Ok(state)
    }
}
