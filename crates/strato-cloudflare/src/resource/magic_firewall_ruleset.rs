//! Magic firewall rulesets
//!
//! Root rulesets in the `magic_transit` phase. The declared rule action
//! vocabulary is `"allow"` and `"block"`; on the wire an allow is a `"skip"`
//! targeting the current ruleset, and the mapping is undone on read. Updates
//! replace the full rule list.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::client::Client;
use crate::error::{Error, Result};
use strato_reconcile::split_import_id;

const IMPORT_FORMAT: &str = "accountID/rulesetID";

const RULESET_KIND: &str = "root";
const RULESET_PHASE: &str = "magic_transit";

/// Declared rule action in a magic firewall ruleset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RuleAction {
    #[default]
    Allow,
    Block,
}

/// Declared and computed attributes for one ruleset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MagicFirewallRulesetState {
    pub id: Option<String>,
    pub account_id: String,
    pub name: String,
    pub description: Option<String>,
    pub rules: Vec<FirewallRule>,
}

/// One declared rule, ordered within the ruleset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FirewallRule {
    pub action: RuleAction,
    pub expression: String,
    pub description: Option<String>,
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Ruleset {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub rules: Vec<RulesetRule>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesetRule {
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_parameters: Option<RuleActionParameters>,
    pub expression: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleActionParameters {
    pub ruleset: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewRuleset {
    pub name: String,
    pub description: String,
    pub kind: &'static str,
    pub phase: &'static str,
    pub rules: Vec<RulesetRule>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateRuleset {
    pub description: String,
    pub rules: Vec<RulesetRule>,
}

#[async_trait]
pub trait MagicFirewallApi: Send + Sync {
    async fn create_ruleset(&self, account_id: &str, ruleset: &NewRuleset) -> Result<Ruleset>;
    async fn ruleset(&self, account_id: &str, ruleset_id: &str) -> Result<Ruleset>;
    async fn update_ruleset(
        &self,
        account_id: &str,
        ruleset_id: &str,
        update: &UpdateRuleset,
    ) -> Result<Ruleset>;
    async fn delete_ruleset(&self, account_id: &str, ruleset_id: &str) -> Result<()>;
}

#[async_trait]
impl MagicFirewallApi for Client {
    async fn create_ruleset(&self, account_id: &str, ruleset: &NewRuleset) -> Result<Ruleset> {
        self.post(&format!("/accounts/{account_id}/rulesets"), ruleset)
            .await
    }

    async fn ruleset(&self, account_id: &str, ruleset_id: &str) -> Result<Ruleset> {
        self.get(&format!("/accounts/{account_id}/rulesets/{ruleset_id}"))
            .await
    }

    async fn update_ruleset(
        &self,
        account_id: &str,
        ruleset_id: &str,
        update: &UpdateRuleset,
    ) -> Result<Ruleset> {
        self.put(&format!("/accounts/{account_id}/rulesets/{ruleset_id}"), update)
            .await
    }

    async fn delete_ruleset(&self, account_id: &str, ruleset_id: &str) -> Result<()> {
        self.delete(&format!("/accounts/{account_id}/rulesets/{ruleset_id}"))
            .await
    }
}

fn wire_rules(rules: &[FirewallRule]) -> Vec<RulesetRule> {
    rules
        .iter()
        .map(|rule| match rule.action {
            RuleAction::Allow => RulesetRule {
                action: "skip".to_string(),
                action_parameters: Some(RuleActionParameters {
                    ruleset: "current".to_string(),
                }),
                expression: rule.expression.clone(),
                description: rule.description.clone(),
                enabled: rule.enabled,
            },
            RuleAction::Block => RulesetRule {
                action: "block".to_string(),
                action_parameters: None,
                expression: rule.expression.clone(),
                description: rule.description.clone(),
                enabled: rule.enabled,
            },
        })
        .collect()
}

fn declared_rules(rules: Vec<RulesetRule>) -> Vec<FirewallRule> {
    rules
        .into_iter()
        .map(|rule| FirewallRule {
            action: if rule.action == "skip" {
                RuleAction::Allow
            } else {
                RuleAction::Block
            },
            expression: rule.expression,
            description: rule.description.filter(|d| !d.is_empty()),
            enabled: rule.enabled,
        })
        .collect()
}

/// Reconciles declared ruleset state against the remote account.
pub struct MagicFirewallRulesetReconciler<A> {
    api: A,
}

impl<A: MagicFirewallApi> MagicFirewallRulesetReconciler<A> {
    pub fn new(api: A) -> Self {
        Self { api }
    }

    pub async fn create(&self, state: &mut MagicFirewallRulesetState) -> Result<()> {
        let ruleset = NewRuleset {
            name: state.name.clone(),
            description: state.description.clone().unwrap_or_default(),
            kind: RULESET_KIND,
            phase: RULESET_PHASE,
            rules: wire_rules(&state.rules),
        };

        let created = self
            .api
            .create_ruleset(&state.account_id, &ruleset)
            .await
            .map_err(|e| e.context(format!("error creating firewall ruleset {}", state.name)))?;
        if created.id.is_empty() {
            return Err(Error::MissingId {
                resource: "magic firewall ruleset",
                op: "create",
            });
        }
        state.id = Some(created.id);

        self.read(state).await
    }

    pub async fn read(&self, state: &mut MagicFirewallRulesetState) -> Result<()> {
        let Some(id) = state.id.clone() else {
            return Err(Error::InvalidConfig("ruleset id is not set".to_string()));
        };

        let ruleset = match self.api.ruleset(&state.account_id, &id).await {
            Ok(ruleset) => ruleset,
            Err(e) if e.is_not_found() => {
                tracing::info!("magic firewall ruleset {id} no longer exists");
                state.id = None;
                return Ok(());
            }
            Err(e) => {
                return Err(e.context(format!("error reading magic firewall ruleset {id:?}")));
            }
        };

        state.name = ruleset.name;
        state.description = Some(ruleset.description).filter(|d| !d.is_empty());
        state.rules = declared_rules(ruleset.rules);
        Ok(())
    }

    pub async fn update(&self, state: &mut MagicFirewallRulesetState) -> Result<()> {
        let Some(id) = state.id.clone() else {
            return Err(Error::InvalidConfig("ruleset id is not set".to_string()));
        };

        let update = UpdateRuleset {
            description: state.description.clone().unwrap_or_default(),
            rules: wire_rules(&state.rules),
        };
        self.api
            .update_ruleset(&state.account_id, &id, &update)
            .await
            .map_err(|e| {
                e.context(format!("error updating magic firewall ruleset with id {id:?}"))
            })?;

        self.read(state).await
    }

    pub async fn delete(&self, state: &mut MagicFirewallRulesetState) -> Result<()> {
        let Some(id) = state.id.clone() else {
            return Ok(());
        };
        tracing::info!(account_id = %state.account_id, "deleting magic firewall ruleset {id}");

        self.api
            .delete_ruleset(&state.account_id, &id)
            .await
            .map_err(|e| {
                e.context(format!("error deleting magic firewall ruleset with id {id:?}"))
            })?;
        state.id = None;
        Ok(())
    }

    pub async fn import(&self, external_id: &str) -> Result<MagicFirewallRulesetState> {
        let [account_id, ruleset_id] = split_import_id(external_id, IMPORT_FORMAT)?;

        let mut state = MagicFirewallRulesetState {
            id: Some(ruleset_id),
            account_id,
            ..Default::default()
        };
        self.read(&mut state).await?;
        Ok(state)
    }
}
