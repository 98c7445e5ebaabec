//! Zero Trust gateway lists
//!
//! Account-scoped named lists (IPs, domains, emails, ...) whose items form
//! an unordered set. Updates split in two: base fields are replaced
//! wholesale, items are patched as an append/remove delta so entries added
//! remotely in the meantime are not clobbered.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::client::Client;
use crate::error::{Error, Result};
use strato_reconcile::{set_delta, split_import_id};

const IMPORT_FORMAT: &str = "accountID/teamsListID";

/// Declared and computed attributes for one gateway list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeamsListState {
    pub id: Option<String>,
    pub account_id: String,
    pub name: String,
    /// List kind, e.g. `"IP"`, `"DOMAIN"`, `"EMAIL"`, `"SERIAL"`, `"URL"`.
    pub kind: String,
    pub description: Option<String>,
    /// Unordered membership.
    pub items: Vec<String>,
}

/// Wire representation of a gateway list (items travel separately).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamsList {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<TeamsListItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TeamsListItem {
    pub value: String,
}

/// Append/remove patch for list items.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct PatchTeamsList {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub append: Vec<TeamsListItem>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub remove: Vec<String>,
}

#[async_trait]
pub trait TeamsListApi: Send + Sync {
    async fn create_teams_list(&self, account_id: &str, list: &TeamsList) -> Result<TeamsList>;
    async fn teams_list(&self, account_id: &str, list_id: &str) -> Result<TeamsList>;
    async fn teams_list_items(&self, account_id: &str, list_id: &str)
    -> Result<Vec<TeamsListItem>>;
    async fn update_teams_list(&self, account_id: &str, list: &TeamsList) -> Result<TeamsList>;
    async fn patch_teams_list(
        &self,
        account_id: &str,
        list_id: &str,
        patch: &PatchTeamsList,
    ) -> Result<TeamsList>;
    async fn delete_teams_list(&self, account_id: &str, list_id: &str) -> Result<()>;
}

#[async_trait]
impl TeamsListApi for Client {
    async fn create_teams_list(&self, account_id: &str, list: &TeamsList) -> Result<TeamsList> {
        self.post(&format!("/accounts/{account_id}/gateway/lists"), list)
            .await
    }

    async fn teams_list(&self, account_id: &str, list_id: &str) -> Result<TeamsList> {
        self.get(&format!("/accounts/{account_id}/gateway/lists/{list_id}"))
            .await
    }

    async fn teams_list_items(
        &self,
        account_id: &str,
        list_id: &str,
    ) -> Result<Vec<TeamsListItem>> {
        self.get(&format!(
            "/accounts/{account_id}/gateway/lists/{list_id}/items"
        ))
        .await
    }

    async fn update_teams_list(&self, account_id: &str, list: &TeamsList) -> Result<TeamsList> {
        self.put(
            &format!("/accounts/{}/gateway/lists/{}", account_id, list.id),
            list,
        )
        .await
    }

    async fn patch_teams_list(
        &self,
        account_id: &str,
        list_id: &str,
        patch: &PatchTeamsList,
    ) -> Result<TeamsList> {
        self.patch(
            &format!("/accounts/{account_id}/gateway/lists/{list_id}"),
            patch,
        )
        .await
    }

    async fn delete_teams_list(&self, account_id: &str, list_id: &str) -> Result<()> {
        self.delete(&format!("/accounts/{account_id}/gateway/lists/{list_id}"))
            .await
    }
}

/// Reconciles declared gateway list state against the remote account.
pub struct TeamsListReconciler<A> {
    api: A,
}

impl<A: TeamsListApi> TeamsListReconciler<A> {
    pub fn new(api: A) -> Self {
        Self { api }
    }

    pub async fn create(&self, state: &mut TeamsListState) -> Result<()> {
        let list = TeamsList {
            id: String::new(),
            name: state.name.clone(),
            kind: state.kind.clone(),
            description: state.description.clone(),
            items: state.items.iter().cloned().map(item).collect(),
        };
        tracing::debug!(account_id = %state.account_id, "creating teams list: {list:?}");

        let created = self.api.create_teams_list(&state.account_id, &list).await.map_err(|e| {
            e.context(format!(
                "error creating teams list for account {:?}",
                state.account_id
            ))
        })?;
        if created.id.is_empty() {
            return Err(Error::MissingId {
                resource: "teams list",
                op: "create",
            });
        }
        state.id = Some(created.id);

        self.read(state).await
    }

    pub async fn read(&self, state: &mut TeamsListState) -> Result<()> {
        let Some(id) = state.id.clone() else {
            return Err(Error::InvalidConfig("teams list id is not set".to_string()));
        };

        let list = match self.api.teams_list(&state.account_id, &id).await {
            Ok(list) => list,
            Err(e) if e.is_not_found() => {
                tracing::info!("teams list {id} no longer exists");
                state.id = None;
                return Ok(());
            }
            Err(e) => return Err(e.context(format!("error finding teams list {id:?}"))),
        };

        state.name = list.name;
        state.kind = list.kind;
        state.description = list.description;

        let items = self
            .api
            .teams_list_items(&state.account_id, &id)
            .await
            .map_err(|e| e.context(format!("error finding teams list {id:?}")))?;
        // The API returns items in reverse order, so iterate backwards for
        // the declared ordering.
        state.items = items.into_iter().rev().map(|i| i.value).collect();

        Ok(())
    }

    pub async fn update(&self, prior: &TeamsListState, state: &mut TeamsListState) -> Result<()> {
        let Some(id) = state.id.clone() else {
            return Err(Error::InvalidConfig("teams list id is not set".to_string()));
        };

        let list = TeamsList {
            id: id.clone(),
            name: state.name.clone(),
            kind: state.kind.clone(),
            description: state.description.clone(),
            items: Vec::new(),
        };
        tracing::debug!(account_id = %state.account_id, "updating teams list: {list:?}");

        let updated = self.api.update_teams_list(&state.account_id, &list).await.map_err(|e| {
            e.context(format!(
                "error updating teams list for account {:?}",
                state.account_id
            ))
        })?;
        if updated.id.is_empty() {
            return Err(Error::MissingId {
                resource: "teams list",
                op: "update",
            });
        }

        let delta = set_delta(&prior.items, &state.items);
        if !delta.is_empty() {
            let patch = PatchTeamsList {
                append: delta.append.into_iter().map(item).collect(),
                remove: delta.remove,
            };
            self.api
                .patch_teams_list(&state.account_id, &id, &patch)
                .await
                .map_err(|e| {
                    e.context(format!(
                        "error updating teams list for account {:?}",
                        state.account_id
                    ))
                })?;
        }

        self.read(state).await
    }

    pub async fn delete(&self, state: &mut TeamsListState) -> Result<()> {
        let Some(id) = state.id.clone() else {
            return Ok(());
        };
        tracing::debug!("deleting teams list {id}");

        self.api
            .delete_teams_list(&state.account_id, &id)
            .await
            .map_err(|e| {
                e.context(format!(
                    "error deleting teams list for account {:?}",
                    state.account_id
                ))
            })?;
        state.id = None;
        Ok(())
    }

    pub async fn import(&self, external_id: &str) -> Result<TeamsListState> {
        let [account_id, list_id] = split_import_id(external_id, IMPORT_FORMAT)?;
        tracing::debug!("importing teams list {list_id} for account {account_id}");

        let mut state = TeamsListState {
            id: Some(list_id),
            account_id,
            ..Default::default()
        };
        self.read(&mut state).await?;
        Ok(state)
    }
}

fn item(value: String) -> TeamsListItem {
    TeamsListItem { value }
}
