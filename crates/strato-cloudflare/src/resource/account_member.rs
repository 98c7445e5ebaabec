//! Account membership
//!
//! Invites a user into an account with a set of role ids. The remote
//! representation nests the email under a user object and expands roles into
//! full role records; the reconciler flattens both back into the declared
//! shape.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::client::Client;
use crate::error::{Error, Result};
use strato_reconcile::split_import_id;

const IMPORT_FORMAT: &str = "accountID/memberID";

/// Declared and computed attributes for one account member.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountMemberState {
    pub id: Option<String>,
    pub account_id: String,
    pub email_address: String,
    pub role_ids: Vec<String>,
    /// Server-computed invitation status, e.g. `"pending"` or `"accepted"`.
    pub status: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountMember {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    pub user: MemberUser,
    #[serde(default)]
    pub roles: Vec<MemberRole>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MemberUser {
    pub email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MemberRole {
    pub id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewAccountMember {
    pub email: String,
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateAccountMember {
    pub roles: Vec<String>,
}

#[async_trait]
pub trait AccountMemberApi: Send + Sync {
    async fn create_account_member(
        &self,
        account_id: &str,
        member: &NewAccountMember,
    ) -> Result<AccountMember>;
    async fn account_member(&self, account_id: &str, member_id: &str) -> Result<AccountMember>;
    async fn update_account_member(
        &self,
        account_id: &str,
        member_id: &str,
        update: &UpdateAccountMember,
    ) -> Result<AccountMember>;
    async fn delete_account_member(&self, account_id: &str, member_id: &str) -> Result<()>;
}

#[async_trait]
impl AccountMemberApi for Client {
    async fn create_account_member(
        &self,
        account_id: &str,
        member: &NewAccountMember,
    ) -> Result<AccountMember> {
        self.post(&format!("/accounts/{account_id}/members"), member)
            .await
    }

    async fn account_member(&self, account_id: &str, member_id: &str) -> Result<AccountMember> {
        self.get(&format!("/accounts/{account_id}/members/{member_id}"))
            .await
    }

    async fn update_account_member(
        &self,
        account_id: &str,
        member_id: &str,
        update: &UpdateAccountMember,
    ) -> Result<AccountMember> {
        self.put(&format!("/accounts/{account_id}/members/{member_id}"), update)
            .await
    }

    async fn delete_account_member(&self, account_id: &str, member_id: &str) -> Result<()> {
        self.delete(&format!("/accounts/{account_id}/members/{member_id}"))
            .await
    }
}

/// Reconciles declared membership state against the remote account.
pub struct AccountMemberReconciler<A> {
    api: A,
}

impl<A: AccountMemberApi> AccountMemberReconciler<A> {
    pub fn new(api: A) -> Self {
        Self { api }
    }

    pub async fn create(&self, state: &mut AccountMemberState) -> Result<()> {
        let member = NewAccountMember {
            email: state.email_address.clone(),
            roles: state.role_ids.clone(),
        };
        tracing::debug!(account_id = %state.account_id, "inviting account member: {member:?}");

        let created = self
            .api
            .create_account_member(&state.account_id, &member)
            .await
            .map_err(|e| e.context("error creating account member"))?;
        if created.id.is_empty() {
            return Err(Error::MissingId {
                resource: "account member",
                op: "create",
            });
        }
        state.id = Some(created.id);

        self.read(state).await
    }

    pub async fn read(&self, state: &mut AccountMemberState) -> Result<()> {
        let Some(id) = state.id.clone() else {
            return Err(Error::InvalidConfig(
                "account member id is not set".to_string(),
            ));
        };

        let member = match self.api.account_member(&state.account_id, &id).await {
            Ok(member) => member,
            Err(e) if e.is_not_found() => {
                tracing::warn!("account member {id} is not present in the API anymore");
                state.id = None;
                return Ok(());
            }
            Err(e) => return Err(e.context(format!("error finding account member {id:?}"))),
        };

        state.email_address = member.user.email;
        state.role_ids = member.roles.into_iter().map(|r| r.id).collect();
        state.status = member.status;
        Ok(())
    }

    pub async fn update(&self, state: &mut AccountMemberState) -> Result<()> {
        let Some(id) = state.id.clone() else {
            return Err(Error::InvalidConfig(
                "account member id is not set".to_string(),
            ));
        };

        let update = UpdateAccountMember {
            roles: state.role_ids.clone(),
        };
        self.api
            .update_account_member(&state.account_id, &id, &update)
            .await
            .map_err(|e| e.context(format!("failed to update account member {id:?}")))?;

        self.read(state).await
    }

    pub async fn delete(&self, state: &mut AccountMemberState) -> Result<()> {
        let Some(id) = state.id.clone() else {
            return Ok(());
        };
        tracing::info!("deleting account member {id}");

        self.api
            .delete_account_member(&state.account_id, &id)
            .await
            .map_err(|e| e.context(format!("error deleting account member {id:?}")))?;
        state.id = None;
        Ok(())
    }

    pub async fn import(&self, external_id: &str) -> Result<AccountMemberState> {
        let [account_id, member_id] = split_import_id(external_id, IMPORT_FORMAT)?;

        let mut state = AccountMemberState {
            id: Some(member_id),
            account_id,
            ..Default::default()
        };
        self.read(&mut state).await?;
        Ok(state)
    }
}
