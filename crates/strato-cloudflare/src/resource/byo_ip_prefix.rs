//! Bring-your-own IP prefixes
//!
//! Prefixes are onboarded out of band; the operator supplies the prefix id
//! and this reconciler only manages the description and the BGP
//! advertisement toggle. Deleting a prefix is not supported remotely, so
//! delete only forgets the identity. Advertisement is declared as `"on"` or
//! `"off"` and mapped onto the boolean the BGP status endpoint speaks.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::client::Client;
use crate::error::{Error, Result};
use strato_reconcile::split_import_id;

const IMPORT_FORMAT: &str = "accountID/prefixID";

/// Declared and computed attributes for one BYOIP prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ByoIpPrefixState {
    /// Operator-supplied prefix id, also the identity.
    pub id: Option<String>,
    pub account_id: String,
    pub prefix_id: String,
    pub description: Option<String>,
    /// `"on"` or `"off"`. `None` leaves the remote toggle alone.
    pub advertisement: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IpPrefix {
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdvertisementStatus {
    pub advertised: bool,
}

#[derive(Debug, Clone, Serialize)]
struct PrefixDescriptionUpdate<'a> {
    description: &'a str,
}

#[derive(Debug, Clone, Serialize)]
struct AdvertisementUpdate {
    advertised: bool,
}

#[async_trait]
pub trait ByoIpPrefixApi: Send + Sync {
    async fn ip_prefix(&self, account_id: &str, prefix_id: &str) -> Result<IpPrefix>;
    async fn advertisement_status(
        &self,
        account_id: &str,
        prefix_id: &str,
    ) -> Result<AdvertisementStatus>;
    async fn update_prefix_description(
        &self,
        account_id: &str,
        prefix_id: &str,
        description: &str,
    ) -> Result<()>;
    async fn update_advertisement_status(
        &self,
        account_id: &str,
        prefix_id: &str,
        advertised: bool,
    ) -> Result<()>;
}

#[async_trait]
impl ByoIpPrefixApi for Client {
    async fn ip_prefix(&self, account_id: &str, prefix_id: &str) -> Result<IpPrefix> {
        self.get(&format!("/accounts/{account_id}/addressing/prefixes/{prefix_id}"))
            .await
    }

    async fn advertisement_status(
        &self,
        account_id: &str,
        prefix_id: &str,
    ) -> Result<AdvertisementStatus> {
        self.get(&format!(
            "/accounts/{account_id}/addressing/prefixes/{prefix_id}/bgp/status"
        ))
        .await
    }

    async fn update_prefix_description(
        &self,
        account_id: &str,
        prefix_id: &str,
        description: &str,
    ) -> Result<()> {
        let _: IpPrefix = self
            .patch(
                &format!("/accounts/{account_id}/addressing/prefixes/{prefix_id}"),
                &PrefixDescriptionUpdate { description },
            )
            .await?;
        Ok(())
    }

    async fn update_advertisement_status(
        &self,
        account_id: &str,
        prefix_id: &str,
        advertised: bool,
    ) -> Result<()> {
        let _: AdvertisementStatus = self
            .patch(
                &format!("/accounts/{account_id}/addressing/prefixes/{prefix_id}/bgp/status"),
                &AdvertisementUpdate { advertised },
            )
            .await?;
        Ok(())
    }
}

fn advertisement_label(advertised: bool) -> &'static str {
    if advertised { "on" } else { "off" }
}

fn advertisement_flag(label: &str) -> Result<bool> {
    match label {
        "on" => Ok(true),
        "off" => Ok(false),
        other => Err(Error::InvalidConfig(format!(
            "advertisement must be \"on\" or \"off\", got {other:?}"
        ))),
    }
}

/// Reconciles the managed attributes of a pre-onboarded prefix.
pub struct ByoIpPrefixReconciler<A> {
    api: A,
}

impl<A: ByoIpPrefixApi> ByoIpPrefixReconciler<A> {
    pub fn new(api: A) -> Self {
        Self { api }
    }

    /// Adopts the operator-supplied prefix id as the identity, then pushes
    /// the declared attributes.
    pub async fn create(&self, state: &mut ByoIpPrefixState) -> Result<()> {
        state.id = Some(state.prefix_id.clone());
        self.apply(state, None).await?;
        self.read(state).await
    }

    pub async fn read(&self, state: &mut ByoIpPrefixState) -> Result<()> {
        let Some(id) = state.id.clone() else {
            return Err(Error::InvalidConfig("prefix id is not set".to_string()));
        };

        let prefix = match self.api.ip_prefix(&state.account_id, &id).await {
            Ok(prefix) => prefix,
            Err(e) if e.is_not_found() => {
                tracing::info!("IP prefix {id} no longer exists");
                state.id = None;
                return Ok(());
            }
            Err(e) => {
                return Err(e.context(format!("error reading IP prefix information for {id:?}")));
            }
        };
        state.description = Some(prefix.description);

        let status = self
            .api
            .advertisement_status(&state.account_id, &id)
            .await
            .map_err(|e| {
                e.context(format!(
                    "error reading advertisement status of IP prefix for {id:?}"
                ))
            })?;
        state.advertisement = Some(advertisement_label(status.advertised).to_string());
        Ok(())
    }

    /// Pushes only the attributes that differ from `prior`; `prior` being
    /// `None` means every declared attribute counts as changed.
    pub async fn update(
        &self,
        state: &mut ByoIpPrefixState,
        prior: Option<&ByoIpPrefixState>,
    ) -> Result<()> {
        self.apply(state, prior).await?;
        self.read(state).await
    }

    async fn apply(
        &self,
        state: &ByoIpPrefixState,
        prior: Option<&ByoIpPrefixState>,
    ) -> Result<()> {
        let Some(id) = state.id.as_deref() else {
            return Err(Error::InvalidConfig("prefix id is not set".to_string()));
        };

        if let Some(description) = state.description.as_deref() {
            let changed = prior.is_none_or(|p| p.description.as_deref() != Some(description));
            if changed {
                self.api
                    .update_prefix_description(&state.account_id, id, description)
                    .await
                    .map_err(|e| {
                        e.context(format!("cannot update prefix description for {id:?}"))
                    })?;
            }
        }

        if let Some(advertisement) = state.advertisement.as_deref() {
            let changed = prior.is_none_or(|p| p.advertisement.as_deref() != Some(advertisement));
            if changed {
                let advertised = advertisement_flag(advertisement)?;
                self.api
                    .update_advertisement_status(&state.account_id, id, advertised)
                    .await
                    .map_err(|e| {
                        e.context(format!(
                            "cannot update prefix advertisement status for {id:?}"
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Prefix offboarding happens out of band. Deliberate no-op.
    pub async fn delete(&self, state: &mut ByoIpPrefixState) -> Result<()> {
        state.id = None;
        Ok(())
    }

    pub async fn import(&self, external_id: &str) -> Result<ByoIpPrefixState> {
        let [account_id, prefix_id] = split_import_id(external_id, IMPORT_FORMAT)?;

        let mut state = ByoIpPrefixState {
            id: Some(prefix_id.clone()),
            account_id,
            prefix_id,
            ..Default::default()
        };
        self.read(&mut state).await?;
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use std::sync::Mutex;

    struct FakePrefixes {
        description: Mutex<String>,
        advertised: Mutex<bool>,
        description_updates: Mutex<u32>,
        advertisement_updates: Mutex<u32>,
    }

    impl FakePrefixes {
        fn onboarded() -> Self {
            Self {
                description: Mutex::new("onboarded".to_string()),
                advertised: Mutex::new(false),
                description_updates: Mutex::new(0),
                advertisement_updates: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl ByoIpPrefixApi for FakePrefixes {
        async fn ip_prefix(&self, _account_id: &str, prefix_id: &str) -> Result<IpPrefix> {
            if prefix_id != "prefix1" {
                return Err(ApiError {
                    status: 404,
                    codes: vec![],
                    message: "prefix not found".to_string(),
                }
                .into());
            }
            Ok(IpPrefix {
                description: self.description.lock().unwrap().clone(),
            })
        }

        async fn advertisement_status(
            &self,
            _account_id: &str,
            _prefix_id: &str,
        ) -> Result<AdvertisementStatus> {
            Ok(AdvertisementStatus {
                advertised: *self.advertised.lock().unwrap(),
            })
        }

        async fn update_prefix_description(
            &self,
            _account_id: &str,
            _prefix_id: &str,
            description: &str,
        ) -> Result<()> {
            *self.description_updates.lock().unwrap() += 1;
            *self.description.lock().unwrap() = description.to_string();
            Ok(())
        }

        async fn update_advertisement_status(
            &self,
            _account_id: &str,
            _prefix_id: &str,
            advertised: bool,
        ) -> Result<()> {
            *self.advertisement_updates.lock().unwrap() += 1;
            *self.advertised.lock().unwrap() = advertised;
            Ok(())
        }
    }

    fn declared() -> ByoIpPrefixState {
        ByoIpPrefixState {
            id: None,
            account_id: "acc1".to_string(),
            prefix_id: "prefix1".to_string(),
            description: Some("edge announcements".to_string()),
            advertisement: Some("on".to_string()),
        }
    }

    #[tokio::test]
    async fn create_adopts_the_declared_prefix_id() {
        let reconciler = ByoIpPrefixReconciler::new(FakePrefixes::onboarded());
        let mut state = declared();

        reconciler.create(&mut state).await.unwrap();

        assert_eq!(state.id.as_deref(), Some("prefix1"));
        assert_eq!(state.description.as_deref(), Some("edge announcements"));
        assert_eq!(state.advertisement.as_deref(), Some("on"));
    }

    #[tokio::test]
    async fn update_skips_unchanged_attributes() {
        let reconciler = ByoIpPrefixReconciler::new(FakePrefixes::onboarded());
        let mut state = declared();
        reconciler.create(&mut state).await.unwrap();

        let prior = state.clone();
        state.description = Some("renumbered".to_string());
        reconciler.update(&mut state, Some(&prior)).await.unwrap();

        assert_eq!(*reconciler.api.description_updates.lock().unwrap(), 2);
        assert_eq!(*reconciler.api.advertisement_updates.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn invalid_advertisement_label_is_rejected() {
        let reconciler = ByoIpPrefixReconciler::new(FakePrefixes::onboarded());
        let mut state = declared();
        state.advertisement = Some("maybe".to_string());

        let err = reconciler.create(&mut state).await.unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn delete_only_forgets_the_identity() {
        let reconciler = ByoIpPrefixReconciler::new(FakePrefixes::onboarded());
        let mut state = declared();
        reconciler.create(&mut state).await.unwrap();

        reconciler.delete(&mut state).await.unwrap();
        assert_eq!(state.id, None);
    }

    #[tokio::test]
    async fn read_clears_identity_when_prefix_is_gone() {
        let reconciler = ByoIpPrefixReconciler::new(FakePrefixes::onboarded());
        let mut state = declared();
        state.id = Some("withdrawn".to_string());

        reconciler.read(&mut state).await.unwrap();
        assert_eq!(state.id, None);
    }

    #[tokio::test]
    async fn import_parses_account_and_prefix() {
        let reconciler = ByoIpPrefixReconciler::new(FakePrefixes::onboarded());

        let state = reconciler.import("acc1/prefix1").await.unwrap();
        assert_eq!(state.account_id, "acc1");
        assert_eq!(state.prefix_id, "prefix1");
        assert_eq!(state.advertisement.as_deref(), Some("off"));

        assert!(reconciler.import("prefix1").await.is_err());
    }
}
