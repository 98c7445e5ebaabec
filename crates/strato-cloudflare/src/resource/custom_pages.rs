//! Custom error pages
//!
//! Custom pages exist for every account and zone whether configured or not,
//! so the remote API has no create or delete: both are updates that set the
//! page state to `"customized"` or back to `"default"`. Identity is derived
//! from the scope and page type since the API issues no identifier of its
//! own; a page read back in the `"default"` state is treated as absent.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::client::Client;
use crate::error::Result;
use strato_reconcile::{Scope, checksum_id, split_import_id};

const IMPORT_FORMAT: &str = "account|zone/ID/pageType";

/// Declared and computed attributes for one custom page configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomPagesState {
    /// Derived identity (checksum of scope and page type).
    pub id: Option<String>,
    /// Account or zone the page belongs to.
    pub scope: Scope,
    /// Page type, e.g. `"basic_challenge"`, `"waf_block"`, `"ratelimit_block"`.
    pub page_type: String,
    /// URL of the replacement page; `None` means rely on the default.
    pub url: Option<String>,
    /// Server-computed state, `"customized"` or `"default"`.
    pub page_state: Option<String>,
}

/// Wire representation of a custom page.
#[derive(Debug, Clone, Deserialize)]
pub struct CustomPage {
    /// The page type doubles as the remote identifier.
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
    pub state: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CustomPageParameters {
    pub url: Option<String>,
    pub state: String,
}

#[async_trait]
pub trait CustomPagesApi: Send + Sync {
    async fn custom_page(&self, scope: &Scope, page_type: &str) -> Result<CustomPage>;
    async fn update_custom_page(
        &self,
        scope: &Scope,
        page_type: &str,
        params: &CustomPageParameters,
    ) -> Result<CustomPage>;
}

fn base_path(scope: &Scope) -> String {
    match scope {
        Scope::Account(id) => format!("/accounts/{id}/custom_pages"),
        Scope::Zone(id) => format!("/zones/{id}/custom_pages"),
    }
}

#[async_trait]
impl CustomPagesApi for Client {
    async fn custom_page(&self, scope: &Scope, page_type: &str) -> Result<CustomPage> {
        self.get(&format!("{}/{page_type}", base_path(scope))).await
    }

    async fn update_custom_page(
        &self,
        scope: &Scope,
        page_type: &str,
        params: &CustomPageParameters,
    ) -> Result<CustomPage> {
        self.put(&format!("{}/{page_type}", base_path(scope)), params)
            .await
    }
}

/// Reconciles declared custom page state against the remote scope.
pub struct CustomPagesReconciler<A> {
    api: A,
}

impl<A: CustomPagesApi> CustomPagesReconciler<A> {
    pub fn new(api: A) -> Self {
        Self { api }
    }

    /// Create and update are the same remote operation: set the page to
    /// `"customized"` with the declared URL.
    pub async fn create(&self, state: &mut CustomPagesState) -> Result<()> {
        self.update(state).await
    }

    pub async fn read(&self, state: &mut CustomPagesState) -> Result<()> {
        let page = self
            .api
            .custom_page(&state.scope, &state.page_type)
            .await
            .map_err(|e| {
                e.context(format!(
                    "error reading {:?} custom page for {}",
                    state.page_type, state.scope
                ))
            })?;

        // A page in the "default" state needs no managed identity anymore;
        // it is relying on the stock pages.
        if page.state == "default" {
            tracing::info!(
                "removing custom page configuration for {:?} as it is in the default state",
                state.page_type
            );
            state.id = None;
            return Ok(());
        }

        state.id = Some(derived_id(&state.scope, &page.id));
        state.page_type = page.id;
        state.url = page.url;
        state.page_state = Some(page.state);
        Ok(())
    }

    pub async fn update(&self, state: &mut CustomPagesState) -> Result<()> {
        let params = CustomPageParameters {
            url: state.url.clone(),
            state: "customized".to_string(),
        };
        self.api
            .update_custom_page(&state.scope, &state.page_type, &params)
            .await
            .map_err(|e| e.context(format!("failed to update {:?} custom page", state.page_type)))?;

        self.read(state).await
    }

    /// Deletion reverts the page to the stock default; the configuration
    /// slot itself cannot be removed.
    pub async fn delete(&self, state: &mut CustomPagesState) -> Result<()> {
        let params = CustomPageParameters {
            url: None,
            state: "default".to_string(),
        };
        self.api
            .update_custom_page(&state.scope, &state.page_type, &params)
            .await
            .map_err(|e| e.context(format!("failed to update {:?} custom page", state.page_type)))?;

        self.read(state).await
    }

    pub async fn import(&self, external_id: &str) -> Result<CustomPagesState> {
        let [scope_kind, scope_id, page_type] = split_import_id(external_id, IMPORT_FORMAT)?;

        let scope = match scope_kind.as_str() {
            "account" => Scope::Account(scope_id),
            _ => Scope::Zone(scope_id),
        };

        let mut state = CustomPagesState {
            id: Some(derived_id(&scope, &page_type)),
            scope,
            page_type,
            url: None,
            page_state: None,
        };
        self.read(&mut state).await?;
        Ok(state)
    }
}

fn derived_id(scope: &Scope, page_type: &str) -> String {
    checksum_id(&format!("{}/{}", scope.id(), page_type))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Every page type exists remotely, initially in the default state.
    #[derive(Default)]
    struct FakePages {
        pages: Mutex<HashMap<String, CustomPage>>,
    }

    #[async_trait]
    impl CustomPagesApi for FakePages {
        async fn custom_page(&self, _scope: &Scope, page_type: &str) -> Result<CustomPage> {
            Ok(self
                .pages
                .lock()
                .unwrap()
                .get(page_type)
                .cloned()
                .unwrap_or(CustomPage {
                    id: page_type.to_string(),
                    url: None,
                    state: "default".to_string(),
                }))
        }

        async fn update_custom_page(
            &self,
            _scope: &Scope,
            page_type: &str,
            params: &CustomPageParameters,
        ) -> Result<CustomPage> {
            let page = CustomPage {
                id: page_type.to_string(),
                url: params.url.clone(),
                state: params.state.clone(),
            };
            self.pages
                .lock()
                .unwrap()
                .insert(page_type.to_string(), page.clone());
            Ok(page)
        }
    }

    fn declared() -> CustomPagesState {
        CustomPagesState {
            id: None,
            scope: Scope::Zone("zone1".to_string()),
            page_type: "waf_block".to_string(),
            url: Some("https://example.com/blocked.html".to_string()),
            page_state: None,
        }
    }

    #[tokio::test]
    async fn create_customizes_and_derives_identity() {
        let reconciler = CustomPagesReconciler::new(FakePages::default());
        let mut state = declared();

        reconciler.create(&mut state).await.unwrap();

        assert_eq!(
            state.id.as_deref(),
            Some(checksum_id("zone1/waf_block").as_str())
        );
        assert_eq!(state.page_state.as_deref(), Some("customized"));
        assert_eq!(state.url.as_deref(), Some("https://example.com/blocked.html"));
    }

    #[tokio::test]
    async fn default_state_reads_as_absent() {
        let reconciler = CustomPagesReconciler::new(FakePages::default());
        let mut state = declared();
        state.id = Some("stale".to_string());

        reconciler.read(&mut state).await.unwrap();
        assert_eq!(state.id, None);
    }

    #[tokio::test]
    async fn delete_reverts_to_default_and_clears_identity() {
        let reconciler = CustomPagesReconciler::new(FakePages::default());
        let mut state = declared();
        reconciler.create(&mut state).await.unwrap();

        reconciler.delete(&mut state).await.unwrap();
        assert_eq!(state.id, None);
    }

    #[tokio::test]
    async fn import_parses_scope_kind_and_page_type() {
        let api = FakePages::default();
        api.pages.lock().unwrap().insert(
            "ratelimit_block".to_string(),
            CustomPage {
                id: "ratelimit_block".to_string(),
                url: Some("https://example.com/limit.html".to_string()),
                state: "customized".to_string(),
            },
        );
        let reconciler = CustomPagesReconciler::new(api);

        let state = reconciler.import("account/acc1/ratelimit_block").await.unwrap();
        assert_eq!(state.scope, Scope::Account("acc1".to_string()));
        assert_eq!(state.page_type, "ratelimit_block");
        assert_eq!(
            state.id.as_deref(),
            Some(checksum_id("acc1/ratelimit_block").as_str())
        );

        assert!(reconciler.import("acc1/ratelimit_block").await.is_err());
    }
}
