//! Zone-scoped filter expressions
//!
//! Filters are the matching half of a firewall rule: an expression evaluated
//! against incoming requests, optionally paused or annotated. The create
//! endpoint is batch-oriented, so a single-resource create sends a
//! one-element array and takes the first returned entry.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::client::Client;
use crate::error::{Error, Result};
use strato_reconcile::split_import_id;

const IMPORT_FORMAT: &str = "zoneID/filterID";

/// Declared and computed attributes for one filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterState {
    /// Server-assigned identifier. `None` means no remote entity is tracked.
    pub id: Option<String>,
    pub zone_id: String,
    pub expression: String,
    pub paused: Option<bool>,
    pub description: Option<String>,
    pub ref_name: Option<String>,
}

/// Wire representation of a filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Filter {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub expression: String,
    #[serde(default)]
    pub paused: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(
        rename = "ref",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub ref_name: Option<String>,
}

#[async_trait]
pub trait FilterApi: Send + Sync {
    async fn create_filters(&self, zone_id: &str, filters: &[Filter]) -> Result<Vec<Filter>>;
    async fn filter(&self, zone_id: &str, filter_id: &str) -> Result<Filter>;
    async fn update_filter(&self, zone_id: &str, filter: &Filter) -> Result<Filter>;
    async fn delete_filter(&self, zone_id: &str, filter_id: &str) -> Result<()>;
}

#[async_trait]
impl FilterApi for Client {
    async fn create_filters(&self, zone_id: &str, filters: &[Filter]) -> Result<Vec<Filter>> {
        self.post(&format!("/zones/{zone_id}/filters"), filters)
            .await
    }

    async fn filter(&self, zone_id: &str, filter_id: &str) -> Result<Filter> {
        self.get(&format!("/zones/{zone_id}/filters/{filter_id}"))
            .await
    }

    async fn update_filter(&self, zone_id: &str, filter: &Filter) -> Result<Filter> {
        self.put(&format!("/zones/{}/filters/{}", zone_id, filter.id), filter)
            .await
    }

    async fn delete_filter(&self, zone_id: &str, filter_id: &str) -> Result<()> {
        self.delete(&format!("/zones/{zone_id}/filters/{filter_id}"))
            .await
    }
}

/// Reconciles declared filter state against the remote zone.
pub struct FilterReconciler<A> {
    api: A,
}

impl<A: FilterApi> FilterReconciler<A> {
    pub fn new(api: A) -> Self {
        Self { api }
    }

    pub async fn create(&self, state: &mut FilterState) -> Result<()> {
        let filter = request_from_state(state, None);
        tracing::debug!(zone_id = %state.zone_id, "creating filter: {filter:?}");

        let created = self
            .api
            .create_filters(&state.zone_id, std::slice::from_ref(&filter))
            .await
            .map_err(|e| e.context(format!("error creating filter for zone {:?}", state.zone_id)))?;

        let Some(first) = created.into_iter().next() else {
            return Err(Error::MissingId {
                resource: "filter",
                op: "create",
            });
        };
        if first.id.is_empty() {
            return Err(Error::MissingId {
                resource: "filter",
                op: "create",
            });
        }

        tracing::info!("created filter {}", first.id);
        state.id = Some(first.id);

        self.read(state).await
    }

    pub async fn read(&self, state: &mut FilterState) -> Result<()> {
        let Some(id) = state.id.clone() else {
            return Err(Error::InvalidConfig("filter id is not set".to_string()));
        };

        let filter = match self.api.filter(&state.zone_id, &id).await {
            Ok(filter) => filter,
            Err(e) if e.is_not_found() => {
                tracing::info!("filter {id} no longer exists");
                state.id = None;
                return Ok(());
            }
            Err(e) => return Err(e.context(format!("error finding filter {id:?}"))),
        };

        state.expression = filter.expression;
        state.paused = Some(filter.paused);
        state.description = filter.description;
        state.ref_name = filter.ref_name;
        Ok(())
    }

    pub async fn update(&self, state: &mut FilterState) -> Result<()> {
        let Some(id) = state.id.clone() else {
            return Err(Error::InvalidConfig("filter id is not set".to_string()));
        };

        let filter = request_from_state(state, Some(&id));
        tracing::debug!(zone_id = %state.zone_id, "updating filter: {filter:?}");

        let updated = self
            .api
            .update_filter(&state.zone_id, &filter)
            .await
            .map_err(|e| e.context(format!("error updating filter for zone {:?}", state.zone_id)))?;
        if updated.id.is_empty() {
            return Err(Error::MissingId {
                resource: "filter",
                op: "update",
            });
        }

        self.read(state).await
    }

    pub async fn delete(&self, state: &mut FilterState) -> Result<()> {
        let Some(id) = state.id.clone() else {
            return Ok(());
        };
        tracing::info!(zone_id = %state.zone_id, "deleting filter {id}");

        self.api
            .delete_filter(&state.zone_id, &id)
            .await
            .map_err(|e| e.context(format!("error deleting filter {id:?}")))?;
        state.id = None;
        Ok(())
    }

    pub async fn import(&self, external_id: &str) -> Result<FilterState> {
        let [zone_id, filter_id] = split_import_id(external_id, IMPORT_FORMAT)?;
        tracing::debug!("importing filter {filter_id} for zone {zone_id}");

        let mut state = FilterState {
            id: Some(filter_id),
            zone_id,
            ..Default::default()
        };
        self.read(&mut state).await?;
        Ok(state)
    }
}

fn request_from_state(state: &FilterState, id: Option<&str>) -> Filter {
    Filter {
        id: id.unwrap_or_default().to_string(),
        expression: state.expression.clone(),
        paused: state.paused.unwrap_or_default(),
        description: state.description.clone(),
        ref_name: state.ref_name.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeFilters {
        store: Mutex<HashMap<String, Filter>>,
        empty_create_response: bool,
    }

    fn not_found() -> Error {
        ApiError {
            status: 404,
            codes: vec![],
            message: "filter not found".to_string(),
        }
        .into()
    }

    #[async_trait]
    impl FilterApi for FakeFilters {
        async fn create_filters(&self, _zone_id: &str, filters: &[Filter]) -> Result<Vec<Filter>> {
            if self.empty_create_response {
                return Ok(Vec::new());
            }
            let mut store = self.store.lock().unwrap();
            let mut created = Vec::new();
            for filter in filters {
                let id = format!("f{}", store.len() + 1);
                let mut filter = filter.clone();
                filter.id = id.clone();
                store.insert(id, filter.clone());
                created.push(filter);
            }
            Ok(created)
        }

        async fn filter(&self, _zone_id: &str, filter_id: &str) -> Result<Filter> {
            self.store
                .lock()
                .unwrap()
                .get(filter_id)
                .cloned()
                .ok_or_else(not_found)
        }

        async fn update_filter(&self, _zone_id: &str, filter: &Filter) -> Result<Filter> {
            let mut store = self.store.lock().unwrap();
            if !store.contains_key(&filter.id) {
                return Err(not_found());
            }
            store.insert(filter.id.clone(), filter.clone());
            Ok(filter.clone())
        }

        async fn delete_filter(&self, _zone_id: &str, filter_id: &str) -> Result<()> {
            self.store
                .lock()
                .unwrap()
                .remove(filter_id)
                .map(|_| ())
                .ok_or_else(not_found)
        }
    }

    fn declared() -> FilterState {
        FilterState {
            id: None,
            zone_id: "023e105f4ecef8ad9ca31a8372d0c353".to_string(),
            expression: "(http.request.uri.path ~ \".*wp-login.php\")".to_string(),
            paused: Some(false),
            description: Some("Login blocker".to_string()),
            ref_name: None,
        }
    }

    #[tokio::test]
    async fn create_then_read_round_trips() {
        let reconciler = FilterReconciler::new(FakeFilters::default());
        let mut state = declared();

        reconciler.create(&mut state).await.unwrap();

        assert_eq!(state.id.as_deref(), Some("f1"));
        let expected = declared();
        assert_eq!(state.expression, expected.expression);
        assert_eq!(state.paused, expected.paused);
        assert_eq!(state.description, expected.description);
    }

    #[tokio::test]
    async fn read_clears_identity_when_remote_is_gone() {
        let reconciler = FilterReconciler::new(FakeFilters::default());
        let mut state = declared();
        state.id = Some("f404".to_string());

        reconciler.read(&mut state).await.unwrap();

        assert_eq!(state.id, None);
    }

    #[tokio::test]
    async fn empty_create_response_is_a_validation_failure() {
        let api = FakeFilters {
            empty_create_response: true,
            ..Default::default()
        };
        let reconciler = FilterReconciler::new(api);
        let mut state = declared();

        let err = reconciler.create(&mut state).await.unwrap_err();
        assert!(matches!(err, Error::MissingId { .. }));
        assert_eq!(state.id, None);
    }

    #[tokio::test]
    async fn update_pushes_changes_and_rereads() {
        let reconciler = FilterReconciler::new(FakeFilters::default());
        let mut state = declared();
        reconciler.create(&mut state).await.unwrap();

        state.paused = Some(true);
        state.description = None;
        reconciler.update(&mut state).await.unwrap();

        assert_eq!(state.paused, Some(true));
        assert_eq!(state.description, None);
    }

    #[tokio::test]
    async fn import_parses_two_segments() {
        let api = FakeFilters::default();
        api.store.lock().unwrap().insert(
            "f9".to_string(),
            Filter {
                id: "f9".to_string(),
                expression: "ip.src eq 192.0.2.1".to_string(),
                paused: true,
                description: None,
                ref_name: Some("blocked-ip".to_string()),
            },
        );
        let reconciler = FilterReconciler::new(api);

        let state = reconciler.import("zone123/f9").await.unwrap();
        assert_eq!(state.zone_id, "zone123");
        assert_eq!(state.id.as_deref(), Some("f9"));
        assert_eq!(state.expression, "ip.src eq 192.0.2.1");
        assert_eq!(state.ref_name.as_deref(), Some("blocked-ip"));
    }

    #[tokio::test]
    async fn import_rejects_wrong_segment_count() {
        let reconciler = FilterReconciler::new(FakeFilters::default());
        assert!(reconciler.import("justazone").await.is_err());
        assert!(reconciler.import("zone/extra/f9").await.is_err());
    }
}
