//! Load balancer origin pools
//!
//! User-level pools of origin servers that load balancers steer traffic to.
//! The wire shape is shared between create and update; the reconciler
//! rebuilds it from declared state on every write instead of diffing
//! individual fields. Pools live under the user, not a zone or account, so
//! the import identifier is the bare pool id.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::client::Client;
use crate::error::{Error, Result};
use strato_reconcile::split_import_id;

const IMPORT_FORMAT: &str = "poolID";

/// Declared and computed attributes for one origin pool.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadBalancerPoolState {
    pub id: Option<String>,
    pub name: String,
    pub origins: Vec<PoolOrigin>,
    pub enabled: bool,
    pub minimum_origins: u32,
    pub latitude: Option<f32>,
    pub longitude: Option<f32>,
    pub check_regions: Vec<String>,
    pub description: Option<String>,
    pub monitor: Option<String>,
    pub load_shedding: Option<LoadShedding>,
    pub origin_steering: Option<OriginSteering>,
    pub notification_email: Option<String>,
    // Server-computed timestamps.
    pub created_on: Option<DateTime<Utc>>,
    pub modified_on: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PoolOrigin {
    pub name: String,
    pub address: String,
    pub enabled: bool,
    pub weight: f64,
    /// Host header overrides, keyed by header name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub header: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LoadShedding {
    pub default_percent: f32,
    pub default_policy: String,
    pub session_percent: f32,
    pub session_policy: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct OriginSteering {
    pub policy: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadBalancerPool {
    #[serde(default, skip_serializing)]
    pub id: String,
    pub name: String,
    pub origins: Vec<PoolOrigin>,
    pub enabled: bool,
    pub minimum_origins: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub check_regions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monitor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_shedding: Option<LoadShedding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_steering: Option<OriginSteering>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_email: Option<String>,
    #[serde(default, skip_serializing)]
    pub created_on: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing)]
    pub modified_on: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait LoadBalancerPoolApi: Send + Sync {
    async fn create_pool(&self, pool: &LoadBalancerPool) -> Result<LoadBalancerPool>;
    async fn pool(&self, pool_id: &str) -> Result<LoadBalancerPool>;
    async fn update_pool(&self, pool_id: &str, pool: &LoadBalancerPool) -> Result<LoadBalancerPool>;
    async fn delete_pool(&self, pool_id: &str) -> Result<()>;
}

#[async_trait]
impl LoadBalancerPoolApi for Client {
    async fn create_pool(&self, pool: &LoadBalancerPool) -> Result<LoadBalancerPool> {
        self.post("/user/load_balancers/pools", pool).await
    }

    async fn pool(&self, pool_id: &str) -> Result<LoadBalancerPool> {
        self.get(&format!("/user/load_balancers/pools/{pool_id}"))
            .await
    }

    async fn update_pool(
        &self,
        pool_id: &str,
        pool: &LoadBalancerPool,
    ) -> Result<LoadBalancerPool> {
        self.put(&format!("/user/load_balancers/pools/{pool_id}"), pool)
            .await
    }

    async fn delete_pool(&self, pool_id: &str) -> Result<()> {
        self.delete(&format!("/user/load_balancers/pools/{pool_id}"))
            .await
    }
}

fn pool_from_state(state: &LoadBalancerPoolState) -> LoadBalancerPool {
    LoadBalancerPool {
        id: state.id.clone().unwrap_or_default(),
        name: state.name.clone(),
        origins: state.origins.clone(),
        enabled: state.enabled,
        minimum_origins: state.minimum_origins,
        latitude: state.latitude,
        longitude: state.longitude,
        check_regions: state.check_regions.clone(),
        description: state.description.clone(),
        monitor: state.monitor.clone(),
        load_shedding: state.load_shedding.clone(),
        origin_steering: state.origin_steering.clone(),
        notification_email: state.notification_email.clone(),
        created_on: None,
        modified_on: None,
    }
}

// Coordinates come back with more precision than the API will accept on the
// next write.
fn round_coordinate(value: f32) -> f32 {
    (f64::from(value) * 10_000.0).round() as f32 / 10_000.0
}

/// Reconciles declared pool state against the remote user scope.
pub struct LoadBalancerPoolReconciler<A> {
    api: A,
}

impl<A: LoadBalancerPoolApi> LoadBalancerPoolReconciler<A> {
    pub fn new(api: A) -> Self {
        Self { api }
    }

    pub async fn create(&self, state: &mut LoadBalancerPoolState) -> Result<()> {
        let pool = pool_from_state(state);
        tracing::debug!("creating load balancer pool: {pool:?}");

        let created = self
            .api
            .create_pool(&pool)
            .await
            .map_err(|e| e.context("error creating load balancer pool"))?;
        if created.id.is_empty() {
            return Err(Error::MissingId {
                resource: "load balancer pool",
                op: "create",
            });
        }
        tracing::info!("new load balancer pool created with id {}", created.id);
        state.id = Some(created.id);

        self.read(state).await
    }

    pub async fn read(&self, state: &mut LoadBalancerPoolState) -> Result<()> {
        let Some(id) = state.id.clone() else {
            return Err(Error::InvalidConfig(
                "load balancer pool id is not set".to_string(),
            ));
        };

        let pool = match self.api.pool(&id).await {
            Ok(pool) => pool,
            Err(e) if e.is_not_found() => {
                tracing::info!("load balancer pool {id} no longer exists");
                state.id = None;
                return Ok(());
            }
            Err(e) => {
                return Err(e.context(format!("error reading load balancer pool {id:?}")));
            }
        };

        state.name = pool.name;
        state.origins = pool.origins;
        state.enabled = pool.enabled;
        state.minimum_origins = pool.minimum_origins;
        state.latitude = pool.latitude.map(round_coordinate);
        state.longitude = pool.longitude.map(round_coordinate);
        state.check_regions = pool.check_regions;
        state.description = pool.description;
        state.monitor = pool.monitor;
        state.load_shedding = pool.load_shedding;
        state.origin_steering = pool.origin_steering;
        state.notification_email = pool.notification_email;
        state.created_on = pool.created_on;
        state.modified_on = pool.modified_on;
        Ok(())
    }

    pub async fn update(&self, state: &mut LoadBalancerPoolState) -> Result<()> {
        let Some(id) = state.id.clone() else {
            return Err(Error::InvalidConfig(
                "load balancer pool id is not set".to_string(),
            ));
        };

        let pool = pool_from_state(state);
        tracing::debug!("updating load balancer pool: {pool:?}");

        self.api
            .update_pool(&id, &pool)
            .await
            .map_err(|e| e.context("error updating load balancer pool"))?;

        self.read(state).await
    }

    pub async fn delete(&self, state: &mut LoadBalancerPoolState) -> Result<()> {
        let Some(id) = state.id.clone() else {
            return Ok(());
        };
        tracing::info!("deleting load balancer pool {id}");

        self.api
            .delete_pool(&id)
            .await
            .map_err(|e| e.context("error deleting load balancer pool"))?;
        state.id = None;
        Ok(())
    }

    /// Pass-through import: the external id is the pool id itself.
    pub async fn import(&self, external_id: &str) -> Result<LoadBalancerPoolState> {
        let [pool_id] = split_import_id(external_id, IMPORT_FORMAT)?;

        let mut state = LoadBalancerPoolState {
            id: Some(pool_id),
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

    #[derive(Default)]
    struct FakePools {
        pool: Mutex<Option<LoadBalancerPool>>,
    }

    fn not_found() -> Error {
        ApiError {
            status: 404,
            codes: vec![],
            message: "pool not found".to_string(),
        }
        .into()
    }

    #[async_trait]
    impl LoadBalancerPoolApi for FakePools {
        async fn create_pool(&self, pool: &LoadBalancerPool) -> Result<LoadBalancerPool> {
            let mut stored = pool.clone();
            stored.id = "pool1".to_string();
            stored.created_on = Some(Utc::now());
            stored.modified_on = stored.created_on;
            *self.pool.lock().unwrap() = Some(stored.clone());
            Ok(stored)
        }

        async fn pool(&self, pool_id: &str) -> Result<LoadBalancerPool> {
            match self.pool.lock().unwrap().clone() {
                Some(pool) if pool.id == pool_id => Ok(pool),
                _ => Err(not_found()),
            }
        }

        async fn update_pool(
            &self,
            pool_id: &str,
            pool: &LoadBalancerPool,
        ) -> Result<LoadBalancerPool> {
            let mut slot = self.pool.lock().unwrap();
            let existing = slot.clone().filter(|p| p.id == pool_id).ok_or_else(not_found)?;
            let mut updated = pool.clone();
            updated.id = existing.id;
            updated.created_on = existing.created_on;
            updated.modified_on = Some(Utc::now());
            *slot = Some(updated.clone());
            Ok(updated)
        }

        async fn delete_pool(&self, _pool_id: &str) -> Result<()> {
            *self.pool.lock().unwrap() = None;
            Ok(())
        }
    }

    fn declared() -> LoadBalancerPoolState {
        LoadBalancerPoolState {
            id: None,
            name: "eu-origins".to_string(),
            origins: vec![PoolOrigin {
                name: "origin-1".to_string(),
                address: "192.0.2.1".to_string(),
                enabled: true,
                weight: 1.0,
                header: BTreeMap::from([(
                    "Host".to_string(),
                    vec!["origin.example.com".to_string()],
                )]),
            }],
            enabled: true,
            minimum_origins: 1,
            latitude: Some(52.5201),
            longitude: Some(13.4049),
            check_regions: vec!["WEU".to_string()],
            description: Some("primary origins".to_string()),
            monitor: Some("mon1".to_string()),
            load_shedding: Some(LoadShedding {
                default_percent: 10.0,
                default_policy: "random".to_string(),
                session_percent: 5.0,
                session_policy: "hash".to_string(),
            }),
            origin_steering: Some(OriginSteering {
                policy: "random".to_string(),
            }),
            notification_email: Some("ops@example.com".to_string()),
            created_on: None,
            modified_on: None,
        }
    }

    #[tokio::test]
    async fn create_then_read_round_trips_nested_shapes() {
        let reconciler = LoadBalancerPoolReconciler::new(FakePools::default());
        let mut state = declared();

        reconciler.create(&mut state).await.unwrap();

        assert_eq!(state.id.as_deref(), Some("pool1"));
        assert_eq!(state.origins.len(), 1);
        assert_eq!(
            state.origins[0].header["Host"],
            vec!["origin.example.com".to_string()]
        );
        assert_eq!(
            state.load_shedding.as_ref().map(|ls| ls.default_percent),
            Some(10.0)
        );
        assert!(state.created_on.is_some());
    }

    #[tokio::test]
    async fn update_replaces_the_whole_pool() {
        let reconciler = LoadBalancerPoolReconciler::new(FakePools::default());
        let mut state = declared();
        reconciler.create(&mut state).await.unwrap();

        state.enabled = false;
        state.origins[0].weight = 0.5;
        reconciler.update(&mut state).await.unwrap();

        assert!(!state.enabled);
        assert_eq!(state.origins[0].weight, 0.5);
    }

    #[tokio::test]
    async fn read_clears_identity_when_pool_is_gone() {
        let reconciler = LoadBalancerPoolReconciler::new(FakePools::default());
        let mut state = declared();
        state.id = Some("vanished".to_string());

        reconciler.read(&mut state).await.unwrap();
        assert_eq!(state.id, None);
    }

    #[tokio::test]
    async fn coordinates_are_rounded_on_read() {
        let reconciler = LoadBalancerPoolReconciler::new(FakePools::default());
        let mut state = declared();
        state.latitude = Some(52.520_077);
        reconciler.create(&mut state).await.unwrap();

        assert_eq!(state.latitude, Some(52.5201));
    }

    #[tokio::test]
    async fn import_is_passthrough() {
        let reconciler = LoadBalancerPoolReconciler::new(FakePools::default());
        let mut seeded = declared();
        reconciler.create(&mut seeded).await.unwrap();

        let state = reconciler.import("pool1").await.unwrap();
        assert_eq!(state.id.as_deref(), Some("pool1"));
        assert_eq!(state.name, "eu-origins");

        assert!(reconciler.import("user1/pool1").await.is_err());
    }
}
