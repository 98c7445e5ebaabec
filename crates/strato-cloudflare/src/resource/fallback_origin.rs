//! Custom hostname fallback origin
//!
//! A zone-level singleton naming the origin served for custom hostnames
//! without a dedicated one. The remote side deploys the setting
//! asynchronously and rejects modification while a previous change is still
//! pending (error code 1414), so create and update both run inside a bounded
//! polling loop. The API issues no identifier; identity is derived from the
//! zone id.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::client::Client;
use crate::error::{Error, Result};
use strato_reconcile::{Poll, PollPolicy, checksum_id, poll_until, split_import_id};

const IMPORT_FORMAT: &str = "zoneID/origin";

/// Error code for "custom hostname resource is not ready for modification".
const CODE_STILL_PENDING: i32 = 1414;

/// Declared and computed attributes for the fallback origin.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FallbackOriginState {
    /// Derived identity (checksum of the zone id).
    pub id: Option<String>,
    pub zone_id: String,
    pub origin: String,
    /// Server-computed deployment status.
    pub status: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FallbackOrigin {
    pub origin: String,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FallbackOriginUpdate {
    pub origin: String,
}

#[async_trait]
pub trait FallbackOriginApi: Send + Sync {
    async fn fallback_origin(&self, zone_id: &str) -> Result<FallbackOrigin>;
    async fn update_fallback_origin(
        &self,
        zone_id: &str,
        update: &FallbackOriginUpdate,
    ) -> Result<FallbackOrigin>;
    async fn delete_fallback_origin(&self, zone_id: &str) -> Result<()>;
}

#[async_trait]
impl FallbackOriginApi for Client {
    async fn fallback_origin(&self, zone_id: &str) -> Result<FallbackOrigin> {
        self.get(&format!("/zones/{zone_id}/custom_hostnames/fallback_origin"))
            .await
    }

    async fn update_fallback_origin(
        &self,
        zone_id: &str,
        update: &FallbackOriginUpdate,
    ) -> Result<FallbackOrigin> {
        self.put(
            &format!("/zones/{zone_id}/custom_hostnames/fallback_origin"),
            update,
        )
        .await
    }

    async fn delete_fallback_origin(&self, zone_id: &str) -> Result<()> {
        self.delete(&format!("/zones/{zone_id}/custom_hostnames/fallback_origin"))
            .await
    }
}

/// Reconciles the zone's custom hostname fallback origin.
pub struct FallbackOriginReconciler<A> {
    api: A,
    policy: PollPolicy,
}

impl<A: FallbackOriginApi> FallbackOriginReconciler<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            policy: PollPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub async fn create(&self, state: &mut FallbackOriginState) -> Result<()> {
        let update = FallbackOriginUpdate {
            origin: state.origin.clone(),
        };
        let zone_id = state.zone_id.clone();

        poll_until(&self.policy, || {
            let update = update.clone();
            let zone_id = zone_id.clone();
            async move {
                match self.api.update_fallback_origin(&zone_id, &update).await {
                    Ok(_) => {}
                    Err(e) if e.has_code(CODE_STILL_PENDING) => {
                        return Ok(Poll::Pending(
                            "fallback origin is still pending a previous change".to_string(),
                        ));
                    }
                    Err(e) => {
                        return Err(e.context("failed to create custom hostname fallback origin"));
                    }
                }

                let deployed = self
                    .api
                    .fallback_origin(&zone_id)
                    .await
                    .map_err(|e| e.context("failed to fetch custom hostname fallback origin"))?;

                // Deleting and immediately re-adding a fallback origin is
                // eventually consistent; the status may still move to active
                // within the retry window.
                if deployed.status != "pending_deployment" && deployed.status != "active" {
                    return Ok(Poll::Pending(format!(
                        "expected fallback origin to be created but was {}",
                        deployed.status
                    )));
                }
                Ok(Poll::Ready(()))
            }
        })
        .await
        .map_err(|e| Error::from_poll("fallback origin", e))?;

        state.id = Some(derived_id(&state.zone_id));
        self.read(state).await
    }

    pub async fn read(&self, state: &mut FallbackOriginState) -> Result<()> {
        let fallback = match self.api.fallback_origin(&state.zone_id).await {
            Ok(fallback) => fallback,
            Err(e) if e.is_not_found() => {
                tracing::info!(
                    "fallback origin for zone {} no longer exists",
                    state.zone_id
                );
                state.id = None;
                return Ok(());
            }
            Err(e) => {
                return Err(e.context(format!(
                    "error reading custom hostname fallback origin {:?}",
                    state.zone_id
                )));
            }
        };

        state.origin = fallback.origin;
        state.status = Some(fallback.status);
        Ok(())
    }

    pub async fn update(&self, state: &mut FallbackOriginState) -> Result<()> {
        let update = FallbackOriginUpdate {
            origin: state.origin.clone(),
        };
        let zone_id = state.zone_id.clone();

        poll_until(&self.policy, || {
            let update = update.clone();
            let zone_id = zone_id.clone();
            async move {
                match self.api.update_fallback_origin(&zone_id, &update).await {
                    Ok(_) => Ok(Poll::Ready(())),
                    Err(e) if e.has_code(CODE_STILL_PENDING) => Ok(Poll::Pending(
                        "fallback origin is still pending a previous change".to_string(),
                    )),
                    Err(e) => Err(e.context("failed to update custom hostname fallback origin")),
                }
            }
        })
        .await
        .map_err(|e| Error::from_poll("fallback origin", e))?;

        self.read(state).await
    }

    pub async fn delete(&self, state: &mut FallbackOriginState) -> Result<()> {
        tracing::info!("deleting fallback origin for zone {}", state.zone_id);

        self.api
            .delete_fallback_origin(&state.zone_id)
            .await
            .map_err(|e| e.context("failed to delete custom hostname fallback origin"))?;
        state.id = None;
        Ok(())
    }

    pub async fn import(&self, external_id: &str) -> Result<FallbackOriginState> {
        let [zone_id, origin] = split_import_id(external_id, IMPORT_FORMAT)?;
        tracing::debug!("importing fallback origin {origin} for zone {zone_id}");

        let mut state = FallbackOriginState {
            id: Some(derived_id(&zone_id)),
            zone_id,
            origin,
            status: None,
        };
        self.read(&mut state).await?;
        Ok(state)
    }
}

fn derived_id(zone_id: &str) -> String {
    checksum_id(&format!("{zone_id}/custom_hostnames_fallback_origin"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use std::sync::Mutex;
    use std::time::Duration;

    struct FakeFallback {
        /// Number of update calls rejected with 1414 before accepting.
        reject_first: Mutex<u32>,
        update_calls: Mutex<u32>,
        origin: Mutex<Option<FallbackOrigin>>,
        /// Status reported after a successful update.
        status_after_update: String,
    }

    impl FakeFallback {
        fn accepting() -> Self {
            Self {
                reject_first: Mutex::new(0),
                update_calls: Mutex::new(0),
                origin: Mutex::new(None),
                status_after_update: "active".to_string(),
            }
        }

        fn rejecting(times: u32) -> Self {
            Self {
                reject_first: Mutex::new(times),
                ..Self::accepting()
            }
        }

        fn stuck_pending() -> Self {
            Self {
                status_after_update: "pending".to_string(),
                ..Self::accepting()
            }
        }
    }

    fn still_pending() -> Error {
        ApiError {
            status: 400,
            codes: vec![CODE_STILL_PENDING],
            message: "resource is not ready for modification".to_string(),
        }
        .into()
    }

    #[async_trait]
    impl FallbackOriginApi for FakeFallback {
        async fn fallback_origin(&self, _zone_id: &str) -> Result<FallbackOrigin> {
            self.origin.lock().unwrap().clone().ok_or_else(|| {
                ApiError {
                    status: 404,
                    codes: vec![],
                    message: "fallback origin not found".to_string(),
                }
                .into()
            })
        }

        async fn update_fallback_origin(
            &self,
            _zone_id: &str,
            update: &FallbackOriginUpdate,
        ) -> Result<FallbackOrigin> {
            *self.update_calls.lock().unwrap() += 1;
            let mut remaining = self.reject_first.lock().unwrap();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(still_pending());
            }
            let fallback = FallbackOrigin {
                origin: update.origin.clone(),
                status: self.status_after_update.clone(),
            };
            *self.origin.lock().unwrap() = Some(fallback.clone());
            Ok(fallback)
        }

        async fn delete_fallback_origin(&self, _zone_id: &str) -> Result<()> {
            *self.origin.lock().unwrap() = None;
            Ok(())
        }
    }

    fn declared() -> FallbackOriginState {
        FallbackOriginState {
            id: None,
            zone_id: "zone1".to_string(),
            origin: "fallback.example.com".to_string(),
            status: None,
        }
    }

    fn fast_policy(max_attempts: u32) -> PollPolicy {
        PollPolicy::new(Duration::from_millis(1), max_attempts)
    }

    #[tokio::test]
    async fn create_derives_identity_and_reads_back() {
        let reconciler =
            FallbackOriginReconciler::new(FakeFallback::accepting()).with_policy(fast_policy(3));
        let mut state = declared();

        reconciler.create(&mut state).await.unwrap();

        assert_eq!(state.id.as_deref(), Some(derived_id("zone1").as_str()));
        assert_eq!(state.status.as_deref(), Some("active"));
    }

    #[tokio::test]
    async fn transient_conflict_is_retried_until_accepted() {
        let reconciler =
            FallbackOriginReconciler::new(FakeFallback::rejecting(2)).with_policy(fast_policy(5));
        let mut state = declared();

        reconciler.update(&mut state).await.unwrap();
        assert_eq!(*reconciler.api.update_calls.lock().unwrap(), 3);
    }

    #[tokio::test]
    async fn stuck_pending_times_out_after_exact_attempt_budget() {
        let reconciler = FallbackOriginReconciler::new(FakeFallback::stuck_pending())
            .with_policy(fast_policy(4));
        let mut state = declared();

        let err = reconciler.create(&mut state).await.unwrap_err();
        match err {
            Error::PollTimeout { attempts, .. } => assert_eq!(attempts, 4),
            other => panic!("expected poll timeout, got {other}"),
        }
        assert_eq!(*reconciler.api.update_calls.lock().unwrap(), 4);
        assert_eq!(state.id, None);
    }

    #[tokio::test]
    async fn read_clears_identity_when_unset_remotely() {
        let reconciler = FallbackOriginReconciler::new(FakeFallback::accepting());
        let mut state = declared();
        state.id = Some(derived_id("zone1"));

        reconciler.read(&mut state).await.unwrap();
        assert_eq!(state.id, None);
    }

    #[tokio::test]
    async fn import_parses_zone_and_origin() {
        let api = FakeFallback::accepting();
        *api.origin.lock().unwrap() = Some(FallbackOrigin {
            origin: "fallback.example.com".to_string(),
            status: "active".to_string(),
        });
        let reconciler = FallbackOriginReconciler::new(api);

        let state = reconciler
            .import("zone1/fallback.example.com")
            .await
            .unwrap();
        assert_eq!(state.zone_id, "zone1");
        assert_eq!(state.origin, "fallback.example.com");
        assert_eq!(state.id.as_deref(), Some(derived_id("zone1").as_str()));

        assert!(reconciler.import("zone1").await.is_err());
    }
}
