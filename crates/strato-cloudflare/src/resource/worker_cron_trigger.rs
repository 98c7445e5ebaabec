//! Worker cron triggers
//!
//! The schedules attached to a worker script. The remote endpoint is a
//! single PUT that replaces the whole set, so create and update share one
//! code path; delete PUTs an empty set. The API issues no identifier of its
//! own, the identity is a checksum of the script name.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::client::Client;
use crate::error::Result;
use strato_reconcile::{checksum_id, split_import_id};

const IMPORT_FORMAT: &str = "accountID/scriptName";

/// Error code for "the worker script does not exist".
const CODE_SCRIPT_NOT_FOUND: i32 = 10007;

/// Declared and computed attributes for one script's triggers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerCronTriggerState {
    /// Derived identity (checksum of the script name).
    pub id: Option<String>,
    pub account_id: String,
    pub script_name: String,
    /// Cron expressions (unordered).
    pub schedules: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CronTrigger {
    pub cron: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CronTriggerSchedules {
    #[serde(default)]
    pub schedules: Vec<CronTrigger>,
}

#[async_trait]
pub trait WorkerCronTriggerApi: Send + Sync {
    async fn cron_triggers(&self, account_id: &str, script_name: &str) -> Result<Vec<CronTrigger>>;
    async fn replace_cron_triggers(
        &self,
        account_id: &str,
        script_name: &str,
        triggers: &[CronTrigger],
    ) -> Result<()>;
}

#[async_trait]
impl WorkerCronTriggerApi for Client {
    async fn cron_triggers(&self, account_id: &str, script_name: &str) -> Result<Vec<CronTrigger>> {
        let result: CronTriggerSchedules = self
            .get(&format!(
                "/accounts/{account_id}/workers/scripts/{script_name}/schedules"
            ))
            .await?;
        Ok(result.schedules)
    }

    async fn replace_cron_triggers(
        &self,
        account_id: &str,
        script_name: &str,
        triggers: &[CronTrigger],
    ) -> Result<()> {
        let _: CronTriggerSchedules = self
            .put(
                &format!("/accounts/{account_id}/workers/scripts/{script_name}/schedules"),
                &triggers,
            )
            .await?;
        Ok(())
    }
}

/// Reconciles the declared schedules of one worker script.
pub struct WorkerCronTriggerReconciler<A> {
    api: A,
}

impl<A: WorkerCronTriggerApi> WorkerCronTriggerReconciler<A> {
    pub fn new(api: A) -> Self {
        Self { api }
    }

    /// Create and update are the same full replacement.
    pub async fn create(&self, state: &mut WorkerCronTriggerState) -> Result<()> {
        self.update(state).await
    }

    pub async fn read(&self, state: &mut WorkerCronTriggerState) -> Result<()> {
        let triggers = match self
            .api
            .cron_triggers(&state.account_id, &state.script_name)
            .await
        {
            Ok(triggers) => triggers,
            // Removing the script removes its triggers with it.
            Err(e) if e.is_not_found() || e.has_code(CODE_SCRIPT_NOT_FOUND) => {
                tracing::info!("worker script {} no longer exists", state.script_name);
                state.id = None;
                return Ok(());
            }
            Err(e) => return Err(e.context("failed to read worker cron triggers")),
        };

        state.schedules = triggers.into_iter().map(|t| t.cron).collect();
        Ok(())
    }

    pub async fn update(&self, state: &mut WorkerCronTriggerState) -> Result<()> {
        let triggers: Vec<CronTrigger> = state
            .schedules
            .iter()
            .map(|cron| CronTrigger { cron: cron.clone() })
            .collect();

        self.api
            .replace_cron_triggers(&state.account_id, &state.script_name, &triggers)
            .await
            .map_err(|e| e.context("failed to update worker cron triggers"))?;

        state.id = Some(checksum_id(&state.script_name));
        self.read(state).await
    }

    pub async fn delete(&self, state: &mut WorkerCronTriggerState) -> Result<()> {
        self.api
            .replace_cron_triggers(&state.account_id, &state.script_name, &[])
            .await
            .map_err(|e| e.context("failed to remove worker cron triggers"))?;
        state.id = None;
        Ok(())
    }

    pub async fn import(&self, external_id: &str) -> Result<WorkerCronTriggerState> {
        let [account_id, script_name] = split_import_id(external_id, IMPORT_FORMAT)?;

        let mut state = WorkerCronTriggerState {
            id: Some(checksum_id(&script_name)),
            account_id,
            script_name,
            schedules: Vec::new(),
        };
        self.read(&mut state).await?;
        Ok(state)
    }
}
