//! SSL certificate packs
//!
//! Orders a certificate pack covering a set of hosts. Packs are immutable
//! once ordered: there is no update operation, changing any attribute means
//! replacing the pack. Advanced packs take extra ordering parameters and a
//! dedicated endpoint; everything else goes through the plain order path.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::client::Client;
use crate::error::{Error, Result};
use strato_reconcile::split_import_id;

const IMPORT_FORMAT: &str = "zoneID/certificatePackID";

/// Declared and computed attributes for one certificate pack.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CertificatePackState {
    pub id: Option<String>,
    pub zone_id: String,
    /// Pack type, `"advanced"` or a legacy dedicated type.
    pub pack_type: String,
    /// Hostnames the pack covers (unordered).
    pub hosts: Vec<String>,
    // Advanced ordering parameters; ignored for other pack types.
    pub validation_method: Option<String>,
    pub validity_days: Option<u32>,
    pub certificate_authority: Option<String>,
    pub cloudflare_branding: Option<bool>,
    // Server-computed validation results.
    pub validation_errors: Vec<String>,
    pub validation_records: Vec<ValidationRecord>,
}

/// DNS/HTTP ownership validation material echoed back by the API.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct ValidationRecord {
    #[serde(default)]
    pub cname_name: Option<String>,
    #[serde(default)]
    pub cname_target: Option<String>,
    #[serde(default)]
    pub txt_name: Option<String>,
    #[serde(default)]
    pub txt_value: Option<String>,
    #[serde(default)]
    pub http_url: Option<String>,
    #[serde(default)]
    pub http_body: Option<String>,
    #[serde(default)]
    pub emails: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CertificatePack {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub pack_type: String,
    #[serde(default)]
    pub hosts: Vec<String>,
    #[serde(default)]
    pub validation_errors: Vec<ValidationError>,
    #[serde(default)]
    pub validation_records: Vec<ValidationRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ValidationError {
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CertificatePackOrder {
    #[serde(rename = "type")]
    pub pack_type: String,
    pub hosts: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdvancedCertificatePackOrder {
    #[serde(rename = "type")]
    pub pack_type: String,
    pub hosts: Vec<String>,
    pub validation_method: String,
    pub validity_days: u32,
    pub certificate_authority: String,
    pub cloudflare_branding: bool,
}

#[async_trait]
pub trait CertificatePackApi: Send + Sync {
    async fn order_certificate_pack(
        &self,
        zone_id: &str,
        order: &CertificatePackOrder,
    ) -> Result<CertificatePack>;
    async fn order_advanced_certificate_pack(
        &self,
        zone_id: &str,
        order: &AdvancedCertificatePackOrder,
    ) -> Result<CertificatePack>;
    async fn certificate_pack(&self, zone_id: &str, pack_id: &str) -> Result<CertificatePack>;
    async fn delete_certificate_pack(&self, zone_id: &str, pack_id: &str) -> Result<()>;
}

#[async_trait]
impl CertificatePackApi for Client {
    async fn order_certificate_pack(
        &self,
        zone_id: &str,
        order: &CertificatePackOrder,
    ) -> Result<CertificatePack> {
        self.post(&format!("/zones/{zone_id}/ssl/certificate_packs/order"), order)
            .await
    }

    async fn order_advanced_certificate_pack(
        &self,
        zone_id: &str,
        order: &AdvancedCertificatePackOrder,
    ) -> Result<CertificatePack> {
        self.post(&format!("/zones/{zone_id}/ssl/certificate_packs/order"), order)
            .await
    }

    async fn certificate_pack(&self, zone_id: &str, pack_id: &str) -> Result<CertificatePack> {
        self.get(&format!("/zones/{zone_id}/ssl/certificate_packs/{pack_id}"))
            .await
    }

    async fn delete_certificate_pack(&self, zone_id: &str, pack_id: &str) -> Result<()> {
        self.delete(&format!("/zones/{zone_id}/ssl/certificate_packs/{pack_id}"))
            .await
    }
}

/// Reconciles declared certificate pack state against the remote zone.
pub struct CertificatePackReconciler<A> {
    api: A,
}

impl<A: CertificatePackApi> CertificatePackReconciler<A> {
    pub fn new(api: A) -> Self {
        Self { api }
    }

    pub async fn create(&self, state: &mut CertificatePackState) -> Result<()> {
        let ordered = if state.pack_type == "advanced" {
            let order = AdvancedCertificatePackOrder {
                pack_type: "advanced".to_string(),
                hosts: state.hosts.clone(),
                validation_method: state.validation_method.clone().unwrap_or_default(),
                validity_days: state.validity_days.unwrap_or_default(),
                certificate_authority: state.certificate_authority.clone().unwrap_or_default(),
                cloudflare_branding: state.cloudflare_branding.unwrap_or_default(),
            };
            self.api
                .order_advanced_certificate_pack(&state.zone_id, &order)
                .await
        } else {
            let order = CertificatePackOrder {
                pack_type: state.pack_type.clone(),
                hosts: state.hosts.clone(),
            };
            self.api.order_certificate_pack(&state.zone_id, &order).await
        };

        let pack = ordered.map_err(|e| e.context("failed to create certificate pack"))?;
        if pack.id.is_empty() {
            return Err(Error::MissingId {
                resource: "certificate pack",
                op: "create",
            });
        }
        state.id = Some(pack.id);

        self.read(state).await
    }

    pub async fn read(&self, state: &mut CertificatePackState) -> Result<()> {
        let Some(id) = state.id.clone() else {
            return Err(Error::InvalidConfig(
                "certificate pack id is not set".to_string(),
            ));
        };

        let pack = match self.api.certificate_pack(&state.zone_id, &id).await {
            Ok(pack) => pack,
            Err(e) if e.is_not_found() => {
                tracing::info!("certificate pack {id} no longer exists");
                state.id = None;
                return Ok(());
            }
            Err(e) => return Err(e.context("failed to fetch certificate pack")),
        };

        state.pack_type = pack.pack_type;
        state.hosts = pack.hosts;
        state.validation_errors = pack.validation_errors.into_iter().map(|e| e.message).collect();
        state.validation_records = pack.validation_records;
        Ok(())
    }

    pub async fn delete(&self, state: &mut CertificatePackState) -> Result<()> {
        let Some(id) = state.id.clone() else {
            return Ok(());
        };
        tracing::info!(zone_id = %state.zone_id, "deleting certificate pack {id}");

        self.api
            .delete_certificate_pack(&state.zone_id, &id)
            .await
            .map_err(|e| e.context("failed to delete certificate pack"))?;
        state.id = None;
        Ok(())
    }

    pub async fn import(&self, external_id: &str) -> Result<CertificatePackState> {
        let [zone_id, pack_id] = split_import_id(external_id, IMPORT_FORMAT)?;
        tracing::debug!("importing certificate pack {pack_id} for zone {zone_id}");

        let mut state = CertificatePackState {
            id: Some(pack_id),
            zone_id,
            ..Default::default()
        };
        self.read(&mut state).await?;
        Ok(state)
    }
}
