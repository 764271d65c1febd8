// Copyright 2025 Capstan Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Resolution of a logical storage request to a durable volume, in order:
//! an existing claim of the target name, a pre-labelled available volume,
//! a storage class by explicit name or label match, and finally the
//! cluster's default storage class.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use k8s_openapi::api::core::v1::{
    PersistentVolumeClaim, PersistentVolumeClaimSpec, PersistentVolumeClaimVolumeSource, Volume,
    VolumeResourceRequirements,
};
use k8s_openapi::api::storage::v1::StorageClass;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{ListParams, PostParams};
use regex::Regex;
use tracing::debug;

use crate::infrastructure::constants::{
    DEFAULT_ACCESS_MODE, DEFAULT_STORAGE_CLASS_ANNOTATION, LABEL_STORAGE,
};
use crate::infrastructure::kubernetes::broker::KubeBroker;
use crate::shared::error::{is_api_not_found, BrokerError, Result};

/// A logical volume request resolved by the provisioning chain.
#[derive(Debug, Clone, Default)]
pub struct VolumeParams {
    /// Acceptable `capstan-storage` label values, in preference order.
    pub storage_labels: Vec<String>,
    /// Explicit storage class name, if the request pins one.
    pub storage_class: Option<String>,
    pub claim_name: String,
    pub volume_name: String,
    /// Requested capacity, e.g. `10Mi`.
    pub volume_size: String,
    /// Labels attached to the created claim.
    pub labels: BTreeMap<String, String>,
    /// Defaults to single-writer (`ReadWriteOnce`).
    pub access_mode: Option<String>,
}

fn quantity_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[0-9]+(\.[0-9]+)?(m|k|Ki|M|Mi|G|Gi|T|Ti|P|Pi|E|Ei)?$").expect("valid regex")
    })
}

/// Validates a capacity string and wraps it as a `Quantity`. A malformed
/// capacity is a terminal input error.
pub(crate) fn parse_quantity(value: &str) -> Result<Quantity> {
    if !quantity_re().is_match(value) {
        return Err(BrokerError::InvalidQuantity {
            value: value.to_string(),
        });
    }
    Ok(Quantity(value.to_string()))
}

fn storage_selector(labels: &[String]) -> String {
    format!("{} in ({})", LABEL_STORAGE, labels.join(", "))
}

/// The pod volume entry referencing a claim. Named after the bound volume
/// when the claim already knows it, else after the requested volume name.
fn claim_volume(params: &VolumeParams, claim: &PersistentVolumeClaim) -> Volume {
    let bound = claim
        .spec
        .as_ref()
        .and_then(|s| s.volume_name.clone())
        .filter(|v| !v.is_empty());
    Volume {
        name: bound.unwrap_or_else(|| params.volume_name.clone()),
        persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
            claim_name: params.claim_name.clone(),
            ..Default::default()
        }),
        ..Default::default()
    }
}

impl KubeBroker {
    /// Finds or creates a durable volume for the request. Returns the pod
    /// volume entry referencing the claim. Fails with
    /// [`BrokerError::NoMatchingStorageClass`] when nothing can provision
    /// the volume; callers may treat that as "proceed without durable
    /// storage".
    pub(crate) async fn resolve_volume(&self, params: &VolumeParams) -> Result<Volume> {
        let claims = self.volume_claims();

        // A claim of the target name means this request was already
        // resolved; reuse whatever it is bound to.
        match claims.get(&params.claim_name).await {
            Ok(claim) => {
                debug!("using existing claim {} for {}", params.claim_name, params.volume_name);
                return Ok(claim_volume(params, &claim));
            }
            Err(err) if is_api_not_found(&err) => {}
            Err(err) => {
                return Err(BrokerError::api(
                    "get",
                    "PersistentVolumeClaim",
                    params.claim_name.as_str(),
                    &err,
                ))
            }
        }

        debug!("creating new persistent volume claim for {}", params.volume_name);

        // Prefer a volume the operator pre-provisioned for this broker.
        let (volume_name, class_name) = match self.find_available_volume(params).await? {
            Some((pv_name, sc_name)) => (Some(pv_name), sc_name),
            None => {
                let sc = self.find_storage_class(params).await?;
                (None, sc.metadata.name.unwrap_or_default())
            }
        };

        let access_mode = params
            .access_mode
            .clone()
            .unwrap_or_else(|| DEFAULT_ACCESS_MODE.to_string());
        let capacity = parse_quantity(&params.volume_size)?;
        let mut requests = BTreeMap::new();
        requests.insert("storage".to_string(), capacity);

        let claim = PersistentVolumeClaim {
            metadata: ObjectMeta {
                name: Some(params.claim_name.clone()),
                namespace: Some(self.namespace.clone()),
                labels: Some(params.labels.clone()),
                ..Default::default()
            },
            spec: Some(PersistentVolumeClaimSpec {
                volume_name,
                storage_class_name: Some(class_name),
                access_modes: Some(vec![access_mode]),
                resources: Some(VolumeResourceRequirements {
                    requests: Some(requests),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        };
        let created = claims
            .create(&PostParams::default(), &claim)
            .await
            .map_err(|e| {
                BrokerError::api(
                    "create",
                    "PersistentVolumeClaim",
                    params.claim_name.as_str(),
                    &e,
                )
            })?;
        debug!("created new claim {}", params.claim_name);
        Ok(claim_volume(params, &created))
    }

    /// Looks for an available persistent volume carrying any of the
    /// requested storage labels; when an explicit class was requested the
    /// volume must match it too. Returns the volume and its class.
    async fn find_available_volume(
        &self,
        params: &VolumeParams,
    ) -> Result<Option<(String, String)>> {
        let lp = ListParams::default().labels(&storage_selector(&params.storage_labels));
        let volumes = self
            .persistent_volumes()
            .list(&lp)
            .await
            .map_err(|e| BrokerError::api("list", "PersistentVolume", "", &e))?;

        for pv in volumes {
            let name = pv.metadata.name.clone().unwrap_or_default();
            let phase = pv.status.as_ref().and_then(|s| s.phase.as_deref());
            if phase != Some("Available") {
                debug!("ignoring volume {}, status is {:?}", name, phase);
                continue;
            }
            let class = pv
                .spec
                .as_ref()
                .and_then(|s| s.storage_class_name.clone())
                .unwrap_or_default();
            if let Some(wanted) = &params.storage_class {
                if &class != wanted {
                    continue;
                }
            }
            debug!("using existing volume {}", name);
            return Ok(Some((name, class)));
        }
        Ok(None)
    }

    /// Resolves the storage class for a new volume: by exact name if
    /// supplied, else by storage label, else the cluster default.
    async fn find_storage_class(&self, params: &VolumeParams) -> Result<StorageClass> {
        let classes = self.storage_classes();

        if let Some(name) = &params.storage_class {
            match classes.get(name).await {
                Ok(sc) => return Ok(sc),
                Err(err) if is_api_not_found(&err) => {}
                Err(err) => {
                    return Err(BrokerError::api("get", "StorageClass", name.as_str(), &err))
                }
            }
        }

        let lp = ListParams::default().labels(&storage_selector(&params.storage_labels));
        let matching = classes
            .list(&lp)
            .await
            .map_err(|e| BrokerError::api("list", "StorageClass", "", &e))?;
        if let Some(sc) = matching.items.into_iter().next() {
            return Ok(sc);
        }

        let all = classes
            .list(&ListParams::default())
            .await
            .map_err(|e| BrokerError::api("list", "StorageClass", "", &e))?;
        for sc in all {
            let is_default = sc
                .metadata
                .annotations
                .as_ref()
                .and_then(|a| a.get(DEFAULT_STORAGE_CLASS_ANNOTATION))
                .is_some_and(|v| v != "false");
            if is_default {
                debug!("using default storage class {:?}", sc.metadata.name);
                return Ok(sc);
            }
        }

        Err(BrokerError::NoMatchingStorageClass {
            labels: params.storage_labels.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantities_are_validated() {
        assert!(parse_quantity("10Mi").is_ok());
        assert!(parse_quantity("1.5Gi").is_ok());
        assert!(parse_quantity("500m").is_ok());
        assert!(parse_quantity("1024").is_ok());

        assert!(parse_quantity("").is_err());
        assert!(parse_quantity("ten").is_err());
        assert!(parse_quantity("10Mb").is_err());
        assert!(parse_quantity("-5Gi").is_err());
    }

    #[test]
    fn selector_lists_acceptable_labels() {
        let labels = vec!["fast".to_string(), "default".to_string()];
        assert_eq!(storage_selector(&labels), "capstan-storage in (fast, default)");
    }

    #[test]
    fn claim_volume_prefers_bound_volume_name() {
        let params = VolumeParams {
            claim_name: "data-claim".to_string(),
            volume_name: "data".to_string(),
            ..Default::default()
        };

        let unbound = PersistentVolumeClaim::default();
        assert_eq!(claim_volume(&params, &unbound).name, "data");

        let bound = PersistentVolumeClaim {
            spec: Some(PersistentVolumeClaimSpec {
                volume_name: Some("pv-0042".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let volume = claim_volume(&params, &bound);
        assert_eq!(volume.name, "pv-0042");
        assert_eq!(
            volume.persistent_volume_claim.unwrap().claim_name,
            "data-claim"
        );
    }
}
