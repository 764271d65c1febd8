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

//! The "ensure" primitive shared by every resource kind: update the
//! resource if it exists, create it if it does not, and treat not-found as
//! success on delete. Server-assigned immutable fields must be read from
//! the live object and copied into the desired spec before the write.

use std::fmt::Debug;

use k8s_openapi::api::core::v1::Service;
use kube::api::{Api, DeleteParams, Patch, PatchParams, PostParams};
use kube::Resource;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::infrastructure::constants::FIELD_MANAGER;
use crate::shared::error::{is_api_not_found, BrokerError, Result};

/// Makes the cluster's resource match `desired`, creating it when absent.
pub async fn ensure<K>(api: &Api<K>, desired: &K) -> Result<K>
where
    K: Resource<DynamicType = ()> + Clone + DeserializeOwned + Serialize + Debug,
{
    let kind = K::kind(&());
    let name = desired.meta().name.clone().ok_or_else(|| {
        BrokerError::invalid_input(format!("{} resource requires a name", kind))
    })?;
    match api.get(&name).await {
        Ok(_) => {
            debug!("updating existing {} {}", kind, name);
            let patch = serde_json::to_value(desired)?;
            api.patch(
                &name,
                &PatchParams::apply(FIELD_MANAGER).force(),
                &Patch::Apply(patch),
            )
            .await
            .map_err(|e| BrokerError::api("update", kind.as_ref(), name.as_str(), &e))
        }
        Err(err) if is_api_not_found(&err) => {
            debug!("creating {} {}", kind, name);
            api.create(&PostParams::default(), desired)
                .await
                .map_err(|e| BrokerError::api("create", kind.as_ref(), name.as_str(), &e))
        }
        Err(err) => Err(BrokerError::api("get", kind.as_ref(), name.as_str(), &err)),
    }
}

/// Like [`ensure`], but preserves the cluster-assigned service addresses,
/// which are immutable once set.
pub async fn ensure_service(api: &Api<Service>, desired: &Service) -> Result<Service> {
    let mut desired = desired.clone();
    if let Some(name) = desired.metadata.name.clone() {
        if let Ok(existing) = api.get(&name).await {
            if let (Some(existing_spec), Some(spec)) = (existing.spec.as_ref(), desired.spec.as_mut())
            {
                spec.cluster_ip = existing_spec.cluster_ip.clone();
                spec.cluster_ips = existing_spec.cluster_ips.clone();
            }
        }
    }
    ensure(api, &desired).await
}

/// Issues a cascading delete; a missing resource is success, not an error.
pub async fn delete_ignore_missing<K>(api: &Api<K>, name: &str) -> Result<()>
where
    K: Resource<DynamicType = ()> + Clone + DeserializeOwned + Debug,
{
    let kind = K::kind(&());
    match api.delete(name, &DeleteParams::foreground()).await {
        Ok(_) => {
            debug!("deleted {} {}", kind, name);
            Ok(())
        }
        Err(err) if is_api_not_found(&err) => Ok(()),
        Err(err) => Err(BrokerError::api("delete", kind.as_ref(), name, &err)),
    }
}
