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

//! The per-application operator pod: a singleton control pod driving the
//! application's own agent, with its own config object and an optional
//! durable volume for agent state.

use k8s_openapi::api::core::v1::VolumeMount;
use kube::api::{ListParams, PostParams};
use tracing::debug;

use crate::domain::app::OperatorConfig;
use crate::infrastructure::constants::{
    LABEL_VERSION, OPERATOR_STORAGE_CLASS, OPERATOR_STORAGE_SIZE,
};
use crate::infrastructure::kubernetes::broker::KubeBroker;
use crate::infrastructure::kubernetes::reconcile;
use crate::infrastructure::kubernetes::resources::operator_pod::OperatorPodBuilder;
use crate::infrastructure::kubernetes::resources::{config_map, naming};
use crate::infrastructure::kubernetes::storage::VolumeParams;
use crate::shared::error::{BrokerError, Result};

impl KubeBroker {
    /// Creates or updates the operator pod for an application.
    pub async fn ensure_operator(
        &self,
        app_name: &str,
        agent_path: &str,
        config: &OperatorConfig,
    ) -> Result<()> {
        debug!("creating/updating {} operator", app_name);

        naming::validate_application_name(app_name)?;

        // Operator setup may be the first operation against a fresh
        // deployment target, so the namespace is ensured lazily here.
        self.ensure_namespace().await?;

        let cm = config_map::operator_config_map(app_name, &self.namespace, config);
        reconcile::ensure(&self.config_maps(), &cm).await?;

        // Attempt to get a persistent volume for the agent state. If
        // nothing can provision one, run with ephemeral storage.
        let volume_params = VolumeParams {
            storage_labels: vec![
                format!("{}-operator-storage", app_name),
                self.namespace.clone(),
                "default".to_string(),
            ],
            storage_class: Some(OPERATOR_STORAGE_CLASS.to_string()),
            claim_name: naming::operator_volume_claim_name(app_name),
            volume_name: format!("{}-operator-volume", app_name),
            volume_size: OPERATOR_STORAGE_SIZE.to_string(),
            labels: naming::application_labels(app_name),
            access_mode: None,
        };
        let storage_volume = match self.resolve_volume(&volume_params).await {
            Ok(volume) => Some(volume),
            Err(BrokerError::NoMatchingStorageClass { .. }) => None,
            Err(err) if err.is_not_found() => None,
            Err(err) => return Err(err),
        };

        let mut operator_pod = OperatorPodBuilder::new(
            app_name,
            &self.namespace,
            agent_path,
            &config.operator_image_path,
            &config.version,
        )
        .build();
        if let Some(volume) = storage_volume {
            debug!("using persistent volume {} for {} operator", volume.name, app_name);
            if let Some(spec) = operator_pod.spec.as_mut() {
                let mount = VolumeMount {
                    name: volume.name.clone(),
                    mount_path: agent_path.to_string(),
                    ..Default::default()
                };
                spec.volumes.get_or_insert_with(Vec::new).push(volume);
                spec.containers[0]
                    .volume_mounts
                    .get_or_insert_with(Vec::new)
                    .push(mount);
            }
        }

        // An in-place image update is only safe when the running pod was
        // built for the target version; on any other outcome fall back to
        // a full delete and recreate.
        match self
            .update_pod_image(
                &naming::operator_selector(app_name),
                &config.version,
                &config.operator_image_path,
            )
            .await
        {
            Ok(()) => Ok(()),
            Err(err) => {
                debug!("cannot update operator pod in place ({}), recreating", err);
                self.ensure_pod(&operator_pod).await
            }
        }
    }

    /// Removes an application's operator: its claim, its config object,
    /// and finally the pod itself.
    pub async fn delete_operator(&self, app_name: &str) -> Result<()> {
        debug!("deleting {} operator", app_name);

        reconcile::delete_ignore_missing(
            &self.volume_claims(),
            &naming::operator_volume_claim_name(app_name),
        )
        .await?;
        reconcile::delete_ignore_missing(
            &self.config_maps(),
            &naming::operator_config_map_name(app_name),
        )
        .await?;
        self.delete_pod(&naming::operator_pod_name(app_name)).await
    }

    /// Updates the image of the pod matched by `selector`, permitted only
    /// when the pod's version label equals `version`: same version means
    /// the rest of the pod spec cannot have changed.
    async fn update_pod_image(&self, selector: &str, version: &str, image: &str) -> Result<()> {
        let pods = self.pods();
        let lp = ListParams::default().labels(selector);
        let list = pods
            .list(&lp)
            .await
            .map_err(|e| BrokerError::api("list", "Pod", selector, &e))?;
        let Some(mut running_pod) = list.items.into_iter().next() else {
            return Err(BrokerError::not_found(
                "Pod",
                selector,
                self.namespace.as_str(),
            ));
        };

        let name = running_pod.metadata.name.clone().unwrap_or_default();
        let running_version = running_pod
            .metadata
            .labels
            .as_ref()
            .and_then(|labels| labels.get(LABEL_VERSION))
            .cloned()
            .unwrap_or_default();
        if running_version != version {
            return Err(BrokerError::VersionMismatch {
                name,
                running: running_version,
                target: version.to_string(),
            });
        }

        if let Some(spec) = running_pod.spec.as_mut() {
            spec.containers[0].image = Some(image.to_string());
        }
        pods.replace(&name, &PostParams::default(), &running_pod)
            .await
            .map_err(|e| BrokerError::api("update", "Pod", name.as_str(), &e))?;
        Ok(())
    }
}
