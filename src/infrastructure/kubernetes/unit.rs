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

//! Individually-addressable workload instances backed by bare pods, used
//! where no controller abstraction fits. Pods forbid in-place mutation of
//! most fields, so ensure is delete-then-create, with a bounded wait for
//! the asynchronous deletion to complete.

use std::time::Duration;

use backon::{ConstantBuilder, Retryable};
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{DeleteParams, PostParams};
use tracing::debug;

use crate::domain::app::PodParams;
use crate::infrastructure::constants::{POD_DELETE_MAX_POLLS, POD_DELETE_POLL_SECS};
use crate::infrastructure::kubernetes::broker::KubeBroker;
use crate::infrastructure::kubernetes::resources::{naming, pod};
use crate::shared::error::{is_api_not_found, BrokerError, Result};

enum WaitError {
    StillExists,
    Fatal(BrokerError),
}

impl KubeBroker {
    /// Creates or replaces the pod backing one unit of an application.
    pub async fn ensure_unit(
        &self,
        app_name: &str,
        unit_name: &str,
        params: &PodParams,
    ) -> Result<()> {
        debug!("creating/updating unit {}", unit_name);

        naming::validate_application_name(app_name)?;
        naming::validate_unit_name(unit_name)?;

        let mut pod_spec = pod::build_pod_spec(params)?;
        self.configure_pod_files(&mut pod_spec, &params.containers, |file_set| {
            naming::unit_config_map_name(unit_name, file_set)
        })
        .await?;

        let unit_pod = Pod {
            metadata: ObjectMeta {
                name: Some(naming::unit_pod_name(unit_name)),
                namespace: Some(self.namespace.clone()),
                labels: Some(naming::unit_labels(app_name, unit_name)),
                ..Default::default()
            },
            spec: Some(pod_spec),
            ..Default::default()
        };
        self.ensure_pod(&unit_pod).await
    }

    pub async fn delete_unit(&self, unit_name: &str) -> Result<()> {
        debug!("deleting unit {}", unit_name);
        naming::validate_unit_name(unit_name)?;
        self.delete_pod(&naming::unit_pod_name(unit_name)).await
    }

    /// Replaces a pod by deleting any existing pod of the same name,
    /// waiting for the deletion to complete, then creating the new one.
    pub(crate) async fn ensure_pod(&self, desired: &Pod) -> Result<()> {
        let name = desired
            .metadata
            .name
            .clone()
            .ok_or_else(|| BrokerError::invalid_input("pod requires a name"))?;
        self.delete_pod(&name).await?;
        self.pods()
            .create(&PostParams::default(), desired)
            .await
            .map_err(|e| BrokerError::api("create", "Pod", name.as_str(), &e))?;
        Ok(())
    }

    /// Deletes a pod, tolerating a missing one, and waits until the
    /// deletion is observably complete. The wait polls on a fixed cadence
    /// with an overall budget; running out of budget is a timeout error.
    pub(crate) async fn delete_pod(&self, pod_name: &str) -> Result<()> {
        let pods = self.pods();
        match pods.delete(pod_name, &DeleteParams::foreground()).await {
            Ok(_) => debug!("deleting pod {}", pod_name),
            Err(err) if is_api_not_found(&err) => return Ok(()),
            Err(err) => return Err(BrokerError::api("delete", "Pod", pod_name, &err)),
        }

        let wait = (|| async {
            match pods.get(pod_name).await {
                Ok(_) => Err(WaitError::StillExists),
                Err(err) if is_api_not_found(&err) => Ok(()),
                Err(err) => Err(WaitError::Fatal(BrokerError::api(
                    "get", "Pod", pod_name, &err,
                ))),
            }
        })
        .retry(
            &ConstantBuilder::default()
                .with_delay(Duration::from_secs(POD_DELETE_POLL_SECS))
                .with_max_times(POD_DELETE_MAX_POLLS),
        )
        .when(|err| matches!(err, WaitError::StillExists))
        .await;

        match wait {
            Ok(()) => Ok(()),
            Err(WaitError::StillExists) => Err(BrokerError::Timeout(format!(
                "pod {} still exists after {} seconds",
                pod_name,
                POD_DELETE_POLL_SECS * POD_DELETE_MAX_POLLS as u64
            ))),
            Err(WaitError::Fatal(err)) => Err(err),
        }
    }
}
