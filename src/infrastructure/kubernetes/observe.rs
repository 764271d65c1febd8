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

//! Read-only projection of cluster-reported instance state into the
//! domain's status vocabulary, plus the change-notification stream for the
//! workload instances of one application.

use std::time::SystemTime;

use futures::StreamExt;
use kube::api::{ListParams, WatchEvent, WatchParams};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::domain::app::{ChangeKind, UnitChange, UnitInfo, UnitStatus, WorkloadStatus};
use crate::infrastructure::constants::LABEL_UNIT;
use crate::infrastructure::kubernetes::broker::KubeBroker;
use crate::infrastructure::kubernetes::resources::naming;
use crate::shared::error::{BrokerError, Result};

const WATCH_CHANNEL_CAPACITY: usize = 32;

/// Change-notification stream for the workload instances of one
/// application. The caller owns its lifetime: [`UnitWatcher::close`]
/// releases the underlying subscription. Notifications are best effort;
/// the upstream push source keeps no history, so a consumer that is not
/// actively reading may miss events.
pub struct UnitWatcher {
    rx: mpsc::Receiver<UnitChange>,
    handle: JoinHandle<()>,
}

impl UnitWatcher {
    /// The next change, or `None` once the stream has terminated.
    pub async fn recv(&mut self) -> Option<UnitChange> {
        self.rx.recv().await
    }

    /// Stops the underlying watch immediately.
    pub fn close(self) {
        self.handle.abort();
    }
}

impl KubeBroker {
    /// Lists all workload instances of an application, with state
    /// recomputed from the cluster's live view.
    pub async fn units(&self, app_name: &str) -> Result<Vec<UnitInfo>> {
        let lp = ListParams::default().labels(&naming::application_selector(app_name));
        let pods = self
            .pods()
            .list(&lp)
            .await
            .map_err(|e| BrokerError::api("list", "Pod", app_name, &e))?;

        let now = SystemTime::now();
        let mut units = Vec::new();
        for pod in pods {
            let dying = pod.metadata.deletion_timestamp.is_some();
            let phase = pod.status.as_ref().and_then(|s| s.phase.as_deref());
            let ports = pod
                .spec
                .iter()
                .flat_map(|s| &s.containers)
                .flat_map(|c| c.ports.iter().flatten())
                .map(|p| {
                    format!(
                        "{}/{}",
                        p.container_port,
                        p.protocol.as_deref().unwrap_or("TCP")
                    )
                })
                .collect();
            // Pods this broker created directly carry a unit label from
            // which the logical unit identity can be recovered.
            let unit_name = pod
                .metadata
                .labels
                .as_ref()
                .and_then(|labels| labels.get(LABEL_UNIT))
                .and_then(|value| naming::recover_unit_name(value));

            units.push(UnitInfo {
                id: pod.metadata.uid.clone().unwrap_or_default(),
                unit_name,
                address: pod
                    .status
                    .as_ref()
                    .and_then(|s| s.pod_ip.clone())
                    .unwrap_or_default(),
                ports,
                dying,
                status: UnitStatus {
                    status: WorkloadStatus::from_pod_phase(phase, dying),
                    message: pod
                        .status
                        .as_ref()
                        .and_then(|s| s.message.clone())
                        .unwrap_or_default(),
                    since: now,
                },
            });
        }
        Ok(units)
    }

    /// Opens a server-driven notification stream for the pods of an
    /// application and adapts it to [`UnitWatcher`].
    pub async fn watch_units(&self, app_name: &str) -> Result<UnitWatcher> {
        let pods = self.pods();
        let wp = WatchParams::default().labels(&naming::application_selector(app_name));
        let stream = pods
            .watch(&wp, "0")
            .await
            .map_err(|e| BrokerError::api("watch", "Pod", app_name, &e))?;

        let (tx, rx) = mpsc::channel(WATCH_CHANNEL_CAPACITY);
        let app = app_name.to_string();
        let handle = tokio::spawn(async move {
            futures::pin_mut!(stream);
            while let Some(event) = stream.next().await {
                let change = match event {
                    Ok(WatchEvent::Added(pod)) => Some((pod, ChangeKind::Added)),
                    Ok(WatchEvent::Modified(pod)) => Some((pod, ChangeKind::Updated)),
                    Ok(WatchEvent::Deleted(pod)) => Some((pod, ChangeKind::Deleted)),
                    Ok(WatchEvent::Bookmark(_)) => None,
                    Ok(WatchEvent::Error(status)) => {
                        warn!("watch stream for {} reported: {}", app, status.message);
                        break;
                    }
                    Err(err) => {
                        warn!("watch stream for {} failed: {}", app, err);
                        break;
                    }
                };
                if let Some((pod, kind)) = change {
                    let pod_name = pod.metadata.name.unwrap_or_default();
                    if tx.send(UnitChange { pod_name, kind }).await.is_err() {
                        // Receiver gone; nothing left to notify.
                        break;
                    }
                }
            }
            debug!("watch stream for {} closed", app);
        });

        Ok(UnitWatcher { rx, handle })
    }
}
