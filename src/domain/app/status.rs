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

//! The broker's own status vocabulary and the read-only projections of
//! cluster state. Status is never stored; it is recomputed from the
//! cluster's live state on every observation.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// Domain status of one workload instance, derived from the cluster's
/// reported phase plus the deletion-in-progress marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkloadStatus {
    Allocating,
    Running,
    Error,
    Terminated,
    Unknown,
}

impl WorkloadStatus {
    /// Maps a pod phase and deletion marker to the domain status. A pending
    /// deletion overrides whatever phase the pod reports.
    pub fn from_pod_phase(phase: Option<&str>, dying: bool) -> Self {
        if dying {
            return WorkloadStatus::Terminated;
        }
        match phase {
            Some("Running") => WorkloadStatus::Running,
            Some("Failed") => WorkloadStatus::Error,
            Some("Pending") => WorkloadStatus::Allocating,
            _ => WorkloadStatus::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkloadStatus::Allocating => "allocating",
            WorkloadStatus::Running => "running",
            WorkloadStatus::Error => "error",
            WorkloadStatus::Terminated => "terminated",
            WorkloadStatus::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone)]
pub struct UnitStatus {
    pub status: WorkloadStatus,
    pub message: String,
    pub since: SystemTime,
}

/// Observed state of one workload instance.
#[derive(Debug, Clone)]
pub struct UnitInfo {
    /// Cluster-assigned unique id of the backing pod.
    pub id: String,
    /// Logical unit name, recovered from the unit label for pods this
    /// broker created directly; `None` for controller-created pods.
    pub unit_name: Option<String>,
    pub address: String,
    /// Open ports as `<port>/<protocol>`.
    pub ports: Vec<String>,
    /// Deletion initiated but not yet complete.
    pub dying: bool,
    pub status: UnitStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressScope {
    /// Reachable only inside the cluster.
    Local,
    /// Reachable from outside the cluster.
    Public,
}

#[derive(Debug, Clone)]
pub struct Address {
    pub value: String,
    pub scope: AddressScope,
}

/// Observed state of an application's exposing service.
#[derive(Debug, Clone)]
pub struct ServiceInfo {
    pub id: String,
    pub addresses: Vec<Address>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Updated,
    Deleted,
}

/// One change notification for a workload instance of an application.
#[derive(Debug, Clone)]
pub struct UnitChange {
    pub pod_name: String,
    pub kind: ChangeKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_mapping() {
        assert_eq!(
            WorkloadStatus::from_pod_phase(Some("Running"), false),
            WorkloadStatus::Running
        );
        assert_eq!(
            WorkloadStatus::from_pod_phase(Some("Failed"), false),
            WorkloadStatus::Error
        );
        assert_eq!(
            WorkloadStatus::from_pod_phase(Some("Pending"), false),
            WorkloadStatus::Allocating
        );
        assert_eq!(
            WorkloadStatus::from_pod_phase(Some("Succeeded"), false),
            WorkloadStatus::Unknown
        );
        assert_eq!(
            WorkloadStatus::from_pod_phase(None, false),
            WorkloadStatus::Unknown
        );
    }

    #[test]
    fn dying_overrides_every_phase() {
        for phase in [Some("Running"), Some("Failed"), Some("Pending"), None] {
            assert_eq!(
                WorkloadStatus::from_pod_phase(phase, true),
                WorkloadStatus::Terminated
            );
        }
    }
}
