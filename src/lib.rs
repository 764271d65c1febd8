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

//! Capstan's Kubernetes broker: maps an abstract application model
//! (containers, ports, files, storage requests, exposure rules) onto
//! concrete cluster resources inside one namespace, and keeps them
//! converged on repeated invocation. The cluster's own resource store is
//! the single source of truth; everything is re-derived from deterministic
//! names and labels on each call.

// Core modules
pub mod domain;
pub mod infrastructure;
pub mod shared;

// Re-export commonly used types
pub use domain::app::{
    Address, AddressScope, ChangeKind, ContainerParams, FileSet, FilesystemParams,
    OperatorConfig, PodParams, PortParams, ProviderContainer, ServiceInfo, ServiceParams,
    UnitChange, UnitInfo, UnitStatus, WorkloadStatus,
};
pub use domain::config::{DeploymentConfig, ServiceType};
pub use infrastructure::kubernetes::{Broker, KubeBroker, UnitWatcher};
pub use shared::{BrokerError, Result};
