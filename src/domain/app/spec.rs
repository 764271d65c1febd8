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

//! Declarative description of what runs in a pod: containers, ports,
//! environment, file sets and storage requests. These types are the
//! provider-independent application model; the Kubernetes rendering lives
//! under `infrastructure::kubernetes`.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::Probe;
use serde::{Deserialize, Serialize};

use crate::shared::error::Result;

/// Everything needed to run one replica of an application.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PodParams {
    pub containers: Vec<ContainerParams>,
    /// Skip creating the exposing service for this workload.
    #[serde(default)]
    pub omit_service_frontend: bool,
}

impl PodParams {
    /// Parses a pod description from a YAML manifest.
    pub fn from_yaml(manifest: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(manifest)?)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ContainerParams {
    pub name: String,
    pub image: String,
    #[serde(default)]
    pub ports: Vec<PortParams>,
    /// Environment variables projected into the container.
    #[serde(default)]
    pub config: BTreeMap<String, String>,
    /// Named sets of file contents mounted via config objects.
    #[serde(default)]
    pub files: Vec<FileSet>,
    /// Cluster-API-family specific extension of the base container spec.
    #[serde(default)]
    pub provider: Option<ProviderContainer>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PortParams {
    pub container_port: i32,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub protocol: Option<String>,
}

/// A named bundle of file contents projected into the pod filesystem at
/// `mount_path` through a config object.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FileSet {
    pub name: String,
    pub mount_path: String,
    pub files: BTreeMap<String, String>,
}

/// Provider-specific container fields the declarative model cannot express,
/// keyed by target cluster-API family.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "kebab-case")]
pub enum ProviderContainer {
    #[serde(rename_all = "kebab-case")]
    Kubernetes {
        #[serde(default)]
        image_pull_policy: Option<String>,
        #[serde(default)]
        liveness_probe: Option<Probe>,
        #[serde(default)]
        readiness_probe: Option<Probe>,
    },
}

/// Logical storage request attached to an application workload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FilesystemParams {
    /// Stable identifier of this filesystem within the application.
    pub tag: String,
    /// Requested capacity in mebibytes.
    pub size_mi: u64,
    #[serde(default)]
    pub storage_class: Option<String>,
    #[serde(default)]
    pub storage_label: Option<String>,
    /// Where to mount; defaults to the per-application/tag convention.
    #[serde(default)]
    pub mount_path: Option<String>,
}

/// Parameters for `ensure_service`: the pod description plus storage.
#[derive(Debug, Clone, Default)]
pub struct ServiceParams {
    pub pod: PodParams,
    pub filesystems: Vec<FilesystemParams>,
}

/// Configuration for an application's operator pod.
#[derive(Debug, Clone)]
pub struct OperatorConfig {
    /// Contents of the agent configuration file mounted into the operator.
    pub agent_conf: String,
    pub operator_image_path: String,
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pod_params_parse_from_yaml() {
        let manifest = r#"
containers:
  - name: gitlab
    image: gitlab/latest
    ports:
      - container-port: 80
        protocol: TCP
      - container-port: 443
    config:
      GITLAB_OMNIBUS_CONFIG: external_url 'http://example.com'
    files:
      - name: configuration
        mount-path: /var/lib/gitlab
        files:
          gitlab.rb: |-
            gitlab_rails['time_zone'] = 'UTC'
"#;
        let params = PodParams::from_yaml(manifest).expect("parse pod params");
        assert_eq!(params.containers.len(), 1);
        let container = &params.containers[0];
        assert_eq!(container.name, "gitlab");
        assert_eq!(container.ports[0].container_port, 80);
        assert_eq!(container.ports[0].protocol.as_deref(), Some("TCP"));
        assert_eq!(container.files[0].mount_path, "/var/lib/gitlab");
        assert!(container.files[0].files.contains_key("gitlab.rb"));
        assert!(!params.omit_service_frontend);
    }

    #[test]
    fn provider_extension_parses_as_tagged_variant() {
        let manifest = r#"
containers:
  - name: app
    image: app:1
    provider:
      family: kubernetes
      image-pull-policy: Always
"#;
        let params = PodParams::from_yaml(manifest).expect("parse pod params");
        match &params.containers[0].provider {
            Some(ProviderContainer::Kubernetes {
                image_pull_policy, ..
            }) => assert_eq!(image_pull_policy.as_deref(), Some("Always")),
            None => panic!("expected provider extension"),
        }
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        assert!(PodParams::from_yaml("containers: 42").is_err());
    }
}
