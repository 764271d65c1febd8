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

//! Expansion of the declarative container model into a Kubernetes
//! `PodSpec`. The expansion happens in two steps: the provider-independent
//! parts (name, image, ports, environment) map mechanically, then the
//! provider extension is merged in for the fields the declarative model
//! cannot express (pull policy, probes).

use k8s_openapi::api::core::v1::{Container, ContainerPort, EnvVar, PodSpec};

use crate::domain::app::{ContainerParams, PodParams, ProviderContainer};
use crate::shared::error::{BrokerError, Result};

/// Expands pod parameters into a `PodSpec`.
pub fn build_pod_spec(params: &PodParams) -> Result<PodSpec> {
    if params.containers.is_empty() {
        return Err(BrokerError::invalid_input(
            "pod spec must declare at least one container",
        ));
    }
    let containers = params
        .containers
        .iter()
        .map(build_container)
        .collect::<Vec<_>>();
    let mut spec = PodSpec {
        containers,
        ..Default::default()
    };
    apply_provider_extension(&mut spec, &params.containers)?;
    Ok(spec)
}

fn build_container(params: &ContainerParams) -> Container {
    let ports: Vec<ContainerPort> = params
        .ports
        .iter()
        .map(|p| ContainerPort {
            container_port: p.container_port,
            name: p.name.clone(),
            protocol: p.protocol.clone(),
            ..Default::default()
        })
        .collect();
    let env: Vec<EnvVar> = params
        .config
        .iter()
        .map(|(name, value)| EnvVar {
            name: name.clone(),
            value: Some(value.clone()),
            ..Default::default()
        })
        .collect();
    Container {
        name: params.name.clone(),
        image: Some(params.image.clone()),
        ports: if ports.is_empty() { None } else { Some(ports) },
        env: if env.is_empty() { None } else { Some(env) },
        ..Default::default()
    }
}

/// Merges provider-specific container fields into the expanded spec.
fn apply_provider_extension(spec: &mut PodSpec, containers: &[ContainerParams]) -> Result<()> {
    for (i, params) in containers.iter().enumerate() {
        let Some(provider) = &params.provider else {
            continue;
        };
        match provider {
            ProviderContainer::Kubernetes {
                image_pull_policy,
                liveness_probe,
                readiness_probe,
            } => {
                let container = &mut spec.containers[i];
                container.image_pull_policy = image_pull_policy.clone();
                if liveness_probe.is_some() {
                    container.liveness_probe = liveness_probe.clone();
                }
                if readiness_probe.is_some() {
                    container.readiness_probe = readiness_probe.clone();
                }
            }
        }
    }
    Ok(())
}

/// Every nonzero container port across all containers of a pod spec, in
/// declaration order.
pub fn nonzero_container_ports(spec: &PodSpec) -> Vec<ContainerPort> {
    spec.containers
        .iter()
        .flat_map(|c| c.ports.iter().flatten())
        .filter(|p| p.container_port != 0)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::app::PortParams;
    use k8s_openapi::api::core::v1::Probe;
    use std::collections::BTreeMap;

    fn container(name: &str, ports: &[i32]) -> ContainerParams {
        ContainerParams {
            name: name.to_string(),
            image: format!("{}:latest", name),
            ports: ports
                .iter()
                .map(|p| PortParams {
                    container_port: *p,
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn expands_containers_ports_and_env() {
        let mut params = PodParams {
            containers: vec![container("web", &[80])],
            omit_service_frontend: false,
        };
        let mut config = BTreeMap::new();
        config.insert("KEY".to_string(), "value".to_string());
        params.containers[0].config = config;

        let spec = build_pod_spec(&params).unwrap();
        assert_eq!(spec.containers.len(), 1);
        let c = &spec.containers[0];
        assert_eq!(c.image.as_deref(), Some("web:latest"));
        assert_eq!(c.ports.as_ref().unwrap()[0].container_port, 80);
        let env = c.env.as_ref().unwrap();
        assert_eq!(env[0].name, "KEY");
        assert_eq!(env[0].value.as_deref(), Some("value"));
    }

    #[test]
    fn empty_container_list_is_rejected() {
        let err = build_pod_spec(&PodParams::default()).unwrap_err();
        assert!(matches!(err, BrokerError::InvalidInput(_)));
    }

    #[test]
    fn provider_extension_sets_pull_policy_and_probes() {
        let mut params = PodParams {
            containers: vec![container("web", &[80])],
            omit_service_frontend: false,
        };
        params.containers[0].provider = Some(ProviderContainer::Kubernetes {
            image_pull_policy: Some("IfNotPresent".to_string()),
            liveness_probe: Some(Probe {
                initial_delay_seconds: Some(15),
                ..Default::default()
            }),
            readiness_probe: None,
        });

        let spec = build_pod_spec(&params).unwrap();
        let c = &spec.containers[0];
        assert_eq!(c.image_pull_policy.as_deref(), Some("IfNotPresent"));
        assert_eq!(
            c.liveness_probe.as_ref().unwrap().initial_delay_seconds,
            Some(15)
        );
        assert!(c.readiness_probe.is_none());
    }

    #[test]
    fn nonzero_ports_span_all_containers() {
        let params = PodParams {
            containers: vec![container("web", &[80, 0]), container("metrics", &[9090])],
            omit_service_frontend: false,
        };
        let spec = build_pod_spec(&params).unwrap();
        let ports = nonzero_container_ports(&spec);
        assert_eq!(
            ports.iter().map(|p| p.container_port).collect::<Vec<_>>(),
            vec![80, 9090]
        );
    }
}
