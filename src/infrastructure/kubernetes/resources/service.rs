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

use k8s_openapi::api::core::v1::{ContainerPort, Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

use crate::domain::config::DeploymentConfig;
use crate::infrastructure::kubernetes::resources::naming;

pub struct ServiceBuilder<'a> {
    app_name: &'a str,
    namespace: &'a str,
    container_ports: &'a [ContainerPort],
    config: &'a DeploymentConfig,
}

impl<'a> ServiceBuilder<'a> {
    pub fn new(
        app_name: &'a str,
        namespace: &'a str,
        container_ports: &'a [ContainerPort],
        config: &'a DeploymentConfig,
    ) -> Self {
        Self {
            app_name,
            namespace,
            container_ports,
            config,
        }
    }

    pub fn build(&self) -> Service {
        let mut ports = Vec::new();
        for (i, cp) in self.container_ports.iter().enumerate() {
            // A single container port is the common case. The caller may
            // override the externally visible port of the first one; it
            // defaults to the container port itself.
            let target_port = if i == 0 {
                Some(IntOrString::Int(
                    self.config.target_port.unwrap_or(cp.container_port),
                ))
            } else {
                None
            };
            ports.push(ServicePort {
                protocol: cp.protocol.clone(),
                port: cp.container_port,
                target_port,
                ..Default::default()
            });
        }

        Service {
            metadata: ObjectMeta {
                name: Some(naming::deployment_name(self.app_name)),
                namespace: Some(self.namespace.to_string()),
                labels: Some(naming::application_labels(self.app_name)),
                ..Default::default()
            },
            spec: Some(ServiceSpec {
                selector: Some(naming::application_labels(self.app_name)),
                type_: Some(self.config.service_type.as_str().to_string()),
                ports: Some(ports),
                external_ips: none_if_empty(&self.config.external_ips),
                load_balancer_ip: self.config.load_balancer_ip.clone(),
                load_balancer_source_ranges: none_if_empty(
                    &self.config.load_balancer_source_ranges,
                ),
                external_name: self.config.external_name.clone(),
                ..Default::default()
            }),
            ..Default::default()
        }
    }
}

fn none_if_empty(values: &[String]) -> Option<Vec<String>> {
    if values.is_empty() {
        None
    } else {
        Some(values.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::ServiceType;

    fn port(number: i32) -> ContainerPort {
        ContainerPort {
            container_port: number,
            protocol: Some("TCP".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn builds_service_with_derived_name_and_selector() {
        let config = DeploymentConfig::default();
        let ports = [port(80)];
        let service = ServiceBuilder::new("gitlab", "testing", &ports, &config).build();

        assert_eq!(service.metadata.name.as_deref(), Some("capstan-gitlab"));
        let spec = service.spec.unwrap();
        assert_eq!(
            spec.selector.unwrap().get("capstan-application"),
            Some(&"gitlab".to_string())
        );
        assert_eq!(spec.type_.as_deref(), Some("ClusterIP"));
        let sp = &spec.ports.unwrap()[0];
        assert_eq!(sp.port, 80);
        assert_eq!(sp.target_port, Some(IntOrString::Int(80)));
    }

    #[test]
    fn first_port_takes_configured_target() {
        let config = DeploymentConfig {
            target_port: Some(8080),
            ..Default::default()
        };
        let ports = [port(80), port(443)];
        let service = ServiceBuilder::new("gitlab", "testing", &ports, &config).build();

        let spec_ports = service.spec.unwrap().ports.unwrap();
        assert_eq!(spec_ports[0].target_port, Some(IntOrString::Int(8080)));
        assert_eq!(spec_ports[1].target_port, None);
    }

    #[test]
    fn load_balancer_fields_come_from_config() {
        let config = DeploymentConfig {
            service_type: ServiceType::LoadBalancer,
            load_balancer_ip: Some("10.0.0.1".to_string()),
            load_balancer_source_ranges: vec!["10.0.0.0/8".to_string()],
            external_ips: vec!["1.2.3.4".to_string()],
            ..Default::default()
        };
        let ports = [port(80)];
        let spec = ServiceBuilder::new("gitlab", "testing", &ports, &config)
            .build()
            .spec
            .unwrap();

        assert_eq!(spec.type_.as_deref(), Some("LoadBalancer"));
        assert_eq!(spec.load_balancer_ip.as_deref(), Some("10.0.0.1"));
        assert_eq!(spec.load_balancer_source_ranges.unwrap(), ["10.0.0.0/8"]);
        assert_eq!(spec.external_ips.unwrap(), ["1.2.3.4"]);
    }
}
