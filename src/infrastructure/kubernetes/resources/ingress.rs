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

use std::collections::BTreeMap;

use k8s_openapi::api::networking::v1::{
    HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule,
    IngressServiceBackend, IngressSpec, ServiceBackendPort,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use crate::domain::config::DeploymentConfig;
use crate::infrastructure::constants::APPLICATION_PATH_SENTINEL;
use crate::infrastructure::kubernetes::resources::naming;

/// Rewrites the configured HTTP path so it always starts with `/`,
/// expanding the `$appname` sentinel to the application name.
pub fn normalize_http_path(configured: &str, app_name: &str) -> String {
    let path = if configured == APPLICATION_PATH_SENTINEL {
        app_name
    } else {
        configured
    };
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}

pub struct IngressBuilder<'a> {
    app_name: &'a str,
    namespace: &'a str,
    host: &'a str,
    http_path: String,
    service_name: &'a str,
    service_port: i32,
    config: &'a DeploymentConfig,
}

impl<'a> IngressBuilder<'a> {
    pub fn new(
        app_name: &'a str,
        namespace: &'a str,
        host: &'a str,
        service_name: &'a str,
        service_port: i32,
        config: &'a DeploymentConfig,
    ) -> Self {
        Self {
            app_name,
            namespace,
            host,
            http_path: normalize_http_path(&config.application_path, app_name),
            service_name,
            service_port,
            config,
        }
    }

    pub fn build(&self) -> Ingress {
        let mut annotations = BTreeMap::new();
        annotations.insert(
            "ingress.kubernetes.io/rewrite-target".to_string(),
            String::new(),
        );
        annotations.insert(
            "ingress.kubernetes.io/ssl-redirect".to_string(),
            self.config.ingress_ssl_redirect.to_string(),
        );
        annotations.insert(
            "ingress.kubernetes.io/ssl-passthrough".to_string(),
            self.config.ingress_ssl_passthrough.to_string(),
        );
        annotations.insert(
            "kubernetes.io/ingress.allow-http".to_string(),
            self.config.ingress_allow_http.to_string(),
        );

        Ingress {
            metadata: ObjectMeta {
                name: Some(naming::deployment_name(self.app_name)),
                namespace: Some(self.namespace.to_string()),
                labels: Some(naming::application_labels(self.app_name)),
                annotations: Some(annotations),
                ..Default::default()
            },
            spec: Some(IngressSpec {
                ingress_class_name: Some(self.config.ingress_class.clone()),
                rules: Some(vec![IngressRule {
                    host: Some(self.host.to_string()),
                    http: Some(HTTPIngressRuleValue {
                        paths: vec![HTTPIngressPath {
                            path: Some(self.http_path.clone()),
                            path_type: "Prefix".to_string(),
                            backend: IngressBackend {
                                service: Some(IngressServiceBackend {
                                    name: self.service_name.to_string(),
                                    port: Some(ServiceBackendPort {
                                        number: Some(self.service_port),
                                        ..Default::default()
                                    }),
                                }),
                                ..Default::default()
                            },
                        }],
                    }),
                }]),
                ..Default::default()
            }),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_normalized_to_leading_slash() {
        assert_eq!(normalize_http_path("foo", "gitlab"), "/foo");
        assert_eq!(normalize_http_path("/foo", "gitlab"), "/foo");
        assert_eq!(normalize_http_path("$appname", "gitlab"), "/gitlab");
    }

    #[test]
    fn builds_ingress_routing_host_to_service() {
        let config = DeploymentConfig {
            ingress_ssl_redirect: true,
            ..Default::default()
        };
        let ingress = IngressBuilder::new(
            "gitlab",
            "testing",
            "gitlab.example.com",
            "capstan-gitlab",
            80,
            &config,
        )
        .build();

        assert_eq!(ingress.metadata.name.as_deref(), Some("capstan-gitlab"));
        let annotations = ingress.metadata.annotations.unwrap();
        assert_eq!(
            annotations.get("ingress.kubernetes.io/ssl-redirect"),
            Some(&"true".to_string())
        );

        let spec = ingress.spec.unwrap();
        assert_eq!(spec.ingress_class_name.as_deref(), Some("nginx"));
        let rule = &spec.rules.unwrap()[0];
        assert_eq!(rule.host.as_deref(), Some("gitlab.example.com"));
        let path = &rule.http.as_ref().unwrap().paths[0];
        assert_eq!(path.path.as_deref(), Some("/gitlab"));
        let backend = path.backend.service.as_ref().unwrap();
        assert_eq!(backend.name, "capstan-gitlab");
        assert_eq!(backend.port.as_ref().unwrap().number, Some(80));
    }
}
