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

//! Strongly-typed view of the deployment configuration an application
//! carries. The recognized keys are enumerated below; values are parsed and
//! validated once at the boundary instead of being coerced at every lookup
//! site. Unrecognized keys are left alone, since application configuration
//! usually carries settings for other consumers as well.

use std::collections::HashMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::infrastructure::constants::{APPLICATION_PATH_SENTINEL, DEFAULT_INGRESS_CLASS};
use crate::shared::error::{BrokerError, Result};

pub const CONFIG_SERVICE_TYPE: &str = "kubernetes-service-type";
pub const CONFIG_SERVICE_EXTERNAL_IPS: &str = "kubernetes-service-external-ips";
pub const CONFIG_SERVICE_LOADBALANCER_IP: &str = "kubernetes-service-loadbalancer-ip";
pub const CONFIG_SERVICE_LOADBALANCER_SOURCE_RANGES: &str =
    "kubernetes-service-loadbalancer-sourceranges";
pub const CONFIG_SERVICE_EXTERNAL_NAME: &str = "kubernetes-service-externalname";
pub const CONFIG_SERVICE_TARGET_PORT: &str = "kubernetes-service-target-port";
pub const CONFIG_INGRESS_CLASS: &str = "kubernetes-ingress-class";
pub const CONFIG_INGRESS_SSL_REDIRECT: &str = "kubernetes-ingress-ssl-redirect";
pub const CONFIG_INGRESS_SSL_PASSTHROUGH: &str = "kubernetes-ingress-ssl-passthrough";
pub const CONFIG_INGRESS_ALLOW_HTTP: &str = "kubernetes-ingress-allow-http";
pub const CONFIG_EXTERNAL_HOSTNAME: &str = "capstan-external-hostname";
pub const CONFIG_APPLICATION_PATH: &str = "capstan-application-path";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceType {
    ClusterIP,
    NodePort,
    LoadBalancer,
    ExternalName,
}

impl ServiceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::ClusterIP => "ClusterIP",
            ServiceType::NodePort => "NodePort",
            ServiceType::LoadBalancer => "LoadBalancer",
            ServiceType::ExternalName => "ExternalName",
        }
    }
}

impl FromStr for ServiceType {
    type Err = BrokerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ClusterIP" => Ok(ServiceType::ClusterIP),
            "NodePort" => Ok(ServiceType::NodePort),
            "LoadBalancer" => Ok(ServiceType::LoadBalancer),
            "ExternalName" => Ok(ServiceType::ExternalName),
            _ => Err(BrokerError::invalid_input(format!(
                "invalid service type: {}",
                s
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DeploymentConfig {
    pub service_type: ServiceType,
    pub external_ips: Vec<String>,
    pub load_balancer_ip: Option<String>,
    pub load_balancer_source_ranges: Vec<String>,
    pub external_name: Option<String>,
    /// Externally visible port for the first service port; falls back to
    /// the container port when unset.
    pub target_port: Option<i32>,
    pub ingress_class: String,
    pub ingress_ssl_redirect: bool,
    pub ingress_ssl_passthrough: bool,
    pub ingress_allow_http: bool,
    pub external_hostname: Option<String>,
    /// HTTP path routed by the ingress rule; the `$appname` sentinel stands
    /// for the application name.
    pub application_path: String,
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            service_type: ServiceType::ClusterIP,
            external_ips: Vec::new(),
            load_balancer_ip: None,
            load_balancer_source_ranges: Vec::new(),
            external_name: None,
            target_port: None,
            ingress_class: DEFAULT_INGRESS_CLASS.to_string(),
            ingress_ssl_redirect: false,
            ingress_ssl_passthrough: false,
            ingress_allow_http: false,
            external_hostname: None,
            application_path: APPLICATION_PATH_SENTINEL.to_string(),
        }
    }
}

impl DeploymentConfig {
    /// Parses the recognized keys out of a raw attribute map, validating
    /// each value. Malformed values are terminal input errors.
    pub fn from_attributes(attrs: &HashMap<String, String>) -> Result<Self> {
        let mut config = DeploymentConfig::default();

        if let Some(v) = attrs.get(CONFIG_SERVICE_TYPE) {
            config.service_type = v.parse()?;
        }
        if let Some(v) = attrs.get(CONFIG_SERVICE_EXTERNAL_IPS) {
            config.external_ips = parse_list(v);
        }
        if let Some(v) = attrs.get(CONFIG_SERVICE_LOADBALANCER_IP) {
            config.load_balancer_ip = non_empty(v);
        }
        if let Some(v) = attrs.get(CONFIG_SERVICE_LOADBALANCER_SOURCE_RANGES) {
            config.load_balancer_source_ranges = parse_list(v);
        }
        if let Some(v) = attrs.get(CONFIG_SERVICE_EXTERNAL_NAME) {
            config.external_name = non_empty(v);
        }
        if let Some(v) = attrs.get(CONFIG_SERVICE_TARGET_PORT) {
            config.target_port = Some(parse_port(CONFIG_SERVICE_TARGET_PORT, v)?);
        }
        if let Some(v) = attrs.get(CONFIG_INGRESS_CLASS) {
            if let Some(class) = non_empty(v) {
                config.ingress_class = class;
            }
        }
        if let Some(v) = attrs.get(CONFIG_INGRESS_SSL_REDIRECT) {
            config.ingress_ssl_redirect = parse_bool(CONFIG_INGRESS_SSL_REDIRECT, v)?;
        }
        if let Some(v) = attrs.get(CONFIG_INGRESS_SSL_PASSTHROUGH) {
            config.ingress_ssl_passthrough = parse_bool(CONFIG_INGRESS_SSL_PASSTHROUGH, v)?;
        }
        if let Some(v) = attrs.get(CONFIG_INGRESS_ALLOW_HTTP) {
            config.ingress_allow_http = parse_bool(CONFIG_INGRESS_ALLOW_HTTP, v)?;
        }
        if let Some(v) = attrs.get(CONFIG_EXTERNAL_HOSTNAME) {
            config.external_hostname = non_empty(v);
        }
        if let Some(v) = attrs.get(CONFIG_APPLICATION_PATH) {
            if let Some(path) = non_empty(v) {
                config.application_path = path;
            }
        }

        Ok(config)
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    value
        .trim()
        .parse()
        .map_err(|_| BrokerError::invalid_input(format!("{}: expected true or false, got '{}'", key, value)))
}

fn parse_port(key: &str, value: &str) -> Result<i32> {
    let port: i32 = value
        .trim()
        .parse()
        .map_err(|_| BrokerError::invalid_input(format!("{}: expected a port number, got '{}'", key, value)))?;
    if !(1..=65535).contains(&port) {
        return Err(BrokerError::invalid_input(format!(
            "{}: port {} out of range",
            key, port
        )));
    }
    Ok(port)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_apply_when_keys_are_absent() {
        let config = DeploymentConfig::from_attributes(&HashMap::new()).unwrap();
        assert_eq!(config.service_type, ServiceType::ClusterIP);
        assert_eq!(config.ingress_class, "nginx");
        assert_eq!(config.application_path, "$appname");
        assert!(!config.ingress_ssl_redirect);
        assert!(config.external_hostname.is_none());
        assert!(config.target_port.is_none());
    }

    #[test]
    fn recognized_keys_are_parsed() {
        let config = DeploymentConfig::from_attributes(&attrs(&[
            (CONFIG_SERVICE_TYPE, "LoadBalancer"),
            (CONFIG_SERVICE_EXTERNAL_IPS, "10.0.0.1, 10.0.0.2"),
            (CONFIG_SERVICE_TARGET_PORT, "8080"),
            (CONFIG_INGRESS_SSL_REDIRECT, "true"),
            (CONFIG_EXTERNAL_HOSTNAME, "app.example.com"),
        ]))
        .unwrap();
        assert_eq!(config.service_type, ServiceType::LoadBalancer);
        assert_eq!(config.external_ips, vec!["10.0.0.1", "10.0.0.2"]);
        assert_eq!(config.target_port, Some(8080));
        assert!(config.ingress_ssl_redirect);
        assert_eq!(config.external_hostname.as_deref(), Some("app.example.com"));
    }

    #[test]
    fn malformed_values_are_terminal_errors() {
        assert!(
            DeploymentConfig::from_attributes(&attrs(&[(CONFIG_SERVICE_TYPE, "Floating")]))
                .is_err()
        );
        assert!(
            DeploymentConfig::from_attributes(&attrs(&[(CONFIG_SERVICE_TARGET_PORT, "http")]))
                .is_err()
        );
        assert!(
            DeploymentConfig::from_attributes(&attrs(&[(CONFIG_SERVICE_TARGET_PORT, "0")]))
                .is_err()
        );
        assert!(
            DeploymentConfig::from_attributes(&attrs(&[(CONFIG_INGRESS_ALLOW_HTTP, "yes")]))
                .is_err()
        );
    }

    #[test]
    fn unrelated_keys_are_ignored() {
        let config =
            DeploymentConfig::from_attributes(&attrs(&[("application-setting", "value")])).unwrap();
        assert_eq!(config.service_type, ServiceType::ClusterIP);
    }
}
