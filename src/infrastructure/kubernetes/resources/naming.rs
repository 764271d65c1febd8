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

//! Deterministic resource name and label derivation.
//!
//! Every resource this broker creates is addressed purely by a name derived
//! from application/unit identifiers plus a label selector; no local index
//! of created resources is kept anywhere.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::infrastructure::constants::{
    LABEL_APPLICATION, LABEL_OPERATOR, LABEL_UNIT, LABEL_VERSION, RESOURCE_PREFIX,
};
use crate::shared::error::{BrokerError, Result};

fn rfc1123_label() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z0-9]([a-z0-9-]*[a-z0-9])?$").expect("valid regex"))
}

/// Validates an application name as a DNS-safe RFC 1123 label.
pub fn validate_application_name(app_name: &str) -> Result<()> {
    if app_name.len() > 63 || !rfc1123_label().is_match(app_name) {
        return Err(BrokerError::invalid_input(format!(
            "application name '{}' must be a lowercase RFC 1123 label",
            app_name
        )));
    }
    Ok(())
}

/// Validates a unit name of the form `<application>/<ordinal>`.
pub fn validate_unit_name(unit_name: &str) -> Result<()> {
    let invalid = || {
        BrokerError::invalid_input(format!(
            "unit name '{}' must have the form <application>/<ordinal>",
            unit_name
        ))
    };
    let (app, ordinal) = unit_name.split_once('/').ok_or_else(invalid)?;
    validate_application_name(app).map_err(|_| invalid())?;
    if ordinal.is_empty() || !ordinal.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    Ok(())
}

/// Name of the deployment, service and ingress resources of an application.
pub fn deployment_name(app_name: &str) -> String {
    format!("{}-{}", RESOURCE_PREFIX, app_name)
}

/// Prefix used for server-generated pod names of an application's workload.
pub fn resource_name_prefix(app_name: &str) -> String {
    format!("{}-{}-", RESOURCE_PREFIX, app_name)
}

pub fn operator_pod_name(app_name: &str) -> String {
    format!("{}-operator-{}", RESOURCE_PREFIX, app_name)
}

pub fn operator_config_map_name(app_name: &str) -> String {
    format!("{}-config", operator_pod_name(app_name))
}

pub fn operator_volume_claim_name(app_name: &str) -> String {
    format!("{}-operator-volume-claim", app_name)
}

/// Config object holding one named file set of an application workload.
pub fn application_config_map_name(app_name: &str, file_set_name: &str) -> String {
    format!("{}-{}-config", deployment_name(app_name), file_set_name)
}

/// Pod name of an individually managed unit, e.g. `mysql/0` ->
/// `capstan-unit-mysql-0`.
pub fn unit_pod_name(unit_name: &str) -> String {
    format!("{}-unit-{}", RESOURCE_PREFIX, unit_name.replace('/', "-"))
}

pub fn unit_config_map_name(unit_name: &str, file_set_name: &str) -> String {
    format!("{}-{}-config", unit_pod_name(unit_name), file_set_name)
}

/// Recovers the logical unit name from a `capstan-unit` pod label, the
/// inverse of [`unit_pod_name`]. Pods created outside this broker carry no
/// such label and yield `None`.
pub fn recover_unit_name(label_value: &str) -> Option<String> {
    let prefix = format!("{}-unit-", RESOURCE_PREFIX);
    let rest = label_value.strip_prefix(&prefix)?;
    let (app, ordinal) = rest.rsplit_once('-')?;
    if app.is_empty() || ordinal.is_empty() || !ordinal.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(format!("{}/{}", app, ordinal))
}

/// Selector matching every pod belonging to an application.
pub fn application_selector(app_name: &str) -> String {
    format!("{}=={}", LABEL_APPLICATION, app_name)
}

/// Selector matching the operator pod of an application.
pub fn operator_selector(app_name: &str) -> String {
    format!("{}=={}", LABEL_OPERATOR, app_name)
}

pub fn application_labels(app_name: &str) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert(LABEL_APPLICATION.to_string(), app_name.to_string());
    labels
}

pub fn unit_labels(app_name: &str, unit_name: &str) -> BTreeMap<String, String> {
    let mut labels = application_labels(app_name);
    labels.insert(LABEL_UNIT.to_string(), unit_pod_name(unit_name));
    labels
}

pub fn operator_labels(app_name: &str, version: &str) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert(LABEL_OPERATOR.to_string(), app_name.to_string());
    labels.insert(LABEL_VERSION.to_string(), version.to_string());
    labels
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deployment_names_are_prefixed() {
        assert_eq!(deployment_name("gitlab"), "capstan-gitlab");
        assert_eq!(resource_name_prefix("gitlab"), "capstan-gitlab-");
    }

    #[test]
    fn operator_names_derive_from_application() {
        assert_eq!(operator_pod_name("gitlab"), "capstan-operator-gitlab");
        assert_eq!(
            operator_config_map_name("gitlab"),
            "capstan-operator-gitlab-config"
        );
        assert_eq!(
            operator_volume_claim_name("gitlab"),
            "gitlab-operator-volume-claim"
        );
    }

    #[test]
    fn config_map_names_include_file_set() {
        assert_eq!(
            application_config_map_name("gitlab", "secrets"),
            "capstan-gitlab-secrets-config"
        );
        assert_eq!(
            unit_config_map_name("gitlab/0", "secrets"),
            "capstan-unit-gitlab-0-secrets-config"
        );
    }

    #[test]
    fn unit_pod_name_round_trips_through_label() {
        let pod_name = unit_pod_name("mysql/0");
        assert_eq!(pod_name, "capstan-unit-mysql-0");
        assert_eq!(recover_unit_name(&pod_name), Some("mysql/0".to_string()));
    }

    #[test]
    fn foreign_labels_are_not_recovered() {
        assert_eq!(recover_unit_name("some-other-label"), None);
        assert_eq!(recover_unit_name("capstan-unit-"), None);
        assert_eq!(recover_unit_name("capstan-unit-mysql-abc"), None);
    }

    #[test]
    fn selectors_use_identity_labels() {
        assert_eq!(application_selector("app"), "capstan-application==app");
        assert_eq!(operator_selector("app"), "capstan-operator==app");
    }

    #[test]
    fn name_validation() {
        assert!(validate_application_name("gitlab").is_ok());
        assert!(validate_application_name("git-lab2").is_ok());
        assert!(validate_application_name("GitLab").is_err());
        assert!(validate_application_name("-gitlab").is_err());
        assert!(validate_application_name("").is_err());

        assert!(validate_unit_name("gitlab/0").is_ok());
        assert!(validate_unit_name("gitlab/12").is_ok());
        assert!(validate_unit_name("gitlab").is_err());
        assert!(validate_unit_name("gitlab/x").is_err());
    }

    #[test]
    fn names_do_not_collide_across_applications() {
        assert_ne!(deployment_name("a-b"), deployment_name("a"));
        assert_ne!(unit_pod_name("a/0"), unit_pod_name("a/10"));
    }
}
