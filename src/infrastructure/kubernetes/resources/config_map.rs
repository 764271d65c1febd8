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

use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use crate::domain::app::{FileSet, OperatorConfig};
use crate::infrastructure::constants::AGENT_CONF_FILE;
use crate::infrastructure::kubernetes::resources::naming;

/// Config object projecting one named file set into a pod filesystem.
pub fn fileset_config_map(name: &str, namespace: &str, file_set: &FileSet) -> ConfigMap {
    ConfigMap {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        data: Some(file_set.files.clone()),
        ..Default::default()
    }
}

/// Config object holding the agent configuration of an operator pod.
pub fn operator_config_map(app_name: &str, namespace: &str, config: &OperatorConfig) -> ConfigMap {
    let mut data = BTreeMap::new();
    data.insert(AGENT_CONF_FILE.to_string(), config.agent_conf.clone());
    ConfigMap {
        metadata: ObjectMeta {
            name: Some(naming::operator_config_map_name(app_name)),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        data: Some(data),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fileset_files_become_config_map_data() {
        let mut files = BTreeMap::new();
        files.insert("nginx.conf".to_string(), "worker_processes 1;".to_string());
        let file_set = FileSet {
            name: "configuration".to_string(),
            mount_path: "/etc/nginx".to_string(),
            files,
        };
        let cm = fileset_config_map("capstan-web-configuration-config", "testing", &file_set);
        assert_eq!(
            cm.metadata.name.as_deref(),
            Some("capstan-web-configuration-config")
        );
        assert_eq!(
            cm.data.unwrap().get("nginx.conf"),
            Some(&"worker_processes 1;".to_string())
        );
    }

    #[test]
    fn operator_config_map_carries_agent_conf() {
        let config = OperatorConfig {
            agent_conf: "apiaddresses: [localhost:17070]".to_string(),
            operator_image_path: "capstan/operator:2.0".to_string(),
            version: "2.0.0".to_string(),
        };
        let cm = operator_config_map("gitlab", "testing", &config);
        assert_eq!(
            cm.metadata.name.as_deref(),
            Some("capstan-operator-gitlab-config")
        );
        assert!(cm.data.unwrap().contains_key("agent.conf"));
    }
}
