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

use k8s_openapi::api::core::v1::{
    ConfigMapVolumeSource, Container, EnvVar, KeyToPath, Pod, PodSpec, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use crate::infrastructure::constants::{AGENT_CONF_FILE, ENV_APPLICATION, OPERATOR_CONTAINER_NAME};
use crate::infrastructure::kubernetes::resources::naming;

/// Directory holding one application agent's state below the agent root.
pub fn agent_dir(agent_path: &str, app_name: &str) -> String {
    format!("{}/agents/application-{}", agent_path, app_name)
}

pub struct OperatorPodBuilder<'a> {
    app_name: &'a str,
    namespace: &'a str,
    agent_path: &'a str,
    operator_image_path: &'a str,
    version: &'a str,
}

impl<'a> OperatorPodBuilder<'a> {
    pub fn new(
        app_name: &'a str,
        namespace: &'a str,
        agent_path: &'a str,
        operator_image_path: &'a str,
        version: &'a str,
    ) -> Self {
        Self {
            app_name,
            namespace,
            agent_path,
            operator_image_path,
            version,
        }
    }

    pub fn build(&self) -> Pod {
        let config_map_name = naming::operator_config_map_name(self.app_name);
        let config_vol_name = format!("{}-volume", config_map_name);

        Pod {
            metadata: ObjectMeta {
                name: Some(naming::operator_pod_name(self.app_name)),
                namespace: Some(self.namespace.to_string()),
                labels: Some(naming::operator_labels(self.app_name, self.version)),
                ..Default::default()
            },
            spec: Some(PodSpec {
                containers: vec![Container {
                    name: OPERATOR_CONTAINER_NAME.to_string(),
                    image: Some(self.operator_image_path.to_string()),
                    image_pull_policy: Some("IfNotPresent".to_string()),
                    env: Some(vec![EnvVar {
                        name: ENV_APPLICATION.to_string(),
                        value: Some(self.app_name.to_string()),
                        ..Default::default()
                    }]),
                    volume_mounts: Some(vec![VolumeMount {
                        name: config_vol_name.clone(),
                        mount_path: format!(
                            "{}/{}",
                            agent_dir(self.agent_path, self.app_name),
                            AGENT_CONF_FILE
                        ),
                        sub_path: Some(AGENT_CONF_FILE.to_string()),
                        ..Default::default()
                    }]),
                    ..Default::default()
                }],
                volumes: Some(vec![Volume {
                    name: config_vol_name,
                    config_map: Some(ConfigMapVolumeSource {
                        name: config_map_name,
                        items: Some(vec![KeyToPath {
                            key: AGENT_CONF_FILE.to_string(),
                            path: AGENT_CONF_FILE.to_string(),
                            ..Default::default()
                        }]),
                        ..Default::default()
                    }),
                    ..Default::default()
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
    fn builds_operator_pod_with_config_volume() {
        let pod = OperatorPodBuilder::new(
            "gitlab",
            "testing",
            "/var/lib/capstan",
            "capstan/operator:2.0",
            "2.0.0",
        )
        .build();

        assert_eq!(
            pod.metadata.name.as_deref(),
            Some("capstan-operator-gitlab")
        );
        let labels = pod.metadata.labels.as_ref().unwrap();
        assert_eq!(labels.get("capstan-operator"), Some(&"gitlab".to_string()));
        assert_eq!(labels.get("capstan-version"), Some(&"2.0.0".to_string()));

        let spec = pod.spec.as_ref().unwrap();
        let container = &spec.containers[0];
        assert_eq!(container.image.as_deref(), Some("capstan/operator:2.0"));
        let mount = &container.volume_mounts.as_ref().unwrap()[0];
        assert_eq!(
            mount.mount_path,
            "/var/lib/capstan/agents/application-gitlab/agent.conf"
        );
        assert_eq!(mount.sub_path.as_deref(), Some("agent.conf"));

        let volume = &spec.volumes.as_ref().unwrap()[0];
        assert_eq!(
            Some(volume.config_map.as_ref().unwrap().name.as_str()),
            Some("capstan-operator-gitlab-config")
        );
    }
}
