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

//! Composition of container/port/file/storage parameters into a replicated
//! workload plus its exposing service and ingress rule. Multi-step creation
//! keeps a stack of release actions; on failure the stack is run in reverse
//! creation order, on success it is discarded.

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    ConfigMapVolumeSource, PodSpec, PodTemplateSpec, Service, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use kube::api::ListParams;
use tracing::{debug, warn};

use crate::domain::app::{
    Address, AddressScope, ContainerParams, FilesystemParams, ServiceInfo, ServiceParams,
};
use crate::domain::config::DeploymentConfig;
use crate::infrastructure::constants::STORAGE_BASE_DIR;
use crate::infrastructure::kubernetes::broker::KubeBroker;
use crate::infrastructure::kubernetes::reconcile;
use crate::infrastructure::kubernetes::resources::ingress::IngressBuilder;
use crate::infrastructure::kubernetes::resources::service::ServiceBuilder;
use crate::infrastructure::kubernetes::resources::{config_map, naming, pod};
use crate::infrastructure::kubernetes::storage::VolumeParams;
use crate::shared::error::{is_api_not_found, BrokerError, Result};

/// Compensating delete for one resource created earlier in a failed
/// multi-step operation.
enum Release {
    Deployment(String),
}

#[derive(Default)]
struct CleanupStack {
    releases: Vec<Release>,
}

impl CleanupStack {
    fn push(&mut self, release: Release) {
        self.releases.push(release);
    }
}

impl KubeBroker {
    /// Creates or updates everything backing an application: storage
    /// claims, file-set config objects, the replicated workload, and
    /// (unless opted out) the exposing service.
    pub async fn ensure_service(
        &self,
        app_name: &str,
        params: &ServiceParams,
        replica_count: i32,
        config: &DeploymentConfig,
    ) -> Result<()> {
        debug!("creating/updating application {}", app_name);

        naming::validate_application_name(app_name)?;
        if replica_count <= 0 {
            return Err(BrokerError::invalid_input("replica count must be > 0"));
        }
        if params.pod.containers.is_empty() {
            return Err(BrokerError::invalid_input("missing pod spec"));
        }

        let mut pod_spec = pod::build_pod_spec(&params.pod)?;
        self.configure_storage(&mut pod_spec, app_name, &params.filesystems)
            .await?;

        let mut cleanups = CleanupStack::default();
        let result = self
            .ensure_service_resources(app_name, params, replica_count, config, pod_spec, &mut cleanups)
            .await;
        if result.is_err() {
            self.run_cleanups(cleanups).await;
        }
        result
    }

    async fn ensure_service_resources(
        &self,
        app_name: &str,
        params: &ServiceParams,
        replica_count: i32,
        config: &DeploymentConfig,
        pod_spec: PodSpec,
        cleanups: &mut CleanupStack,
    ) -> Result<()> {
        let container_ports = pod::nonzero_container_ports(&pod_spec);

        self.configure_deployment(app_name, pod_spec, &params.pod.containers, replica_count)
            .await?;
        cleanups.push(Release::Deployment(naming::deployment_name(app_name)));

        if !params.pod.omit_service_frontend {
            debug!("creating/updating service for {}", app_name);
            let service =
                ServiceBuilder::new(app_name, &self.namespace, &container_ports, config).build();
            reconcile::ensure_service(&self.services(), &service).await?;
        }
        Ok(())
    }

    /// Rollback of already-created resources, best effort: failures are
    /// logged and never mask the error that triggered the rollback.
    async fn run_cleanups(&self, stack: CleanupStack) {
        for release in stack.releases.into_iter().rev() {
            let result = match release {
                Release::Deployment(name) => {
                    reconcile::delete_ignore_missing(&self.deployments(), &name).await
                }
            };
            if let Err(err) = result {
                warn!("cleanup after failed operation: {}", err);
            }
        }
    }

    /// Resolves each requested filesystem to a durable volume and mounts it
    /// on the first container.
    async fn configure_storage(
        &self,
        pod_spec: &mut PodSpec,
        app_name: &str,
        filesystems: &[FilesystemParams],
    ) -> Result<()> {
        for (i, fs) in filesystems.iter().enumerate() {
            let mount_path = fs.mount_path.clone().unwrap_or_else(|| {
                format!("{}/fs/{}/{}", STORAGE_BASE_DIR, app_name, fs.tag)
            });
            let volume_name = format!("{}-fsvolume-{}", app_name, i);
            let mut storage_labels = vec![
                format!("{}-unit-storage", app_name),
                self.namespace.clone(),
                "default".to_string(),
            ];
            if let Some(label) = &fs.storage_label {
                storage_labels.insert(0, label.clone());
            }
            let volume_params = VolumeParams {
                storage_labels,
                storage_class: fs.storage_class.clone(),
                claim_name: format!("{}-claim", volume_name),
                volume_name,
                volume_size: format!("{}Mi", fs.size_mi),
                labels: naming::application_labels(app_name),
                access_mode: None,
            };
            let volume = self.resolve_volume(&volume_params).await?;
            debug!(
                "using persistent volume {} for {} filesystem {}",
                volume.name, app_name, fs.tag
            );
            let mount = VolumeMount {
                name: volume.name.clone(),
                mount_path,
                ..Default::default()
            };
            pod_spec.volumes.get_or_insert_with(Vec::new).push(volume);
            let first = pod_spec
                .containers
                .first_mut()
                .ok_or_else(|| BrokerError::invalid_input("missing pod spec"))?;
            first.volume_mounts.get_or_insert_with(Vec::new).push(mount);
        }
        Ok(())
    }

    /// Projects every declared file set into a config object and mounts it
    /// at the requested path. Shared by the workload and unit paths, which
    /// differ only in how config object names derive.
    pub(crate) async fn configure_pod_files<F>(
        &self,
        pod_spec: &mut PodSpec,
        containers: &[ContainerParams],
        config_map_name: F,
    ) -> Result<()>
    where
        F: Fn(&str) -> String,
    {
        for (i, container) in containers.iter().enumerate() {
            for file_set in &container.files {
                let cfg_name = config_map_name(&file_set.name);
                let cm = config_map::fileset_config_map(&cfg_name, &self.namespace, file_set);
                reconcile::ensure(&self.config_maps(), &cm).await?;

                pod_spec.volumes.get_or_insert_with(Vec::new).push(Volume {
                    name: cfg_name.clone(),
                    config_map: Some(ConfigMapVolumeSource {
                        name: cfg_name.clone(),
                        ..Default::default()
                    }),
                    ..Default::default()
                });
                pod_spec.containers[i]
                    .volume_mounts
                    .get_or_insert_with(Vec::new)
                    .push(VolumeMount {
                        name: cfg_name,
                        mount_path: file_set.mount_path.clone(),
                        ..Default::default()
                    });
            }
        }
        Ok(())
    }

    async fn configure_deployment(
        &self,
        app_name: &str,
        mut pod_spec: PodSpec,
        containers: &[ContainerParams],
        replicas: i32,
    ) -> Result<()> {
        debug!("creating/updating deployment for {}", app_name);

        self.configure_pod_files(&mut pod_spec, containers, |file_set| {
            naming::application_config_map_name(app_name, file_set)
        })
        .await?;

        let labels = naming::application_labels(app_name);
        let deployment = Deployment {
            metadata: ObjectMeta {
                name: Some(naming::deployment_name(app_name)),
                namespace: Some(self.namespace.clone()),
                labels: Some(labels.clone()),
                ..Default::default()
            },
            spec: Some(DeploymentSpec {
                replicas: Some(replicas),
                selector: LabelSelector {
                    match_labels: Some(labels.clone()),
                    ..Default::default()
                },
                template: PodTemplateSpec {
                    metadata: Some(ObjectMeta {
                        generate_name: Some(naming::resource_name_prefix(app_name)),
                        labels: Some(labels),
                        ..Default::default()
                    }),
                    spec: Some(pod_spec),
                },
                ..Default::default()
            }),
            ..Default::default()
        };
        reconcile::ensure(&self.deployments(), &deployment).await?;
        Ok(())
    }

    /// Deletes the application's service and workload, service first so no
    /// endpoints outlive their backing controller.
    pub async fn delete_service(&self, app_name: &str) -> Result<()> {
        debug!("deleting application {}", app_name);
        let name = naming::deployment_name(app_name);
        reconcile::delete_ignore_missing(&self.services(), &name).await?;
        reconcile::delete_ignore_missing(&self.deployments(), &name).await
    }

    /// Sets up external access to the application through an ingress rule
    /// routing the configured hostname and path to its service.
    pub async fn expose_service(&self, app_name: &str, config: &DeploymentConfig) -> Result<()> {
        debug!("creating/updating ingress resource for {}", app_name);

        let host = config
            .external_hostname
            .clone()
            .ok_or(BrokerError::MissingHostname)?;

        let service_name = naming::deployment_name(app_name);
        let service = self.services().get(&service_name).await.map_err(|err| {
            if is_api_not_found(&err) {
                BrokerError::not_found("Service", service_name.as_str(), self.namespace.as_str())
            } else {
                BrokerError::api("get", "Service", service_name.as_str(), &err)
            }
        })?;
        let ports = service.spec.and_then(|s| s.ports).unwrap_or_default();
        let Some(first_port) = ports.first() else {
            return Err(BrokerError::PortlessService {
                service: service_name,
            });
        };

        let ingress = IngressBuilder::new(
            app_name,
            &self.namespace,
            &host,
            &service_name,
            first_port.port,
            config,
        )
        .build();
        reconcile::ensure(&self.ingresses(), &ingress).await?;
        Ok(())
    }

    /// Removes external access to the application.
    pub async fn unexpose_service(&self, app_name: &str) -> Result<()> {
        debug!("deleting ingress resource for {}", app_name);
        reconcile::delete_ignore_missing(&self.ingresses(), &naming::deployment_name(app_name))
            .await
    }

    /// Returns the observed state of the application's exposing service.
    pub async fn service(&self, app_name: &str) -> Result<ServiceInfo> {
        let lp = ListParams::default().labels(&naming::application_selector(app_name));
        let services = self
            .services()
            .list(&lp)
            .await
            .map_err(|e| BrokerError::api("list", "Service", app_name, &e))?;
        let Some(service) = services.items.into_iter().next() else {
            return Err(BrokerError::not_found(
                "Service",
                app_name,
                self.namespace.as_str(),
            ));
        };
        Ok(ServiceInfo {
            id: service.metadata.uid.clone().unwrap_or_default(),
            addresses: service_addresses(&service),
        })
    }
}

/// Projects the cluster-assigned and configured addresses of a service into
/// the domain's address list.
fn service_addresses(service: &Service) -> Vec<Address> {
    let mut addresses = Vec::new();
    let Some(spec) = service.spec.as_ref() else {
        return addresses;
    };
    if let Some(cluster_ip) = spec.cluster_ip.as_deref() {
        if !cluster_ip.is_empty() && cluster_ip != "None" {
            addresses.push(Address {
                value: cluster_ip.to_string(),
                scope: AddressScope::Local,
            });
        }
    }
    if let Some(lb_ip) = spec.load_balancer_ip.as_deref() {
        if !lb_ip.is_empty() {
            addresses.push(Address {
                value: lb_ip.to_string(),
                scope: AddressScope::Public,
            });
        }
    }
    for external_ip in spec.external_ips.iter().flatten() {
        addresses.push(Address {
            value: external_ip.clone(),
            scope: AddressScope::Public,
        });
    }
    addresses
}
