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

//! The broker context: an already-authenticated Kubernetes client plus the
//! namespace all resources of one deployment target live in. The context is
//! passed explicitly to every operation, so one process can drive multiple
//! namespace targets concurrently.

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{
    ConfigMap, Namespace, PersistentVolume, PersistentVolumeClaim, Pod, Service,
};
use k8s_openapi::api::networking::v1::Ingress;
use k8s_openapi::api::storage::v1::StorageClass;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::{Api, Client};
use tracing::debug;

use crate::domain::app::{
    OperatorConfig, PodParams, ServiceInfo, ServiceParams, UnitInfo,
};
use crate::domain::config::DeploymentConfig;
use crate::infrastructure::kubernetes::observe::UnitWatcher;
use crate::infrastructure::kubernetes::reconcile;
use crate::shared::error::{BrokerError, Result};

/// Boundary surface of the orchestration layer. All operations are
/// synchronous request/response round trips except [`Broker::watch_units`].
#[async_trait::async_trait]
pub trait Broker: Send + Sync {
    async fn ensure_namespace(&self) -> Result<()>;

    /// Destroys the namespace and, by cascade, everything inside it.
    async fn destroy(&self) -> Result<()>;

    async fn ensure_operator(
        &self,
        app_name: &str,
        agent_path: &str,
        config: &OperatorConfig,
    ) -> Result<()>;

    async fn delete_operator(&self, app_name: &str) -> Result<()>;

    async fn ensure_service(
        &self,
        app_name: &str,
        params: &ServiceParams,
        replica_count: i32,
        config: &DeploymentConfig,
    ) -> Result<()>;

    async fn delete_service(&self, app_name: &str) -> Result<()>;

    async fn expose_service(&self, app_name: &str, config: &DeploymentConfig) -> Result<()>;

    async fn unexpose_service(&self, app_name: &str) -> Result<()>;

    async fn ensure_unit(
        &self,
        app_name: &str,
        unit_name: &str,
        params: &PodParams,
    ) -> Result<()>;

    async fn delete_unit(&self, unit_name: &str) -> Result<()>;

    async fn units(&self, app_name: &str) -> Result<Vec<UnitInfo>>;

    async fn service(&self, app_name: &str) -> Result<ServiceInfo>;

    async fn watch_units(&self, app_name: &str) -> Result<UnitWatcher>;
}

/// Kubernetes-backed [`Broker`].
pub struct KubeBroker {
    pub(crate) client: Client,
    pub(crate) namespace: String,
}

impl KubeBroker {
    /// Creates a broker from the ambient kubeconfig or in-cluster
    /// environment.
    pub async fn try_default(namespace: impl Into<String>) -> Result<Self> {
        let client = Client::try_default()
            .await
            .map_err(|e| BrokerError::Client(format!("failed to create Kubernetes client: {}", e)))?;
        Ok(Self::new(client, namespace))
    }

    /// Creates a broker from an explicit kubeconfig file and context.
    pub async fn from_kubeconfig(
        namespace: impl Into<String>,
        kubeconfig_path: Option<String>,
        context: Option<String>,
    ) -> Result<Self> {
        use kube::config::{KubeConfigOptions, Kubeconfig};

        let kubeconfig = if let Some(path) = kubeconfig_path {
            Kubeconfig::read_from(path)
                .map_err(|e| BrokerError::Client(format!("failed to load kubeconfig: {}", e)))?
        } else {
            Kubeconfig::read()
                .map_err(|e| BrokerError::Client(format!("failed to load kubeconfig: {}", e)))?
        };

        let options = KubeConfigOptions {
            context,
            cluster: None,
            user: None,
        };
        let config = kube::Config::from_custom_kubeconfig(kubeconfig, &options)
            .await
            .map_err(|e| BrokerError::Client(format!("failed to create Kubernetes config: {}", e)))?;
        let client = Client::try_from(config)
            .map_err(|e| BrokerError::Client(format!("failed to create Kubernetes client: {}", e)))?;
        Ok(Self::new(client, namespace))
    }

    /// Wraps an existing client handle.
    pub fn new(client: Client, namespace: impl Into<String>) -> Self {
        Self {
            client,
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub(crate) fn pods(&self) -> Api<Pod> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    pub(crate) fn services(&self) -> Api<Service> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    pub(crate) fn config_maps(&self) -> Api<ConfigMap> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    pub(crate) fn deployments(&self) -> Api<Deployment> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    pub(crate) fn ingresses(&self) -> Api<Ingress> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    pub(crate) fn volume_claims(&self) -> Api<PersistentVolumeClaim> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    pub(crate) fn persistent_volumes(&self) -> Api<PersistentVolume> {
        Api::all(self.client.clone())
    }

    pub(crate) fn storage_classes(&self) -> Api<StorageClass> {
        Api::all(self.client.clone())
    }

    fn namespaces(&self) -> Api<Namespace> {
        Api::all(self.client.clone())
    }

    /// Ensures this broker's namespace exists.
    pub async fn ensure_namespace(&self) -> Result<()> {
        let ns = Namespace {
            metadata: ObjectMeta {
                name: Some(self.namespace.clone()),
                ..Default::default()
            },
            ..Default::default()
        };
        reconcile::ensure(&self.namespaces(), &ns).await?;
        Ok(())
    }

    /// Deletes the namespace. Every resource this broker provisioned lives
    /// inside it, so the cascade removes them all.
    pub async fn destroy(&self) -> Result<()> {
        debug!("destroying namespace {}", self.namespace);
        reconcile::delete_ignore_missing(&self.namespaces(), &self.namespace).await
    }
}

#[async_trait::async_trait]
impl Broker for KubeBroker {
    async fn ensure_namespace(&self) -> Result<()> {
        KubeBroker::ensure_namespace(self).await
    }

    async fn destroy(&self) -> Result<()> {
        KubeBroker::destroy(self).await
    }

    async fn ensure_operator(
        &self,
        app_name: &str,
        agent_path: &str,
        config: &OperatorConfig,
    ) -> Result<()> {
        KubeBroker::ensure_operator(self, app_name, agent_path, config).await
    }

    async fn delete_operator(&self, app_name: &str) -> Result<()> {
        KubeBroker::delete_operator(self, app_name).await
    }

    async fn ensure_service(
        &self,
        app_name: &str,
        params: &ServiceParams,
        replica_count: i32,
        config: &DeploymentConfig,
    ) -> Result<()> {
        KubeBroker::ensure_service(self, app_name, params, replica_count, config).await
    }

    async fn delete_service(&self, app_name: &str) -> Result<()> {
        KubeBroker::delete_service(self, app_name).await
    }

    async fn expose_service(&self, app_name: &str, config: &DeploymentConfig) -> Result<()> {
        KubeBroker::expose_service(self, app_name, config).await
    }

    async fn unexpose_service(&self, app_name: &str) -> Result<()> {
        KubeBroker::unexpose_service(self, app_name).await
    }

    async fn ensure_unit(
        &self,
        app_name: &str,
        unit_name: &str,
        params: &PodParams,
    ) -> Result<()> {
        KubeBroker::ensure_unit(self, app_name, unit_name, params).await
    }

    async fn delete_unit(&self, unit_name: &str) -> Result<()> {
        KubeBroker::delete_unit(self, unit_name).await
    }

    async fn units(&self, app_name: &str) -> Result<Vec<UnitInfo>> {
        KubeBroker::units(self, app_name).await
    }

    async fn service(&self, app_name: &str) -> Result<ServiceInfo> {
        KubeBroker::service(self, app_name).await
    }

    async fn watch_units(&self, app_name: &str) -> Result<UnitWatcher> {
        KubeBroker::watch_units(self, app_name).await
    }
}
