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

use std::collections::HashMap;

use capstan_kube::*;

fn test_pod_params() -> PodParams {
    PodParams::from_yaml(
        r#"
containers:
  - name: web
    image: nginx:1.27
    ports:
      - container-port: 80
        protocol: TCP
"#,
    )
    .expect("valid pod params")
}

fn test_config() -> DeploymentConfig {
    DeploymentConfig::from_attributes(&HashMap::new()).expect("valid config")
}

#[test]
fn service_params_default_to_no_storage() {
    let params = ServiceParams {
        pod: test_pod_params(),
        filesystems: Vec::new(),
    };
    assert!(params.filesystems.is_empty());
    assert!(!params.pod.omit_service_frontend);
}

#[test]
fn workload_status_derives_from_phase_and_deletion_marker() {
    assert_eq!(
        WorkloadStatus::from_pod_phase(Some("Failed"), false),
        WorkloadStatus::Error
    );
    assert_eq!(
        WorkloadStatus::from_pod_phase(Some("Failed"), true),
        WorkloadStatus::Terminated
    );
}

#[tokio::test]
#[ignore] // Requires Kubernetes cluster
async fn test_namespace_lifecycle() {
    tracing_subscriber::fmt::try_init().ok();
    let broker = KubeBroker::try_default("capstan-testing")
        .await
        .expect("Failed to create broker");

    broker
        .ensure_namespace()
        .await
        .expect("Failed to ensure namespace");
    // Second ensure must be a no-op, not a conflict.
    broker
        .ensure_namespace()
        .await
        .expect("Failed to re-ensure namespace");
}

#[tokio::test]
#[ignore] // Requires Kubernetes cluster
async fn test_ensure_service_is_idempotent() {
    tracing_subscriber::fmt::try_init().ok();
    let broker = KubeBroker::try_default("capstan-testing")
        .await
        .expect("Failed to create broker");
    broker.ensure_namespace().await.expect("namespace");

    let params = ServiceParams {
        pod: test_pod_params(),
        filesystems: Vec::new(),
    };
    broker
        .ensure_service("web", &params, 2, &test_config())
        .await
        .expect("first ensure");
    broker
        .ensure_service("web", &params, 2, &test_config())
        .await
        .expect("second ensure");

    let info = broker.service("web").await.expect("service info");
    assert!(!info.id.is_empty());

    broker.delete_service("web").await.expect("delete");
    // Deleting again must succeed: not-found is a normal outcome.
    broker.delete_service("web").await.expect("repeat delete");
}

#[tokio::test]
#[ignore] // Requires Kubernetes cluster with a default storage class
async fn test_service_storage_binds_once_and_is_reused() {
    tracing_subscriber::fmt::try_init().ok();
    let broker = KubeBroker::try_default("capstan-testing")
        .await
        .expect("Failed to create broker");
    broker.ensure_namespace().await.expect("namespace");

    let params = ServiceParams {
        pod: test_pod_params(),
        filesystems: vec![FilesystemParams {
            tag: "data-0".to_string(),
            size_mi: 16,
            storage_class: None,
            storage_label: None,
            mount_path: None,
        }],
    };
    broker
        .ensure_service("web", &params, 1, &test_config())
        .await
        .expect("first ensure");
    // The second call must reuse the bound claim instead of re-resolving
    // through the class search.
    broker
        .ensure_service("web", &params, 1, &test_config())
        .await
        .expect("second ensure");

    broker.delete_service("web").await.expect("delete");
}

#[tokio::test]
#[ignore] // Requires Kubernetes cluster
async fn test_rejects_bad_inputs_before_any_work() {
    let broker = KubeBroker::try_default("capstan-testing")
        .await
        .expect("Failed to create broker");

    let params = ServiceParams {
        pod: test_pod_params(),
        filesystems: Vec::new(),
    };
    let err = broker
        .ensure_service("web", &params, 0, &test_config())
        .await
        .unwrap_err();
    assert!(matches!(err, BrokerError::InvalidInput(_)));

    let empty = ServiceParams::default();
    let err = broker
        .ensure_service("web", &empty, 1, &test_config())
        .await
        .unwrap_err();
    assert!(matches!(err, BrokerError::InvalidInput(_)));
}

#[tokio::test]
#[ignore] // Requires Kubernetes cluster
async fn test_expose_requires_hostname() {
    let broker = KubeBroker::try_default("capstan-testing")
        .await
        .expect("Failed to create broker");

    let err = broker
        .expose_service("web", &test_config())
        .await
        .unwrap_err();
    assert!(matches!(err, BrokerError::MissingHostname));
}

#[tokio::test]
#[ignore] // Requires Kubernetes cluster
async fn test_unit_lifecycle() {
    tracing_subscriber::fmt::try_init().ok();
    let broker = KubeBroker::try_default("capstan-testing")
        .await
        .expect("Failed to create broker");
    broker.ensure_namespace().await.expect("namespace");

    broker
        .ensure_unit("web", "web/0", &test_pod_params())
        .await
        .expect("ensure unit");
    // Re-ensuring replaces the pod rather than failing on the existing one.
    broker
        .ensure_unit("web", "web/0", &test_pod_params())
        .await
        .expect("re-ensure unit");

    let units = broker.units("web").await.expect("list units");
    assert!(units
        .iter()
        .any(|u| u.unit_name.as_deref() == Some("web/0")));

    broker.delete_unit("web/0").await.expect("delete unit");
    broker.delete_unit("web/0").await.expect("repeat delete");
}

#[tokio::test]
#[ignore] // Requires Kubernetes cluster
async fn test_watch_units_delivers_changes() {
    tracing_subscriber::fmt::try_init().ok();
    let broker = KubeBroker::try_default("capstan-testing")
        .await
        .expect("Failed to create broker");
    broker.ensure_namespace().await.expect("namespace");

    let mut watcher = broker.watch_units("web").await.expect("watch");
    broker
        .ensure_unit("web", "web/0", &test_pod_params())
        .await
        .expect("ensure unit");

    let change = watcher.recv().await.expect("change notification");
    assert_eq!(change.pod_name, "capstan-unit-web-0");

    watcher.close();
    broker.delete_unit("web/0").await.expect("delete unit");
}
