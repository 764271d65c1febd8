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

/// Field manager name used for server-side-apply patches.
pub const FIELD_MANAGER: &str = "capstan-kube";

/// Resource labels
pub const LABEL_APPLICATION: &str = "capstan-application";
pub const LABEL_OPERATOR: &str = "capstan-operator";
pub const LABEL_UNIT: &str = "capstan-unit";
pub const LABEL_VERSION: &str = "capstan-version";
pub const LABEL_STORAGE: &str = "capstan-storage";

/// Resource name prefix
pub const RESOURCE_PREFIX: &str = "capstan";

/// Operator settings
pub const OPERATOR_CONTAINER_NAME: &str = "capstan-operator";
pub const OPERATOR_STORAGE_CLASS: &str = "capstan-operator-storage";
pub const OPERATOR_STORAGE_SIZE: &str = "10Mi";
pub const ENV_APPLICATION: &str = "CAPSTAN_APPLICATION";
pub const AGENT_CONF_FILE: &str = "agent.conf";

/// Filesystem mount base for storage attachments without an explicit path
pub const STORAGE_BASE_DIR: &str = "/var/lib/capstan/storage";

/// Default resource settings
pub const DEFAULT_ACCESS_MODE: &str = "ReadWriteOnce";
pub const DEFAULT_INGRESS_CLASS: &str = "nginx";

/// Sentinel meaning "derive the ingress path from the application name".
pub const APPLICATION_PATH_SENTINEL: &str = "$appname";

/// Annotation marking a cluster's default storage class.
pub const DEFAULT_STORAGE_CLASS_ANNOTATION: &str = "storageclass.kubernetes.io/is-default-class";

/// Pod deletion polling: fixed delay between polls and total attempt budget.
pub const POD_DELETE_POLL_SECS: u64 = 5;
pub const POD_DELETE_MAX_POLLS: usize = 24;
