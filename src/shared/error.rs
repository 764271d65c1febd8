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

use thiserror::Error;

pub type Result<T> = std::result::Result<T, BrokerError>;

#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("Kubernetes API error during {operation} of {kind} '{name}': {message}")]
    Api {
        operation: String,
        kind: String,
        name: String,
        message: String,
    },

    #[error("Kubernetes client error: {0}")]
    Client(String),

    #[error("Resource not found: {kind} '{name}' in namespace '{namespace}'")]
    NotFound {
        kind: String,
        name: String,
        namespace: String,
    },

    #[error(
        "cannot create persistent volume: no storage class matching {labels:?} exists \
         and no default storage class is defined"
    )]
    NoMatchingStorageClass { labels: Vec<String> },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid capacity '{value}'")]
    InvalidQuantity { value: String },

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("external hostname required")]
    MissingHostname,

    #[error("cannot create ingress rule for service '{service}' without a port")]
    PortlessService { service: String },

    #[error("operator pod '{name}' runs version '{running}', cannot update in place to '{target}'")]
    VersionMismatch {
        name: String,
        running: String,
        target: String,
    },

    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("JSON serialization error: {0}")]
    JsonSerialize(#[from] serde_json::Error),
}

impl From<kube::Error> for BrokerError {
    fn from(err: kube::Error) -> Self {
        BrokerError::Client(err.to_string())
    }
}

impl BrokerError {
    pub fn api(
        operation: impl Into<String>,
        kind: impl Into<String>,
        name: impl Into<String>,
        err: &kube::Error,
    ) -> Self {
        Self::Api {
            operation: operation.into(),
            kind: kind.into(),
            name: name.into(),
            message: err.to_string(),
        }
    }

    pub fn not_found(
        kind: impl Into<String>,
        name: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self::NotFound {
            kind: kind.into(),
            name: name.into(),
            namespace: namespace.into(),
        }
    }

    pub fn invalid_input(context: impl Into<String>) -> Self {
        Self::InvalidInput(context.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Whether a raw kube error is the API server's 404 response.
pub(crate) fn is_api_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(ae) if ae.code == 404)
}
