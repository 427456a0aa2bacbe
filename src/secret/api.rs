// This file is part of the terraform-provider-scaleway project
//
// Copyright (C) ANEO, 2024-2024. All rights reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License")
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

//! Typed subset of the Secret Manager API (`/secret-manager/v1beta1/regions/{region}`).

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::client::{ScalewayClient, ScalewayError};
use crate::locality::Region;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Secret {
    pub id: String,
    pub project_id: String,
    pub name: String,
    pub status: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub path: String,
    pub version_count: u32,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CreateSecretRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    pub name: String,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateSecretRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SecretVersion {
    pub revision: u32,
    pub secret_id: String,
    pub status: String,
    pub description: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

#[derive(Debug, Serialize)]
struct CreateVersionRequest<'d> {
    data: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'d str>,
}

#[derive(Debug, Serialize)]
struct UpdateVersionRequest<'d> {
    description: &'d str,
}

#[derive(Debug, Deserialize)]
struct AccessResponse {
    data: String,
}

/// Secret Manager API scoped to a region
#[derive(Debug, Clone)]
pub struct SecretApi<'c> {
    client: &'c ScalewayClient,
    base: String,
}

impl<'c> SecretApi<'c> {
    pub fn new(client: &'c ScalewayClient, region: &Region) -> Self {
        Self {
            client,
            base: format!("/secret-manager/v1beta1/regions/{region}"),
        }
    }

    pub async fn create_secret(
        &self,
        request: &CreateSecretRequest,
    ) -> Result<Secret, ScalewayError> {
        self.client
            .post(&format!("{}/secrets", self.base), request)
            .await
    }

    pub async fn get_secret(&self, id: &str) -> Result<Secret, ScalewayError> {
        self.client
            .get(&format!("{}/secrets/{id}", self.base))
            .await
    }

    pub async fn update_secret(
        &self,
        id: &str,
        request: &UpdateSecretRequest,
    ) -> Result<Secret, ScalewayError> {
        self.client
            .patch(&format!("{}/secrets/{id}", self.base), request)
            .await
    }

    pub async fn delete_secret(&self, id: &str) -> Result<(), ScalewayError> {
        self.client
            .delete(&format!("{}/secrets/{id}", self.base))
            .await
    }

    pub async fn create_version(
        &self,
        secret_id: &str,
        data: &[u8],
        description: Option<&str>,
    ) -> Result<SecretVersion, ScalewayError> {
        self.client
            .post(
                &format!("{}/secrets/{secret_id}/versions", self.base),
                &CreateVersionRequest {
                    data: STANDARD.encode(data),
                    description,
                },
            )
            .await
    }

    /// `revision` is a number or `latest`
    pub async fn get_version(
        &self,
        secret_id: &str,
        revision: &str,
    ) -> Result<SecretVersion, ScalewayError> {
        self.client
            .get(&format!(
                "{}/secrets/{secret_id}/versions/{revision}",
                self.base
            ))
            .await
    }

    pub async fn update_version(
        &self,
        secret_id: &str,
        revision: &str,
        description: &str,
    ) -> Result<SecretVersion, ScalewayError> {
        self.client
            .patch(
                &format!("{}/secrets/{secret_id}/versions/{revision}", self.base),
                &UpdateVersionRequest { description },
            )
            .await
    }

    pub async fn delete_version(
        &self,
        secret_id: &str,
        revision: &str,
    ) -> Result<(), ScalewayError> {
        self.client
            .delete(&format!(
                "{}/secrets/{secret_id}/versions/{revision}",
                self.base
            ))
            .await
    }

    /// Decoded payload of a version
    pub async fn access_version(
        &self,
        secret_id: &str,
        revision: &str,
    ) -> Result<Vec<u8>, ScalewayError> {
        let response: AccessResponse = self
            .client
            .get(&format!(
                "{}/secrets/{secret_id}/versions/{revision}/access",
                self.base
            ))
            .await?;
        STANDARD
            .decode(response.data.as_bytes())
            .map_err(|err| ScalewayError::Api {
                status: 200,
                message: format!("secret payload is not valid base64: {err}"),
            })
    }
}
