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

//! Typed subset of the IAM API (`/iam/v1alpha1`), which is global.

use serde::{Deserialize, Serialize};

use crate::client::{ScalewayClient, ScalewayError};

const BASE: &str = "/iam/v1alpha1";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Application {
    pub id: String,
    pub name: String,
    pub description: String,
    pub organization_id: String,
    pub editable: bool,
    pub tags: Vec<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CreateApplicationRequest {
    pub name: String,
    pub organization_id: String,
    pub description: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateApplicationRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ApiKey {
    pub access_key: String,
    /// Only returned on creation
    pub secret_key: Option<String>,
    pub application_id: Option<String>,
    pub user_id: Option<String>,
    pub description: String,
    pub default_project_id: Option<String>,
    pub editable: bool,
    pub creation_ip: Option<String>,
    pub expires_at: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CreateApiKeyRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_project_id: Option<String>,
    pub description: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateApiKeyRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_project_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct IamApi<'c> {
    client: &'c ScalewayClient,
}

impl<'c> IamApi<'c> {
    pub fn new(client: &'c ScalewayClient) -> Self {
        Self { client }
    }

    pub async fn create_application(
        &self,
        request: &CreateApplicationRequest,
    ) -> Result<Application, ScalewayError> {
        self.client
            .post(&format!("{BASE}/applications"), request)
            .await
    }

    pub async fn get_application(&self, id: &str) -> Result<Application, ScalewayError> {
        self.client.get(&format!("{BASE}/applications/{id}")).await
    }

    pub async fn update_application(
        &self,
        id: &str,
        request: &UpdateApplicationRequest,
    ) -> Result<Application, ScalewayError> {
        self.client
            .patch(&format!("{BASE}/applications/{id}"), request)
            .await
    }

    pub async fn delete_application(&self, id: &str) -> Result<(), ScalewayError> {
        self.client.delete(&format!("{BASE}/applications/{id}")).await
    }

    pub async fn create_api_key(
        &self,
        request: &CreateApiKeyRequest,
    ) -> Result<ApiKey, ScalewayError> {
        self.client.post(&format!("{BASE}/api-keys"), request).await
    }

    pub async fn get_api_key(&self, access_key: &str) -> Result<ApiKey, ScalewayError> {
        self.client
            .get(&format!("{BASE}/api-keys/{access_key}"))
            .await
    }

    pub async fn update_api_key(
        &self,
        access_key: &str,
        request: &UpdateApiKeyRequest,
    ) -> Result<ApiKey, ScalewayError> {
        self.client
            .patch(&format!("{BASE}/api-keys/{access_key}"), request)
            .await
    }

    pub async fn delete_api_key(&self, access_key: &str) -> Result<(), ScalewayError> {
        self.client
            .delete(&format!("{BASE}/api-keys/{access_key}"))
            .await
    }
}
