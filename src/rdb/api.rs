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

//! Typed subset of the Managed Database API (`/rdb/v1/regions/{region}`).

use serde::{Deserialize, Serialize};

use crate::client::{Paging, ScalewayClient, ScalewayError};
use crate::locality::Region;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Instance {
    pub id: String,
    pub name: String,
    pub organization_id: String,
    pub project_id: String,
    pub status: String,
    pub engine: String,
    pub node_type: String,
    pub is_ha_cluster: bool,
    pub tags: Vec<String>,
    pub endpoints: Vec<Endpoint>,
    pub volume: Volume,
    pub backup_schedule: BackupSchedule,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Endpoint {
    pub ip: Option<String>,
    pub port: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Volume {
    #[serde(rename = "type")]
    pub volume_type: String,
    pub size: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BackupSchedule {
    pub disabled: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CreateInstanceRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    pub name: String,
    pub engine: String,
    pub user_name: String,
    pub password: String,
    pub node_type: String,
    pub is_ha_cluster: bool,
    pub disable_backup: bool,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_size: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateInstanceRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_backup_schedule_disabled: Option<bool>,
}

impl UpdateInstanceRequest {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.tags.is_none() && self.is_backup_schedule_disabled.is_none()
    }
}

/// Exactly one field is set per upgrade
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpgradeInstanceRequest {
    NodeType(String),
    VolumeSize(u64),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Database {
    pub name: String,
    pub owner: String,
    pub managed: bool,
    pub size: u64,
}

#[derive(Debug, Serialize)]
struct CreateDatabaseRequest<'n> {
    name: &'n str,
}

#[derive(Debug, Serialize)]
struct UpdateUserRequest<'p> {
    password: &'p str,
}

/// Managed Database API scoped to a region
#[derive(Debug, Clone)]
pub struct RdbApi<'c> {
    client: &'c ScalewayClient,
    base: String,
}

impl<'c> RdbApi<'c> {
    pub fn new(client: &'c ScalewayClient, region: &Region) -> Self {
        Self {
            client,
            base: format!("/rdb/v1/regions/{region}"),
        }
    }

    pub async fn create_instance(
        &self,
        request: &CreateInstanceRequest,
    ) -> Result<Instance, ScalewayError> {
        self.client
            .post(&format!("{}/instances", self.base), request)
            .await
    }

    pub async fn get_instance(&self, id: &str) -> Result<Instance, ScalewayError> {
        self.client
            .get(&format!("{}/instances/{id}", self.base))
            .await
    }

    pub async fn update_instance(
        &self,
        id: &str,
        request: &UpdateInstanceRequest,
    ) -> Result<Instance, ScalewayError> {
        self.client
            .patch(&format!("{}/instances/{id}", self.base), request)
            .await
    }

    pub async fn upgrade_instance(
        &self,
        id: &str,
        request: &UpgradeInstanceRequest,
    ) -> Result<Instance, ScalewayError> {
        self.client
            .post(&format!("{}/instances/{id}/upgrade", self.base), request)
            .await
    }

    pub async fn delete_instance(&self, id: &str) -> Result<(), ScalewayError> {
        self.client
            .delete(&format!("{}/instances/{id}", self.base))
            .await
    }

    pub async fn update_user_password(
        &self,
        instance_id: &str,
        user_name: &str,
        password: &str,
    ) -> Result<(), ScalewayError> {
        let _: serde_json::Value = self
            .client
            .patch(
                &format!("{}/instances/{instance_id}/users/{user_name}", self.base),
                &UpdateUserRequest { password },
            )
            .await?;
        Ok(())
    }

    pub async fn create_database(
        &self,
        instance_id: &str,
        name: &str,
    ) -> Result<Database, ScalewayError> {
        self.client
            .post(
                &format!("{}/instances/{instance_id}/databases", self.base),
                &CreateDatabaseRequest { name },
            )
            .await
    }

    /// Database named exactly `name`, as the API filters on substrings
    pub async fn find_database(
        &self,
        instance_id: &str,
        name: &str,
    ) -> Result<Option<Database>, ScalewayError> {
        let databases: Vec<Database> = self
            .client
            .list_all(
                &format!("{}/instances/{instance_id}/databases", self.base),
                &[("name", name.to_owned())],
                "databases",
                Paging::PageSize,
            )
            .await?;
        Ok(databases.into_iter().find(|database| database.name == name))
    }

    pub async fn delete_database(
        &self,
        instance_id: &str,
        name: &str,
    ) -> Result<(), ScalewayError> {
        self.client
            .delete(&format!(
                "{}/instances/{instance_id}/databases/{name}",
                self.base
            ))
            .await
    }
}
