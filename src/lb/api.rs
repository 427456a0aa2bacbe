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

//! Typed subset of the Load Balancer API (`/lb/v1/zones/{zone}`).

use serde::{Deserialize, Serialize};

use crate::client::{ScalewayClient, ScalewayError};
use crate::locality::Zone;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Lb {
    pub id: String,
    pub name: String,
    pub description: String,
    pub organization_id: String,
    pub project_id: String,
    pub status: String,
    #[serde(rename = "type")]
    pub lb_type: String,
    pub tags: Vec<String>,
    pub ip: Vec<LbIp>,
    pub ssl_compatibility_level: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LbIp {
    pub id: String,
    pub ip_address: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CreateLbRequest {
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_id: Option<String>,
    pub tags: Vec<String>,
    #[serde(rename = "type")]
    pub lb_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssl_compatibility_level: Option<String>,
}

/// Full replacement of the mutable fields
#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateLbRequest {
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssl_compatibility_level: Option<String>,
}

#[derive(Debug, Serialize)]
struct MigrateRequest<'t> {
    #[serde(rename = "type")]
    lb_type: &'t str,
}

/// Load Balancer API scoped to a zone
#[derive(Debug, Clone)]
pub struct LbApi<'c> {
    client: &'c ScalewayClient,
    base: String,
}

impl<'c> LbApi<'c> {
    pub fn new(client: &'c ScalewayClient, zone: &Zone) -> Self {
        Self {
            client,
            base: format!("/lb/v1/zones/{zone}"),
        }
    }

    pub async fn create_lb(&self, request: &CreateLbRequest) -> Result<Lb, ScalewayError> {
        self.client
            .post(&format!("{}/lbs", self.base), request)
            .await
    }

    pub async fn get_lb(&self, id: &str) -> Result<Lb, ScalewayError> {
        self.client.get(&format!("{}/lbs/{id}", self.base)).await
    }

    pub async fn update_lb(
        &self,
        id: &str,
        request: &UpdateLbRequest,
    ) -> Result<Lb, ScalewayError> {
        self.client
            .put(&format!("{}/lbs/{id}", self.base), request)
            .await
    }

    pub async fn migrate_lb(&self, id: &str, lb_type: &str) -> Result<Lb, ScalewayError> {
        self.client
            .post(
                &format!("{}/lbs/{id}/migrate", self.base),
                &MigrateRequest { lb_type },
            )
            .await
    }

    pub async fn delete_lb(&self, id: &str, release_ip: bool) -> Result<(), ScalewayError> {
        self.client
            .delete_query(
                &format!("{}/lbs/{id}", self.base),
                &[("release_ip", release_ip.to_string())],
            )
            .await
    }
}
