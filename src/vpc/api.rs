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

//! Typed subset of the VPC (`/vpc/v2/regions/{region}`) and Public Gateway
//! (`/vpc-gw/v1/zones/{zone}`) APIs.

use serde::{Deserialize, Serialize};

use crate::client::{Paging, ScalewayClient, ScalewayError};
use crate::locality::{Region, Zone};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PrivateNetwork {
    pub id: String,
    pub name: String,
    pub organization_id: String,
    pub project_id: String,
    pub tags: Vec<String>,
    pub subnets: Vec<Subnet>,
    pub vpc_id: String,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Subnet {
    pub id: String,
    pub subnet: String,
}

impl PrivateNetwork {
    /// First IPv4 subnet of the network
    pub fn ipv4_subnet(&self) -> Option<&str> {
        self.subnets
            .iter()
            .map(|subnet| subnet.subnet.as_str())
            .find(|subnet| !subnet.contains(':'))
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CreatePrivateNetworkRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub subnets: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vpc_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdatePrivateNetworkRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Gateway {
    pub id: String,
    pub name: String,
    pub organization_id: String,
    pub project_id: String,
    #[serde(rename = "type")]
    pub gateway_type: GatewayType,
    pub status: String,
    pub tags: Vec<String>,
    pub ip: Option<GatewayIp>,
    pub bastion_enabled: bool,
    pub bastion_port: u32,
    pub smtp_enabled: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GatewayType {
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GatewayIp {
    pub id: String,
    pub address: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CreateGatewayRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    pub tags: Vec<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub gateway_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_id: Option<String>,
    pub enable_smtp: bool,
    pub enable_bastion: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bastion_port: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateGatewayRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_bastion: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bastion_port: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_smtp: Option<bool>,
}

impl UpdateGatewayRequest {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.tags.is_none()
            && self.enable_bastion.is_none()
            && self.bastion_port.is_none()
            && self.enable_smtp.is_none()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GatewayNetwork {
    pub id: String,
    pub gateway_id: String,
    pub private_network_id: String,
    pub mac_address: Option<String>,
    pub enable_masquerade: bool,
    pub enable_dhcp: bool,
    pub status: String,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CreateGatewayNetworkRequest {
    pub gateway_id: String,
    pub private_network_id: String,
    pub enable_masquerade: bool,
    pub enable_dhcp: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateGatewayNetworkRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_masquerade: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_dhcp: Option<bool>,
}

/// VPC API scoped to a region
#[derive(Debug, Clone)]
pub struct VpcApi<'c> {
    client: &'c ScalewayClient,
    base: String,
}

impl<'c> VpcApi<'c> {
    pub fn new(client: &'c ScalewayClient, region: &Region) -> Self {
        Self {
            client,
            base: format!("/vpc/v2/regions/{region}"),
        }
    }

    pub async fn create_private_network(
        &self,
        request: &CreatePrivateNetworkRequest,
    ) -> Result<PrivateNetwork, ScalewayError> {
        self.client
            .post(&format!("{}/private-networks", self.base), request)
            .await
    }

    pub async fn get_private_network(&self, id: &str) -> Result<PrivateNetwork, ScalewayError> {
        self.client
            .get(&format!("{}/private-networks/{id}", self.base))
            .await
    }

    pub async fn update_private_network(
        &self,
        id: &str,
        request: &UpdatePrivateNetworkRequest,
    ) -> Result<PrivateNetwork, ScalewayError> {
        self.client
            .patch(&format!("{}/private-networks/{id}", self.base), request)
            .await
    }

    pub async fn delete_private_network(&self, id: &str) -> Result<(), ScalewayError> {
        self.client
            .delete(&format!("{}/private-networks/{id}", self.base))
            .await
    }

    pub async fn list_private_networks(
        &self,
        name: &str,
        project_id: Option<&str>,
    ) -> Result<Vec<PrivateNetwork>, ScalewayError> {
        let mut query = vec![("name", name.to_owned())];
        if let Some(project_id) = project_id {
            query.push(("project_id", project_id.to_owned()));
        }
        self.client
            .list_all(
                &format!("{}/private-networks", self.base),
                &query,
                "private_networks",
                Paging::PageSize,
            )
            .await
    }
}

/// Public Gateway API scoped to a zone
#[derive(Debug, Clone)]
pub struct GatewayApi<'c> {
    client: &'c ScalewayClient,
    base: String,
}

impl<'c> GatewayApi<'c> {
    pub fn new(client: &'c ScalewayClient, zone: &Zone) -> Self {
        Self {
            client,
            base: format!("/vpc-gw/v1/zones/{zone}"),
        }
    }

    pub async fn create_gateway(
        &self,
        request: &CreateGatewayRequest,
    ) -> Result<Gateway, ScalewayError> {
        self.client
            .post(&format!("{}/gateways", self.base), request)
            .await
    }

    pub async fn get_gateway(&self, id: &str) -> Result<Gateway, ScalewayError> {
        self.client
            .get(&format!("{}/gateways/{id}", self.base))
            .await
    }

    pub async fn update_gateway(
        &self,
        id: &str,
        request: &UpdateGatewayRequest,
    ) -> Result<Gateway, ScalewayError> {
        self.client
            .patch(&format!("{}/gateways/{id}", self.base), request)
            .await
    }

    pub async fn delete_gateway(&self, id: &str) -> Result<(), ScalewayError> {
        self.client
            .delete_query(
                &format!("{}/gateways/{id}", self.base),
                &[("cleanup_dhcp", "true".to_owned())],
            )
            .await
    }

    pub async fn create_gateway_network(
        &self,
        request: &CreateGatewayNetworkRequest,
    ) -> Result<GatewayNetwork, ScalewayError> {
        self.client
            .post(&format!("{}/gateway-networks", self.base), request)
            .await
    }

    pub async fn get_gateway_network(&self, id: &str) -> Result<GatewayNetwork, ScalewayError> {
        self.client
            .get(&format!("{}/gateway-networks/{id}", self.base))
            .await
    }

    pub async fn update_gateway_network(
        &self,
        id: &str,
        request: &UpdateGatewayNetworkRequest,
    ) -> Result<GatewayNetwork, ScalewayError> {
        self.client
            .patch(&format!("{}/gateway-networks/{id}", self.base), request)
            .await
    }

    pub async fn delete_gateway_network(&self, id: &str) -> Result<(), ScalewayError> {
        self.client
            .delete_query(
                &format!("{}/gateway-networks/{id}", self.base),
                &[("cleanup_dhcp", "false".to_owned())],
            )
            .await
    }
}
