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

//! Typed subset of the Instance API (`/instance/v1/zones/{zone}`).

use std::collections::BTreeMap;
use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::client::{Paging, ScalewayClient, ScalewayError};
use crate::locality::Zone;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Server {
    pub id: String,
    pub name: String,
    pub organization: String,
    pub project: String,
    pub commercial_type: String,
    pub state: String,
    pub tags: Vec<String>,
    pub image: Option<ImageRef>,
    pub public_ip: Option<ServerIp>,
    pub private_ip: Option<String>,
    pub enable_ipv6: bool,
    pub security_group: Option<SecurityGroupRef>,
    pub volumes: BTreeMap<String, ServerVolume>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImageRef {
    pub id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServerIp {
    pub id: String,
    pub address: String,
    pub dynamic: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecurityGroupRef {
    pub id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServerVolume {
    pub id: String,
    pub volume_type: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateServerRequest {
    pub name: String,
    pub commercial_type: String,
    pub image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    pub tags: Vec<String>,
    pub enable_ipv6: bool,
    pub dynamic_ip_required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_group: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateServerRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_ipv6: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_group: Option<SecurityGroupRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commercial_type: Option<String>,
}

impl UpdateServerRequest {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.tags.is_none()
            && self.enable_ipv6.is_none()
            && self.security_group.is_none()
            && self.commercial_type.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerAction {
    Poweron,
    Poweroff,
    StopInPlace,
    Terminate,
}

impl Display for ServerAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ServerAction::Poweron => "poweron",
            ServerAction::Poweroff => "poweroff",
            ServerAction::StopInPlace => "stop_in_place",
            ServerAction::Terminate => "terminate",
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Ip {
    pub id: String,
    pub address: String,
    pub reverse: Option<String>,
    pub server: Option<ServerRef>,
    pub organization: String,
    pub project: String,
    pub tags: Vec<String>,
    #[serde(rename = "type")]
    pub ip_type: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerRef {
    pub id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateIpRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    pub tags: Vec<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub ip_type: Option<String>,
}

/// `Some(None)` clears a field, `None` leaves it untouched
#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateIpRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reverse: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<Option<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SecurityGroup {
    pub id: String,
    pub name: String,
    pub description: String,
    pub organization: String,
    pub project: String,
    pub stateful: bool,
    pub inbound_default_policy: String,
    pub outbound_default_policy: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateSecurityGroupRequest {
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    pub stateful: bool,
    pub inbound_default_policy: String,
    pub outbound_default_policy: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateSecurityGroupRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stateful: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inbound_default_policy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outbound_default_policy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityGroupRule {
    #[serde(skip_serializing)]
    pub id: String,
    pub protocol: String,
    pub direction: String,
    pub action: String,
    pub ip_range: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dest_port_from: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dest_port_to: Option<u32>,
    pub position: u32,
    #[serde(skip_serializing)]
    pub editable: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PrivateNic {
    pub id: String,
    pub server_id: String,
    pub private_network_id: String,
    pub mac_address: String,
    pub state: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatePrivateNicRequest {
    pub private_network_id: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ServerResponse {
    server: Server,
}

#[derive(Debug, Deserialize)]
struct IpResponse {
    ip: Ip,
}

#[derive(Debug, Deserialize)]
struct SecurityGroupResponse {
    security_group: SecurityGroup,
}

#[derive(Debug, Deserialize)]
struct PrivateNicResponse {
    private_nic: PrivateNic,
}

#[derive(Debug, Serialize)]
struct ActionRequest {
    action: ServerAction,
}

#[derive(Debug, Serialize)]
struct SetRulesRequest<'r> {
    rules: &'r [SecurityGroupRule],
}

#[derive(Debug, Serialize)]
struct TagsRequest<'t> {
    tags: &'t [String],
}

/// Instance API scoped to a zone
#[derive(Debug, Clone)]
pub struct InstanceApi<'c> {
    client: &'c ScalewayClient,
    base: String,
}

impl<'c> InstanceApi<'c> {
    pub fn new(client: &'c ScalewayClient, zone: &Zone) -> Self {
        Self {
            client,
            base: format!("/instance/v1/zones/{zone}"),
        }
    }

    pub async fn create_server(
        &self,
        request: &CreateServerRequest,
    ) -> Result<Server, ScalewayError> {
        let response: ServerResponse = self
            .client
            .post(&format!("{}/servers", self.base), request)
            .await?;
        Ok(response.server)
    }

    pub async fn get_server(&self, id: &str) -> Result<Server, ScalewayError> {
        let response: ServerResponse = self
            .client
            .get(&format!("{}/servers/{id}", self.base))
            .await?;
        Ok(response.server)
    }

    pub async fn update_server(
        &self,
        id: &str,
        request: &UpdateServerRequest,
    ) -> Result<Server, ScalewayError> {
        let response: ServerResponse = self
            .client
            .patch(&format!("{}/servers/{id}", self.base), request)
            .await?;
        Ok(response.server)
    }

    pub async fn server_action(&self, id: &str, action: ServerAction) -> Result<(), ScalewayError> {
        let _: serde_json::Value = self
            .client
            .post(
                &format!("{}/servers/{id}/action", self.base),
                &ActionRequest { action },
            )
            .await?;
        Ok(())
    }

    pub async fn delete_server(&self, id: &str) -> Result<(), ScalewayError> {
        self.client
            .delete(&format!("{}/servers/{id}", self.base))
            .await
    }

    pub async fn list_servers(
        &self,
        name: Option<&str>,
        project: Option<&str>,
    ) -> Result<Vec<Server>, ScalewayError> {
        let mut query = Vec::new();
        if let Some(name) = name {
            query.push(("name", name.to_owned()));
        }
        if let Some(project) = project {
            query.push(("project", project.to_owned()));
        }
        self.client
            .list_all(
                &format!("{}/servers", self.base),
                &query,
                "servers",
                Paging::PerPage,
            )
            .await
    }

    pub async fn delete_volume(&self, id: &str) -> Result<(), ScalewayError> {
        self.client
            .delete(&format!("{}/volumes/{id}", self.base))
            .await
    }

    pub async fn create_ip(&self, request: &CreateIpRequest) -> Result<Ip, ScalewayError> {
        let response: IpResponse = self
            .client
            .post(&format!("{}/ips", self.base), request)
            .await?;
        Ok(response.ip)
    }

    pub async fn get_ip(&self, id: &str) -> Result<Ip, ScalewayError> {
        let response: IpResponse = self.client.get(&format!("{}/ips/{id}", self.base)).await?;
        Ok(response.ip)
    }

    pub async fn update_ip(
        &self,
        id: &str,
        request: &UpdateIpRequest,
    ) -> Result<Ip, ScalewayError> {
        let response: IpResponse = self
            .client
            .patch(&format!("{}/ips/{id}", self.base), request)
            .await?;
        Ok(response.ip)
    }

    /// Attach the flexible IP `ip_id` to `server_id`, or detach it with `None`
    pub async fn attach_ip(
        &self,
        ip_id: &str,
        server_id: Option<&str>,
    ) -> Result<Ip, ScalewayError> {
        self.update_ip(
            ip_id,
            &UpdateIpRequest {
                server: Some(server_id.map(str::to_owned)),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn delete_ip(&self, id: &str) -> Result<(), ScalewayError> {
        self.client.delete(&format!("{}/ips/{id}", self.base)).await
    }

    pub async fn create_security_group(
        &self,
        request: &CreateSecurityGroupRequest,
    ) -> Result<SecurityGroup, ScalewayError> {
        let response: SecurityGroupResponse = self
            .client
            .post(&format!("{}/security_groups", self.base), request)
            .await?;
        Ok(response.security_group)
    }

    pub async fn get_security_group(&self, id: &str) -> Result<SecurityGroup, ScalewayError> {
        let response: SecurityGroupResponse = self
            .client
            .get(&format!("{}/security_groups/{id}", self.base))
            .await?;
        Ok(response.security_group)
    }

    pub async fn update_security_group(
        &self,
        id: &str,
        request: &UpdateSecurityGroupRequest,
    ) -> Result<SecurityGroup, ScalewayError> {
        let response: SecurityGroupResponse = self
            .client
            .patch(&format!("{}/security_groups/{id}", self.base), request)
            .await?;
        Ok(response.security_group)
    }

    pub async fn delete_security_group(&self, id: &str) -> Result<(), ScalewayError> {
        self.client
            .delete(&format!("{}/security_groups/{id}", self.base))
            .await
    }

    pub async fn list_security_group_rules(
        &self,
        id: &str,
    ) -> Result<Vec<SecurityGroupRule>, ScalewayError> {
        self.client
            .list_all(
                &format!("{}/security_groups/{id}/rules", self.base),
                &[],
                "rules",
                Paging::PerPage,
            )
            .await
    }

    /// Replace every editable rule of the security group
    pub async fn set_security_group_rules(
        &self,
        id: &str,
        rules: &[SecurityGroupRule],
    ) -> Result<(), ScalewayError> {
        let _: serde_json::Value = self
            .client
            .put(
                &format!("{}/security_groups/{id}/rules", self.base),
                &SetRulesRequest { rules },
            )
            .await?;
        Ok(())
    }

    pub async fn create_private_nic(
        &self,
        server_id: &str,
        request: &CreatePrivateNicRequest,
    ) -> Result<PrivateNic, ScalewayError> {
        let response: PrivateNicResponse = self
            .client
            .post(
                &format!("{}/servers/{server_id}/private_nics", self.base),
                request,
            )
            .await?;
        Ok(response.private_nic)
    }

    pub async fn get_private_nic(
        &self,
        server_id: &str,
        id: &str,
    ) -> Result<PrivateNic, ScalewayError> {
        let response: PrivateNicResponse = self
            .client
            .get(&format!("{}/servers/{server_id}/private_nics/{id}", self.base))
            .await?;
        Ok(response.private_nic)
    }

    pub async fn update_private_nic_tags(
        &self,
        server_id: &str,
        id: &str,
        tags: &[String],
    ) -> Result<PrivateNic, ScalewayError> {
        let response: PrivateNicResponse = self
            .client
            .patch(
                &format!("{}/servers/{server_id}/private_nics/{id}", self.base),
                &TagsRequest { tags },
            )
            .await?;
        Ok(response.private_nic)
    }

    pub async fn delete_private_nic(&self, server_id: &str, id: &str) -> Result<(), ScalewayError> {
        self.client
            .delete(&format!("{}/servers/{server_id}/private_nics/{id}", self.base))
            .await
    }
}
