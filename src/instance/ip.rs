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

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tf_provider::value::{Value, ValueList, ValueString};
use tf_provider::{map, AttributePath, AttributeType, Block, Description, Diagnostics, Schema};

use crate::adapter::{IdKind, ReplaceTriggers, ScalewayResource};
use crate::client::NotFoundExt;
use crate::expand::{
    expand_id, expand_string, expand_strings, flatten_optional_string, flatten_reference,
    flatten_string, flatten_tags, parse_id, unknown_if_null,
};
use crate::locality::{validate_zone, Zone, ZonedId};
use crate::meta::Meta;
use crate::schema;
use crate::utils::{impl_with_id, WithSchema, WithValidate};

use super::api::{CreateIpRequest, InstanceApi, Ip, UpdateIpRequest};

const IP_TYPES: &[&str] = &["routed_ipv4", "routed_ipv6", "nat"];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IpState<'a> {
    pub id: ValueString<'a>,
    pub zone: ValueString<'a>,
    pub project_id: ValueString<'a>,
    pub organization_id: ValueString<'a>,
    pub address: ValueString<'a>,
    #[serde(rename = "type")]
    pub ip_type: ValueString<'a>,
    pub reverse: ValueString<'a>,
    pub server_id: ValueString<'a>,
    pub tags: ValueList<ValueString<'a>>,
}

impl_with_id!(IpState);

impl<'a> WithSchema for IpState<'a> {
    fn schema() -> Schema {
        Schema {
            version: 1,
            block: Block {
                version: 1,
                description: Description::plain("Scaleway Instance flexible IP"),
                attributes: map! {
                    "id" => schema::id("Zoned id of the IP"),
                    "zone" => schema::zone(),
                    "project_id" => schema::project_id(),
                    "organization_id" => schema::organization_id(),
                    "address" => schema::computed(AttributeType::String, "IP address"),
                    "type" => schema::optional_computed(AttributeType::String, "IP type: `routed_ipv4`, `routed_ipv6` or `nat`"),
                    "reverse" => schema::optional(AttributeType::String, "Reverse DNS of the IP"),
                    "server_id" => schema::optional(AttributeType::String, "Server the IP is attached to"),
                    "tags" => schema::tags(),
                },
                ..Default::default()
            },
        }
    }
}

impl<'a> WithValidate for IpState<'a> {
    fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        validate_zone(diags, &self.zone, attr_path.clone().attribute("zone"));
        if let Some(ip_type) = self.ip_type.as_deref_option() {
            if !IP_TYPES.contains(&ip_type) {
                diags.error(
                    "Invalid IP type",
                    format!("`{ip_type}` is not one of {}", IP_TYPES.join(", ")),
                    attr_path.attribute("type"),
                );
            }
        }
    }
}

fn flatten_ip<'a>(state: IpState<'a>, zone: &Zone, ip: Ip) -> IpState<'a> {
    IpState {
        id: flatten_string(ZonedId::new(zone.clone(), &ip.id).to_string()),
        zone: flatten_string(zone.to_string()),
        project_id: flatten_string(ip.project),
        organization_id: flatten_string(ip.organization),
        address: flatten_string(ip.address),
        ip_type: flatten_string(ip.ip_type),
        reverse: flatten_optional_string(ip.reverse),
        server_id: flatten_reference(&state.server_id, zone, ip.server.map(|server| server.id)),
        tags: flatten_tags(&state.tags, ip.tags),
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct IpResource;

#[async_trait]
impl ScalewayResource for IpResource {
    type State<'a> = IpState<'a>;

    const NAME: &'static str = "instance_ip";
    const ID_KIND: IdKind = IdKind::Zoned;

    fn plan_create<'a>(&self, meta: &Meta, state: &mut IpState<'a>) -> Result<()> {
        let zone = meta.parent_zone(&state.zone, &state.server_id)?;
        state.zone = flatten_string(zone.to_string());
        state.project_id = meta.plan_project_id(&state.project_id);
        state.organization_id = Value::Unknown;
        state.address = Value::Unknown;
        unknown_if_null(&mut state.ip_type);
        Ok(())
    }

    fn plan_update<'a>(
        &self,
        prior: &IpState<'a>,
        proposed: &mut IpState<'a>,
    ) -> Vec<AttributePath> {
        ReplaceTriggers::new()
            .check("type", &prior.ip_type, &proposed.ip_type)
            .check("zone", &prior.zone, &proposed.zone)
            .check("project_id", &prior.project_id, &proposed.project_id)
            .build()
    }

    async fn create<'a>(&self, meta: &Meta, planned: IpState<'a>) -> Result<IpState<'a>> {
        let zone = meta.parent_zone(&planned.zone, &planned.server_id)?;
        let api = InstanceApi::new(&meta.client, &zone);

        let mut ip = api
            .create_ip(&CreateIpRequest {
                project: meta.project_id(&planned.project_id),
                tags: expand_strings(&planned.tags).unwrap_or_default(),
                ip_type: expand_string(&planned.ip_type),
            })
            .await
            .context("cannot create flexible IP")?;

        let server = expand_id(&planned.server_id);
        let reverse = expand_string(&planned.reverse);
        if server.is_some() || reverse.is_some() {
            ip = api
                .update_ip(
                    &ip.id,
                    &UpdateIpRequest {
                        reverse: reverse.map(Some),
                        server: server.map(Some),
                        ..Default::default()
                    },
                )
                .await
                .context("cannot configure flexible IP")?;
        }

        Ok(flatten_ip(planned, &zone, ip))
    }

    async fn read<'a>(&self, meta: &Meta, state: IpState<'a>) -> Result<Option<IpState<'a>>> {
        let id: ZonedId = parse_id(&state.id)?;
        let api = InstanceApi::new(&meta.client, &id.locality);

        match api.get_ip(&id.id).await.found()? {
            Some(ip) => Ok(Some(flatten_ip(state, &id.locality, ip))),
            None => Ok(None),
        }
    }

    async fn update<'a>(
        &self,
        meta: &Meta,
        prior: IpState<'a>,
        planned: IpState<'a>,
    ) -> Result<IpState<'a>> {
        let id: ZonedId = parse_id(&prior.id)?;
        let api = InstanceApi::new(&meta.client, &id.locality);

        let request = UpdateIpRequest {
            reverse: (prior.reverse != planned.reverse).then(|| expand_string(&planned.reverse)),
            tags: (prior.tags != planned.tags)
                .then(|| expand_strings(&planned.tags).unwrap_or_default()),
            server: (prior.server_id != planned.server_id).then(|| expand_id(&planned.server_id)),
        };
        let ip = api
            .update_ip(&id.id, &request)
            .await
            .context("cannot update flexible IP")?;

        Ok(flatten_ip(planned, &id.locality, ip))
    }

    async fn delete<'a>(&self, meta: &Meta, state: IpState<'a>) -> Result<()> {
        let id: ZonedId = parse_id(&state.id)?;
        let api = InstanceApi::new(&meta.client, &id.locality);

        api.delete_ip(&id.id)
            .await
            .found()
            .context("cannot delete flexible IP")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::meta::tests::{test_meta, PROJECT_ID};

    const BASE: &str = "/instance/v1/zones/fr-par-1";

    fn ip_json(server: Option<&str>, reverse: Option<&str>) -> serde_json::Value {
        json!({
            "ip": {
                "id": "ip1",
                "address": "51.15.0.1",
                "reverse": reverse,
                "server": server.map(|id| json!({"id": id, "name": "web"})),
                "organization": PROJECT_ID,
                "project": PROJECT_ID,
                "tags": [],
                "type": "routed_ipv4"
            }
        })
    }

    #[tokio::test]
    async fn create_attached() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("{BASE}/ips")))
            .and(body_json(json!({"project": PROJECT_ID, "tags": []})))
            .respond_with(ResponseTemplate::new(201).set_body_json(ip_json(None, None)))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path(format!("{BASE}/ips/ip1")))
            .and(body_json(json!({"server": "srv"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(ip_json(Some("srv"), None)))
            .expect(1)
            .mount(&server)
            .await;

        let meta = test_meta(&server);
        let mut state = IpState {
            server_id: flatten_string("fr-par-1/srv"),
            ..Default::default()
        };
        IpResource.plan_create(&meta, &mut state).unwrap();
        assert!(state.ip_type.is_unknown());

        let state = IpResource.create(&meta, state).await.unwrap();
        assert_eq!(state.id, flatten_string("fr-par-1/ip1"));
        assert_eq!(state.address, flatten_string("51.15.0.1"));
        assert_eq!(state.server_id, flatten_string("fr-par-1/srv"));
        assert_eq!(state.ip_type, flatten_string("routed_ipv4"));
        assert!(state.tags.is_null());
        assert!(state.reverse.is_null());
    }

    #[tokio::test]
    async fn attached_ip_follows_server_zone() {
        let server = MockServer::start().await;
        let meta = test_meta(&server);
        let mut state = IpState {
            server_id: flatten_string("pl-waw-1/srv"),
            ..Default::default()
        };
        IpResource.plan_create(&meta, &mut state).unwrap();
        assert_eq!(state.zone, flatten_string("pl-waw-1"));
    }

    #[tokio::test]
    async fn detach_and_clear_reverse() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path(format!("{BASE}/ips/ip1")))
            .and(body_json(json!({"reverse": null, "server": null})))
            .respond_with(ResponseTemplate::new(200).set_body_json(ip_json(None, None)))
            .expect(1)
            .mount(&server)
            .await;

        let meta = test_meta(&server);
        let prior = IpState {
            id: flatten_string("fr-par-1/ip1"),
            reverse: flatten_string("web.example.com"),
            server_id: flatten_string("srv"),
            ..Default::default()
        };
        let planned = IpState {
            reverse: Value::Null,
            server_id: Value::Null,
            ..prior.clone()
        };
        let state = IpResource.update(&meta, prior, planned).await.unwrap();
        assert!(state.server_id.is_null());
    }

    #[test]
    fn type_change_replaces() {
        let prior = IpState {
            ip_type: flatten_string("routed_ipv4"),
            ..Default::default()
        };
        let mut proposed = IpState {
            ip_type: flatten_string("nat"),
            ..Default::default()
        };
        assert_eq!(IpResource.plan_update(&prior, &mut proposed).len(), 1);
    }

    #[test]
    fn invalid_type() {
        let mut diags = Diagnostics::default();
        IpState {
            ip_type: flatten_string("ipv5"),
            ..Default::default()
        }
        .validate(&mut diags, AttributePath::default());
        assert_eq!(diags.errors.len(), 1);
    }
}
