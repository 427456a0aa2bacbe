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
use tf_provider::value::{Value, ValueList, ValueNumber, ValueString};
use tf_provider::{map, AttributePath, AttributeType, Block, Description, Diagnostics, Schema};

use crate::adapter::{IdKind, ReplaceTriggers, ScalewayResource};
use crate::client::NotFoundExt;
use crate::expand::{
    expand_bool, expand_id, expand_number, expand_string, expand_strings, flatten_bool,
    flatten_number, flatten_optional_string, flatten_reference, flatten_string, flatten_tags,
    parse_id, unknown_if_null,
};
use crate::locality::{validate_zone, Zone, ZonedId};
use crate::meta::Meta;
use crate::schema;
use crate::utils::{impl_with_id, random_name, WithSchema, WithValidate};
use crate::waiter::{wait_for, wait_for_deletion, Status, WaitConfig};

use super::api::{CreateGatewayRequest, Gateway, GatewayApi, UpdateGatewayRequest};

const DEFAULT_TYPE: &str = "VPC-GW-S";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PublicGatewayState<'a> {
    pub id: ValueString<'a>,
    pub zone: ValueString<'a>,
    pub project_id: ValueString<'a>,
    pub organization_id: ValueString<'a>,
    pub name: ValueString<'a>,
    #[serde(rename = "type")]
    pub gateway_type: ValueString<'a>,
    pub tags: ValueList<ValueString<'a>>,
    pub ip_id: ValueString<'a>,
    pub ip_address: ValueString<'a>,
    pub bastion_enabled: Value<bool>,
    pub bastion_port: ValueNumber,
    pub enable_smtp: Value<bool>,
}

impl_with_id!(PublicGatewayState);

impl<'a> WithSchema for PublicGatewayState<'a> {
    fn schema() -> Schema {
        Schema {
            version: 1,
            block: Block {
                version: 1,
                description: Description::plain("Scaleway VPC public gateway"),
                attributes: map! {
                    "id" => schema::id("Zoned id of the gateway"),
                    "zone" => schema::zone(),
                    "project_id" => schema::project_id(),
                    "organization_id" => schema::organization_id(),
                    "name" => schema::optional_computed(AttributeType::String, "Name of the gateway, generated when unset"),
                    "type" => schema::optional_computed(AttributeType::String, "Gateway type, defaults to `VPC-GW-S`"),
                    "tags" => schema::tags(),
                    "ip_id" => schema::optional_computed(AttributeType::String, "Flexible IP of the gateway, allocated when unset"),
                    "ip_address" => schema::computed(AttributeType::String, "Public address of the gateway"),
                    "bastion_enabled" => schema::optional_computed(AttributeType::Bool, "Enable the SSH bastion"),
                    "bastion_port" => schema::optional_computed(AttributeType::Number, "Port of the SSH bastion"),
                    "enable_smtp" => schema::optional_computed(AttributeType::Bool, "Allow outgoing SMTP traffic"),
                },
                ..Default::default()
            },
        }
    }
}

impl<'a> WithValidate for PublicGatewayState<'a> {
    fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        validate_zone(diags, &self.zone, attr_path.clone().attribute("zone"));
        if let Some(port) = expand_number(&self.bastion_port) {
            if !(1..=65535).contains(&port) {
                diags.error(
                    "Invalid bastion port",
                    format!("{port} is not a valid TCP port"),
                    attr_path.attribute("bastion_port"),
                );
            }
        }
    }
}

fn expand_port(port: &ValueNumber) -> Result<Option<u32>> {
    expand_number(port)
        .map(|port| u32::try_from(port).with_context(|| format!("invalid bastion port {port}")))
        .transpose()
}

fn flatten_gateway<'a>(
    state: PublicGatewayState<'a>,
    zone: &Zone,
    gateway: Gateway,
) -> PublicGatewayState<'a> {
    let (ip_id, ip_address) = match gateway.ip {
        Some(ip) => (Some(ip.id), Some(ip.address)),
        None => (None, None),
    };
    PublicGatewayState {
        id: flatten_string(ZonedId::new(zone.clone(), &gateway.id).to_string()),
        zone: flatten_string(zone.to_string()),
        project_id: flatten_string(gateway.project_id),
        organization_id: flatten_string(gateway.organization_id),
        name: flatten_string(gateway.name),
        gateway_type: flatten_string(gateway.gateway_type.name),
        tags: flatten_tags(&state.tags, gateway.tags),
        ip_id: flatten_reference(&state.ip_id, zone, ip_id),
        ip_address: flatten_optional_string(ip_address),
        bastion_enabled: flatten_bool(gateway.bastion_enabled),
        bastion_port: flatten_number(gateway.bastion_port),
        enable_smtp: flatten_bool(gateway.smtp_enabled),
    }
}

/// Wait until the gateway is `running`
pub(crate) async fn wait_gateway(
    api: &GatewayApi<'_>,
    id: &str,
    config: &WaitConfig,
) -> Result<Gateway> {
    let what = format!("public gateway {id}");
    let gateway = wait_for(&what, config, move || async move {
        let gateway = api.get_gateway(id).await?;
        Ok(if gateway.status == "running" {
            Status::Ready(gateway)
        } else if gateway.status == "failed" {
            Status::Failed(gateway.status)
        } else {
            Status::Pending(gateway.status)
        })
    })
    .await?;
    Ok(gateway)
}

#[derive(Debug, Clone, Copy)]
pub struct PublicGatewayResource {
    wait: WaitConfig,
}

impl Default for PublicGatewayResource {
    fn default() -> Self {
        Self {
            wait: WaitConfig::new(10 * 60, 5),
        }
    }
}

#[async_trait]
impl ScalewayResource for PublicGatewayResource {
    type State<'a> = PublicGatewayState<'a>;

    const NAME: &'static str = "vpc_public_gateway";
    const ID_KIND: IdKind = IdKind::Zoned;

    fn plan_create<'a>(&self, meta: &Meta, state: &mut PublicGatewayState<'a>) -> Result<()> {
        state.zone = flatten_string(meta.zone(&state.zone)?.to_string());
        state.project_id = meta.plan_project_id(&state.project_id);
        state.organization_id = Value::Unknown;
        unknown_if_null(&mut state.name);
        if state.gateway_type.is_null() {
            state.gateway_type = flatten_string(DEFAULT_TYPE);
        }
        unknown_if_null(&mut state.ip_id);
        state.ip_address = Value::Unknown;
        if state.bastion_enabled.is_null() {
            state.bastion_enabled = flatten_bool(false);
        }
        unknown_if_null(&mut state.bastion_port);
        if state.enable_smtp.is_null() {
            state.enable_smtp = flatten_bool(false);
        }
        Ok(())
    }

    fn plan_update<'a>(
        &self,
        prior: &PublicGatewayState<'a>,
        proposed: &mut PublicGatewayState<'a>,
    ) -> Vec<AttributePath> {
        if proposed.bastion_port.is_null() {
            proposed.bastion_port = prior.bastion_port.clone();
        }
        ReplaceTriggers::new()
            .check("zone", &prior.zone, &proposed.zone)
            .check("project_id", &prior.project_id, &proposed.project_id)
            .check("type", &prior.gateway_type, &proposed.gateway_type)
            .check("ip_id", &expand_id(&prior.ip_id), &expand_id(&proposed.ip_id))
            .build()
    }

    async fn create<'a>(
        &self,
        meta: &Meta,
        planned: PublicGatewayState<'a>,
    ) -> Result<PublicGatewayState<'a>> {
        let zone = meta.zone(&planned.zone)?;
        let api = GatewayApi::new(&meta.client, &zone);

        let gateway = api
            .create_gateway(&CreateGatewayRequest {
                name: expand_string(&planned.name).unwrap_or_else(|| random_name("gw")),
                project_id: meta.project_id(&planned.project_id),
                tags: expand_strings(&planned.tags).unwrap_or_default(),
                gateway_type: expand_string(&planned.gateway_type),
                ip_id: expand_id(&planned.ip_id),
                enable_smtp: expand_bool(&planned.enable_smtp).unwrap_or_default(),
                enable_bastion: expand_bool(&planned.bastion_enabled).unwrap_or_default(),
                bastion_port: expand_port(&planned.bastion_port)?,
            })
            .await
            .context("cannot create public gateway")?;

        let gateway = wait_gateway(&api, &gateway.id, &self.wait).await?;
        Ok(flatten_gateway(planned, &zone, gateway))
    }

    async fn read<'a>(
        &self,
        meta: &Meta,
        state: PublicGatewayState<'a>,
    ) -> Result<Option<PublicGatewayState<'a>>> {
        let id: ZonedId = parse_id(&state.id)?;
        let api = GatewayApi::new(&meta.client, &id.locality);

        match api.get_gateway(&id.id).await.found()? {
            Some(gateway) => Ok(Some(flatten_gateway(state, &id.locality, gateway))),
            None => Ok(None),
        }
    }

    async fn update<'a>(
        &self,
        meta: &Meta,
        prior: PublicGatewayState<'a>,
        planned: PublicGatewayState<'a>,
    ) -> Result<PublicGatewayState<'a>> {
        let id: ZonedId = parse_id(&prior.id)?;
        let api = GatewayApi::new(&meta.client, &id.locality);

        let request = UpdateGatewayRequest {
            name: (prior.name != planned.name)
                .then(|| expand_string(&planned.name))
                .flatten(),
            tags: (prior.tags != planned.tags)
                .then(|| expand_strings(&planned.tags).unwrap_or_default()),
            enable_bastion: (prior.bastion_enabled != planned.bastion_enabled)
                .then(|| expand_bool(&planned.bastion_enabled))
                .flatten(),
            bastion_port: if prior.bastion_port != planned.bastion_port {
                expand_port(&planned.bastion_port)?
            } else {
                None
            },
            enable_smtp: (prior.enable_smtp != planned.enable_smtp)
                .then(|| expand_bool(&planned.enable_smtp))
                .flatten(),
        };
        if !request.is_empty() {
            wait_gateway(&api, &id.id, &self.wait).await?;
            api.update_gateway(&id.id, &request)
                .await
                .context("cannot update public gateway")?;
        }

        let gateway = wait_gateway(&api, &id.id, &self.wait).await?;
        Ok(flatten_gateway(planned, &id.locality, gateway))
    }

    async fn delete<'a>(&self, meta: &Meta, state: PublicGatewayState<'a>) -> Result<()> {
        let id: ZonedId = parse_id(&state.id)?;
        let api = GatewayApi::new(&meta.client, &id.locality);

        if api.get_gateway(&id.id).await.found()?.is_none() {
            return Ok(());
        }
        wait_gateway(&api, &id.id, &self.wait).await?;
        api.delete_gateway(&id.id)
            .await
            .found()
            .context("cannot delete public gateway")?;

        let what = format!("public gateway {} deletion", id.id);
        let (api, gateway_id) = (&api, id.id.as_str());
        wait_for_deletion(&what, &self.wait, move || async move {
            api.get_gateway(gateway_id).await.map(|gateway| gateway.status)
        })
        .await?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::meta::tests::{test_meta, PROJECT_ID};
    use crate::waiter::tests::FAST_WAIT;

    pub(crate) const BASE: &str = "/vpc-gw/v1/zones/fr-par-1";

    pub(crate) fn gateway_json(status: &str) -> serde_json::Value {
        json!({
            "id": "gw",
            "name": "gateway",
            "organization_id": PROJECT_ID,
            "project_id": PROJECT_ID,
            "type": {"name": "VPC-GW-S"},
            "status": status,
            "tags": [],
            "ip": {"id": "ip", "address": "51.15.0.2"},
            "bastion_enabled": true,
            "bastion_port": 61000,
            "smtp_enabled": false
        })
    }

    #[tokio::test]
    async fn create_waits_for_running() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("{BASE}/gateways")))
            .and(body_json(json!({
                "name": "gateway",
                "project_id": PROJECT_ID,
                "tags": [],
                "type": "VPC-GW-S",
                "enable_smtp": false,
                "enable_bastion": true
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(gateway_json("allocating")))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("{BASE}/gateways/gw")))
            .respond_with(ResponseTemplate::new(200).set_body_json(gateway_json("configuring")))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("{BASE}/gateways/gw")))
            .respond_with(ResponseTemplate::new(200).set_body_json(gateway_json("running")))
            .mount(&server)
            .await;

        let meta = test_meta(&server);
        let resource = PublicGatewayResource { wait: FAST_WAIT };
        let mut state = PublicGatewayState {
            name: flatten_string("gateway"),
            bastion_enabled: flatten_bool(true),
            ..Default::default()
        };
        resource.plan_create(&meta, &mut state).unwrap();

        let state = resource.create(&meta, state).await.unwrap();
        assert_eq!(state.id, flatten_string("fr-par-1/gw"));
        assert_eq!(state.ip_id, flatten_string("fr-par-1/ip"));
        assert_eq!(state.ip_address, flatten_string("51.15.0.2"));
        assert_eq!(state.bastion_port, Value::Value(61000));
    }

    #[tokio::test]
    async fn failed_gateway() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{BASE}/gateways/gw")))
            .respond_with(ResponseTemplate::new(200).set_body_json(gateway_json("failed")))
            .mount(&server)
            .await;

        let meta = test_meta(&server);
        let api = GatewayApi::new(&meta.client, &meta.default_zone);
        assert!(wait_gateway(&api, "gw", &FAST_WAIT).await.is_err());
    }

    #[tokio::test]
    async fn delete_waits_until_gone() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{BASE}/gateways/gw")))
            .respond_with(ResponseTemplate::new(200).set_body_json(gateway_json("running")))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path(format!("{BASE}/gateways/gw")))
            .and(query_param("cleanup_dhcp", "true"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("{BASE}/gateways/gw")))
            .respond_with(ResponseTemplate::new(200).set_body_json(gateway_json("deleting")))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("{BASE}/gateways/gw")))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"type": "not_found"})))
            .mount(&server)
            .await;

        let meta = test_meta(&server);
        let resource = PublicGatewayResource { wait: FAST_WAIT };
        let state = PublicGatewayState {
            id: flatten_string("fr-par-1/gw"),
            ..Default::default()
        };
        resource.delete(&meta, state).await.unwrap();
    }

    #[test]
    fn invalid_bastion_port() {
        let mut diags = Diagnostics::default();
        PublicGatewayState {
            bastion_port: Value::Value(70000),
            ..Default::default()
        }
        .validate(&mut diags, AttributePath::default());
        assert_eq!(diags.errors.len(), 1);

        assert_eq!(expand_port(&Value::Value(61000)).unwrap(), Some(61000));
        assert_eq!(expand_port(&Value::Unknown).unwrap(), None);
        assert!(expand_port(&Value::Value(-22)).is_err());
    }
}
