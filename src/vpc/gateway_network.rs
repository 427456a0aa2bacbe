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
use tf_provider::value::{Value, ValueString};
use tf_provider::{map, AttributePath, AttributeType, Block, Description, Diagnostics, Schema};

use crate::adapter::{IdKind, ReplaceTriggers, ScalewayResource};
use crate::client::NotFoundExt;
use crate::expand::{
    expand_bool, expand_id, flatten_bool, flatten_optional_string, flatten_reference,
    flatten_string, parse_id,
};
use crate::locality::{validate_zone, Zone, ZonedId};
use crate::meta::Meta;
use crate::schema;
use crate::utils::{impl_with_id, WithSchema, WithValidate};
use crate::waiter::{wait_for, wait_for_deletion, Status, WaitConfig};

use super::api::{
    CreateGatewayNetworkRequest, GatewayApi, GatewayNetwork, UpdateGatewayNetworkRequest,
};
use super::public_gateway::wait_gateway;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayNetworkState<'a> {
    pub id: ValueString<'a>,
    pub zone: ValueString<'a>,
    pub gateway_id: ValueString<'a>,
    pub private_network_id: ValueString<'a>,
    pub enable_masquerade: Value<bool>,
    pub enable_dhcp: Value<bool>,
    pub mac_address: ValueString<'a>,
    pub status: ValueString<'a>,
    pub created_at: ValueString<'a>,
    pub updated_at: ValueString<'a>,
}

impl_with_id!(GatewayNetworkState);

impl<'a> WithSchema for GatewayNetworkState<'a> {
    fn schema() -> Schema {
        Schema {
            version: 1,
            block: Block {
                version: 1,
                description: Description::plain(
                    "Attachment of a VPC public gateway to a private network",
                ),
                attributes: map! {
                    "id" => schema::id("Zoned id of the gateway network"),
                    "zone" => schema::zone(),
                    "gateway_id" => schema::required(AttributeType::String, "Public gateway to attach"),
                    "private_network_id" => schema::required(AttributeType::String, "Private network to attach the gateway to"),
                    "enable_masquerade" => schema::optional_computed(AttributeType::Bool, "Masquerade traffic of the private network, defaults to `true`"),
                    "enable_dhcp" => schema::optional_computed(AttributeType::Bool, "Serve DHCP on the private network, defaults to `true`"),
                    "mac_address" => schema::computed(AttributeType::String, "MAC address of the gateway in the private network"),
                    "status" => schema::computed(AttributeType::String, "Status of the gateway network"),
                    "created_at" => schema::timestamp("Creation date of the gateway network"),
                    "updated_at" => schema::timestamp("Last update date of the gateway network"),
                },
                ..Default::default()
            },
        }
    }
}

impl<'a> WithValidate for GatewayNetworkState<'a> {
    fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        validate_zone(diags, &self.zone, attr_path.attribute("zone"));
    }
}

fn flatten_gateway_network<'a>(
    state: GatewayNetworkState<'a>,
    zone: &Zone,
    network: GatewayNetwork,
) -> GatewayNetworkState<'a> {
    GatewayNetworkState {
        id: flatten_string(ZonedId::new(zone.clone(), &network.id).to_string()),
        zone: flatten_string(zone.to_string()),
        gateway_id: flatten_reference(&state.gateway_id, zone, Some(network.gateway_id)),
        private_network_id: flatten_reference(
            &state.private_network_id,
            &zone.region(),
            Some(network.private_network_id),
        ),
        enable_masquerade: flatten_bool(network.enable_masquerade),
        enable_dhcp: flatten_bool(network.enable_dhcp),
        mac_address: flatten_optional_string(network.mac_address),
        status: flatten_string(network.status),
        created_at: flatten_optional_string(network.created_at),
        updated_at: flatten_optional_string(network.updated_at),
    }
}

async fn wait_gateway_network(
    api: &GatewayApi<'_>,
    id: &str,
    config: &WaitConfig,
) -> Result<GatewayNetwork> {
    let what = format!("gateway network {id}");
    let network = wait_for(&what, config, move || async move {
        let network = api.get_gateway_network(id).await?;
        Ok(if network.status == "ready" {
            Status::Ready(network)
        } else if network.status == "deleted" {
            Status::Failed(network.status)
        } else {
            Status::Pending(network.status)
        })
    })
    .await?;
    Ok(network)
}

#[derive(Debug, Clone, Copy)]
pub struct GatewayNetworkResource {
    wait: WaitConfig,
}

impl Default for GatewayNetworkResource {
    fn default() -> Self {
        Self {
            wait: WaitConfig::new(10 * 60, 5),
        }
    }
}

#[async_trait]
impl ScalewayResource for GatewayNetworkResource {
    type State<'a> = GatewayNetworkState<'a>;

    const NAME: &'static str = "vpc_gateway_network";
    const ID_KIND: IdKind = IdKind::Zoned;

    fn plan_create<'a>(&self, meta: &Meta, state: &mut GatewayNetworkState<'a>) -> Result<()> {
        let zone = meta.parent_zone(&state.zone, &state.gateway_id)?;
        state.zone = flatten_string(zone.to_string());
        if state.enable_masquerade.is_null() {
            state.enable_masquerade = flatten_bool(true);
        }
        if state.enable_dhcp.is_null() {
            state.enable_dhcp = flatten_bool(true);
        }
        state.mac_address = Value::Unknown;
        state.status = Value::Unknown;
        state.created_at = Value::Unknown;
        state.updated_at = Value::Unknown;
        Ok(())
    }

    fn plan_update<'a>(
        &self,
        prior: &GatewayNetworkState<'a>,
        proposed: &mut GatewayNetworkState<'a>,
    ) -> Vec<AttributePath> {
        if prior.enable_masquerade != proposed.enable_masquerade
            || prior.enable_dhcp != proposed.enable_dhcp
        {
            proposed.updated_at = Value::Unknown;
        }
        ReplaceTriggers::new()
            .check("zone", &prior.zone, &proposed.zone)
            .check(
                "gateway_id",
                &expand_id(&prior.gateway_id),
                &expand_id(&proposed.gateway_id),
            )
            .check(
                "private_network_id",
                &expand_id(&prior.private_network_id),
                &expand_id(&proposed.private_network_id),
            )
            .build()
    }

    async fn create<'a>(
        &self,
        meta: &Meta,
        planned: GatewayNetworkState<'a>,
    ) -> Result<GatewayNetworkState<'a>> {
        let zone = meta.parent_zone(&planned.zone, &planned.gateway_id)?;
        let api = GatewayApi::new(&meta.client, &zone);
        let gateway_id = expand_id(&planned.gateway_id).context("`gateway_id` is required")?;

        wait_gateway(&api, &gateway_id, &self.wait).await?;
        let network = api
            .create_gateway_network(&CreateGatewayNetworkRequest {
                gateway_id: gateway_id.clone(),
                private_network_id: expand_id(&planned.private_network_id)
                    .context("`private_network_id` is required")?,
                enable_masquerade: expand_bool(&planned.enable_masquerade).unwrap_or(true),
                enable_dhcp: expand_bool(&planned.enable_dhcp).unwrap_or(true),
            })
            .await
            .context("cannot attach public gateway")?;

        let network = wait_gateway_network(&api, &network.id, &self.wait).await?;
        wait_gateway(&api, &gateway_id, &self.wait).await?;
        Ok(flatten_gateway_network(planned, &zone, network))
    }

    async fn read<'a>(
        &self,
        meta: &Meta,
        state: GatewayNetworkState<'a>,
    ) -> Result<Option<GatewayNetworkState<'a>>> {
        let id: ZonedId = parse_id(&state.id)?;
        let api = GatewayApi::new(&meta.client, &id.locality);

        match api.get_gateway_network(&id.id).await.found()? {
            Some(network) => Ok(Some(flatten_gateway_network(state, &id.locality, network))),
            None => Ok(None),
        }
    }

    async fn update<'a>(
        &self,
        meta: &Meta,
        prior: GatewayNetworkState<'a>,
        planned: GatewayNetworkState<'a>,
    ) -> Result<GatewayNetworkState<'a>> {
        let id: ZonedId = parse_id(&prior.id)?;
        let api = GatewayApi::new(&meta.client, &id.locality);

        let request = UpdateGatewayNetworkRequest {
            enable_masquerade: (prior.enable_masquerade != planned.enable_masquerade)
                .then(|| expand_bool(&planned.enable_masquerade))
                .flatten(),
            enable_dhcp: (prior.enable_dhcp != planned.enable_dhcp)
                .then(|| expand_bool(&planned.enable_dhcp))
                .flatten(),
        };
        if request.enable_masquerade.is_some() || request.enable_dhcp.is_some() {
            api.update_gateway_network(&id.id, &request)
                .await
                .context("cannot update gateway network")?;
        }

        let network = wait_gateway_network(&api, &id.id, &self.wait).await?;
        Ok(flatten_gateway_network(planned, &id.locality, network))
    }

    async fn delete<'a>(&self, meta: &Meta, state: GatewayNetworkState<'a>) -> Result<()> {
        let id: ZonedId = parse_id(&state.id)?;
        let api = GatewayApi::new(&meta.client, &id.locality);

        let Some(network) = api.get_gateway_network(&id.id).await.found()? else {
            return Ok(());
        };
        wait_gateway(&api, &network.gateway_id, &self.wait).await?;
        api.delete_gateway_network(&id.id)
            .await
            .found()
            .context("cannot detach public gateway")?;

        let what = format!("gateway network {} deletion", id.id);
        let (api, network_id) = (&api, id.id.as_str());
        wait_for_deletion(&what, &self.wait, move || async move {
            api.get_gateway_network(network_id)
                .await
                .map(|network| network.status)
        })
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::meta::tests::test_meta;
    use crate::vpc::public_gateway::tests::{gateway_json, BASE};
    use crate::waiter::tests::FAST_WAIT;

    fn network_json(status: &str) -> serde_json::Value {
        json!({
            "id": "gwn",
            "gateway_id": "gw",
            "private_network_id": "pn",
            "mac_address": "02:00:00:00:00:02",
            "enable_masquerade": true,
            "enable_dhcp": true,
            "status": status
        })
    }

    #[tokio::test]
    async fn attach_waits_for_gateway_then_network() {
        let server = MockServer::start().await;
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
        Mock::given(method("POST"))
            .and(path(format!("{BASE}/gateway-networks")))
            .and(body_json(json!({
                "gateway_id": "gw",
                "private_network_id": "pn",
                "enable_masquerade": true,
                "enable_dhcp": true
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(network_json("created")))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("{BASE}/gateway-networks/gwn")))
            .respond_with(ResponseTemplate::new(200).set_body_json(network_json("attaching")))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("{BASE}/gateway-networks/gwn")))
            .respond_with(ResponseTemplate::new(200).set_body_json(network_json("ready")))
            .mount(&server)
            .await;

        let meta = test_meta(&server);
        let resource = GatewayNetworkResource { wait: FAST_WAIT };
        let mut state = GatewayNetworkState {
            gateway_id: flatten_string("fr-par-1/gw"),
            private_network_id: flatten_string("fr-par/pn"),
            ..Default::default()
        };
        resource.plan_create(&meta, &mut state).unwrap();

        let state = resource.create(&meta, state).await.unwrap();
        assert_eq!(state.id, flatten_string("fr-par-1/gwn"));
        assert_eq!(state.gateway_id, flatten_string("fr-par-1/gw"));
        assert_eq!(state.private_network_id, flatten_string("fr-par/pn"));
        assert_eq!(state.status, flatten_string("ready"));
    }

    #[tokio::test]
    async fn attach_in_gateway_zone() {
        let server = MockServer::start().await;
        let base = "/vpc-gw/v1/zones/nl-ams-1";
        Mock::given(method("GET"))
            .and(path(format!("{base}/gateways/gw")))
            .respond_with(ResponseTemplate::new(200).set_body_json(gateway_json("running")))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(format!("{base}/gateway-networks")))
            .respond_with(ResponseTemplate::new(200).set_body_json(network_json("created")))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("{base}/gateway-networks/gwn")))
            .respond_with(ResponseTemplate::new(200).set_body_json(network_json("ready")))
            .mount(&server)
            .await;

        let meta = test_meta(&server);
        let resource = GatewayNetworkResource { wait: FAST_WAIT };
        let mut state = GatewayNetworkState {
            gateway_id: flatten_string("nl-ams-1/gw"),
            private_network_id: flatten_string("nl-ams/pn"),
            ..Default::default()
        };
        resource.plan_create(&meta, &mut state).unwrap();
        assert_eq!(state.zone, flatten_string("nl-ams-1"));

        let state = resource.create(&meta, state).await.unwrap();
        assert_eq!(state.id, flatten_string("nl-ams-1/gwn"));
        assert_eq!(state.gateway_id, flatten_string("nl-ams-1/gw"));
        assert_eq!(state.private_network_id, flatten_string("nl-ams/pn"));
    }

    #[tokio::test]
    async fn detach_waits_until_gone() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{BASE}/gateway-networks/gwn")))
            .respond_with(ResponseTemplate::new(200).set_body_json(network_json("ready")))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("{BASE}/gateways/gw")))
            .respond_with(ResponseTemplate::new(200).set_body_json(gateway_json("running")))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path(format!("{BASE}/gateway-networks/gwn")))
            .and(query_param("cleanup_dhcp", "false"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("{BASE}/gateway-networks/gwn")))
            .respond_with(ResponseTemplate::new(200).set_body_json(network_json("detaching")))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("{BASE}/gateway-networks/gwn")))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"type": "not_found"})))
            .mount(&server)
            .await;

        let meta = test_meta(&server);
        let resource = GatewayNetworkResource { wait: FAST_WAIT };
        let state = GatewayNetworkState {
            id: flatten_string("fr-par-1/gwn"),
            ..Default::default()
        };
        resource.delete(&meta, state).await.unwrap();
    }

    #[test]
    fn references_force_replacement() {
        let prior = GatewayNetworkState {
            gateway_id: flatten_string("fr-par-1/gw"),
            private_network_id: flatten_string("fr-par/pn"),
            ..Default::default()
        };
        let mut proposed = GatewayNetworkState {
            gateway_id: flatten_string("gw"),
            ..prior.clone()
        };
        assert!(GatewayNetworkResource::default().plan_update(&prior, &mut proposed).is_empty());
    }
}
