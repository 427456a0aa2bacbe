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
use crate::locality::{validate_region, Region, RegionalId};
use crate::meta::Meta;
use crate::schema;
use crate::utils::{impl_with_id, random_name, WithSchema, WithValidate};

use super::api::{
    CreatePrivateNetworkRequest, PrivateNetwork, UpdatePrivateNetworkRequest, VpcApi,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrivateNetworkState<'a> {
    pub id: ValueString<'a>,
    pub region: ValueString<'a>,
    pub project_id: ValueString<'a>,
    pub organization_id: ValueString<'a>,
    pub name: ValueString<'a>,
    pub tags: ValueList<ValueString<'a>>,
    pub ipv4_subnet: ValueString<'a>,
    pub vpc_id: ValueString<'a>,
    pub created_at: ValueString<'a>,
    pub updated_at: ValueString<'a>,
}

impl_with_id!(PrivateNetworkState);

impl<'a> WithSchema for PrivateNetworkState<'a> {
    fn schema() -> Schema {
        Schema {
            version: 1,
            block: Block {
                version: 1,
                description: Description::plain("Scaleway VPC private network"),
                attributes: map! {
                    "id" => schema::id("Regional id of the private network"),
                    "region" => schema::region(),
                    "project_id" => schema::project_id(),
                    "organization_id" => schema::organization_id(),
                    "name" => schema::optional_computed(AttributeType::String, "Name of the private network, generated when unset"),
                    "tags" => schema::tags(),
                    "ipv4_subnet" => schema::optional_computed(AttributeType::String, "IPv4 subnet of the network (CIDR), allocated when unset"),
                    "vpc_id" => schema::optional_computed(AttributeType::String, "VPC of the network, the default VPC when unset"),
                    "created_at" => schema::timestamp("Creation date of the private network"),
                    "updated_at" => schema::timestamp("Last update date of the private network"),
                },
                ..Default::default()
            },
        }
    }
}

impl<'a> WithValidate for PrivateNetworkState<'a> {
    fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        validate_region(diags, &self.region, attr_path.clone().attribute("region"));
        if let Some(subnet) = self.ipv4_subnet.as_deref_option() {
            if let Err(err) = validate_ipv4_cidr(subnet) {
                diags.error("Invalid subnet", err, attr_path.attribute("ipv4_subnet"));
            }
        }
    }
}

fn validate_ipv4_cidr(subnet: &str) -> Result<(), String> {
    let (address, prefix) = subnet
        .split_once('/')
        .ok_or_else(|| format!("`{subnet}` is not in CIDR notation"))?;
    address
        .parse::<std::net::Ipv4Addr>()
        .map_err(|_| format!("`{address}` is not an IPv4 address"))?;
    match prefix.parse::<u8>() {
        Ok(prefix) if prefix <= 32 => Ok(()),
        _ => Err(format!("`{prefix}` is not a valid prefix length")),
    }
}

pub(crate) fn flatten_private_network<'a>(
    state: PrivateNetworkState<'a>,
    region: &Region,
    network: PrivateNetwork,
) -> PrivateNetworkState<'a> {
    PrivateNetworkState {
        id: flatten_string(RegionalId::new(region.clone(), &network.id).to_string()),
        region: flatten_string(region.to_string()),
        project_id: flatten_string(network.project_id.clone()),
        organization_id: flatten_string(network.organization_id.clone()),
        name: flatten_string(network.name.clone()),
        tags: flatten_tags(&state.tags, network.tags.clone()),
        ipv4_subnet: flatten_optional_string(network.ipv4_subnet().map(str::to_owned)),
        vpc_id: flatten_reference(&state.vpc_id, region, Some(network.vpc_id)),
        created_at: flatten_optional_string(network.created_at),
        updated_at: flatten_optional_string(network.updated_at),
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PrivateNetworkResource;

#[async_trait]
impl ScalewayResource for PrivateNetworkResource {
    type State<'a> = PrivateNetworkState<'a>;

    const NAME: &'static str = "vpc_private_network";
    const ID_KIND: IdKind = IdKind::Regional;

    fn plan_create<'a>(&self, meta: &Meta, state: &mut PrivateNetworkState<'a>) -> Result<()> {
        state.region = flatten_string(meta.region(&state.region)?.to_string());
        state.project_id = meta.plan_project_id(&state.project_id);
        state.organization_id = Value::Unknown;
        unknown_if_null(&mut state.name);
        unknown_if_null(&mut state.ipv4_subnet);
        unknown_if_null(&mut state.vpc_id);
        state.created_at = Value::Unknown;
        state.updated_at = Value::Unknown;
        Ok(())
    }

    fn plan_update<'a>(
        &self,
        prior: &PrivateNetworkState<'a>,
        proposed: &mut PrivateNetworkState<'a>,
    ) -> Vec<AttributePath> {
        if prior.name != proposed.name || prior.tags != proposed.tags {
            proposed.updated_at = Value::Unknown;
        }
        ReplaceTriggers::new()
            .check("region", &prior.region, &proposed.region)
            .check("project_id", &prior.project_id, &proposed.project_id)
            .check("ipv4_subnet", &prior.ipv4_subnet, &proposed.ipv4_subnet)
            .check("vpc_id", &expand_id(&prior.vpc_id), &expand_id(&proposed.vpc_id))
            .build()
    }

    async fn create<'a>(
        &self,
        meta: &Meta,
        planned: PrivateNetworkState<'a>,
    ) -> Result<PrivateNetworkState<'a>> {
        let region = meta.region(&planned.region)?;
        let api = VpcApi::new(&meta.client, &region);

        let network = api
            .create_private_network(&CreatePrivateNetworkRequest {
                name: expand_string(&planned.name).unwrap_or_else(|| random_name("pn")),
                project_id: meta.project_id(&planned.project_id),
                tags: expand_strings(&planned.tags).unwrap_or_default(),
                subnets: expand_string(&planned.ipv4_subnet).into_iter().collect(),
                vpc_id: expand_id(&planned.vpc_id),
            })
            .await
            .context("cannot create private network")?;
        tracing::debug!(id = %network.id, "private network created");

        Ok(flatten_private_network(planned, &region, network))
    }

    async fn read<'a>(
        &self,
        meta: &Meta,
        state: PrivateNetworkState<'a>,
    ) -> Result<Option<PrivateNetworkState<'a>>> {
        let id: RegionalId = parse_id(&state.id)?;
        let api = VpcApi::new(&meta.client, &id.locality);

        match api.get_private_network(&id.id).await.found()? {
            Some(network) => Ok(Some(flatten_private_network(state, &id.locality, network))),
            None => Ok(None),
        }
    }

    async fn update<'a>(
        &self,
        meta: &Meta,
        prior: PrivateNetworkState<'a>,
        planned: PrivateNetworkState<'a>,
    ) -> Result<PrivateNetworkState<'a>> {
        let id: RegionalId = parse_id(&prior.id)?;
        let api = VpcApi::new(&meta.client, &id.locality);

        let request = UpdatePrivateNetworkRequest {
            name: (prior.name != planned.name)
                .then(|| expand_string(&planned.name))
                .flatten(),
            tags: (prior.tags != planned.tags)
                .then(|| expand_strings(&planned.tags).unwrap_or_default()),
        };
        let network = api
            .update_private_network(&id.id, &request)
            .await
            .context("cannot update private network")?;

        Ok(flatten_private_network(planned, &id.locality, network))
    }

    async fn delete<'a>(&self, meta: &Meta, state: PrivateNetworkState<'a>) -> Result<()> {
        let id: RegionalId = parse_id(&state.id)?;
        let api = VpcApi::new(&meta.client, &id.locality);

        api.delete_private_network(&id.id)
            .await
            .found()
            .context("cannot delete private network")?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::meta::tests::{test_meta, PROJECT_ID};

    pub(crate) const BASE: &str = "/vpc/v2/regions/fr-par";

    pub(crate) fn network_json(id: &str, name: &str) -> serde_json::Value {
        json!({
            "id": id,
            "name": name,
            "organization_id": PROJECT_ID,
            "project_id": PROJECT_ID,
            "tags": ["web"],
            "subnets": [
                {"id": "s4", "subnet": "172.16.8.0/22"},
                {"id": "s6", "subnet": "fd5f:519c:6d46:2728::/64"}
            ],
            "vpc_id": "vpc",
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-02T00:00:00Z"
        })
    }

    #[tokio::test]
    async fn create_with_subnet() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("{BASE}/private-networks")))
            .and(body_json(json!({
                "name": "net",
                "project_id": PROJECT_ID,
                "tags": ["web"],
                "subnets": ["172.16.8.0/22"]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(network_json("pn", "net")))
            .expect(1)
            .mount(&server)
            .await;

        let meta = test_meta(&server);
        let mut state = PrivateNetworkState {
            name: flatten_string("net"),
            tags: Value::Value(vec![flatten_string("web")]),
            ipv4_subnet: flatten_string("172.16.8.0/22"),
            ..Default::default()
        };
        PrivateNetworkResource.plan_create(&meta, &mut state).unwrap();
        assert!(state.vpc_id.is_unknown());

        let state = PrivateNetworkResource.create(&meta, state).await.unwrap();
        assert_eq!(state.id, flatten_string("fr-par/pn"));
        assert_eq!(state.ipv4_subnet, flatten_string("172.16.8.0/22"));
        assert_eq!(state.vpc_id, flatten_string("fr-par/vpc"));
        assert_eq!(state.created_at, flatten_string("2024-01-01T00:00:00Z"));
    }

    #[tokio::test]
    async fn read_removed_network() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{BASE}/private-networks/pn")))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "type": "not_found",
                "resource": "private_network",
                "resource_id": "pn"
            })))
            .mount(&server)
            .await;

        let meta = test_meta(&server);
        let state = PrivateNetworkState {
            id: flatten_string("fr-par/pn"),
            ..Default::default()
        };
        assert!(PrivateNetworkResource.read(&meta, state).await.unwrap().is_none());
    }

    #[test]
    fn subnet_and_vpc_force_replacement() {
        let prior = PrivateNetworkState {
            ipv4_subnet: flatten_string("172.16.8.0/22"),
            vpc_id: flatten_string("fr-par/vpc"),
            ..Default::default()
        };
        let mut proposed = PrivateNetworkState {
            vpc_id: flatten_string("vpc"),
            ..prior.clone()
        };
        assert!(PrivateNetworkResource.plan_update(&prior, &mut proposed).is_empty());

        proposed.ipv4_subnet = flatten_string("172.16.12.0/22");
        proposed.vpc_id = flatten_string("other");
        assert_eq!(PrivateNetworkResource.plan_update(&prior, &mut proposed).len(), 2);
    }

    #[test]
    fn cidr() {
        assert!(validate_ipv4_cidr("10.0.0.0/24").is_ok());
        assert!(validate_ipv4_cidr("10.0.0.0").is_err());
        assert!(validate_ipv4_cidr("10.0.0/24").is_err());
        assert!(validate_ipv4_cidr("10.0.0.0/33").is_err());
    }
}
