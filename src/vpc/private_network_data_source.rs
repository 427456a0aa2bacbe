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

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tf_provider::value::{Value, ValueList, ValueString};
use tf_provider::{map, AttributePath, AttributeType, Block, Description, Diagnostics, Schema};

use crate::adapter::ScalewayDataSource;
use crate::expand::{expand_id, expand_string, flatten_string};
use crate::locality::validate_region;
use crate::meta::Meta;
use crate::schema;
use crate::utils::{WithSchema, WithValidate};

use super::api::{PrivateNetwork, VpcApi};
use super::private_network::{flatten_private_network, PrivateNetworkState};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrivateNetworkDataState<'a> {
    pub id: ValueString<'a>,
    pub private_network_id: ValueString<'a>,
    pub name: ValueString<'a>,
    pub region: ValueString<'a>,
    pub project_id: ValueString<'a>,
    pub organization_id: ValueString<'a>,
    pub tags: ValueList<ValueString<'a>>,
    pub ipv4_subnet: ValueString<'a>,
    pub vpc_id: ValueString<'a>,
    pub created_at: ValueString<'a>,
    pub updated_at: ValueString<'a>,
}

impl<'a> WithSchema for PrivateNetworkDataState<'a> {
    fn schema() -> Schema {
        Schema {
            version: 1,
            block: Block {
                version: 1,
                description: Description::plain(
                    "Look up a Scaleway VPC private network by id or by name",
                ),
                attributes: map! {
                    "id" => schema::id("Regional id of the private network"),
                    "private_network_id" => schema::optional_computed(AttributeType::String, "Id of the private network, conflicts with `name`"),
                    "name" => schema::optional_computed(AttributeType::String, "Exact name of the private network, conflicts with `private_network_id`"),
                    "region" => schema::region(),
                    "project_id" => schema::project_id(),
                    "organization_id" => schema::organization_id(),
                    "tags" => schema::computed(AttributeType::List(AttributeType::String.into()), "Tags of the private network"),
                    "ipv4_subnet" => schema::computed(AttributeType::String, "IPv4 subnet of the network"),
                    "vpc_id" => schema::computed(AttributeType::String, "VPC of the network"),
                    "created_at" => schema::timestamp("Creation date of the private network"),
                    "updated_at" => schema::timestamp("Last update date of the private network"),
                },
                ..Default::default()
            },
        }
    }
}

impl<'a> WithValidate for PrivateNetworkDataState<'a> {
    fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        validate_region(diags, &self.region, attr_path.clone().attribute("region"));
        match (&self.private_network_id, &self.name) {
            (Value::Value(_), Value::Value(_)) => diags.error_short(
                "`private_network_id` and `name` cannot be set together",
                attr_path.attribute("name"),
            ),
            (Value::Null, Value::Null) => {
                diags.root_error_short("One of `private_network_id` or `name` must be set")
            }
            _ => (),
        }
    }
}

fn find_by_name(networks: Vec<PrivateNetwork>, name: &str) -> Result<PrivateNetwork> {
    let mut matching = networks.into_iter().filter(|network| network.name == name);
    let network = matching
        .next()
        .ok_or_else(|| anyhow!("no private network named `{name}`"))?;
    if matching.next().is_some() {
        bail!("more than one private network named `{name}`, use `private_network_id` instead");
    }
    Ok(network)
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PrivateNetworkDataSource;

#[async_trait]
impl ScalewayDataSource for PrivateNetworkDataSource {
    type State<'a> = PrivateNetworkDataState<'a>;

    const NAME: &'static str = "vpc_private_network";

    async fn read<'a>(
        &self,
        meta: &Meta,
        config: PrivateNetworkDataState<'a>,
    ) -> Result<PrivateNetworkDataState<'a>> {
        let region = meta.parent_region(&config.region, &config.private_network_id)?;
        let api = VpcApi::new(&meta.client, &region);

        let network = match expand_id(&config.private_network_id) {
            Some(id) => api
                .get_private_network(&id)
                .await
                .with_context(|| format!("cannot read private network {id}"))?,
            None => {
                let name = expand_string(&config.name).context("`name` is not known")?;
                let project_id = meta.project_id(&config.project_id);
                let networks = api
                    .list_private_networks(&name, project_id.as_deref())
                    .await
                    .context("cannot list private networks")?;
                find_by_name(networks, &name)?
            }
        };

        let private_network_id = flatten_string(network.id.clone());
        let state = flatten_private_network(PrivateNetworkState::default(), &region, network);
        Ok(PrivateNetworkDataState {
            id: state.id,
            private_network_id,
            name: state.name,
            region: state.region,
            project_id: state.project_id,
            organization_id: state.organization_id,
            tags: match state.tags {
                Value::Null => Value::Value(Vec::new()),
                tags => tags,
            },
            ipv4_subnet: state.ipv4_subnet,
            vpc_id: state.vpc_id,
            created_at: state.created_at,
            updated_at: state.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::meta::tests::{test_meta, PROJECT_ID};
    use crate::vpc::private_network::tests::{network_json, BASE};

    #[tokio::test]
    async fn by_name_in_default_project() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{BASE}/private-networks")))
            .and(query_param("name", "net"))
            .and(query_param("project_id", PROJECT_ID))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "private_networks": [network_json("a", "net-old"), network_json("b", "net")],
                "total_count": 2
            })))
            .expect(1)
            .mount(&server)
            .await;

        let meta = test_meta(&server);
        let state = PrivateNetworkDataSource
            .read(
                &meta,
                PrivateNetworkDataState {
                    name: flatten_string("net"),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(state.id, flatten_string("fr-par/b"));
        assert_eq!(state.private_network_id, flatten_string("b"));
        assert_eq!(state.tags, Value::Value(vec![flatten_string("web")]));
    }

    #[tokio::test]
    async fn by_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{BASE}/private-networks/pn")))
            .respond_with(ResponseTemplate::new(200).set_body_json(network_json("pn", "net")))
            .expect(1)
            .mount(&server)
            .await;

        let meta = test_meta(&server);
        let state = PrivateNetworkDataSource
            .read(
                &meta,
                PrivateNetworkDataState {
                    private_network_id: flatten_string("fr-par/pn"),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(state.name, flatten_string("net"));
        assert_eq!(state.ipv4_subnet, flatten_string("172.16.8.0/22"));
    }

    #[tokio::test]
    async fn by_id_in_another_region() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/vpc/v2/regions/pl-waw/private-networks/pn"))
            .respond_with(ResponseTemplate::new(200).set_body_json(network_json("pn", "net")))
            .expect(1)
            .mount(&server)
            .await;

        let meta = test_meta(&server);
        let state = PrivateNetworkDataSource
            .read(
                &meta,
                PrivateNetworkDataState {
                    private_network_id: flatten_string("pl-waw/pn"),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(state.id, flatten_string("pl-waw/pn"));
        assert_eq!(state.region, flatten_string("pl-waw"));
    }

    #[tokio::test]
    async fn no_match() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{BASE}/private-networks")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"private_networks": [], "total_count": 0})),
            )
            .mount(&server)
            .await;

        let meta = test_meta(&server);
        let err = PrivateNetworkDataSource
            .read(
                &meta,
                PrivateNetworkDataState {
                    name: flatten_string("net"),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no private network named `net`"));
    }
}
