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
use crate::locality::{validate_zone, ZonedId};
use crate::meta::Meta;
use crate::schema;
use crate::utils::{WithSchema, WithValidate};

use super::api::{InstanceApi, Server};
use super::server::{flatten_server, ServerState};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerDataState<'a> {
    pub id: ValueString<'a>,
    pub server_id: ValueString<'a>,
    pub name: ValueString<'a>,
    pub zone: ValueString<'a>,
    pub project_id: ValueString<'a>,
    pub organization_id: ValueString<'a>,
    #[serde(rename = "type")]
    pub server_type: ValueString<'a>,
    pub image: ValueString<'a>,
    pub tags: ValueList<ValueString<'a>>,
    pub security_group_id: ValueString<'a>,
    pub enable_ipv6: Value<bool>,
    pub state: ValueString<'a>,
    pub public_ip: ValueString<'a>,
    pub private_ip: ValueString<'a>,
}

impl<'a> WithSchema for ServerDataState<'a> {
    fn schema() -> Schema {
        Schema {
            version: 1,
            block: Block {
                version: 1,
                description: Description::plain(
                    "Look up a Scaleway Instance server by id or by name",
                ),
                attributes: map! {
                    "id" => schema::id("Zoned id of the server"),
                    "server_id" => schema::optional_computed(AttributeType::String, "Id of the server, conflicts with `name`"),
                    "name" => schema::optional_computed(AttributeType::String, "Exact name of the server, conflicts with `server_id`"),
                    "zone" => schema::zone(),
                    "project_id" => schema::project_id(),
                    "organization_id" => schema::organization_id(),
                    "type" => schema::computed(AttributeType::String, "Commercial type of the server"),
                    "image" => schema::computed(AttributeType::String, "Image id of the server"),
                    "tags" => schema::computed(AttributeType::List(AttributeType::String.into()), "Tags of the server"),
                    "security_group_id" => schema::computed(AttributeType::String, "Security group of the server"),
                    "enable_ipv6" => schema::computed(AttributeType::Bool, "Whether IPv6 is enabled"),
                    "state" => schema::computed(AttributeType::String, "Power state of the server"),
                    "public_ip" => schema::computed(AttributeType::String, "Public IPv4 address of the server"),
                    "private_ip" => schema::computed(AttributeType::String, "Private IPv4 address of the server"),
                },
                ..Default::default()
            },
        }
    }
}

impl<'a> WithValidate for ServerDataState<'a> {
    fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        validate_zone(diags, &self.zone, attr_path.clone().attribute("zone"));
        match (&self.server_id, &self.name) {
            (Value::Value(_), Value::Value(_)) => diags.error_short(
                "`server_id` and `name` cannot be set together",
                attr_path.attribute("name"),
            ),
            (Value::Null, Value::Null) => {
                diags.root_error_short("One of `server_id` or `name` must be set")
            }
            _ => (),
        }
    }
}

/// Only server with exactly `name`, as the API filters on substrings
fn find_by_name(servers: Vec<Server>, name: &str) -> Result<Server> {
    let mut matching = servers.into_iter().filter(|server| server.name == name);
    let server = matching
        .next()
        .ok_or_else(|| anyhow!("no server named `{name}`"))?;
    if matching.next().is_some() {
        bail!("more than one server named `{name}`, use `server_id` instead");
    }
    Ok(server)
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ServerDataSource;

#[async_trait]
impl ScalewayDataSource for ServerDataSource {
    type State<'a> = ServerDataState<'a>;

    const NAME: &'static str = "instance_server";

    async fn read<'a>(
        &self,
        meta: &Meta,
        config: ServerDataState<'a>,
    ) -> Result<ServerDataState<'a>> {
        let zone = meta.parent_zone(&config.zone, &config.server_id)?;
        let api = InstanceApi::new(&meta.client, &zone);

        let server = match expand_id(&config.server_id) {
            Some(id) => api
                .get_server(&id)
                .await
                .with_context(|| format!("cannot read server {id}"))?,
            None => {
                let name = expand_string(&config.name).context("`name` is not known")?;
                let project = config.project_id.as_deref_option();
                let servers = api
                    .list_servers(Some(&name), project)
                    .await
                    .context("cannot list servers")?;
                find_by_name(servers, &name)?
            }
        };

        let id = ZonedId::new(zone.clone(), &server.id);
        let server_id = flatten_string(server.id.clone());
        let state = flatten_server(ServerState::default(), &zone, server);
        Ok(ServerDataState {
            id: flatten_string(id.to_string()),
            server_id,
            name: state.name,
            zone: state.zone,
            project_id: state.project_id,
            organization_id: state.organization_id,
            server_type: state.server_type,
            image: state.image,
            tags: match state.tags {
                Value::Null => Value::Value(Vec::new()),
                tags => tags,
            },
            security_group_id: state.security_group_id,
            enable_ipv6: state.enable_ipv6,
            state: state.state,
            public_ip: state.public_ip,
            private_ip: state.private_ip,
        })
    }
}
