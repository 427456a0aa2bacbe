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

use std::fmt::Display;
use std::str::FromStr;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use tf_provider::value::{Value, ValueList, ValueString};
use tf_provider::{map, AttributePath, AttributeType, Block, Description, Diagnostics, Schema};

use crate::adapter::{IdKind, ReplaceTriggers, ScalewayResource};
use crate::client::NotFoundExt;
use crate::expand::{
    expand_bool, expand_id, expand_string, expand_strings, flatten_bool, flatten_optional_string,
    flatten_reference, flatten_string, flatten_tags, parse_id, unknown_if_null,
};
use crate::locality::{validate_zone, Zone, ZonedId};
use crate::meta::Meta;
use crate::schema;
use crate::utils::{impl_with_id, random_name, WithSchema, WithValidate};
use crate::waiter::{wait_for, wait_for_deletion, Status, WaitConfig};

use super::api::{CreateServerRequest, InstanceApi, Server, ServerAction, UpdateServerRequest};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerState<'a> {
    pub id: ValueString<'a>,
    pub zone: ValueString<'a>,
    pub project_id: ValueString<'a>,
    pub organization_id: ValueString<'a>,
    pub name: ValueString<'a>,
    #[serde(rename = "type")]
    pub server_type: ValueString<'a>,
    pub image: ValueString<'a>,
    pub tags: ValueList<ValueString<'a>>,
    pub security_group_id: ValueString<'a>,
    pub enable_ipv6: Value<bool>,
    pub ip_id: ValueString<'a>,
    pub state: ValueString<'a>,
    pub public_ip: ValueString<'a>,
    pub private_ip: ValueString<'a>,
}

impl_with_id!(ServerState);

impl<'a> WithSchema for ServerState<'a> {
    fn schema() -> Schema {
        Schema {
            version: 1,
            block: Block {
                version: 1,
                description: Description::plain("Scaleway Instance server"),
                attributes: map! {
                    "id" => schema::id("Zoned id of the server"),
                    "zone" => schema::zone(),
                    "project_id" => schema::project_id(),
                    "organization_id" => schema::organization_id(),
                    "name" => schema::optional_computed(AttributeType::String, "Name of the server, generated when unset"),
                    "type" => schema::required(AttributeType::String, "Commercial type of the server (e.g. `DEV1-S`)"),
                    "image" => schema::required(AttributeType::String, "Image of the server; changing it recreates the server"),
                    "tags" => schema::tags(),
                    "security_group_id" => schema::optional_computed(AttributeType::String, "Security group of the server"),
                    "enable_ipv6" => schema::optional_computed(AttributeType::Bool, "Enable IPv6 on the server"),
                    "ip_id" => schema::optional(AttributeType::String, "Flexible IP attached to the server"),
                    "state" => schema::optional_computed(AttributeType::String, "Power state of the server: `started`, `stopped` or `standby`"),
                    "public_ip" => schema::computed(AttributeType::String, "Public IPv4 address of the server"),
                    "private_ip" => schema::computed(AttributeType::String, "Private IPv4 address of the server"),
                },
                ..Default::default()
            },
        }
    }
}

impl<'a> WithValidate for ServerState<'a> {
    fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        validate_zone(diags, &self.zone, attr_path.clone().attribute("zone"));
        if let Some(state) = self.state.as_deref_option() {
            if let Err(err) = state.parse::<PowerState>() {
                diags.error(
                    "Invalid server state",
                    err.to_string(),
                    attr_path.attribute("state"),
                );
            }
        }
    }
}

/// Power state requested through the `state` attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PowerState {
    Started,
    Stopped,
    Standby,
}

impl PowerState {
    pub fn as_str(self) -> &'static str {
        match self {
            PowerState::Started => "started",
            PowerState::Stopped => "stopped",
            PowerState::Standby => "standby",
        }
    }

    /// Stable power state matching an API server state
    pub fn from_api(state: &str) -> Option<Self> {
        match state {
            "running" => Some(PowerState::Started),
            "stopped" => Some(PowerState::Stopped),
            "stopped in place" => Some(PowerState::Standby),
            _ => None,
        }
    }

    /// Next action to send to move from `self` towards `target`
    fn next_action(self, target: PowerState) -> Option<ServerAction> {
        match (self, target) {
            (current, target) if current == target => None,
            (_, PowerState::Started) => Some(ServerAction::Poweron),
            (_, PowerState::Stopped) => Some(ServerAction::Poweroff),
            (PowerState::Started, PowerState::Standby) => Some(ServerAction::StopInPlace),
            // stop_in_place is only allowed from a running server
            (_, PowerState::Standby) => Some(ServerAction::Poweron),
        }
    }
}

impl FromStr for PowerState {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "started" => Ok(PowerState::Started),
            "stopped" => Ok(PowerState::Stopped),
            "standby" => Ok(PowerState::Standby),
            _ => Err(anyhow!(
                "unknown server state `{s}`, expected one of: started, stopped, standby"
            )),
        }
    }
}

impl Display for PowerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn action_result(action: ServerAction) -> Option<PowerState> {
    match action {
        ServerAction::Poweron => Some(PowerState::Started),
        ServerAction::Poweroff => Some(PowerState::Stopped),
        ServerAction::StopInPlace => Some(PowerState::Standby),
        ServerAction::Terminate => None,
    }
}

/// Wait until the server is in a stable state, or in `target` when given
pub(crate) async fn wait_server(
    api: &InstanceApi<'_>,
    id: &str,
    target: Option<PowerState>,
    config: &WaitConfig,
) -> Result<Server> {
    let what = format!("instance server {id}");
    let server = wait_for(&what, config, move || async move {
        let server = api.get_server(id).await?;
        if server.state == "locked" {
            return Ok(Status::Failed(server.state));
        }
        match PowerState::from_api(&server.state) {
            Some(state) if target.map_or(true, |target| target == state) => {
                Ok(Status::Ready(server))
            }
            _ => Ok(Status::Pending(server.state)),
        }
    })
    .await?;
    Ok(server)
}

/// Drive the server to `target`, waiting out transitional states before each action
pub(crate) async fn reach_state(
    api: &InstanceApi<'_>,
    id: &str,
    target: PowerState,
    config: &WaitConfig,
) -> Result<Server> {
    let mut server = wait_server(api, id, None, config).await?;

    // standby from stopped goes through running
    for _ in 0..2 {
        let current = PowerState::from_api(&server.state)
            .ok_or_else(|| anyhow!("unexpected server state `{}`", server.state))?;
        let Some(action) = current.next_action(target) else {
            return Ok(server);
        };

        tracing::info!(server = id, %action, %target, "sending server action");
        api.server_action(id, action)
            .await
            .with_context(|| format!("cannot {action} server {id}"))?;
        server = wait_server(api, id, action_result(action), config).await?;
    }

    match PowerState::from_api(&server.state) {
        Some(state) if state == target => Ok(server),
        _ => bail!(
            "server {id} is `{}` instead of `{target}`",
            server.state
        ),
    }
}

fn target_state(state: &ServerState<'_>) -> Result<PowerState> {
    state
        .state
        .as_deref_option()
        .map_or(Ok(PowerState::Started), str::parse)
}

pub(crate) fn flatten_server<'a>(
    state: ServerState<'a>,
    zone: &Zone,
    server: Server,
) -> ServerState<'a> {
    let flexible_ip = server
        .public_ip
        .as_ref()
        .filter(|ip| !ip.dynamic)
        .map(|ip| ip.id.clone());

    ServerState {
        id: flatten_string(ZonedId::new(zone.clone(), &server.id).to_string()),
        zone: flatten_string(zone.to_string()),
        project_id: flatten_string(server.project),
        organization_id: flatten_string(server.organization),
        name: flatten_string(server.name),
        server_type: flatten_string(server.commercial_type),
        image: match state.image {
            // Images may be configured by label, which the API resolves to an id
            Value::Value(image) => Value::Value(image),
            _ => flatten_optional_string(server.image.map(|image| image.id)),
        },
        tags: flatten_tags(&state.tags, server.tags),
        security_group_id: flatten_reference(
            &state.security_group_id,
            zone,
            server.security_group.map(|sg| sg.id),
        ),
        enable_ipv6: flatten_bool(server.enable_ipv6),
        ip_id: flatten_reference(&state.ip_id, zone, flexible_ip),
        public_ip: flatten_optional_string(server.public_ip.map(|ip| ip.address)),
        private_ip: flatten_optional_string(server.private_ip),
        state: match PowerState::from_api(&server.state) {
            Some(power_state) => flatten_string(power_state.as_str()),
            None => state.state,
        },
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ServerResource {
    wait: WaitConfig,
}

impl Default for ServerResource {
    fn default() -> Self {
        Self {
            wait: WaitConfig::new(10 * 60, 5),
        }
    }
}

#[async_trait]
impl ScalewayResource for ServerResource {
    type State<'a> = ServerState<'a>;

    const NAME: &'static str = "instance_server";
    const ID_KIND: IdKind = IdKind::Zoned;

    fn plan_create<'a>(&self, meta: &Meta, state: &mut ServerState<'a>) -> Result<()> {
        state.zone = flatten_string(meta.zone(&state.zone)?.to_string());
        state.project_id = meta.plan_project_id(&state.project_id);
        state.organization_id = Value::Unknown;
        unknown_if_null(&mut state.name);
        unknown_if_null(&mut state.security_group_id);
        if state.state.is_null() {
            state.state = flatten_string(PowerState::Started.as_str());
        }
        if state.enable_ipv6.is_null() {
            state.enable_ipv6 = flatten_bool(false);
        }
        state.public_ip = Value::Unknown;
        state.private_ip = Value::Unknown;
        Ok(())
    }

    fn plan_update<'a>(
        &self,
        prior: &ServerState<'a>,
        proposed: &mut ServerState<'a>,
    ) -> Vec<AttributePath> {
        if prior.ip_id != proposed.ip_id {
            proposed.public_ip = Value::Unknown;
        }
        ReplaceTriggers::new()
            .check("image", &prior.image, &proposed.image)
            .check("zone", &prior.zone, &proposed.zone)
            .check("project_id", &prior.project_id, &proposed.project_id)
            .build()
    }

    async fn create<'a>(&self, meta: &Meta, planned: ServerState<'a>) -> Result<ServerState<'a>> {
        let zone = meta.zone(&planned.zone)?;
        let api = InstanceApi::new(&meta.client, &zone);
        let target = target_state(&planned)?;

        let request = CreateServerRequest {
            name: expand_string(&planned.name).unwrap_or_else(|| random_name("srv")),
            commercial_type: expand_string(&planned.server_type).context("`type` is required")?,
            image: expand_id(&planned.image).context("`image` is required")?,
            project: meta.project_id(&planned.project_id),
            tags: expand_strings(&planned.tags).unwrap_or_default(),
            enable_ipv6: expand_bool(&planned.enable_ipv6).unwrap_or_default(),
            dynamic_ip_required: false,
            security_group: expand_id(&planned.security_group_id),
        };
        let server = api
            .create_server(&request)
            .await
            .context("cannot create server")?;
        tracing::debug!(id = %server.id, name = %server.name, "server created");

        if let Some(ip_id) = expand_id(&planned.ip_id) {
            api.attach_ip(&ip_id, Some(&server.id))
                .await
                .with_context(|| format!("cannot attach flexible IP {ip_id}"))?;
        }

        let server = reach_state(&api, &server.id, target, &self.wait).await?;
        Ok(flatten_server(planned, &zone, server))
    }

    async fn read<'a>(
        &self,
        meta: &Meta,
        state: ServerState<'a>,
    ) -> Result<Option<ServerState<'a>>> {
        let id: ZonedId = parse_id(&state.id)?;
        let api = InstanceApi::new(&meta.client, &id.locality);

        match api.get_server(&id.id).await.found()? {
            Some(server) => Ok(Some(flatten_server(state, &id.locality, server))),
            None => Ok(None),
        }
    }

    async fn update<'a>(
        &self,
        meta: &Meta,
        prior: ServerState<'a>,
        planned: ServerState<'a>,
    ) -> Result<ServerState<'a>> {
        let id: ZonedId = parse_id(&prior.id)?;
        let api = InstanceApi::new(&meta.client, &id.locality);
        let server_id = id.id.as_str();
        let target = target_state(&planned)?;

        if prior.server_type != planned.server_type {
            reach_state(&api, server_id, PowerState::Stopped, &self.wait).await?;
            api.update_server(
                server_id,
                &UpdateServerRequest {
                    commercial_type: expand_string(&planned.server_type),
                    ..Default::default()
                },
            )
            .await
            .context("cannot change server type")?;
        }

        let request = UpdateServerRequest {
            name: (prior.name != planned.name)
                .then(|| expand_string(&planned.name))
                .flatten(),
            tags: (prior.tags != planned.tags)
                .then(|| expand_strings(&planned.tags).unwrap_or_default()),
            enable_ipv6: (prior.enable_ipv6 != planned.enable_ipv6)
                .then(|| expand_bool(&planned.enable_ipv6))
                .flatten(),
            security_group: (prior.security_group_id != planned.security_group_id)
                .then(|| expand_id(&planned.security_group_id))
                .flatten()
                .map(|id| super::api::SecurityGroupRef { id }),
            commercial_type: None,
        };
        if !request.is_empty() {
            api.update_server(server_id, &request)
                .await
                .context("cannot update server")?;
        }

        if prior.ip_id != planned.ip_id {
            if let Some(ip_id) = expand_id(&prior.ip_id) {
                api.attach_ip(&ip_id, None)
                    .await
                    .found()
                    .with_context(|| format!("cannot detach flexible IP {ip_id}"))?;
            }
            if let Some(ip_id) = expand_id(&planned.ip_id) {
                api.attach_ip(&ip_id, Some(server_id))
                    .await
                    .with_context(|| format!("cannot attach flexible IP {ip_id}"))?;
            }
        }

        let server = reach_state(&api, server_id, target, &self.wait).await?;
        Ok(flatten_server(planned, &id.locality, server))
    }

    async fn delete<'a>(&self, meta: &Meta, state: ServerState<'a>) -> Result<()> {
        let id: ZonedId = parse_id(&state.id)?;
        let api = InstanceApi::new(&meta.client, &id.locality);
        let server_id = id.id.as_str();

        let Some(server) = api.get_server(server_id).await.found()? else {
            return Ok(());
        };
        if let Some(ip) = server.public_ip.as_ref().filter(|ip| !ip.dynamic) {
            api.attach_ip(&ip.id, None)
                .await
                .found()
                .with_context(|| format!("cannot detach flexible IP {}", ip.id))?;
        }

        let mut server = wait_server(&api, server_id, None, &self.wait).await?;
        if PowerState::from_api(&server.state) == Some(PowerState::Standby) {
            server = reach_state(&api, server_id, PowerState::Stopped, &self.wait).await?;
        }

        if PowerState::from_api(&server.state) == Some(PowerState::Started) {
            // terminate also removes the local volumes
            api.server_action(server_id, ServerAction::Terminate)
                .await
                .context("cannot terminate server")?;
            let what = format!("instance server {server_id} deletion");
            let api = &api;
            wait_for_deletion(&what, &self.wait, move || async move {
                api.get_server(server_id).await.map(|server| server.state)
            })
            .await?;
        } else {
            api.delete_server(server_id)
                .await
                .found()
                .context("cannot delete server")?;
            let api = &api;
            try_join_all(server.volumes.values().map(|volume| async move {
                api.delete_volume(&volume.id)
                    .await
                    .found()
                    .with_context(|| format!("cannot delete volume {}", volume.id))
            }))
            .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_json, body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::meta::tests::{test_meta, PROJECT_ID};
    use crate::waiter::tests::FAST_WAIT;

    const BASE: &str = "/instance/v1/zones/fr-par-1";
    const SERVER_ID: &str = "11111111-0000-0000-0000-000000000001";

    fn server_json(state: &str) -> serde_json::Value {
        json!({
            "server": {
                "id": SERVER_ID,
                "name": "web",
                "organization": PROJECT_ID,
                "project": PROJECT_ID,
                "commercial_type": "DEV1-S",
                "state": state,
                "tags": ["web"],
                "image": {"id": "img"},
                "public_ip": null,
                "private_ip": "10.0.0.1",
                "enable_ipv6": false,
                "security_group": {"id": "sg"},
                "volumes": {"0": {"id": "vol", "volume_type": "l_ssd"}}
            }
        })
    }

    async fn mock_get_server(server: &MockServer, state: &str, times: u64) {
        Mock::given(method("GET"))
            .and(path(format!("{BASE}/servers/{SERVER_ID}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(server_json(state)))
            .up_to_n_times(times)
            .mount(server)
            .await;
    }

    fn planned() -> ServerState<'static> {
        ServerState {
            zone: flatten_string("fr-par-1"),
            name: flatten_string("web"),
            server_type: flatten_string("DEV1-S"),
            image: flatten_string("img"),
            tags: Value::Value(vec![flatten_string("web")]),
            state: flatten_string("started"),
            ..Default::default()
        }
    }

    #[test]
    fn next_actions() {
        use PowerState::*;
        assert_eq!(Started.next_action(Started), None);
        assert_eq!(Stopped.next_action(Started), Some(ServerAction::Poweron));
        assert_eq!(Standby.next_action(Started), Some(ServerAction::Poweron));
        assert_eq!(Started.next_action(Stopped), Some(ServerAction::Poweroff));
        assert_eq!(Started.next_action(Standby), Some(ServerAction::StopInPlace));
        assert_eq!(Stopped.next_action(Standby), Some(ServerAction::Poweron));
    }

    #[test]
    fn invalid_state() {
        let mut diags = Diagnostics::default();
        let state = ServerState {
            state: flatten_string("paused"),
            ..Default::default()
        };
        state.validate(&mut diags, AttributePath::default());
        assert_eq!(diags.errors.len(), 1);
    }

    #[tokio::test]
    async fn create_and_start() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("{BASE}/servers")))
            .and(body_partial_json(json!({
                "name": "web",
                "commercial_type": "DEV1-S",
                "image": "img",
                "project": PROJECT_ID,
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(server_json("stopped")))
            .expect(1)
            .mount(&server)
            .await;
        mock_get_server(&server, "stopped", 1).await;
        Mock::given(method("POST"))
            .and(path(format!("{BASE}/servers/{SERVER_ID}/action")))
            .and(body_json(json!({"action": "poweron"})))
            .respond_with(ResponseTemplate::new(202).set_body_json(json!({"task": {}})))
            .expect(1)
            .mount(&server)
            .await;
        mock_get_server(&server, "starting", 2).await;
        mock_get_server(&server, "running", 10).await;

        let meta = test_meta(&server);
        let resource = ServerResource { wait: FAST_WAIT };
        let mut state = planned();
        resource.plan_create(&meta, &mut state).unwrap();
        assert_eq!(state.project_id, flatten_string(PROJECT_ID));

        let state = resource.create(&meta, state).await.unwrap();
        assert_eq!(
            state.id,
            flatten_string(format!("fr-par-1/{SERVER_ID}"))
        );
        assert_eq!(state.state, flatten_string("started"));
        assert_eq!(state.security_group_id, flatten_string("fr-par-1/sg"));
        assert_eq!(state.private_ip, flatten_string("10.0.0.1"));
        assert!(state.public_ip.is_null());
    }

    #[tokio::test]
    async fn locked_server_fails() {
        let server = MockServer::start().await;
        mock_get_server(&server, "locked", 10).await;

        let meta = test_meta(&server);
        let api = InstanceApi::new(&meta.client, &meta.default_zone);
        let err = reach_state(&api, SERVER_ID, PowerState::Started, &FAST_WAIT)
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("locked"));
    }

    #[tokio::test]
    async fn read_removed_server() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{BASE}/servers/{SERVER_ID}")))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "type": "not_found",
                "message": "resource is not found",
                "resource": "instance_server",
                "resource_id": SERVER_ID,
            })))
            .mount(&server)
            .await;

        let meta = test_meta(&server);
        let state = ServerState {
            id: flatten_string(format!("fr-par-1/{SERVER_ID}")),
            ..Default::default()
        };
        let state = ServerResource { wait: FAST_WAIT }
            .read(&meta, state)
            .await
            .unwrap();
        assert!(state.is_none());
    }

    #[tokio::test]
    async fn delete_stopped_server_and_volumes() {
        let server = MockServer::start().await;
        mock_get_server(&server, "stopped", 10).await;
        Mock::given(method("DELETE"))
            .and(path(format!("{BASE}/servers/{SERVER_ID}")))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path(format!("{BASE}/volumes/vol")))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let meta = test_meta(&server);
        let state = ServerState {
            id: flatten_string(format!("fr-par-1/{SERVER_ID}")),
            ..Default::default()
        };
        ServerResource { wait: FAST_WAIT }
            .delete(&meta, state)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn type_change_stops_server_first() {
        let server = MockServer::start().await;
        mock_get_server(&server, "running", 1).await;
        Mock::given(method("POST"))
            .and(path(format!("{BASE}/servers/{SERVER_ID}/action")))
            .and(body_json(json!({"action": "poweroff"})))
            .respond_with(ResponseTemplate::new(202).set_body_json(json!({"task": {}})))
            .expect(1)
            .mount(&server)
            .await;
        mock_get_server(&server, "stopped", 2).await;
        Mock::given(method("PATCH"))
            .and(path(format!("{BASE}/servers/{SERVER_ID}")))
            .and(body_json(json!({"commercial_type": "DEV1-M"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(server_json("stopped")))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(format!("{BASE}/servers/{SERVER_ID}/action")))
            .and(body_json(json!({"action": "poweron"})))
            .respond_with(ResponseTemplate::new(202).set_body_json(json!({"task": {}})))
            .expect(1)
            .mount(&server)
            .await;
        mock_get_server(&server, "running", 10).await;

        let meta = test_meta(&server);
        let prior = ServerState {
            id: flatten_string(format!("fr-par-1/{SERVER_ID}")),
            ..planned()
        };
        let planned = ServerState {
            server_type: flatten_string("DEV1-M"),
            ..prior.clone()
        };
        let state = ServerResource { wait: FAST_WAIT }
            .update(&meta, prior, planned)
            .await
            .unwrap();
        assert_eq!(state.state, flatten_string("started"));
    }
}
