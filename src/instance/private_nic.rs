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
    expand_id, expand_strings, flatten_reference, flatten_string, flatten_tags, parse_id,
};
use crate::locality::{validate_zone, NestedZonedId, Zone};
use crate::meta::Meta;
use crate::schema;
use crate::utils::{impl_with_id, WithSchema, WithValidate};
use crate::waiter::{wait_for, wait_for_deletion, Status, WaitConfig};

use super::api::{CreatePrivateNicRequest, InstanceApi, PrivateNic};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrivateNicState<'a> {
    pub id: ValueString<'a>,
    pub zone: ValueString<'a>,
    pub server_id: ValueString<'a>,
    pub private_network_id: ValueString<'a>,
    pub mac_address: ValueString<'a>,
    pub tags: ValueList<ValueString<'a>>,
}

impl_with_id!(PrivateNicState);

impl<'a> WithSchema for PrivateNicState<'a> {
    fn schema() -> Schema {
        Schema {
            version: 1,
            block: Block {
                version: 1,
                description: Description::plain(
                    "Private network interface of a Scaleway Instance server",
                ),
                attributes: map! {
                    "id" => schema::id("Id of the private NIC, as `<zone>/<server id>/<nic id>`"),
                    "zone" => schema::zone(),
                    "server_id" => schema::required(AttributeType::String, "Server the NIC is plugged into"),
                    "private_network_id" => schema::required(AttributeType::String, "Private network of the NIC"),
                    "mac_address" => schema::computed(AttributeType::String, "MAC address of the NIC"),
                    "tags" => schema::tags(),
                },
                ..Default::default()
            },
        }
    }
}

impl<'a> WithValidate for PrivateNicState<'a> {
    fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        validate_zone(diags, &self.zone, attr_path.attribute("zone"));
    }
}

fn flatten_private_nic<'a>(
    state: PrivateNicState<'a>,
    zone: &Zone,
    nic: PrivateNic,
) -> PrivateNicState<'a> {
    PrivateNicState {
        id: flatten_string(NestedZonedId::new(zone.clone(), &nic.server_id, &nic.id).to_string()),
        zone: flatten_string(zone.to_string()),
        server_id: flatten_reference(&state.server_id, zone, Some(nic.server_id)),
        private_network_id: flatten_reference(
            &state.private_network_id,
            &zone.region(),
            Some(nic.private_network_id),
        ),
        mac_address: flatten_string(nic.mac_address),
        tags: flatten_tags(&state.tags, nic.tags),
    }
}

async fn wait_private_nic(
    api: &InstanceApi<'_>,
    server_id: &str,
    id: &str,
    config: &WaitConfig,
) -> Result<PrivateNic> {
    let what = format!("private NIC {id}");
    let nic = wait_for(&what, config, move || async move {
        let nic = api.get_private_nic(server_id, id).await?;
        Ok(if nic.state == "available" {
            Status::Ready(nic)
        } else if nic.state == "syncing_error" {
            Status::Failed(nic.state)
        } else {
            Status::Pending(nic.state)
        })
    })
    .await?;
    Ok(nic)
}

#[derive(Debug, Clone, Copy)]
pub struct PrivateNicResource {
    wait: WaitConfig,
}

impl Default for PrivateNicResource {
    fn default() -> Self {
        Self {
            wait: WaitConfig::new(10 * 60, 5),
        }
    }
}

#[async_trait]
impl ScalewayResource for PrivateNicResource {
    type State<'a> = PrivateNicState<'a>;

    const NAME: &'static str = "instance_private_nic";
    const ID_KIND: IdKind = IdKind::NestedZoned;

    fn plan_create<'a>(&self, meta: &Meta, state: &mut PrivateNicState<'a>) -> Result<()> {
        let zone = meta.parent_zone(&state.zone, &state.server_id)?;
        state.zone = flatten_string(zone.to_string());
        state.mac_address = Value::Unknown;
        Ok(())
    }

    fn plan_update<'a>(
        &self,
        prior: &PrivateNicState<'a>,
        proposed: &mut PrivateNicState<'a>,
    ) -> Vec<AttributePath> {
        ReplaceTriggers::new()
            .check("zone", &prior.zone, &proposed.zone)
            .check("server_id", &prior.server_id, &proposed.server_id)
            .check(
                "private_network_id",
                &prior.private_network_id,
                &proposed.private_network_id,
            )
            .build()
    }

    async fn create<'a>(
        &self,
        meta: &Meta,
        planned: PrivateNicState<'a>,
    ) -> Result<PrivateNicState<'a>> {
        let zone = meta.parent_zone(&planned.zone, &planned.server_id)?;
        let api = InstanceApi::new(&meta.client, &zone);
        let server_id = expand_id(&planned.server_id).context("`server_id` is required")?;

        let nic = api
            .create_private_nic(
                &server_id,
                &CreatePrivateNicRequest {
                    private_network_id: expand_id(&planned.private_network_id)
                        .context("`private_network_id` is required")?,
                    tags: expand_strings(&planned.tags).unwrap_or_default(),
                },
            )
            .await
            .context("cannot create private NIC")?;

        let nic = wait_private_nic(&api, &server_id, &nic.id, &self.wait).await?;
        Ok(flatten_private_nic(planned, &zone, nic))
    }

    async fn read<'a>(
        &self,
        meta: &Meta,
        state: PrivateNicState<'a>,
    ) -> Result<Option<PrivateNicState<'a>>> {
        let id: NestedZonedId = parse_id(&state.id)?;
        let api = InstanceApi::new(&meta.client, &id.locality);

        match api.get_private_nic(&id.parent_id, &id.id).await.found()? {
            Some(nic) => Ok(Some(flatten_private_nic(state, &id.locality, nic))),
            None => Ok(None),
        }
    }

    async fn update<'a>(
        &self,
        meta: &Meta,
        prior: PrivateNicState<'a>,
        planned: PrivateNicState<'a>,
    ) -> Result<PrivateNicState<'a>> {
        let id: NestedZonedId = parse_id(&prior.id)?;
        let api = InstanceApi::new(&meta.client, &id.locality);

        let nic = if prior.tags != planned.tags {
            api.update_private_nic_tags(
                &id.parent_id,
                &id.id,
                &expand_strings(&planned.tags).unwrap_or_default(),
            )
            .await
            .context("cannot update private NIC")?
        } else {
            api.get_private_nic(&id.parent_id, &id.id).await?
        };
        Ok(flatten_private_nic(planned, &id.locality, nic))
    }

    async fn delete<'a>(&self, meta: &Meta, state: PrivateNicState<'a>) -> Result<()> {
        let id: NestedZonedId = parse_id(&state.id)?;
        let api = InstanceApi::new(&meta.client, &id.locality);

        if api
            .delete_private_nic(&id.parent_id, &id.id)
            .await
            .found()
            .context("cannot delete private NIC")?
            .is_none()
        {
            return Ok(());
        }

        let what = format!("private NIC {} deletion", id.id);
        let (api, server_id, nic_id) = (&api, id.parent_id.as_str(), id.id.as_str());
        wait_for_deletion(&what, &self.wait, move || async move {
            api.get_private_nic(server_id, nic_id)
                .await
                .map(|nic| nic.state)
        })
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::meta::tests::test_meta;
    use crate::waiter::tests::FAST_WAIT;

    const BASE: &str = "/instance/v1/zones/fr-par-1";

    fn nic_json(state: &str) -> serde_json::Value {
        json!({
            "private_nic": {
                "id": "nic",
                "server_id": "srv",
                "private_network_id": "pn",
                "mac_address": "02:00:00:00:00:01",
                "state": state,
                "tags": []
            }
        })
    }

    #[tokio::test]
    async fn create_waits_for_available() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("{BASE}/servers/srv/private_nics")))
            .and(body_json(json!({"private_network_id": "pn", "tags": []})))
            .respond_with(ResponseTemplate::new(201).set_body_json(nic_json("syncing")))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("{BASE}/servers/srv/private_nics/nic")))
            .respond_with(ResponseTemplate::new(200).set_body_json(nic_json("syncing")))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("{BASE}/servers/srv/private_nics/nic")))
            .respond_with(ResponseTemplate::new(200).set_body_json(nic_json("available")))
            .mount(&server)
            .await;

        let meta = test_meta(&server);
        let resource = PrivateNicResource { wait: FAST_WAIT };
        let mut state = PrivateNicState {
            server_id: flatten_string("fr-par-1/srv"),
            private_network_id: flatten_string("fr-par/pn"),
            ..Default::default()
        };
        resource.plan_create(&meta, &mut state).unwrap();

        let state = resource.create(&meta, state).await.unwrap();
        assert_eq!(state.id, flatten_string("fr-par-1/srv/nic"));
        assert_eq!(state.server_id, flatten_string("fr-par-1/srv"));
        assert_eq!(state.private_network_id, flatten_string("fr-par/pn"));
        assert_eq!(state.mac_address, flatten_string("02:00:00:00:00:01"));
    }

    #[tokio::test]
    async fn create_in_server_zone() {
        let server = MockServer::start().await;
        let nic = json!({
            "private_nic": {
                "id": "nic",
                "server_id": "srv",
                "private_network_id": "pn",
                "mac_address": "02:00:00:00:00:02",
                "state": "available",
                "tags": []
            }
        });
        Mock::given(method("POST"))
            .and(path("/instance/v1/zones/fr-par-2/servers/srv/private_nics"))
            .respond_with(ResponseTemplate::new(201).set_body_json(nic.clone()))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/instance/v1/zones/fr-par-2/servers/srv/private_nics/nic"))
            .respond_with(ResponseTemplate::new(200).set_body_json(nic))
            .mount(&server)
            .await;

        let meta = test_meta(&server);
        let resource = PrivateNicResource { wait: FAST_WAIT };
        let mut state = PrivateNicState {
            server_id: flatten_string("fr-par-2/srv"),
            private_network_id: flatten_string("fr-par/pn"),
            ..Default::default()
        };
        resource.plan_create(&meta, &mut state).unwrap();
        assert_eq!(state.zone, flatten_string("fr-par-2"));

        let state = resource.create(&meta, state).await.unwrap();
        assert_eq!(state.id, flatten_string("fr-par-2/srv/nic"));
        assert_eq!(state.server_id, flatten_string("fr-par-2/srv"));
    }

    #[tokio::test]
    async fn sync_error_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{BASE}/servers/srv/private_nics/nic")))
            .respond_with(ResponseTemplate::new(200).set_body_json(nic_json("syncing_error")))
            .mount(&server)
            .await;

        let meta = test_meta(&server);
        let api = InstanceApi::new(&meta.client, &meta.default_zone);
        let err = wait_private_nic(&api, "srv", "nic", &FAST_WAIT)
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("syncing_error"));
    }

    #[test]
    fn nested_import_id() {
        assert!(PrivateNicResource::ID_KIND.check("fr-par-1/srv/nic").is_ok());
        assert!(PrivateNicResource::ID_KIND.check("fr-par-1/nic").is_err());
    }
}
