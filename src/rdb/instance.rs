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
    bytes_to_gb, expand_bool, expand_number, expand_string, expand_strings, flatten_bool,
    flatten_number, flatten_optional_string, flatten_string, flatten_tags, gb_to_bytes, parse_id,
    unknown_if_null,
};
use crate::locality::{validate_region, Region, RegionalId};
use crate::meta::Meta;
use crate::schema;
use crate::utils::{impl_with_id, random_name, WithSchema, WithValidate};
use crate::waiter::{wait_for, wait_for_deletion, Status, WaitConfig};

use super::api::{
    CreateInstanceRequest, Instance, RdbApi, UpdateInstanceRequest, UpgradeInstanceRequest,
};

const VOLUME_TYPES: &[&str] = &["lssd", "bssd", "sbs_5k", "sbs_15k"];
const DEFAULT_VOLUME_TYPE: &str = "lssd";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RdbInstanceState<'a> {
    pub id: ValueString<'a>,
    pub region: ValueString<'a>,
    pub project_id: ValueString<'a>,
    pub organization_id: ValueString<'a>,
    pub name: ValueString<'a>,
    pub engine: ValueString<'a>,
    pub node_type: ValueString<'a>,
    pub is_ha_cluster: Value<bool>,
    pub user_name: ValueString<'a>,
    pub password: ValueString<'a>,
    pub disable_backup: Value<bool>,
    pub tags: ValueList<ValueString<'a>>,
    pub volume_type: ValueString<'a>,
    pub volume_size_in_gb: ValueNumber,
    pub endpoint_ip: ValueString<'a>,
    pub endpoint_port: ValueNumber,
}

impl_with_id!(RdbInstanceState);

impl<'a> WithSchema for RdbInstanceState<'a> {
    fn schema() -> Schema {
        Schema {
            version: 1,
            block: Block {
                version: 1,
                description: Description::plain("Scaleway Managed Database instance"),
                attributes: map! {
                    "id" => schema::id("Regional id of the database instance"),
                    "region" => schema::region(),
                    "project_id" => schema::project_id(),
                    "organization_id" => schema::organization_id(),
                    "name" => schema::optional_computed(AttributeType::String, "Name of the instance, generated when unset"),
                    "engine" => schema::required(AttributeType::String, "Engine and version (e.g. `PostgreSQL-15`)"),
                    "node_type" => schema::required(AttributeType::String, "Node type (e.g. `DB-DEV-S`); changing it upgrades the instance"),
                    "is_ha_cluster" => schema::optional_computed(AttributeType::Bool, "Run a high-availability cluster"),
                    "user_name" => schema::required(AttributeType::String, "Initial admin user"),
                    "password" => schema::sensitive(schema::required(AttributeType::String, "Password of the admin user")),
                    "disable_backup" => schema::optional_computed(AttributeType::Bool, "Disable the automatic backup schedule"),
                    "tags" => schema::tags(),
                    "volume_type" => schema::optional_computed(AttributeType::String, "Volume type: `lssd`, `bssd`, `sbs_5k` or `sbs_15k`"),
                    "volume_size_in_gb" => schema::optional_computed(AttributeType::Number, "Volume size in GB; it can only grow in place"),
                    "endpoint_ip" => schema::computed(AttributeType::String, "IP of the instance endpoint"),
                    "endpoint_port" => schema::computed(AttributeType::Number, "Port of the instance endpoint"),
                },
                ..Default::default()
            },
        }
    }
}

impl<'a> WithValidate for RdbInstanceState<'a> {
    fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        validate_region(diags, &self.region, attr_path.clone().attribute("region"));
        if let Some(volume_type) = self.volume_type.as_deref_option() {
            if !VOLUME_TYPES.contains(&volume_type) {
                diags.error(
                    "Invalid volume type",
                    format!("`{volume_type}` is not one of {}", VOLUME_TYPES.join(", ")),
                    attr_path.clone().attribute("volume_type"),
                );
            }
        }
        if let Some(size) = expand_number(&self.volume_size_in_gb) {
            if size <= 0 {
                diags.error_short(
                    "`volume_size_in_gb` must be positive",
                    attr_path.attribute("volume_size_in_gb"),
                );
            }
        }
    }
}

fn flatten_instance<'a>(
    state: RdbInstanceState<'a>,
    region: &Region,
    instance: Instance,
) -> RdbInstanceState<'a> {
    let endpoint = instance.endpoints.into_iter().next();
    RdbInstanceState {
        id: flatten_string(RegionalId::new(region.clone(), &instance.id).to_string()),
        region: flatten_string(region.to_string()),
        project_id: flatten_string(instance.project_id),
        organization_id: flatten_string(instance.organization_id),
        name: flatten_string(instance.name),
        engine: flatten_string(instance.engine),
        node_type: match state.node_type {
            Value::Value(node_type) if node_type.eq_ignore_ascii_case(&instance.node_type) => {
                Value::Value(node_type)
            }
            _ => flatten_string(instance.node_type),
        },
        is_ha_cluster: flatten_bool(instance.is_ha_cluster),
        // the API never returns credentials
        user_name: state.user_name,
        password: state.password,
        disable_backup: flatten_bool(instance.backup_schedule.disabled),
        tags: flatten_tags(&state.tags, instance.tags),
        volume_type: flatten_string(instance.volume.volume_type),
        volume_size_in_gb: flatten_number(bytes_to_gb(instance.volume.size)),
        endpoint_ip: flatten_optional_string(endpoint.as_ref().and_then(|e| e.ip.clone())),
        endpoint_port: match endpoint {
            Some(endpoint) => flatten_number(endpoint.port),
            None => Value::Null,
        },
    }
}

/// Wait until the instance is `ready`
pub(crate) async fn wait_instance(
    api: &RdbApi<'_>,
    id: &str,
    config: &WaitConfig,
) -> Result<Instance> {
    let what = format!("database instance {id}");
    let instance = wait_for(&what, config, move || async move {
        let instance = api.get_instance(id).await?;
        Ok(if instance.status == "ready" {
            Status::Ready(instance)
        } else if instance.status == "error" || instance.status == "locked" {
            Status::Failed(instance.status)
        } else {
            Status::Pending(instance.status)
        })
    })
    .await?;
    Ok(instance)
}

#[derive(Debug, Clone, Copy)]
pub struct RdbInstanceResource {
    wait: WaitConfig,
}

impl Default for RdbInstanceResource {
    fn default() -> Self {
        Self {
            wait: WaitConfig::new(30 * 60, 10),
        }
    }
}

/// Node types are case insensitive for the API
fn node_type_changed(prior: &ValueString<'_>, planned: &ValueString<'_>) -> bool {
    match (prior.as_deref_option(), planned.as_deref_option()) {
        (Some(prior), Some(planned)) => !prior.eq_ignore_ascii_case(planned),
        _ => prior != planned,
    }
}

#[async_trait]
impl ScalewayResource for RdbInstanceResource {
    type State<'a> = RdbInstanceState<'a>;

    const NAME: &'static str = "rdb_instance";
    const ID_KIND: IdKind = IdKind::Regional;

    fn plan_create<'a>(&self, meta: &Meta, state: &mut RdbInstanceState<'a>) -> Result<()> {
        state.region = flatten_string(meta.region(&state.region)?.to_string());
        state.project_id = meta.plan_project_id(&state.project_id);
        state.organization_id = Value::Unknown;
        unknown_if_null(&mut state.name);
        if state.is_ha_cluster.is_null() {
            state.is_ha_cluster = flatten_bool(false);
        }
        if state.disable_backup.is_null() {
            state.disable_backup = flatten_bool(false);
        }
        if state.volume_type.is_null() {
            state.volume_type = flatten_string(DEFAULT_VOLUME_TYPE);
        }
        unknown_if_null(&mut state.volume_size_in_gb);
        state.endpoint_ip = Value::Unknown;
        state.endpoint_port = Value::Unknown;
        Ok(())
    }

    fn plan_update<'a>(
        &self,
        prior: &RdbInstanceState<'a>,
        proposed: &mut RdbInstanceState<'a>,
    ) -> Vec<AttributePath> {
        let mut triggers = ReplaceTriggers::new()
            .check("region", &prior.region, &proposed.region)
            .check("project_id", &prior.project_id, &proposed.project_id)
            .check("engine", &prior.engine, &proposed.engine)
            .check("is_ha_cluster", &prior.is_ha_cluster, &proposed.is_ha_cluster)
            .check("user_name", &prior.user_name, &proposed.user_name)
            .check("volume_type", &prior.volume_type, &proposed.volume_type);
        if let (Some(prior), Some(proposed)) = (
            expand_number(&prior.volume_size_in_gb),
            expand_number(&proposed.volume_size_in_gb),
        ) {
            if proposed < prior {
                triggers = triggers.add("volume_size_in_gb");
            }
        }
        if node_type_changed(&prior.node_type, &proposed.node_type) {
            proposed.endpoint_ip = Value::Unknown;
        }
        triggers.build()
    }

    async fn create<'a>(
        &self,
        meta: &Meta,
        planned: RdbInstanceState<'a>,
    ) -> Result<RdbInstanceState<'a>> {
        let region = meta.region(&planned.region)?;
        let api = RdbApi::new(&meta.client, &region);

        let instance = api
            .create_instance(&CreateInstanceRequest {
                project_id: meta.project_id(&planned.project_id),
                name: expand_string(&planned.name).unwrap_or_else(|| random_name("rdb")),
                engine: expand_string(&planned.engine).context("`engine` is required")?,
                user_name: expand_string(&planned.user_name).context("`user_name` is required")?,
                password: expand_string(&planned.password).context("`password` is required")?,
                node_type: expand_string(&planned.node_type).context("`node_type` is required")?,
                is_ha_cluster: expand_bool(&planned.is_ha_cluster).unwrap_or_default(),
                disable_backup: expand_bool(&planned.disable_backup).unwrap_or_default(),
                tags: expand_strings(&planned.tags).unwrap_or_default(),
                volume_type: expand_string(&planned.volume_type),
                volume_size: expand_number(&planned.volume_size_in_gb)
                    .map(gb_to_bytes)
                    .transpose()?,
            })
            .await
            .context("cannot create database instance")?;
        tracing::debug!(id = %instance.id, "database instance created");

        let instance = wait_instance(&api, &instance.id, &self.wait).await?;
        Ok(flatten_instance(planned, &region, instance))
    }

    async fn read<'a>(
        &self,
        meta: &Meta,
        state: RdbInstanceState<'a>,
    ) -> Result<Option<RdbInstanceState<'a>>> {
        let id: RegionalId = parse_id(&state.id)?;
        let api = RdbApi::new(&meta.client, &id.locality);

        match api.get_instance(&id.id).await.found()? {
            Some(instance) => Ok(Some(flatten_instance(state, &id.locality, instance))),
            None => Ok(None),
        }
    }

    async fn update<'a>(
        &self,
        meta: &Meta,
        prior: RdbInstanceState<'a>,
        planned: RdbInstanceState<'a>,
    ) -> Result<RdbInstanceState<'a>> {
        let id: RegionalId = parse_id(&prior.id)?;
        let api = RdbApi::new(&meta.client, &id.locality);
        let instance_id = id.id.as_str();

        let request = UpdateInstanceRequest {
            name: (prior.name != planned.name)
                .then(|| expand_string(&planned.name))
                .flatten(),
            tags: (prior.tags != planned.tags)
                .then(|| expand_strings(&planned.tags).unwrap_or_default()),
            is_backup_schedule_disabled: (prior.disable_backup != planned.disable_backup)
                .then(|| expand_bool(&planned.disable_backup))
                .flatten(),
        };
        if !request.is_empty() {
            wait_instance(&api, instance_id, &self.wait).await?;
            api.update_instance(instance_id, &request)
                .await
                .context("cannot update database instance")?;
        }

        let mut upgrades = Vec::new();
        if node_type_changed(&prior.node_type, &planned.node_type) {
            if let Some(node_type) = expand_string(&planned.node_type) {
                upgrades.push(UpgradeInstanceRequest::NodeType(node_type));
            }
        }
        if let (Some(prior_size), Some(size)) = (
            expand_number(&prior.volume_size_in_gb),
            expand_number(&planned.volume_size_in_gb),
        ) {
            if size > prior_size {
                upgrades.push(UpgradeInstanceRequest::VolumeSize(gb_to_bytes(size)?));
            }
        }
        for upgrade in &upgrades {
            wait_instance(&api, instance_id, &self.wait).await?;
            tracing::info!(instance = instance_id, ?upgrade, "upgrading database instance");
            api.upgrade_instance(instance_id, upgrade)
                .await
                .context("cannot upgrade database instance")?;
        }

        if prior.password != planned.password {
            let user_name = expand_string(&planned.user_name).context("`user_name` is required")?;
            let password = expand_string(&planned.password).context("`password` is required")?;
            wait_instance(&api, instance_id, &self.wait).await?;
            api.update_user_password(instance_id, &user_name, &password)
                .await
                .with_context(|| format!("cannot update password of user {user_name}"))?;
        }

        let instance = wait_instance(&api, instance_id, &self.wait).await?;
        Ok(flatten_instance(planned, &id.locality, instance))
    }

    async fn delete<'a>(&self, meta: &Meta, state: RdbInstanceState<'a>) -> Result<()> {
        let id: RegionalId = parse_id(&state.id)?;
        let api = RdbApi::new(&meta.client, &id.locality);

        if api.get_instance(&id.id).await.found()?.is_none() {
            return Ok(());
        }
        wait_instance(&api, &id.id, &self.wait).await?;
        api.delete_instance(&id.id)
            .await
            .found()
            .context("cannot delete database instance")?;

        let what = format!("database instance {} deletion", id.id);
        let (api, instance_id) = (&api, id.id.as_str());
        wait_for_deletion(&what, &self.wait, move || async move {
            api.get_instance(instance_id)
                .await
                .map(|instance| instance.status)
        })
        .await?;
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
    use crate::waiter::tests::FAST_WAIT;

    pub(crate) const BASE: &str = "/rdb/v1/regions/fr-par";

    pub(crate) fn instance_json(status: &str, node_type: &str, size: u64) -> serde_json::Value {
        json!({
            "id": "db",
            "name": "main",
            "organization_id": PROJECT_ID,
            "project_id": PROJECT_ID,
            "status": status,
            "engine": "PostgreSQL-15",
            "node_type": node_type,
            "is_ha_cluster": false,
            "tags": [],
            "endpoints": [{"ip": "10.0.0.5", "port": 5432}],
            "volume": {"type": "bssd", "size": size},
            "backup_schedule": {"disabled": false, "frequency": 24, "retention": 7}
        })
    }

    fn planned() -> RdbInstanceState<'static> {
        RdbInstanceState {
            name: flatten_string("main"),
            engine: flatten_string("PostgreSQL-15"),
            node_type: flatten_string("DB-DEV-S"),
            user_name: flatten_string("admin"),
            password: flatten_string("Secret-123"),
            volume_type: flatten_string("bssd"),
            volume_size_in_gb: Value::Value(10),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn create_waits_for_ready() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("{BASE}/instances")))
            .and(body_json(json!({
                "project_id": PROJECT_ID,
                "name": "main",
                "engine": "PostgreSQL-15",
                "user_name": "admin",
                "password": "Secret-123",
                "node_type": "DB-DEV-S",
                "is_ha_cluster": false,
                "disable_backup": false,
                "tags": [],
                "volume_type": "bssd",
                "volume_size": 10_000_000_000u64
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(instance_json("provisioning", "db-dev-s", 10_000_000_000)),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("{BASE}/instances/db")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(instance_json("initializing", "db-dev-s", 10_000_000_000)),
            )
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("{BASE}/instances/db")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(instance_json("ready", "db-dev-s", 10_000_000_000)),
            )
            .mount(&server)
            .await;

        let meta = test_meta(&server);
        let resource = RdbInstanceResource { wait: FAST_WAIT };
        let mut state = planned();
        resource.plan_create(&meta, &mut state).unwrap();

        let state = resource.create(&meta, state).await.unwrap();
        assert_eq!(state.id, flatten_string("fr-par/db"));
        assert_eq!(state.node_type, flatten_string("DB-DEV-S"));
        assert_eq!(state.password, flatten_string("Secret-123"));
        assert_eq!(state.endpoint_ip, flatten_string("10.0.0.5"));
        assert_eq!(state.endpoint_port, Value::Value(5432));
        assert_eq!(state.volume_size_in_gb, Value::Value(10));
    }

    #[tokio::test]
    async fn upgrades_and_password() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{BASE}/instances/db")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(instance_json("ready", "db-gp-xs", 20_000_000_000)),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(format!("{BASE}/instances/db/upgrade")))
            .and(body_json(json!({"node_type": "DB-GP-XS"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(instance_json("upgrading", "db-gp-xs", 10_000_000_000)),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(format!("{BASE}/instances/db/upgrade")))
            .and(body_json(json!({"volume_size": 20_000_000_000u64})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(instance_json("upgrading", "db-gp-xs", 20_000_000_000)),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path(format!("{BASE}/instances/db/users/admin")))
            .and(body_json(json!({"password": "Other-456"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "admin"})))
            .expect(1)
            .mount(&server)
            .await;

        let meta = test_meta(&server);
        let resource = RdbInstanceResource { wait: FAST_WAIT };
        let prior = RdbInstanceState {
            id: flatten_string("fr-par/db"),
            ..planned()
        };
        let planned = RdbInstanceState {
            node_type: flatten_string("DB-GP-XS"),
            volume_size_in_gb: Value::Value(20),
            password: flatten_string("Other-456"),
            ..prior.clone()
        };
        let state = resource.update(&meta, prior, planned).await.unwrap();
        assert_eq!(state.node_type, flatten_string("DB-GP-XS"));
        assert_eq!(state.volume_size_in_gb, Value::Value(20));
        assert_eq!(state.password, flatten_string("Other-456"));
    }

    #[tokio::test]
    async fn node_type_case_change_is_not_an_upgrade() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{BASE}/instances/db")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(instance_json("ready", "db-dev-s", 10_000_000_000)),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(format!("{BASE}/instances/db/upgrade")))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "type": "invalid_arguments",
                "message": "node type is unchanged"
            })))
            .expect(0)
            .mount(&server)
            .await;

        let meta = test_meta(&server);
        let resource = RdbInstanceResource { wait: FAST_WAIT };
        let prior = RdbInstanceState {
            id: flatten_string("fr-par/db"),
            node_type: flatten_string("db-dev-s"),
            endpoint_ip: flatten_string("10.0.0.5"),
            ..planned()
        };
        let mut planned = RdbInstanceState {
            node_type: flatten_string("DB-DEV-S"),
            ..prior.clone()
        };
        assert!(resource.plan_update(&prior, &mut planned).is_empty());
        assert_eq!(planned.endpoint_ip, flatten_string("10.0.0.5"));

        let state = resource.update(&meta, prior, planned).await.unwrap();
        assert_eq!(state.node_type, flatten_string("DB-DEV-S"));
    }

    #[test]
    fn replacement_triggers() {
        let resource = RdbInstanceResource::default();
        let prior = planned();

        let mut proposed = RdbInstanceState {
            volume_size_in_gb: Value::Value(20),
            node_type: flatten_string("DB-GP-XS"),
            ..prior.clone()
        };
        assert!(resource.plan_update(&prior, &mut proposed).is_empty());

        let mut proposed = RdbInstanceState {
            volume_size_in_gb: Value::Value(5),
            engine: flatten_string("PostgreSQL-16"),
            user_name: flatten_string("root"),
            ..prior.clone()
        };
        assert_eq!(resource.plan_update(&prior, &mut proposed).len(), 3);
    }

    #[test]
    fn invalid_volume() {
        let mut diags = Diagnostics::default();
        RdbInstanceState {
            volume_type: flatten_string("ssd"),
            volume_size_in_gb: Value::Value(0),
            ..Default::default()
        }
        .validate(&mut diags, AttributePath::default());
        assert_eq!(diags.errors.len(), 2);
    }
}
