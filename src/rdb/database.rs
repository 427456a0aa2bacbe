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

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tf_provider::value::{Value, ValueString};
use tf_provider::{map, AttributePath, AttributeType, Block, Description, Diagnostics, Schema};

use crate::adapter::{IdKind, ReplaceTriggers, ScalewayResource};
use crate::client::NotFoundExt;
use crate::expand::{
    bytes_to_gb, expand_id, expand_string, flatten_bool, flatten_reference, flatten_string,
    parse_id,
};
use crate::locality::{validate_region, NestedRegionalId, Region};
use crate::meta::Meta;
use crate::schema;
use crate::utils::{impl_with_id, WithSchema, WithValidate};
use crate::waiter::WaitConfig;

use super::api::{Database, RdbApi};
use super::instance::wait_instance;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RdbDatabaseState<'a> {
    pub id: ValueString<'a>,
    pub region: ValueString<'a>,
    pub instance_id: ValueString<'a>,
    pub name: ValueString<'a>,
    pub owner: ValueString<'a>,
    pub managed: Value<bool>,
    pub size: ValueString<'a>,
}

impl_with_id!(RdbDatabaseState);

impl<'a> WithSchema for RdbDatabaseState<'a> {
    fn schema() -> Schema {
        Schema {
            version: 1,
            block: Block {
                version: 1,
                description: Description::plain(
                    "Logical database of a Scaleway Managed Database instance",
                ),
                attributes: map! {
                    "id" => schema::id("Id of the database, as `<region>/<instance id>/<name>`"),
                    "region" => schema::region(),
                    "instance_id" => schema::required(AttributeType::String, "Database instance hosting the database"),
                    "name" => schema::required(AttributeType::String, "Name of the database"),
                    "owner" => schema::computed(AttributeType::String, "Owner of the database"),
                    "managed" => schema::computed(AttributeType::Bool, "Whether the database is managed by Scaleway"),
                    "size" => schema::computed(AttributeType::String, "Size of the database"),
                },
                ..Default::default()
            },
        }
    }
}

impl<'a> WithValidate for RdbDatabaseState<'a> {
    fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        validate_region(diags, &self.region, attr_path.clone().attribute("region"));
        if let Some(name) = self.name.as_deref_option() {
            if name.is_empty() || name.contains('/') {
                diags.error_short(
                    "Database names cannot be empty nor contain `/`",
                    attr_path.attribute("name"),
                );
            }
        }
    }
}

fn flatten_database<'a>(
    state: RdbDatabaseState<'a>,
    region: &Region,
    instance_id: &str,
    database: Database,
) -> RdbDatabaseState<'a> {
    RdbDatabaseState {
        id: flatten_string(
            NestedRegionalId::new(region.clone(), instance_id, &database.name).to_string(),
        ),
        region: flatten_string(region.to_string()),
        instance_id: flatten_reference(&state.instance_id, region, Some(instance_id.to_owned())),
        name: flatten_string(database.name),
        owner: flatten_string(database.owner),
        managed: flatten_bool(database.managed),
        size: flatten_string(format!("{} GB", bytes_to_gb(database.size))),
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RdbDatabaseResource {
    wait: WaitConfig,
}

impl Default for RdbDatabaseResource {
    fn default() -> Self {
        Self {
            wait: WaitConfig::new(30 * 60, 10),
        }
    }
}

#[async_trait]
impl ScalewayResource for RdbDatabaseResource {
    type State<'a> = RdbDatabaseState<'a>;

    const NAME: &'static str = "rdb_database";
    const ID_KIND: IdKind = IdKind::NestedRegional;

    fn plan_create<'a>(&self, meta: &Meta, state: &mut RdbDatabaseState<'a>) -> Result<()> {
        let region = meta.parent_region(&state.region, &state.instance_id)?;
        state.region = flatten_string(region.to_string());
        state.owner = Value::Unknown;
        state.managed = Value::Unknown;
        state.size = Value::Unknown;
        Ok(())
    }

    fn plan_update<'a>(
        &self,
        prior: &RdbDatabaseState<'a>,
        proposed: &mut RdbDatabaseState<'a>,
    ) -> Vec<AttributePath> {
        ReplaceTriggers::new()
            .check("region", &prior.region, &proposed.region)
            .check(
                "instance_id",
                &expand_id(&prior.instance_id),
                &expand_id(&proposed.instance_id),
            )
            .check("name", &prior.name, &proposed.name)
            .build()
    }

    async fn create<'a>(
        &self,
        meta: &Meta,
        planned: RdbDatabaseState<'a>,
    ) -> Result<RdbDatabaseState<'a>> {
        let region = meta.parent_region(&planned.region, &planned.instance_id)?;
        let api = RdbApi::new(&meta.client, &region);
        let instance_id = expand_id(&planned.instance_id).context("`instance_id` is required")?;
        let name = expand_string(&planned.name).context("`name` is required")?;

        wait_instance(&api, &instance_id, &self.wait).await?;
        let database = api
            .create_database(&instance_id, &name)
            .await
            .with_context(|| format!("cannot create database {name}"))?;
        wait_instance(&api, &instance_id, &self.wait).await?;

        Ok(flatten_database(planned, &region, &instance_id, database))
    }

    async fn read<'a>(
        &self,
        meta: &Meta,
        state: RdbDatabaseState<'a>,
    ) -> Result<Option<RdbDatabaseState<'a>>> {
        let id: NestedRegionalId = parse_id(&state.id)?;
        let api = RdbApi::new(&meta.client, &id.locality);

        // a deleted instance takes its databases along
        match api.find_database(&id.parent_id, &id.id).await.found()?.flatten() {
            Some(database) => Ok(Some(flatten_database(
                state,
                &id.locality,
                &id.parent_id,
                database,
            ))),
            None => Ok(None),
        }
    }

    async fn update<'a>(
        &self,
        meta: &Meta,
        prior: RdbDatabaseState<'a>,
        planned: RdbDatabaseState<'a>,
    ) -> Result<RdbDatabaseState<'a>> {
        let id: NestedRegionalId = parse_id(&prior.id)?;
        let api = RdbApi::new(&meta.client, &id.locality);

        let database = api
            .find_database(&id.parent_id, &id.id)
            .await?
            .ok_or_else(|| anyhow!("database {} no longer exists", id.id))?;
        Ok(flatten_database(planned, &id.locality, &id.parent_id, database))
    }

    async fn delete<'a>(&self, meta: &Meta, state: RdbDatabaseState<'a>) -> Result<()> {
        let id: NestedRegionalId = parse_id(&state.id)?;
        let api = RdbApi::new(&meta.client, &id.locality);

        if api.get_instance(&id.parent_id).await.found()?.is_none() {
            return Ok(());
        }
        wait_instance(&api, &id.parent_id, &self.wait).await?;
        api.delete_database(&id.parent_id, &id.id)
            .await
            .found()
            .with_context(|| format!("cannot delete database {}", id.id))?;
        wait_instance(&api, &id.parent_id, &self.wait).await?;
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
    use crate::rdb::instance::tests::{instance_json, BASE};
    use crate::waiter::tests::FAST_WAIT;

    fn database_json(name: &str) -> serde_json::Value {
        json!({"name": name, "owner": "admin", "managed": true, "size": 8_000_000_000u64})
    }

    async fn mount_ready_instance(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path(format!("{BASE}/instances/db")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(instance_json("ready", "db-dev-s", 10_000_000_000)),
            )
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn create_waits_for_instance() {
        let server = MockServer::start().await;
        mount_ready_instance(&server).await;
        Mock::given(method("POST"))
            .and(path(format!("{BASE}/instances/db/databases")))
            .and(body_json(json!({"name": "app"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(database_json("app")))
            .expect(1)
            .mount(&server)
            .await;

        let meta = test_meta(&server);
        let resource = RdbDatabaseResource { wait: FAST_WAIT };
        let mut state = RdbDatabaseState {
            instance_id: flatten_string("fr-par/db"),
            name: flatten_string("app"),
            ..Default::default()
        };
        resource.plan_create(&meta, &mut state).unwrap();

        let state = resource.create(&meta, state).await.unwrap();
        assert_eq!(state.id, flatten_string("fr-par/db/app"));
        assert_eq!(state.instance_id, flatten_string("fr-par/db"));
        assert_eq!(state.owner, flatten_string("admin"));
        assert_eq!(state.size, flatten_string("8 GB"));
    }

    #[tokio::test]
    async fn create_in_instance_region() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rdb/v1/regions/nl-ams/instances/db"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(instance_json("ready", "db-dev-s", 10_000_000_000)),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/rdb/v1/regions/nl-ams/instances/db/databases"))
            .respond_with(ResponseTemplate::new(200).set_body_json(database_json("app")))
            .expect(1)
            .mount(&server)
            .await;

        let meta = test_meta(&server);
        let resource = RdbDatabaseResource { wait: FAST_WAIT };
        let mut state = RdbDatabaseState {
            instance_id: flatten_string("nl-ams/db"),
            name: flatten_string("app"),
            ..Default::default()
        };
        resource.plan_create(&meta, &mut state).unwrap();
        assert_eq!(state.region, flatten_string("nl-ams"));

        let state = resource.create(&meta, state).await.unwrap();
        assert_eq!(state.id, flatten_string("nl-ams/db/app"));
        assert_eq!(state.instance_id, flatten_string("nl-ams/db"));
    }

    #[tokio::test]
    async fn read_filters_exact_name() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{BASE}/instances/db/databases")))
            .and(query_param("name", "app"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "databases": [database_json("app_test")],
                "total_count": 1
            })))
            .mount(&server)
            .await;

        let meta = test_meta(&server);
        let state = RdbDatabaseState {
            id: flatten_string("fr-par/db/app"),
            ..Default::default()
        };
        let state = RdbDatabaseResource::default().read(&meta, state).await.unwrap();
        assert!(state.is_none());
    }

    #[tokio::test]
    async fn delete() {
        let server = MockServer::start().await;
        mount_ready_instance(&server).await;
        Mock::given(method("DELETE"))
            .and(path(format!("{BASE}/instances/db/databases/app")))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let meta = test_meta(&server);
        let resource = RdbDatabaseResource { wait: FAST_WAIT };
        let state = RdbDatabaseState {
            id: flatten_string("fr-par/db/app"),
            ..Default::default()
        };
        resource.delete(&meta, state).await.unwrap();
    }
}
