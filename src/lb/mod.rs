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

//! Load balancers.

use anyhow::{Context, Result};
use async_trait::async_trait;
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

mod api;

use api::{CreateLbRequest, Lb, LbApi, UpdateLbRequest};

const SSL_LEVELS: &[&str] = &[
    "ssl_compatibility_level_intermediate",
    "ssl_compatibility_level_modern",
    "ssl_compatibility_level_old",
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LbState<'a> {
    pub id: ValueString<'a>,
    pub zone: ValueString<'a>,
    pub project_id: ValueString<'a>,
    pub organization_id: ValueString<'a>,
    pub name: ValueString<'a>,
    pub description: ValueString<'a>,
    #[serde(rename = "type")]
    pub lb_type: ValueString<'a>,
    pub tags: ValueList<ValueString<'a>>,
    pub ip_id: ValueString<'a>,
    pub ip_address: ValueString<'a>,
    pub ssl_compatibility_level: ValueString<'a>,
    pub release_ip: Value<bool>,
}

impl_with_id!(LbState);

impl<'a> WithSchema for LbState<'a> {
    fn schema() -> Schema {
        Schema {
            version: 1,
            block: Block {
                version: 1,
                description: Description::plain("Scaleway load balancer"),
                attributes: map! {
                    "id" => schema::id("Zoned id of the load balancer"),
                    "zone" => schema::zone(),
                    "project_id" => schema::project_id(),
                    "organization_id" => schema::organization_id(),
                    "name" => schema::optional_computed(AttributeType::String, "Name of the load balancer, generated when unset"),
                    "description" => schema::optional(AttributeType::String, "Description of the load balancer"),
                    "type" => schema::required(AttributeType::String, "Offer of the load balancer (e.g. `LB-S`); changing it migrates the load balancer"),
                    "tags" => schema::tags(),
                    "ip_id" => schema::optional_computed(AttributeType::String, "Flexible IP of the load balancer, allocated when unset"),
                    "ip_address" => schema::computed(AttributeType::String, "Address of the load balancer"),
                    "ssl_compatibility_level" => schema::optional_computed(AttributeType::String, "TLS compatibility level of the frontends"),
                    "release_ip" => schema::optional(AttributeType::Bool, "Release the flexible IP when the load balancer is deleted"),
                },
                ..Default::default()
            },
        }
    }
}

impl<'a> WithValidate for LbState<'a> {
    fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        validate_zone(diags, &self.zone, attr_path.clone().attribute("zone"));
        if let Some(level) = self.ssl_compatibility_level.as_deref_option() {
            if !SSL_LEVELS.contains(&level) {
                diags.error(
                    "Invalid SSL compatibility level",
                    format!("`{level}` is not one of {}", SSL_LEVELS.join(", ")),
                    attr_path.attribute("ssl_compatibility_level"),
                );
            }
        }
    }
}

fn flatten_lb<'a>(state: LbState<'a>, zone: &Zone, lb: Lb) -> LbState<'a> {
    let ip = lb.ip.into_iter().next();
    LbState {
        id: flatten_string(ZonedId::new(zone.clone(), &lb.id).to_string()),
        zone: flatten_string(zone.to_string()),
        project_id: flatten_string(lb.project_id),
        organization_id: flatten_string(lb.organization_id),
        name: flatten_string(lb.name),
        description: match state.description {
            Value::Null if lb.description.is_empty() => Value::Null,
            _ => flatten_string(lb.description),
        },
        // the API answers with lowercase offers
        lb_type: match state.lb_type {
            Value::Value(lb_type) if lb_type.eq_ignore_ascii_case(&lb.lb_type) => {
                Value::Value(lb_type)
            }
            _ => flatten_string(lb.lb_type.to_uppercase()),
        },
        tags: flatten_tags(&state.tags, lb.tags),
        ip_id: flatten_reference(&state.ip_id, zone, ip.as_ref().map(|ip| ip.id.clone())),
        ip_address: flatten_optional_string(ip.map(|ip| ip.ip_address)),
        ssl_compatibility_level: flatten_optional_string(Some(lb.ssl_compatibility_level)),
        release_ip: state.release_ip,
    }
}

async fn wait_lb(api: &LbApi<'_>, id: &str, config: &WaitConfig) -> Result<Lb> {
    let what = format!("load balancer {id}");
    let lb = wait_for(&what, config, move || async move {
        let lb = api.get_lb(id).await?;
        Ok(if lb.status == "ready" {
            Status::Ready(lb)
        } else if lb.status == "error" || lb.status == "locked" {
            Status::Failed(lb.status)
        } else {
            Status::Pending(lb.status)
        })
    })
    .await?;
    Ok(lb)
}

#[derive(Debug, Clone, Copy)]
pub struct LbResource {
    wait: WaitConfig,
}

impl Default for LbResource {
    fn default() -> Self {
        Self {
            wait: WaitConfig::new(20 * 60, 5),
        }
    }
}

#[async_trait]
impl ScalewayResource for LbResource {
    type State<'a> = LbState<'a>;

    const NAME: &'static str = "lb";
    const ID_KIND: IdKind = IdKind::Zoned;

    fn plan_create<'a>(&self, meta: &Meta, state: &mut LbState<'a>) -> Result<()> {
        state.zone = flatten_string(meta.zone(&state.zone)?.to_string());
        state.project_id = meta.plan_project_id(&state.project_id);
        state.organization_id = Value::Unknown;
        unknown_if_null(&mut state.name);
        unknown_if_null(&mut state.ip_id);
        unknown_if_null(&mut state.ssl_compatibility_level);
        state.ip_address = Value::Unknown;
        Ok(())
    }

    fn plan_update<'a>(
        &self,
        prior: &LbState<'a>,
        proposed: &mut LbState<'a>,
    ) -> Vec<AttributePath> {
        ReplaceTriggers::new()
            .check("zone", &prior.zone, &proposed.zone)
            .check("project_id", &prior.project_id, &proposed.project_id)
            .check("ip_id", &expand_id(&prior.ip_id), &expand_id(&proposed.ip_id))
            .build()
    }

    async fn create<'a>(&self, meta: &Meta, planned: LbState<'a>) -> Result<LbState<'a>> {
        let zone = meta.zone(&planned.zone)?;
        let api = LbApi::new(&meta.client, &zone);

        let lb = api
            .create_lb(&CreateLbRequest {
                name: expand_string(&planned.name).unwrap_or_else(|| random_name("lb")),
                description: expand_string(&planned.description).unwrap_or_default(),
                project_id: meta.project_id(&planned.project_id),
                ip_id: expand_id(&planned.ip_id),
                tags: expand_strings(&planned.tags).unwrap_or_default(),
                lb_type: expand_string(&planned.lb_type).context("`type` is required")?,
                ssl_compatibility_level: expand_string(&planned.ssl_compatibility_level),
            })
            .await
            .context("cannot create load balancer")?;
        tracing::debug!(id = %lb.id, "load balancer created");

        let lb = wait_lb(&api, &lb.id, &self.wait).await?;
        Ok(flatten_lb(planned, &zone, lb))
    }

    async fn read<'a>(&self, meta: &Meta, state: LbState<'a>) -> Result<Option<LbState<'a>>> {
        let id: ZonedId = parse_id(&state.id)?;
        let api = LbApi::new(&meta.client, &id.locality);

        match api.get_lb(&id.id).await.found()? {
            Some(lb) => Ok(Some(flatten_lb(state, &id.locality, lb))),
            None => Ok(None),
        }
    }

    async fn update<'a>(
        &self,
        meta: &Meta,
        prior: LbState<'a>,
        planned: LbState<'a>,
    ) -> Result<LbState<'a>> {
        let id: ZonedId = parse_id(&prior.id)?;
        let api = LbApi::new(&meta.client, &id.locality);

        let lb_type = expand_string(&planned.lb_type).context("`type` is required")?;
        if !prior
            .lb_type
            .as_deref_option()
            .is_some_and(|prior| prior.eq_ignore_ascii_case(&lb_type))
        {
            wait_lb(&api, &id.id, &self.wait).await?;
            tracing::info!(lb = %id.id, %lb_type, "migrating load balancer");
            api.migrate_lb(&id.id, &lb_type)
                .await
                .context("cannot migrate load balancer")?;
        }

        if prior.name != planned.name
            || prior.description != planned.description
            || prior.tags != planned.tags
            || prior.ssl_compatibility_level != planned.ssl_compatibility_level
        {
            wait_lb(&api, &id.id, &self.wait).await?;
            api.update_lb(
                &id.id,
                &UpdateLbRequest {
                    name: expand_string(&planned.name).context("`name` is not known")?,
                    description: expand_string(&planned.description).unwrap_or_default(),
                    tags: expand_strings(&planned.tags).unwrap_or_default(),
                    ssl_compatibility_level: expand_string(&planned.ssl_compatibility_level),
                },
            )
            .await
            .context("cannot update load balancer")?;
        }

        let lb = wait_lb(&api, &id.id, &self.wait).await?;
        Ok(flatten_lb(planned, &id.locality, lb))
    }

    async fn delete<'a>(&self, meta: &Meta, state: LbState<'a>) -> Result<()> {
        let id: ZonedId = parse_id(&state.id)?;
        let api = LbApi::new(&meta.client, &id.locality);

        if api.get_lb(&id.id).await.found()?.is_none() {
            return Ok(());
        }
        wait_lb(&api, &id.id, &self.wait).await?;
        api.delete_lb(&id.id, expand_bool(&state.release_ip).unwrap_or_default())
            .await
            .found()
            .context("cannot delete load balancer")?;

        let what = format!("load balancer {} deletion", id.id);
        let (api, lb_id) = (&api, id.id.as_str());
        wait_for_deletion(&what, &self.wait, move || async move {
            api.get_lb(lb_id).await.map(|lb| lb.status)
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
    use crate::meta::tests::{test_meta, PROJECT_ID};
    use crate::waiter::tests::FAST_WAIT;

    const BASE: &str = "/lb/v1/zones/fr-par-1";

    fn lb_json(status: &str, lb_type: &str) -> serde_json::Value {
        json!({
            "id": "lb",
            "name": "front",
            "description": "",
            "organization_id": PROJECT_ID,
            "project_id": PROJECT_ID,
            "status": status,
            "type": lb_type,
            "tags": [],
            "ip": [{"id": "ip", "ip_address": "51.15.0.3"}],
            "ssl_compatibility_level": "ssl_compatibility_level_intermediate"
        })
    }

    #[tokio::test]
    async fn create_waits_for_ready() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("{BASE}/lbs")))
            .and(body_json(json!({
                "name": "front",
                "description": "",
                "project_id": PROJECT_ID,
                "tags": [],
                "type": "LB-S"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(lb_json("to_create", "lb-s")))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("{BASE}/lbs/lb")))
            .respond_with(ResponseTemplate::new(200).set_body_json(lb_json("creating", "lb-s")))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("{BASE}/lbs/lb")))
            .respond_with(ResponseTemplate::new(200).set_body_json(lb_json("ready", "lb-s")))
            .mount(&server)
            .await;

        let meta = test_meta(&server);
        let resource = LbResource { wait: FAST_WAIT };
        let mut state = LbState {
            name: flatten_string("front"),
            lb_type: flatten_string("LB-S"),
            ..Default::default()
        };
        resource.plan_create(&meta, &mut state).unwrap();

        let state = resource.create(&meta, state).await.unwrap();
        assert_eq!(state.id, flatten_string("fr-par-1/lb"));
        assert_eq!(state.lb_type, flatten_string("LB-S"));
        assert_eq!(state.ip_id, flatten_string("fr-par-1/ip"));
        assert_eq!(state.ip_address, flatten_string("51.15.0.3"));
        assert!(state.description.is_null());
    }

    #[tokio::test]
    async fn type_change_migrates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{BASE}/lbs/lb")))
            .respond_with(ResponseTemplate::new(200).set_body_json(lb_json("ready", "lb-s")))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(format!("{BASE}/lbs/lb/migrate")))
            .and(body_json(json!({"type": "LB-GP-M"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(lb_json("migrating", "lb-gp-m")))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("{BASE}/lbs/lb")))
            .respond_with(ResponseTemplate::new(200).set_body_json(lb_json("ready", "lb-gp-m")))
            .mount(&server)
            .await;

        let meta = test_meta(&server);
        let resource = LbResource { wait: FAST_WAIT };
        let prior = LbState {
            id: flatten_string("fr-par-1/lb"),
            name: flatten_string("front"),
            lb_type: flatten_string("LB-S"),
            ..Default::default()
        };
        let planned = LbState {
            lb_type: flatten_string("LB-GP-M"),
            ..prior.clone()
        };
        let state = resource.update(&meta, prior, planned).await.unwrap();
        assert_eq!(state.lb_type, flatten_string("LB-GP-M"));
    }

    #[tokio::test]
    async fn delete_releases_ip() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{BASE}/lbs/lb")))
            .respond_with(ResponseTemplate::new(200).set_body_json(lb_json("ready", "lb-s")))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path(format!("{BASE}/lbs/lb")))
            .and(query_param("release_ip", "true"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("{BASE}/lbs/lb")))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"type": "not_found"})))
            .mount(&server)
            .await;

        let meta = test_meta(&server);
        let resource = LbResource { wait: FAST_WAIT };
        let state = LbState {
            id: flatten_string("fr-par-1/lb"),
            release_ip: flatten_bool(true),
            ..Default::default()
        };
        resource.delete(&meta, state).await.unwrap();
    }

    #[test]
    fn invalid_ssl_level() {
        let mut diags = Diagnostics::default();
        LbState {
            ssl_compatibility_level: flatten_string("ssl_compatibility_level_ancient"),
            ..Default::default()
        }
        .validate(&mut diags, AttributePath::default());
        assert_eq!(diags.errors.len(), 1);
    }
}
