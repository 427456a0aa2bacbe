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

//! Secret Manager product: secrets and their versions.

mod api;
mod version;
mod version_data_source;

pub use version::SecretVersionResource;
pub use version_data_source::SecretVersionDataSource;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tf_provider::value::{Value, ValueList, ValueNumber, ValueString};
use tf_provider::{map, AttributePath, AttributeType, Block, Description, Diagnostics, Schema};

use crate::adapter::{IdKind, ReplaceTriggers, ScalewayResource};
use crate::client::NotFoundExt;
use crate::expand::{
    expand_string, expand_strings, flatten_number, flatten_optional_string, flatten_string,
    flatten_tags, parse_id,
};
use crate::locality::{validate_region, Region, RegionalId};
use crate::meta::Meta;
use crate::schema;
use crate::utils::{impl_with_id, WithSchema, WithValidate};

use api::{CreateSecretRequest, Secret, SecretApi, UpdateSecretRequest};

const DEFAULT_PATH: &str = "/";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecretState<'a> {
    pub id: ValueString<'a>,
    pub region: ValueString<'a>,
    pub project_id: ValueString<'a>,
    pub name: ValueString<'a>,
    pub description: ValueString<'a>,
    pub tags: ValueList<ValueString<'a>>,
    pub path: ValueString<'a>,
    pub status: ValueString<'a>,
    pub version_count: ValueNumber,
    pub created_at: ValueString<'a>,
    pub updated_at: ValueString<'a>,
}

impl_with_id!(SecretState);

impl<'a> WithSchema for SecretState<'a> {
    fn schema() -> Schema {
        Schema {
            version: 1,
            block: Block {
                version: 1,
                description: Description::plain("Scaleway Secret Manager secret"),
                attributes: map! {
                    "id" => schema::id("Regional id of the secret"),
                    "region" => schema::region(),
                    "project_id" => schema::project_id(),
                    "name" => schema::required(AttributeType::String, "Name of the secret"),
                    "description" => schema::optional(AttributeType::String, "Description of the secret"),
                    "tags" => schema::tags(),
                    "path" => schema::optional_computed(AttributeType::String, "Folder of the secret, `/` when unset"),
                    "status" => schema::computed(AttributeType::String, "Status of the secret"),
                    "version_count" => schema::computed(AttributeType::Number, "Number of versions of the secret"),
                    "created_at" => schema::timestamp("Creation date of the secret"),
                    "updated_at" => schema::timestamp("Last update date of the secret"),
                },
                ..Default::default()
            },
        }
    }
}

impl<'a> WithValidate for SecretState<'a> {
    fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        validate_region(diags, &self.region, attr_path.clone().attribute("region"));
        if let Some(path) = self.path.as_deref_option() {
            if !path.starts_with('/') {
                diags.error_short(
                    "Secret path must be absolute",
                    attr_path.attribute("path"),
                );
            }
        }
    }
}

fn flatten_secret<'a>(state: SecretState<'a>, region: &Region, secret: Secret) -> SecretState<'a> {
    SecretState {
        id: flatten_string(RegionalId::new(region.clone(), &secret.id).to_string()),
        region: flatten_string(region.to_string()),
        project_id: flatten_string(secret.project_id),
        name: flatten_string(secret.name),
        description: flatten_optional_string(secret.description),
        tags: flatten_tags(&state.tags, secret.tags),
        path: flatten_string(if secret.path.is_empty() {
            DEFAULT_PATH.to_owned()
        } else {
            secret.path
        }),
        status: flatten_string(secret.status),
        version_count: flatten_number(secret.version_count),
        created_at: flatten_optional_string(secret.created_at),
        updated_at: flatten_optional_string(secret.updated_at),
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SecretResource;

#[async_trait]
impl ScalewayResource for SecretResource {
    type State<'a> = SecretState<'a>;

    const NAME: &'static str = "secret";
    const ID_KIND: IdKind = IdKind::Regional;

    fn plan_create<'a>(&self, meta: &Meta, state: &mut SecretState<'a>) -> Result<()> {
        state.region = flatten_string(meta.region(&state.region)?.to_string());
        state.project_id = meta.plan_project_id(&state.project_id);
        if state.path.is_null() {
            state.path = flatten_string(DEFAULT_PATH);
        }
        state.status = Value::Unknown;
        state.version_count = Value::Unknown;
        state.created_at = Value::Unknown;
        state.updated_at = Value::Unknown;
        Ok(())
    }

    fn plan_update<'a>(
        &self,
        prior: &SecretState<'a>,
        proposed: &mut SecretState<'a>,
    ) -> Vec<AttributePath> {
        if proposed.path.is_null() {
            proposed.path = flatten_string(DEFAULT_PATH);
        }
        if prior.name != proposed.name
            || prior.description != proposed.description
            || prior.tags != proposed.tags
            || prior.path != proposed.path
        {
            proposed.updated_at = Value::Unknown;
        }
        ReplaceTriggers::new()
            .check("region", &prior.region, &proposed.region)
            .check("project_id", &prior.project_id, &proposed.project_id)
            .build()
    }

    async fn create<'a>(&self, meta: &Meta, planned: SecretState<'a>) -> Result<SecretState<'a>> {
        let region = meta.region(&planned.region)?;
        let api = SecretApi::new(&meta.client, &region);
        let name = expand_string(&planned.name).context("`name` is required")?;

        let secret = api
            .create_secret(&CreateSecretRequest {
                project_id: meta.project_id(&planned.project_id),
                name,
                tags: expand_strings(&planned.tags).unwrap_or_default(),
                description: expand_string(&planned.description),
                path: expand_string(&planned.path),
            })
            .await
            .context("cannot create secret")?;
        tracing::debug!(id = %secret.id, "secret created");

        Ok(flatten_secret(planned, &region, secret))
    }

    async fn read<'a>(
        &self,
        meta: &Meta,
        state: SecretState<'a>,
    ) -> Result<Option<SecretState<'a>>> {
        let id: RegionalId = parse_id(&state.id)?;
        let api = SecretApi::new(&meta.client, &id.locality);

        Ok(api
            .get_secret(&id.id)
            .await
            .found()?
            .map(|secret| flatten_secret(state, &id.locality, secret)))
    }

    async fn update<'a>(
        &self,
        meta: &Meta,
        prior: SecretState<'a>,
        planned: SecretState<'a>,
    ) -> Result<SecretState<'a>> {
        let id: RegionalId = parse_id(&prior.id)?;
        let api = SecretApi::new(&meta.client, &id.locality);

        let request = UpdateSecretRequest {
            name: (prior.name != planned.name)
                .then(|| expand_string(&planned.name))
                .flatten(),
            tags: (prior.tags != planned.tags)
                .then(|| expand_strings(&planned.tags).unwrap_or_default()),
            description: (prior.description != planned.description)
                .then(|| expand_string(&planned.description).unwrap_or_default()),
            path: (prior.path != planned.path)
                .then(|| expand_string(&planned.path))
                .flatten(),
        };
        let secret = api
            .update_secret(&id.id, &request)
            .await
            .context("cannot update secret")?;

        Ok(flatten_secret(planned, &id.locality, secret))
    }

    async fn delete<'a>(&self, meta: &Meta, state: SecretState<'a>) -> Result<()> {
        let id: RegionalId = parse_id(&state.id)?;
        let api = SecretApi::new(&meta.client, &id.locality);

        api.delete_secret(&id.id)
            .await
            .found()
            .context("cannot delete secret")?;
        Ok(())
    }
}
