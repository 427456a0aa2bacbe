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
use tf_provider::value::{Value, ValueNumber, ValueString};
use tf_provider::{map, AttributePath, AttributeType, Block, Description, Diagnostics, Schema};

use crate::adapter::{IdKind, ReplaceTriggers, ScalewayResource};
use crate::client::NotFoundExt;
use crate::expand::{
    expand_id, expand_string, flatten_number, flatten_optional_string, flatten_reference,
    flatten_string, parse_id,
};
use crate::locality::{validate_region, NestedRegionalId, Region};
use crate::meta::Meta;
use crate::schema;
use crate::utils::{impl_with_id, WithSchema, WithValidate};

use super::api::{SecretApi, SecretVersion};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecretVersionState<'a> {
    pub id: ValueString<'a>,
    pub region: ValueString<'a>,
    pub secret_id: ValueString<'a>,
    pub data: ValueString<'a>,
    pub description: ValueString<'a>,
    pub revision: ValueNumber,
    pub status: ValueString<'a>,
    pub created_at: ValueString<'a>,
    pub updated_at: ValueString<'a>,
}

impl_with_id!(SecretVersionState);

impl<'a> WithSchema for SecretVersionState<'a> {
    fn schema() -> Schema {
        Schema {
            version: 1,
            block: Block {
                version: 1,
                description: Description::plain("Version of a Scaleway Secret Manager secret"),
                attributes: map! {
                    "id" => schema::id("Id of the version, as `<region>/<secret id>/<revision>`"),
                    "region" => schema::region(),
                    "secret_id" => schema::required(AttributeType::String, "Secret holding the version"),
                    "data" => schema::sensitive(schema::required(AttributeType::String, "Payload of the version")),
                    "description" => schema::optional(AttributeType::String, "Description of the version"),
                    "revision" => schema::computed(AttributeType::Number, "Revision number of the version"),
                    "status" => schema::computed(AttributeType::String, "Status of the version"),
                    "created_at" => schema::timestamp("Creation date of the version"),
                    "updated_at" => schema::timestamp("Last update date of the version"),
                },
                ..Default::default()
            },
        }
    }
}

impl<'a> WithValidate for SecretVersionState<'a> {
    fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        validate_region(diags, &self.region, attr_path.attribute("region"));
    }
}

pub(crate) fn decode_data(data: Vec<u8>) -> Result<String> {
    String::from_utf8(data).context("secret payload is not valid UTF-8")
}

fn flatten_version<'a>(
    state: SecretVersionState<'a>,
    region: &Region,
    version: SecretVersion,
    data: ValueString<'a>,
) -> SecretVersionState<'a> {
    SecretVersionState {
        id: flatten_string(
            NestedRegionalId::new(
                region.clone(),
                &version.secret_id,
                version.revision.to_string(),
            )
            .to_string(),
        ),
        region: flatten_string(region.to_string()),
        secret_id: flatten_reference(&state.secret_id, region, Some(version.secret_id)),
        data,
        description: flatten_optional_string(version.description),
        revision: flatten_number(version.revision),
        status: flatten_string(version.status),
        created_at: flatten_optional_string(version.created_at),
        updated_at: flatten_optional_string(version.updated_at),
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SecretVersionResource;

#[async_trait]
impl ScalewayResource for SecretVersionResource {
    type State<'a> = SecretVersionState<'a>;

    const NAME: &'static str = "secret_version";
    const ID_KIND: IdKind = IdKind::NestedRegional;

    fn plan_create<'a>(&self, meta: &Meta, state: &mut SecretVersionState<'a>) -> Result<()> {
        let region = meta.parent_region(&state.region, &state.secret_id)?;
        state.region = flatten_string(region.to_string());
        state.revision = Value::Unknown;
        state.status = Value::Unknown;
        state.created_at = Value::Unknown;
        state.updated_at = Value::Unknown;
        Ok(())
    }

    fn plan_update<'a>(
        &self,
        prior: &SecretVersionState<'a>,
        proposed: &mut SecretVersionState<'a>,
    ) -> Vec<AttributePath> {
        if prior.description != proposed.description {
            proposed.updated_at = Value::Unknown;
        }
        ReplaceTriggers::new()
            .check("region", &prior.region, &proposed.region)
            .check(
                "secret_id",
                &expand_id(&prior.secret_id),
                &expand_id(&proposed.secret_id),
            )
            .check("data", &prior.data, &proposed.data)
            .build()
    }

    async fn create<'a>(
        &self,
        meta: &Meta,
        planned: SecretVersionState<'a>,
    ) -> Result<SecretVersionState<'a>> {
        let region = meta.parent_region(&planned.region, &planned.secret_id)?;
        let api = SecretApi::new(&meta.client, &region);
        let secret_id = expand_id(&planned.secret_id).context("`secret_id` is required")?;
        let data = expand_string(&planned.data).context("`data` is required")?;
        let description = expand_string(&planned.description);

        let version = api
            .create_version(&secret_id, data.as_bytes(), description.as_deref())
            .await
            .with_context(|| format!("cannot create version of secret {secret_id}"))?;
        tracing::debug!(
            secret_id = %secret_id,
            revision = version.revision,
            "secret version created"
        );

        let data = planned.data.clone();
        Ok(flatten_version(planned, &region, version, data))
    }

    async fn read<'a>(
        &self,
        meta: &Meta,
        state: SecretVersionState<'a>,
    ) -> Result<Option<SecretVersionState<'a>>> {
        let id: NestedRegionalId = parse_id(&state.id)?;
        let api = SecretApi::new(&meta.client, &id.locality);

        let version = match api.get_version(&id.parent_id, &id.id).await.found()? {
            Some(version) if version.status != "destroyed" => version,
            _ => return Ok(None),
        };
        let data = match api.access_version(&id.parent_id, &id.id).await.found()? {
            Some(data) => flatten_string(decode_data(data)?),
            None => return Ok(None),
        };
        Ok(Some(flatten_version(state, &id.locality, version, data)))
    }

    async fn update<'a>(
        &self,
        meta: &Meta,
        prior: SecretVersionState<'a>,
        planned: SecretVersionState<'a>,
    ) -> Result<SecretVersionState<'a>> {
        let id: NestedRegionalId = parse_id(&prior.id)?;
        let api = SecretApi::new(&meta.client, &id.locality);

        let description = expand_string(&planned.description).unwrap_or_default();
        let version = api
            .update_version(&id.parent_id, &id.id, &description)
            .await
            .context("cannot update secret version")?;

        let data = planned.data.clone();
        Ok(flatten_version(planned, &id.locality, version, data))
    }

    async fn delete<'a>(&self, meta: &Meta, state: SecretVersionState<'a>) -> Result<()> {
        let id: NestedRegionalId = parse_id(&state.id)?;
        let api = SecretApi::new(&meta.client, &id.locality);

        api.delete_version(&id.parent_id, &id.id)
            .await
            .found()
            .context("cannot delete secret version")?;
        Ok(())
    }
}
