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
use crate::config::validate_uuid;
use crate::expand::{
    expand_string, expand_strings, flatten_bool, flatten_optional_string, flatten_string,
    flatten_tags, unknown_if_null,
};
use crate::meta::Meta;
use crate::schema;
use crate::utils::{impl_with_id, random_name, WithSchema, WithValidate};

use super::api::{Application, CreateApplicationRequest, IamApi, UpdateApplicationRequest};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApplicationState<'a> {
    pub id: ValueString<'a>,
    pub name: ValueString<'a>,
    pub description: ValueString<'a>,
    pub tags: ValueList<ValueString<'a>>,
    pub organization_id: ValueString<'a>,
    pub editable: Value<bool>,
    pub created_at: ValueString<'a>,
    pub updated_at: ValueString<'a>,
}

impl_with_id!(ApplicationState);

impl<'a> WithSchema for ApplicationState<'a> {
    fn schema() -> Schema {
        Schema {
            version: 1,
            block: Block {
                version: 1,
                description: Description::plain("Scaleway IAM application, a non-human principal"),
                attributes: map! {
                    "id" => schema::id("Id of the application"),
                    "name" => schema::optional_computed(AttributeType::String, "Name of the application, generated when unset"),
                    "description" => schema::optional(AttributeType::String, "Description of the application"),
                    "tags" => schema::tags(),
                    "organization_id" => schema::optional_computed(AttributeType::String, "Organization of the application, defaults to the provider organization"),
                    "editable" => schema::computed(AttributeType::Bool, "Whether the application can be edited"),
                    "created_at" => schema::timestamp("Creation date of the application"),
                    "updated_at" => schema::timestamp("Last update date of the application"),
                },
                ..Default::default()
            },
        }
    }
}

impl<'a> WithValidate for ApplicationState<'a> {
    fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        if let Some(organization_id) = self.organization_id.as_deref_option() {
            if let Err(err) = validate_uuid("organization_id", organization_id) {
                diags.error_short(err.to_string(), attr_path.attribute("organization_id"));
            }
        }
    }
}

fn flatten_application<'a>(
    state: ApplicationState<'a>,
    application: Application,
) -> ApplicationState<'a> {
    ApplicationState {
        id: flatten_string(application.id),
        name: flatten_string(application.name),
        description: flatten_optional_string(Some(application.description)),
        tags: flatten_tags(&state.tags, application.tags),
        organization_id: flatten_string(application.organization_id),
        editable: flatten_bool(application.editable),
        created_at: flatten_optional_string(application.created_at),
        updated_at: flatten_optional_string(application.updated_at),
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ApplicationResource;

#[async_trait]
impl ScalewayResource for ApplicationResource {
    type State<'a> = ApplicationState<'a>;

    const NAME: &'static str = "iam_application";
    const ID_KIND: IdKind = IdKind::Global;

    fn plan_create<'a>(&self, meta: &Meta, state: &mut ApplicationState<'a>) -> Result<()> {
        if state.organization_id.is_null() {
            if let Some(organization_id) = &meta.default_organization_id {
                state.organization_id = flatten_string(organization_id.clone());
            }
        }
        unknown_if_null(&mut state.organization_id);
        unknown_if_null(&mut state.name);
        state.editable = Value::Unknown;
        state.created_at = Value::Unknown;
        state.updated_at = Value::Unknown;
        Ok(())
    }

    fn plan_update<'a>(
        &self,
        prior: &ApplicationState<'a>,
        proposed: &mut ApplicationState<'a>,
    ) -> Vec<AttributePath> {
        if proposed.organization_id.is_null() {
            proposed.organization_id = prior.organization_id.clone();
        }
        if prior.name != proposed.name
            || prior.description != proposed.description
            || prior.tags != proposed.tags
        {
            proposed.updated_at = Value::Unknown;
        }
        ReplaceTriggers::new()
            .check(
                "organization_id",
                &prior.organization_id,
                &proposed.organization_id,
            )
            .build()
    }

    async fn create<'a>(
        &self,
        meta: &Meta,
        planned: ApplicationState<'a>,
    ) -> Result<ApplicationState<'a>> {
        let api = IamApi::new(&meta.client);
        let organization_id = expand_string(&planned.organization_id)
            .or_else(|| meta.default_organization_id.clone())
            .context("`organization_id` must be set on the resource or the provider")?;

        let application = api
            .create_application(&CreateApplicationRequest {
                name: expand_string(&planned.name).unwrap_or_else(|| random_name("app")),
                organization_id,
                description: expand_string(&planned.description).unwrap_or_default(),
                tags: expand_strings(&planned.tags).unwrap_or_default(),
            })
            .await
            .context("cannot create application")?;
        tracing::debug!(id = %application.id, "application created");

        Ok(flatten_application(planned, application))
    }

    async fn read<'a>(
        &self,
        meta: &Meta,
        state: ApplicationState<'a>,
    ) -> Result<Option<ApplicationState<'a>>> {
        let id = state.id.as_deref_option().context("resource id is not known")?;
        let application = IamApi::new(&meta.client).get_application(id).await.found()?;
        Ok(application.map(|application| flatten_application(state, application)))
    }

    async fn update<'a>(
        &self,
        meta: &Meta,
        prior: ApplicationState<'a>,
        planned: ApplicationState<'a>,
    ) -> Result<ApplicationState<'a>> {
        let id = prior.id.as_deref_option().context("resource id is not known")?;
        let request = UpdateApplicationRequest {
            name: (prior.name != planned.name)
                .then(|| expand_string(&planned.name))
                .flatten(),
            description: (prior.description != planned.description)
                .then(|| expand_string(&planned.description).unwrap_or_default()),
            tags: (prior.tags != planned.tags)
                .then(|| expand_strings(&planned.tags).unwrap_or_default()),
        };
        let application = IamApi::new(&meta.client)
            .update_application(id, &request)
            .await
            .context("cannot update application")?;

        Ok(flatten_application(planned, application))
    }

    async fn delete<'a>(&self, meta: &Meta, state: ApplicationState<'a>) -> Result<()> {
        let id = state.id.as_deref_option().context("resource id is not known")?;
        IamApi::new(&meta.client)
            .delete_application(id)
            .await
            .found()
            .context("cannot delete application")?;
        Ok(())
    }
}
