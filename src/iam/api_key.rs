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

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tf_provider::value::{Value, ValueString};
use tf_provider::{map, AttributePath, AttributeType, Block, Description, Diagnostics, Schema};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::adapter::{IdKind, ReplaceTriggers, ScalewayResource};
use crate::client::NotFoundExt;
use crate::expand::{
    expand_id, expand_string, flatten_bool, flatten_optional_string, flatten_string,
    keep_or_flatten, unknown_if_null,
};
use crate::meta::Meta;
use crate::schema;
use crate::utils::{impl_with_id, WithSchema, WithValidate};

use super::api::{ApiKey, CreateApiKeyRequest, IamApi, UpdateApiKeyRequest};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiKeyState<'a> {
    pub id: ValueString<'a>,
    pub access_key: ValueString<'a>,
    pub secret_key: ValueString<'a>,
    pub application_id: ValueString<'a>,
    pub user_id: ValueString<'a>,
    pub description: ValueString<'a>,
    pub default_project_id: ValueString<'a>,
    pub expires_at: ValueString<'a>,
    pub creation_ip: ValueString<'a>,
    pub editable: Value<bool>,
    pub created_at: ValueString<'a>,
    pub updated_at: ValueString<'a>,
}

impl_with_id!(ApiKeyState);

impl<'a> WithSchema for ApiKeyState<'a> {
    fn schema() -> Schema {
        Schema {
            version: 1,
            block: Block {
                version: 1,
                description: Description::plain("Scaleway IAM API key of an application or a user"),
                attributes: map! {
                    "id" => schema::id("Access key of the API key"),
                    "access_key" => schema::computed(AttributeType::String, "Access key of the API key"),
                    "secret_key" => schema::sensitive(schema::computed(AttributeType::String, "Secret key, only known after creation")),
                    "application_id" => schema::optional(AttributeType::String, "Application owning the key, conflicts with `user_id`"),
                    "user_id" => schema::optional(AttributeType::String, "User owning the key, conflicts with `application_id`"),
                    "description" => schema::optional(AttributeType::String, "Description of the API key"),
                    "default_project_id" => schema::optional_computed(AttributeType::String, "Project used by default with this key"),
                    "expires_at" => schema::optional(AttributeType::String, "Expiration date of the key (RFC 3339)"),
                    "creation_ip" => schema::computed(AttributeType::String, "IP address the key was created from"),
                    "editable" => schema::computed(AttributeType::Bool, "Whether the key can be edited"),
                    "created_at" => schema::timestamp("Creation date of the API key"),
                    "updated_at" => schema::timestamp("Last update date of the API key"),
                },
                ..Default::default()
            },
        }
    }
}

impl<'a> WithValidate for ApiKeyState<'a> {
    fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        match (&self.application_id, &self.user_id) {
            (Value::Value(_), Value::Value(_)) => diags.error_short(
                "`application_id` and `user_id` cannot be set together",
                attr_path.clone().attribute("user_id"),
            ),
            (Value::Null, Value::Null) => {
                diags.root_error_short("One of `application_id` or `user_id` must be set")
            }
            _ => (),
        }
        if let Some(expires_at) = self.expires_at.as_deref_option() {
            if let Err(err) = parse_expiration(expires_at) {
                diags.error(
                    "Invalid expiration date",
                    format!("`{expires_at}` is not an RFC 3339 date: {err}"),
                    attr_path.attribute("expires_at"),
                );
            }
        }
    }
}

fn parse_expiration(value: &str) -> Result<OffsetDateTime, time::error::Parse> {
    OffsetDateTime::parse(value, &Rfc3339)
}

/// Keep the configured date when it is the same instant as the one returned by the API
fn flatten_expiration<'a>(
    planned: &ValueString<'a>,
    expires_at: Option<String>,
) -> ValueString<'a> {
    let same_instant = |configured: &str, returned: &str| {
        matches!(
            (parse_expiration(configured), parse_expiration(returned)),
            (Ok(a), Ok(b)) if a == b
        )
    };
    match (planned.as_deref_option(), expires_at) {
        (Some(configured), Some(returned)) if same_instant(configured, &returned) => {
            planned.clone()
        }
        (_, expires_at) => flatten_optional_string(expires_at),
    }
}

fn flatten_api_key<'a>(state: ApiKeyState<'a>, key: ApiKey) -> ApiKeyState<'a> {
    ApiKeyState {
        id: flatten_string(key.access_key.clone()),
        access_key: flatten_string(key.access_key),
        secret_key: keep_or_flatten(&state.secret_key, key.secret_key),
        application_id: flatten_optional_string(key.application_id),
        user_id: flatten_optional_string(key.user_id),
        description: flatten_optional_string(Some(key.description)),
        default_project_id: flatten_optional_string(key.default_project_id),
        expires_at: flatten_expiration(&state.expires_at, key.expires_at),
        creation_ip: flatten_optional_string(key.creation_ip),
        editable: flatten_bool(key.editable),
        created_at: flatten_optional_string(key.created_at),
        updated_at: flatten_optional_string(key.updated_at),
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ApiKeyResource;

#[async_trait]
impl ScalewayResource for ApiKeyResource {
    type State<'a> = ApiKeyState<'a>;

    const NAME: &'static str = "iam_api_key";
    const ID_KIND: IdKind = IdKind::Global;

    fn plan_create<'a>(&self, _meta: &Meta, state: &mut ApiKeyState<'a>) -> Result<()> {
        state.access_key = Value::Unknown;
        state.secret_key = Value::Unknown;
        unknown_if_null(&mut state.default_project_id);
        state.creation_ip = Value::Unknown;
        state.editable = Value::Unknown;
        state.created_at = Value::Unknown;
        state.updated_at = Value::Unknown;
        Ok(())
    }

    fn plan_update<'a>(
        &self,
        prior: &ApiKeyState<'a>,
        proposed: &mut ApiKeyState<'a>,
    ) -> Vec<AttributePath> {
        proposed.secret_key = prior.secret_key.clone();
        if proposed.default_project_id.is_null() {
            proposed.default_project_id = prior.default_project_id.clone();
        }
        if prior.description != proposed.description
            || prior.default_project_id != proposed.default_project_id
        {
            proposed.updated_at = Value::Unknown;
        }
        ReplaceTriggers::new()
            .check(
                "application_id",
                &expand_id(&prior.application_id),
                &expand_id(&proposed.application_id),
            )
            .check("user_id", &expand_id(&prior.user_id), &expand_id(&proposed.user_id))
            .check("expires_at", &prior.expires_at, &proposed.expires_at)
            .build()
    }

    async fn create<'a>(&self, meta: &Meta, planned: ApiKeyState<'a>) -> Result<ApiKeyState<'a>> {
        let request = CreateApiKeyRequest {
            application_id: expand_id(&planned.application_id),
            user_id: expand_id(&planned.user_id),
            expires_at: expand_string(&planned.expires_at),
            default_project_id: expand_string(&planned.default_project_id),
            description: expand_string(&planned.description).unwrap_or_default(),
        };
        if request.application_id.is_some() == request.user_id.is_some() {
            bail!("exactly one of `application_id` or `user_id` must be set");
        }

        let key = IamApi::new(&meta.client)
            .create_api_key(&request)
            .await
            .context("cannot create API key")?;
        tracing::debug!(access_key = %key.access_key, "API key created");

        Ok(flatten_api_key(planned, key))
    }

    async fn read<'a>(
        &self,
        meta: &Meta,
        state: ApiKeyState<'a>,
    ) -> Result<Option<ApiKeyState<'a>>> {
        let access_key = state.id.as_deref_option().context("resource id is not known")?;
        let key = IamApi::new(&meta.client).get_api_key(access_key).await.found()?;
        Ok(key.map(|key| flatten_api_key(state, key)))
    }

    async fn update<'a>(
        &self,
        meta: &Meta,
        prior: ApiKeyState<'a>,
        planned: ApiKeyState<'a>,
    ) -> Result<ApiKeyState<'a>> {
        let access_key = prior.id.as_deref_option().context("resource id is not known")?;
        let request = UpdateApiKeyRequest {
            default_project_id: (prior.default_project_id != planned.default_project_id)
                .then(|| expand_string(&planned.default_project_id))
                .flatten(),
            description: (prior.description != planned.description)
                .then(|| expand_string(&planned.description).unwrap_or_default()),
        };
        let key = IamApi::new(&meta.client)
            .update_api_key(access_key, &request)
            .await
            .context("cannot update API key")?;

        Ok(flatten_api_key(planned, key))
    }

    async fn delete<'a>(&self, meta: &Meta, state: ApiKeyState<'a>) -> Result<()> {
        let access_key = state.id.as_deref_option().context("resource id is not known")?;
        IamApi::new(&meta.client)
            .delete_api_key(access_key)
            .await
            .found()
            .context("cannot delete API key")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::meta::tests::{test_meta, PROJECT_ID};

    const ACCESS_KEY: &str = "SCW0123456789ABCDEFG";
    const SECRET_KEY: &str = "44444444-4444-4444-4444-444444444444";

    fn key_json(secret_key: Option<&str>) -> serde_json::Value {
        json!({
            "access_key": ACCESS_KEY,
            "secret_key": secret_key,
            "application_id": "app",
            "user_id": null,
            "description": "",
            "default_project_id": PROJECT_ID,
            "editable": true,
            "creation_ip": "198.51.100.7",
            "expires_at": "2030-01-01T00:00:00Z",
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    #[tokio::test]
    async fn secret_key_only_known_after_create() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/iam/v1alpha1/api-keys"))
            .and(body_json(json!({
                "application_id": "app",
                "expires_at": "2030-01-01T01:00:00+01:00",
                "description": ""
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(key_json(Some(SECRET_KEY))))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/iam/v1alpha1/api-keys/{ACCESS_KEY}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(key_json(None)))
            .mount(&server)
            .await;

        let meta = test_meta(&server);
        let mut state = ApiKeyState {
            application_id: flatten_string("app"),
            expires_at: flatten_string("2030-01-01T01:00:00+01:00"),
            ..Default::default()
        };
        ApiKeyResource.plan_create(&meta, &mut state).unwrap();
        assert!(state.default_project_id.is_unknown());

        let state = ApiKeyResource.create(&meta, state).await.unwrap();
        assert_eq!(state.id, flatten_string(ACCESS_KEY));
        assert_eq!(state.secret_key, flatten_string(SECRET_KEY));
        assert_eq!(state.expires_at, flatten_string("2030-01-01T01:00:00+01:00"));
        assert_eq!(state.default_project_id, flatten_string(PROJECT_ID));

        let state = ApiKeyResource.read(&meta, state).await.unwrap().unwrap();
        assert_eq!(state.secret_key, flatten_string(SECRET_KEY));
        assert_eq!(state.creation_ip, flatten_string("198.51.100.7"));
    }

    #[tokio::test]
    async fn update_description() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path(format!("/iam/v1alpha1/api-keys/{ACCESS_KEY}")))
            .and(body_json(json!({"description": "ci"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(key_json(None)))
            .expect(1)
            .mount(&server)
            .await;

        let meta = test_meta(&server);
        let prior = ApiKeyState {
            id: flatten_string(ACCESS_KEY),
            secret_key: flatten_string(SECRET_KEY),
            application_id: flatten_string("app"),
            default_project_id: flatten_string(PROJECT_ID),
            ..Default::default()
        };
        let mut planned = ApiKeyState {
            description: flatten_string("ci"),
            secret_key: Value::Unknown,
            ..prior.clone()
        };
        assert!(ApiKeyResource.plan_update(&prior, &mut planned).is_empty());
        assert_eq!(planned.secret_key, flatten_string(SECRET_KEY));

        let state = ApiKeyResource.update(&meta, prior, planned).await.unwrap();
        assert_eq!(state.secret_key, flatten_string(SECRET_KEY));
    }

    #[test]
    fn owner_and_expiration_force_replacement() {
        let prior = ApiKeyState {
            application_id: flatten_string("app"),
            expires_at: flatten_string("2030-01-01T00:00:00Z"),
            ..Default::default()
        };
        let mut proposed = ApiKeyState {
            application_id: Value::Null,
            user_id: flatten_string("user"),
            expires_at: Value::Null,
            ..prior.clone()
        };
        assert_eq!(ApiKeyResource.plan_update(&prior, &mut proposed).len(), 3);
    }

    #[test]
    fn validation() {
        let mut diags = Diagnostics::default();
        ApiKeyState {
            application_id: flatten_string("app"),
            expires_at: flatten_string("2030-01-01T00:00:00Z"),
            ..Default::default()
        }
        .validate(&mut diags, AttributePath::default());
        assert!(diags.errors.is_empty());

        let mut diags = Diagnostics::default();
        ApiKeyState {
            application_id: flatten_string("app"),
            user_id: flatten_string("user"),
            expires_at: flatten_string("next year"),
            ..Default::default()
        }
        .validate(&mut diags, AttributePath::default());
        assert_eq!(diags.errors.len(), 2);

        let mut diags = Diagnostics::default();
        ApiKeyState::default().validate(&mut diags, AttributePath::default());
        assert_eq!(diags.errors.len(), 1);
    }
}
