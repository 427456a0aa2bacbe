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
use tf_provider::value::{Value, ValueString};
use tf_provider::{map, AttributePath, AttributeType, Block, Description, Diagnostics, Schema};

use crate::adapter::ScalewayDataSource;
use crate::expand::{expand_id, expand_string, flatten_optional_string, flatten_string};
use crate::locality::{validate_region, NestedRegionalId};
use crate::meta::Meta;
use crate::schema;
use crate::utils::{WithSchema, WithValidate};

use super::api::SecretApi;
use super::version::decode_data;

const LATEST: &str = "latest";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecretVersionDataState<'a> {
    pub id: ValueString<'a>,
    pub region: ValueString<'a>,
    pub secret_id: ValueString<'a>,
    pub revision: ValueString<'a>,
    pub data: ValueString<'a>,
    pub description: ValueString<'a>,
    pub status: ValueString<'a>,
    pub created_at: ValueString<'a>,
    pub updated_at: ValueString<'a>,
}

impl<'a> WithSchema for SecretVersionDataState<'a> {
    fn schema() -> Schema {
        Schema {
            version: 1,
            block: Block {
                version: 1,
                description: Description::plain(
                    "Read the payload of a Scaleway Secret Manager secret version",
                ),
                attributes: map! {
                    "id" => schema::id("Id of the version, as `<region>/<secret id>/<revision>`"),
                    "region" => schema::region(),
                    "secret_id" => schema::required(AttributeType::String, "Secret holding the version"),
                    "revision" => schema::optional_computed(AttributeType::String, "Revision number, or `latest` (the default)"),
                    "data" => schema::sensitive(schema::computed(AttributeType::String, "Payload of the version")),
                    "description" => schema::computed(AttributeType::String, "Description of the version"),
                    "status" => schema::computed(AttributeType::String, "Status of the version"),
                    "created_at" => schema::timestamp("Creation date of the version"),
                    "updated_at" => schema::timestamp("Last update date of the version"),
                },
                ..Default::default()
            },
        }
    }
}

impl<'a> WithValidate for SecretVersionDataState<'a> {
    fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        validate_region(diags, &self.region, attr_path.clone().attribute("region"));
        if let Some(revision) = self.revision.as_deref_option() {
            if !is_revision(revision) {
                diags.error(
                    "Invalid revision",
                    format!("`{revision}` is neither a revision number nor `{LATEST}`"),
                    attr_path.attribute("revision"),
                );
            }
        }
    }
}

fn is_revision(revision: &str) -> bool {
    revision == LATEST || revision.parse::<u32>().map_or(false, |n| n > 0)
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SecretVersionDataSource;

#[async_trait]
impl ScalewayDataSource for SecretVersionDataSource {
    type State<'a> = SecretVersionDataState<'a>;

    const NAME: &'static str = "secret_version";

    async fn read<'a>(
        &self,
        meta: &Meta,
        config: SecretVersionDataState<'a>,
    ) -> Result<SecretVersionDataState<'a>> {
        let region = meta.parent_region(&config.region, &config.secret_id)?;
        let api = SecretApi::new(&meta.client, &region);
        let secret_id = expand_id(&config.secret_id).context("`secret_id` is not known")?;
        let revision = expand_string(&config.revision).unwrap_or_else(|| LATEST.to_owned());

        // resolve `latest` first so the payload matches the reported revision
        let version = api
            .get_version(&secret_id, &revision)
            .await
            .with_context(|| format!("cannot read revision {revision} of secret {secret_id}"))?;
        let revision = version.revision.to_string();
        let data = api
            .access_version(&secret_id, &revision)
            .await
            .with_context(|| format!("cannot access revision {revision} of secret {secret_id}"))?;

        Ok(SecretVersionDataState {
            id: flatten_string(
                NestedRegionalId::new(region.clone(), &secret_id, &revision).to_string(),
            ),
            region: flatten_string(region.to_string()),
            secret_id: config.secret_id,
            revision: match config.revision {
                Value::Value(revision) => Value::Value(revision),
                _ => flatten_string(revision),
            },
            data: flatten_string(decode_data(data)?),
            description: flatten_optional_string(version.description),
            status: flatten_string(version.status),
            created_at: flatten_optional_string(version.created_at),
            updated_at: flatten_optional_string(version.updated_at),
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::meta::tests::test_meta;
    use crate::secret::tests::BASE;

    #[tokio::test]
    async fn latest_by_default() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{BASE}/secrets/sec/versions/latest")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "revision": 3,
                "secret_id": "sec",
                "status": "enabled"
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("{BASE}/secrets/sec/versions/3/access")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": "aHVudGVyMg=="})))
            .expect(1)
            .mount(&server)
            .await;

        let meta = test_meta(&server);
        let state = SecretVersionDataSource
            .read(
                &meta,
                SecretVersionDataState {
                    secret_id: flatten_string("fr-par/sec"),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(state.id, flatten_string("fr-par/sec/3"));
        assert_eq!(state.revision, flatten_string("3"));
        assert_eq!(state.data, flatten_string("hunter2"));
        assert!(state.description.is_null());
    }

    #[tokio::test]
    async fn reads_in_secret_region() {
        let server = MockServer::start().await;
        let base = "/secret-manager/v1beta1/regions/nl-ams";
        Mock::given(method("GET"))
            .and(path(format!("{base}/secrets/sec/versions/2")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "revision": 2,
                "secret_id": "sec",
                "status": "enabled"
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("{base}/secrets/sec/versions/2/access")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": "aHVudGVyMg=="})))
            .expect(1)
            .mount(&server)
            .await;

        let meta = test_meta(&server);
        let state = SecretVersionDataSource
            .read(
                &meta,
                SecretVersionDataState {
                    secret_id: flatten_string("nl-ams/sec"),
                    revision: flatten_string("2"),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(state.id, flatten_string("nl-ams/sec/2"));
        assert_eq!(state.region, flatten_string("nl-ams"));
    }

    #[tokio::test]
    async fn missing_version() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{BASE}/secrets/sec/versions/7")))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"type": "not_found"})))
            .mount(&server)
            .await;

        let meta = test_meta(&server);
        let result = SecretVersionDataSource
            .read(
                &meta,
                SecretVersionDataState {
                    secret_id: flatten_string("sec"),
                    revision: flatten_string("7"),
                    ..Default::default()
                },
            )
            .await;
        assert!(result.is_err());
    }

    #[test]
    fn revisions() {
        assert!(is_revision("latest"));
        assert!(is_revision("12"));
        assert!(!is_revision("0"));
        assert!(!is_revision("-1"));
        assert!(!is_revision("newest"));

        let mut diags = Diagnostics::default();
        SecretVersionDataState {
            revision: flatten_string("newest"),
            ..Default::default()
        }
        .validate(&mut diags, AttributePath::default());
        assert_eq!(diags.errors.len(), 1);
    }
}
