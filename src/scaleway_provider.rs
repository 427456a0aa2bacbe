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

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use tf_provider::{
    map, AttributePath, AttributeType, Block, Description, Diagnostics, Provider, Schema,
    ValueEmpty, ValueString,
};

use crate::adapter::{DataSourceAdapter, ResourceAdapter};
use crate::client::{ClientConfig, RetryPolicy, ScalewayClient};
use crate::config::{self, Profile};
use crate::expand::expand_string;
use crate::locality::{validate_region, validate_zone};
use crate::meta::{Meta, MetaHandle};
use crate::schema::{optional, sensitive};
use crate::{iam, instance, lb, rdb, secret, vpc};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig<'a> {
    pub access_key: ValueString<'a>,
    pub secret_key: ValueString<'a>,
    pub project_id: ValueString<'a>,
    pub organization_id: ValueString<'a>,
    pub region: ValueString<'a>,
    pub zone: ValueString<'a>,
    pub api_url: ValueString<'a>,
    pub profile: ValueString<'a>,
}

impl<'a> ProviderConfig<'a> {
    fn profile(&self) -> Profile {
        Profile {
            access_key: expand_string(&self.access_key),
            secret_key: expand_string(&self.secret_key),
            project_id: expand_string(&self.project_id),
            organization_id: expand_string(&self.organization_id),
            region: expand_string(&self.region),
            zone: expand_string(&self.zone),
            api_url: expand_string(&self.api_url),
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct ScalewayProvider {
    meta: MetaHandle,
}

#[async_trait]
impl Provider for ScalewayProvider {
    type Config<'a> = ProviderConfig<'a>;
    type MetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(Schema {
            version: 1,
            block: Block {
                description: Description::plain("Manage Scaleway resources"),
                attributes: map! {
                    "access_key" => optional(AttributeType::String, "Scaleway access key"),
                    "secret_key" => sensitive(optional(AttributeType::String, "Scaleway secret key")),
                    "project_id" => optional(AttributeType::String, "Default project of the resources"),
                    "organization_id" => optional(AttributeType::String, "Organization of the credentials"),
                    "region" => optional(AttributeType::String, "Default region of the resources"),
                    "zone" => optional(AttributeType::String, "Default zone of the resources"),
                    "api_url" => optional(AttributeType::String, "Scaleway API endpoint"),
                    "profile" => optional(AttributeType::String, "Profile of the Scaleway configuration file"),
                },
                ..Default::default()
            },
        })
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::Config<'a>) -> Option<()> {
        let uuids = [
            ("secret_key", &config.secret_key),
            ("project_id", &config.project_id),
            ("organization_id", &config.organization_id),
        ];
        for (field, value) in uuids {
            if let Some(value) = value.as_deref_option() {
                if let Err(err) = config::validate_uuid(field, value) {
                    diags.error_short(err.to_string(), AttributePath::new(field));
                }
            }
        }
        if let Some(access_key) = config.access_key.as_deref_option() {
            if let Err(err) = config::validate_access_key(access_key) {
                diags.error_short(err.to_string(), AttributePath::new("access_key"));
            }
        }
        validate_zone(diags, &config.zone, AttributePath::new("zone"));
        validate_region(diags, &config.region, AttributePath::new("region"));

        if diags.errors.is_empty() {
            Some(())
        } else {
            None
        }
    }

    async fn configure<'a>(
        &self,
        diags: &mut Diagnostics,
        terraform_version: String,
        config: Self::Config<'a>,
    ) -> Option<()> {
        let resolved = match config::resolve(
            config.profile(),
            config.profile.as_deref_option(),
            |name| std::env::var(name).ok(),
        ) {
            Ok(resolved) => resolved,
            Err(err) => {
                diags.root_error("Invalid Scaleway provider configuration", err.to_string());
                return None;
            }
        };
        tracing::info!(zone = %resolved.zone, region = %resolved.region, api_url = resolved.api_url, "configuring provider");

        let client = match ScalewayClient::new(ClientConfig {
            secret_key: resolved.secret_key.clone(),
            api_url: resolved.api_url.clone(),
            user_agent: format!(
                "terraform-provider-scaleway/{} terraform/{terraform_version}",
                env!("CARGO_PKG_VERSION")
            ),
            retry: RetryPolicy::default(),
        }) {
            Ok(client) => client,
            Err(err) => {
                diags.root_error("Cannot create the Scaleway client", err.to_string());
                return None;
            }
        };

        self.meta.set(Meta::new(client, &resolved)).await;
        Some(())
    }

    fn get_resources(
        &self,
        _diags: &mut Diagnostics,
    ) -> Option<std::collections::HashMap<String, Box<dyn tf_provider::resource::DynamicResource>>>
    {
        let meta = &self.meta;
        Some(map! {
            "instance_server" => ResourceAdapter::new(instance::ServerResource::default(), meta.clone()),
            "instance_ip" => ResourceAdapter::new(instance::IpResource::default(), meta.clone()),
            "instance_security_group" => ResourceAdapter::new(instance::SecurityGroupResource::default(), meta.clone()),
            "instance_private_nic" => ResourceAdapter::new(instance::PrivateNicResource::default(), meta.clone()),
            "vpc_private_network" => ResourceAdapter::new(vpc::PrivateNetworkResource::default(), meta.clone()),
            "vpc_public_gateway" => ResourceAdapter::new(vpc::PublicGatewayResource::default(), meta.clone()),
            "vpc_gateway_network" => ResourceAdapter::new(vpc::GatewayNetworkResource::default(), meta.clone()),
            "lb" => ResourceAdapter::new(lb::LbResource::default(), meta.clone()),
            "rdb_instance" => ResourceAdapter::new(rdb::RdbInstanceResource::default(), meta.clone()),
            "rdb_database" => ResourceAdapter::new(rdb::RdbDatabaseResource::default(), meta.clone()),
            "secret" => ResourceAdapter::new(secret::SecretResource::default(), meta.clone()),
            "secret_version" => ResourceAdapter::new(secret::SecretVersionResource::default(), meta.clone()),
            "iam_application" => ResourceAdapter::new(iam::ApplicationResource::default(), meta.clone()),
            "iam_api_key" => ResourceAdapter::new(iam::ApiKeyResource::default(), meta.clone()),
        })
    }

    fn get_data_sources(
        &self,
        _diags: &mut Diagnostics,
    ) -> Option<
        std::collections::HashMap<String, Box<dyn tf_provider::data_source::DynamicDataSource>>,
    > {
        let meta = &self.meta;
        Some(map! {
            "instance_server" => DataSourceAdapter::new(instance::ServerDataSource::default(), meta.clone()),
            "vpc_private_network" => DataSourceAdapter::new(vpc::PrivateNetworkDataSource::default(), meta.clone()),
            "secret_version" => DataSourceAdapter::new(secret::SecretVersionDataSource::default(), meta.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::expand::flatten_string;

    #[tokio::test]
    async fn validate_formats() {
        let provider = ScalewayProvider::default();

        let mut diags = Diagnostics::default();
        let config = ProviderConfig {
            secret_key: flatten_string("11111111-1111-1111-1111-111111111111"),
            zone: flatten_string("fr-par-2"),
            ..Default::default()
        };
        assert!(provider.validate(&mut diags, config).await.is_some());

        let mut diags = Diagnostics::default();
        let config = ProviderConfig {
            secret_key: flatten_string("nope"),
            access_key: flatten_string("SCW1"),
            zone: flatten_string("mars-1"),
            ..Default::default()
        };
        assert!(provider.validate(&mut diags, config).await.is_none());
        assert_eq!(diags.errors.len(), 3);
    }

    #[tokio::test]
    async fn registers_every_resource() {
        let provider = ScalewayProvider::default();
        let mut diags = Diagnostics::default();

        let resources = provider.get_resources(&mut diags).unwrap();
        assert_eq!(resources.len(), 14);
        assert!(resources.contains_key("instance_server"));
        assert!(resources.contains_key("iam_api_key"));

        let data_sources = provider.get_data_sources(&mut diags).unwrap();
        assert_eq!(data_sources.len(), 3);
    }
}
