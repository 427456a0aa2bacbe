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

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tf_provider::value::{Value, ValueString};
use tf_provider::Diagnostics;
use tokio::sync::RwLock;

use crate::client::ScalewayClient;
use crate::config::ResolvedConfig;
use crate::expand::flatten_string;
use crate::locality::{LocalizedId, Locality, Region, Zone};

/// Configured client and defaults, shared by every resource once the provider is configured
#[derive(Debug)]
pub struct Meta {
    pub client: ScalewayClient,
    pub default_zone: Zone,
    pub default_region: Region,
    pub default_project_id: Option<String>,
    pub default_organization_id: Option<String>,
}

impl Meta {
    pub fn new(client: ScalewayClient, config: &ResolvedConfig) -> Self {
        Self {
            client,
            default_zone: config.zone.clone(),
            default_region: config.region.clone(),
            default_project_id: config.project_id.clone(),
            default_organization_id: config.organization_id.clone(),
        }
    }

    /// Zone of a resource, or the provider zone when unset
    pub fn zone(&self, zone: &ValueString<'_>) -> Result<Zone> {
        match zone.as_deref_option() {
            Some(zone) => zone.parse().context("invalid `zone`"),
            None => Ok(self.default_zone.clone()),
        }
    }

    /// Region of a resource, or the provider region when unset
    pub fn region(&self, region: &ValueString<'_>) -> Result<Region> {
        match region.as_deref_option() {
            Some(region) => region.parse().context("invalid `region`"),
            None => Ok(self.default_region.clone()),
        }
    }

    /// Zone of a sub-resource, taken from its zoned parent id when `zone` is unset
    pub fn parent_zone(
        &self,
        zone: &ValueString<'_>,
        parent_id: &ValueString<'_>,
    ) -> Result<Zone> {
        parent_locality(zone, parent_id, &self.default_zone)
    }

    /// Region of a sub-resource, taken from its regional parent id when `region` is unset
    pub fn parent_region(
        &self,
        region: &ValueString<'_>,
        parent_id: &ValueString<'_>,
    ) -> Result<Region> {
        parent_locality(region, parent_id, &self.default_region)
    }

    /// Planned project: the configured one, the provider default, or unknown
    pub fn plan_project_id<'a>(&self, project_id: &ValueString<'a>) -> ValueString<'a> {
        match project_id {
            Value::Null => match &self.default_project_id {
                Some(project_id) => flatten_string(project_id.clone()),
                None => Value::Unknown,
            },
            project_id => project_id.clone(),
        }
    }

    /// Project to send on creation; `None` lets the API pick the default project of the credentials
    pub fn project_id(&self, project_id: &ValueString<'_>) -> Option<String> {
        project_id
            .as_deref_option()
            .map(str::to_owned)
            .or_else(|| self.default_project_id.clone())
    }
}

/// Locality of a resource referencing a parent: the configured one, the one of a localized
/// parent id, or `default`. A configured locality must match the parent's.
pub fn parent_locality<L: Locality>(
    configured: &ValueString<'_>,
    parent_id: &ValueString<'_>,
    default: &L,
) -> Result<L> {
    let from_parent = parent_id
        .as_deref_option()
        .and_then(|id| id.parse::<LocalizedId<L>>().ok())
        .map(|id| id.locality);
    let configured = match configured.as_deref_option() {
        Some(locality) => Some(
            locality
                .parse::<L>()
                .with_context(|| format!("invalid `{}`", L::KIND))?,
        ),
        None => None,
    };
    match (configured, from_parent) {
        (Some(configured), Some(parent)) if configured != parent => bail!(
            "{} `{configured}` does not match the {} of the parent resource `{parent}`",
            L::KIND,
            L::KIND
        ),
        (Some(locality), _) | (None, Some(locality)) => Ok(locality),
        (None, None) => Ok(default.clone()),
    }
}

/// Slot filled by the provider `configure` call and read by resources and data sources
#[derive(Debug, Clone, Default)]
pub struct MetaHandle(Arc<RwLock<Option<Arc<Meta>>>>);

impl MetaHandle {
    pub async fn set(&self, meta: Meta) {
        *self.0.write().await = Some(Arc::new(meta));
    }

    pub async fn get(&self, diags: &mut Diagnostics) -> Option<Arc<Meta>> {
        let meta = self.0.read().await.clone();
        if meta.is_none() {
            diags.root_error(
                "Provider is not configured",
                "The Scaleway provider must be configured before managing resources.",
            );
        }
        meta
    }
}
