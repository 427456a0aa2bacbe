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

use std::fmt::Debug;
use std::str::FromStr;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tf_provider::{AttributePath, Diagnostics};

use crate::locality::{NestedRegionalId, NestedZonedId, RegionalId, ZonedId};
use crate::meta::Meta;
use crate::utils::{WithId, WithSchema, WithValidate};

mod data_source;
mod resource;

pub use data_source::DataSourceAdapter;
pub use resource::ResourceAdapter;

/// Shape of the Terraform `id` of a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdKind {
    /// Bare identifier, for global resources
    Global,
    /// `<zone>/<id>`
    Zoned,
    /// `<region>/<id>`
    Regional,
    /// `<zone>/<parent id>/<id>`
    NestedZoned,
    /// `<region>/<parent id>/<id>`
    NestedRegional,
}

impl IdKind {
    /// Check `id` has the expected shape
    pub fn check(self, id: &str) -> Result<()> {
        match self {
            IdKind::Global => {
                if id.is_empty() || id.contains('/') {
                    anyhow::bail!("invalid id `{id}`: expected a bare identifier");
                }
            }
            IdKind::Zoned => {
                ZonedId::from_str(id)?;
            }
            IdKind::Regional => {
                RegionalId::from_str(id)?;
            }
            IdKind::NestedZoned => {
                NestedZonedId::from_str(id)?;
            }
            IdKind::NestedRegional => {
                NestedRegionalId::from_str(id)?;
            }
        }
        Ok(())
    }
}

/// CRUD hooks of a Scaleway resource, driven by [`ResourceAdapter`]
#[async_trait]
pub trait ScalewayResource: Send + Sync + 'static {
    type State<'a>: WithSchema
        + WithValidate
        + WithId
        + Serialize
        + Deserialize<'a>
        + Clone
        + Debug
        + Default
        + Send
        + Sync;

    /// Resource type name, without the provider prefix
    const NAME: &'static str;
    const ID_KIND: IdKind;

    /// Fill defaults and mark computed attributes as unknown before creation
    fn plan_create<'a>(&self, meta: &Meta, state: &mut Self::State<'a>) -> Result<()>;

    /// Adjust the planned state of an update, and return the attributes requiring a replacement
    fn plan_update<'a>(
        &self,
        prior: &Self::State<'a>,
        proposed: &mut Self::State<'a>,
    ) -> Vec<AttributePath>;

    async fn create<'a>(&self, meta: &Meta, planned: Self::State<'a>) -> Result<Self::State<'a>>;

    /// Refresh the state, returning `None` when the resource no longer exists
    async fn read<'a>(&self, meta: &Meta, state: Self::State<'a>)
        -> Result<Option<Self::State<'a>>>;

    async fn update<'a>(
        &self,
        meta: &Meta,
        prior: Self::State<'a>,
        planned: Self::State<'a>,
    ) -> Result<Self::State<'a>>;

    async fn delete<'a>(&self, meta: &Meta, state: Self::State<'a>) -> Result<()>;
}

/// Read hook of a Scaleway data source, driven by [`DataSourceAdapter`]
#[async_trait]
pub trait ScalewayDataSource: Send + Sync + 'static {
    type State<'a>: WithSchema
        + WithValidate
        + Serialize
        + Deserialize<'a>
        + Clone
        + Debug
        + Send
        + Sync;

    const NAME: &'static str;

    async fn read<'a>(&self, meta: &Meta, config: Self::State<'a>) -> Result<Self::State<'a>>;
}

/// Collect the attributes that changed between the prior and proposed states
pub(crate) struct ReplaceTriggers(Vec<AttributePath>);

impl ReplaceTriggers {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Require a replacement when `name` changed, or is not known yet
    pub fn check<T: PartialEq>(mut self, name: &'static str, prior: &T, proposed: &T) -> Self {
        if prior != proposed {
            self.0.push(AttributePath::new(name));
        }
        self
    }

    pub fn add(mut self, name: &'static str) -> Self {
        self.0.push(AttributePath::new(name));
        self
    }

    pub fn build(self) -> Vec<AttributePath> {
        self.0
    }
}

/// Report an error on the whole configuration
pub(crate) fn report(diags: &mut Diagnostics, summary: String, err: &anyhow::Error) {
    tracing::error!("{summary}: {err:#}");
    diags.root_error(summary, format!("{err:#}"));
}
