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

use tf_provider::{AttributePath, DataSource, Diagnostics, Schema, ValueEmpty};

use crate::meta::MetaHandle;
use crate::utils::{WithSchema, WithValidate};

use super::{report, ScalewayDataSource};

#[derive(Debug, Default)]
pub struct DataSourceAdapter<D: ScalewayDataSource> {
    data_source: D,
    meta: MetaHandle,
}

impl<D: ScalewayDataSource> DataSourceAdapter<D> {
    pub fn new(data_source: D, meta: MetaHandle) -> Self {
        Self { data_source, meta }
    }
}

#[async_trait]
impl<D> DataSource for DataSourceAdapter<D>
where
    D: ScalewayDataSource,
{
    type State<'a> = D::State<'a>;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(<D::State<'static> as WithSchema>::schema())
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::State<'a>) -> Option<()> {
        config.validate(diags, AttributePath::default());

        if diags.errors.is_empty() {
            Some(())
        } else {
            None
        }
    }

    async fn read<'a>(
        &self,
        diags: &mut Diagnostics,
        config: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<Self::State<'a>> {
        let meta = self.meta.get(diags).await?;

        match self.data_source.read(&meta, config).await {
            Ok(state) => Some(state),
            Err(err) => {
                report(diags, format!("Failed to read `{}`", D::NAME), &err);
                None
            }
        }
    }
}
