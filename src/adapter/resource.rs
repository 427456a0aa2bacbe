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

use tf_provider::value::{Value, ValueEmpty};
use tf_provider::{schema::Schema, AttributePath, Diagnostics, Resource};

use crate::meta::MetaHandle;
use crate::utils::{WithId, WithSchema, WithValidate};

use super::{report, ScalewayResource};

/// Terraform resource backed by a [`ScalewayResource`]
///
/// The Terraform state is null once the resource has been deleted outside of Terraform.
#[derive(Debug, Default)]
pub struct ResourceAdapter<R: ScalewayResource> {
    resource: R,
    meta: MetaHandle,
}

impl<R: ScalewayResource> ResourceAdapter<R> {
    pub fn new(resource: R, meta: MetaHandle) -> Self {
        Self { resource, meta }
    }
}

#[async_trait]
impl<R> Resource for ResourceAdapter<R>
where
    R: ScalewayResource,
{
    type State<'a> = Value<R::State<'a>>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(<R::State<'static> as WithSchema>::schema())
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::State<'a>) -> Option<()> {
        if let Value::Value(config) = &config {
            config.validate(diags, AttributePath::default());
        }

        if diags.errors.is_empty() {
            Some(())
        } else {
            None
        }
    }

    async fn read<'a>(
        &self,
        diags: &mut Diagnostics,
        state: Self::State<'a>,
        private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let state = match state {
            Value::Value(state) => state,
            state => return Some((state, private_state)),
        };
        let meta = self.meta.get(diags).await?;
        let id = state.id().unwrap_or_default().to_owned();

        match self.resource.read(&meta, state).await {
            Ok(Some(state)) => Some((Value::Value(state), private_state)),
            Ok(None) => {
                tracing::warn!(
                    resource = R::NAME,
                    %id,
                    "resource not found, removing it from the state"
                );
                Some((Value::Null, private_state))
            }
            Err(err) => {
                report(diags, format!("Failed to read `{}` {id}", R::NAME), &err);
                None
            }
        }
    }

    async fn plan_create<'a>(
        &self,
        diags: &mut Diagnostics,
        proposed_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let mut state = match proposed_state {
            Value::Value(state) => state,
            proposed_state => return Some((proposed_state, Default::default())),
        };
        let meta = self.meta.get(diags).await?;

        state.set_id(None);
        if let Err(err) = self.resource.plan_create(&meta, &mut state) {
            report(diags, format!("Failed to plan `{}`", R::NAME), &err);
            return None;
        }

        Some((Value::Value(state), Default::default()))
    }

    async fn plan_update<'a>(
        &self,
        _diags: &mut Diagnostics,
        prior_state: Self::State<'a>,
        proposed_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        prior_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(
        Self::State<'a>,
        Self::PrivateState<'a>,
        Vec<tf_provider::AttributePath>,
    )> {
        match (prior_state, proposed_state) {
            (Value::Value(prior), Value::Value(mut proposed)) => {
                let trigger_replace = self.resource.plan_update(&prior, &mut proposed);
                Some((Value::Value(proposed), prior_private_state, trigger_replace))
            }
            (_, proposed_state) => Some((proposed_state, prior_private_state, Vec::new())),
        }
    }

    async fn plan_destroy<'a>(
        &self,
        _diags: &mut Diagnostics,
        _prior_state: Self::State<'a>,
        _prior_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<()> {
        Some(())
    }

    async fn create<'a>(
        &self,
        diags: &mut Diagnostics,
        planned_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let Value::Value(planned) = planned_state else {
            diags.root_error_short("Cannot create a resource from a null plan");
            return None;
        };
        let meta = self.meta.get(diags).await?;

        match self.resource.create(&meta, planned).await {
            Ok(state) => {
                tracing::info!(resource = R::NAME, id = ?state.id(), "resource created");
                Some((Value::Value(state), private_state))
            }
            Err(err) => {
                report(diags, format!("Failed to create `{}`", R::NAME), &err);
                None
            }
        }
    }

    async fn update<'a>(
        &self,
        diags: &mut Diagnostics,
        prior_state: Self::State<'a>,
        planned_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let (Value::Value(prior), Value::Value(planned)) = (prior_state, planned_state) else {
            diags.root_error_short("Cannot update a resource without prior state");
            return None;
        };
        let meta = self.meta.get(diags).await?;
        let id = prior.id().unwrap_or_default().to_owned();

        match self.resource.update(&meta, prior, planned).await {
            Ok(state) => {
                tracing::info!(resource = R::NAME, %id, "resource updated");
                Some((Value::Value(state), private_state))
            }
            Err(err) => {
                report(diags, format!("Failed to update `{}` {id}", R::NAME), &err);
                None
            }
        }
    }

    async fn destroy<'a>(
        &self,
        diags: &mut Diagnostics,
        state: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<()> {
        let Value::Value(state) = state else {
            return Some(());
        };
        let meta = self.meta.get(diags).await?;
        let id = state.id().unwrap_or_default().to_owned();

        match self.resource.delete(&meta, state).await {
            Ok(()) => {
                tracing::info!(resource = R::NAME, %id, "resource deleted");
                Some(())
            }
            Err(err) => {
                report(diags, format!("Failed to delete `{}` {id}", R::NAME), &err);
                None
            }
        }
    }

    async fn import<'a>(
        &self,
        diags: &mut Diagnostics,
        id: String,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        if let Err(err) = R::ID_KIND.check(&id) {
            report(diags, format!("Cannot import `{}`", R::NAME), &err);
            return None;
        }

        let mut state = <R::State<'a> as Default>::default();
        state.set_id(Some(id));
        Some((Value::Value(state), Default::default()))
    }
}
