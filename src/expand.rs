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

//! Conversions between Terraform values and Scaleway API values.
//!
//! `expand_*` functions read a Terraform value into a plain Rust value, treating both null
//! and unknown as absent. `flatten_*` functions build Terraform values from API responses.

use std::borrow::Cow;
use std::fmt::Display;
use std::str::FromStr;

use anyhow::{anyhow, Context, Result};

use tf_provider::value::{Value, ValueList, ValueNumber, ValueString};

use crate::locality;

const BYTES_PER_GB: u64 = 1_000_000_000;

pub fn expand_string(value: &ValueString<'_>) -> Option<String> {
    value.as_deref_option().map(str::to_owned)
}

/// Bare identifier of a referenced resource, stripped of its locality
pub fn expand_id(value: &ValueString<'_>) -> Option<String> {
    value
        .as_deref_option()
        .map(|id| locality::expand_id(id).to_owned())
}

/// Parse the Terraform `id` of a resource into its structured form
pub fn parse_id<T>(id: &ValueString<'_>) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let id = id.as_deref_option().ok_or_else(|| anyhow!("resource id is not known"))?;
    id.parse().with_context(|| format!("invalid resource id `{id}`"))
}

pub fn expand_bool(value: &Value<bool>) -> Option<bool> {
    value.as_ref_option().copied()
}

pub fn expand_number(value: &ValueNumber) -> Option<i64> {
    value.as_ref_option().copied()
}

pub fn expand_strings(value: &ValueList<ValueString<'_>>) -> Option<Vec<String>> {
    value.as_ref_option().map(|values| {
        values
            .iter()
            .filter_map(|value| value.as_deref_option().map(str::to_owned))
            .collect()
    })
}

pub fn flatten_string<'a>(value: impl Into<String>) -> ValueString<'a> {
    Value::Value(Cow::Owned(value.into()))
}

/// `None` and empty strings are flattened to null
pub fn flatten_optional_string<'a>(value: Option<String>) -> ValueString<'a> {
    match value {
        Some(value) if !value.is_empty() => Value::Value(Cow::Owned(value)),
        _ => Value::Null,
    }
}

pub fn flatten_bool(value: bool) -> Value<bool> {
    Value::Value(value)
}

pub fn flatten_number(value: impl Into<i64>) -> ValueNumber {
    Value::Value(value.into())
}

pub fn flatten_strings<'a>(values: Vec<String>) -> ValueList<ValueString<'a>> {
    Value::Value(values.into_iter().map(flatten_string).collect())
}

/// Empty API lists stay null when the configuration left them unset
pub fn flatten_tags<'a>(
    planned: &ValueList<ValueString<'a>>,
    tags: Vec<String>,
) -> ValueList<ValueString<'a>> {
    if tags.is_empty() && !matches!(planned, Value::Value(_)) {
        Value::Null
    } else {
        flatten_strings(tags)
    }
}

/// Reference to another resource, kept as configured when it designates the same resource
pub fn flatten_reference<'a>(
    planned: &ValueString<'a>,
    locality: &impl Display,
    id: Option<String>,
) -> ValueString<'a> {
    match id {
        Some(id) if id.is_empty() => Value::Null,
        Some(id) if expand_id(planned).as_deref() == Some(id.as_str()) => planned.clone(),
        Some(id) => flatten_string(format!("{locality}/{id}")),
        None => Value::Null,
    }
}

/// Keep the planned value as-is when the API does not echo it back
pub fn keep_or_flatten<'a>(planned: &ValueString<'a>, value: Option<String>) -> ValueString<'a> {
    match value {
        Some(value) => flatten_string(value),
        None if planned.is_unknown() => Value::Null,
        None => planned.clone(),
    }
}

/// Mark an optional+computed attribute as computed when it is not set in the configuration
pub fn unknown_if_null<T>(value: &mut Value<T>) {
    if value.is_null() {
        *value = Value::Unknown;
    }
}

pub fn bytes_to_gb(bytes: u64) -> i64 {
    (bytes / BYTES_PER_GB) as i64
}

pub fn gb_to_bytes(gb: i64) -> Result<u64> {
    u64::try_from(gb)
        .ok()
        .and_then(|gb| gb.checked_mul(BYTES_PER_GB))
        .ok_or_else(|| anyhow!("volume size of {gb} GB is out of range"))
}
