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

use std::borrow::Cow;
use std::cell::RefCell;

use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use tf_provider::{AttributePath, Diagnostics, Schema, Value};

pub(crate) trait WithSchema {
    fn schema() -> Schema;
}

pub(crate) trait WithValidate {
    fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath);
}

/// State carrying the Terraform `id` attribute
pub(crate) trait WithId {
    fn id(&self) -> Option<&str>;
    fn set_id(&mut self, id: Option<String>);
}

/// Implement [`WithId`] for states whose identifier is stored in an `id: ValueString` field
macro_rules! impl_with_id {
    ($($state:ident),+ $(,)?) => {
        $(
            impl<'a> $crate::utils::WithId for $state<'a> {
                fn id(&self) -> Option<&str> {
                    self.id.as_deref_option()
                }
                fn set_id(&mut self, id: Option<String>) {
                    self.id = $crate::utils::value_from_option(id);
                }
            }
        )+
    };
}
pub(crate) use impl_with_id;

/// Known value, or unknown when the value has yet to be computed
pub(crate) fn value_from_option<'a>(value: Option<String>) -> Value<Cow<'a, str>> {
    match value {
        Some(value) => Value::Value(Cow::Owned(value)),
        None => Value::Unknown,
    }
}

/// Name given to resources created without one: `tf-<prefix>-<random suffix>`
pub(crate) fn random_name(prefix: &str) -> String {
    let suffix = thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(|c| char::from(c).to_ascii_lowercase())
        .collect::<String>();
    format!("tf-{prefix}-{suffix}")
}

pub struct DisplayJoiner<'a, T, I>
where
    T: Iterator<Item = I>,
    I: std::fmt::Display,
{
    iter: RefCell<T>,
    sep: &'a str,
}

pub trait DisplayJoinable {
    type Joiner<'a>;
    fn join_with(self, sep: &str) -> Self::Joiner<'_>;
}

impl<T, I> DisplayJoinable for T
where
    T: Iterator<Item = I>,
    I: std::fmt::Display,
{
    type Joiner<'a> = DisplayJoiner<'a, T, I>;

    fn join_with(self, sep: &str) -> Self::Joiner<'_> {
        DisplayJoiner {
            iter: RefCell::new(self),
            sep,
        }
    }
}

impl<'a, T, I> std::fmt::Display for DisplayJoiner<'a, T, I>
where
    T: Iterator<Item = I>,
    I: std::fmt::Display,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut sep = "";
        let mut iter = self.iter.try_borrow_mut().or(Err(std::fmt::Error))?;
        for elt in iter.by_ref() {
            f.write_str(sep)?;
            f.write_fmt(format_args!("{elt}"))?;
            sep = self.sep;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join() {
        let joined = ["a", "b", "c"].iter().join_with(", ").to_string();
        assert_eq!(joined, "a, b, c");
        assert_eq!(std::iter::empty::<&str>().join_with(", ").to_string(), "");
    }

    #[test]
    fn random_names() {
        let name = random_name("srv");
        assert!(name.starts_with("tf-srv-"));
        assert_eq!(name.len(), "tf-srv-".len() + 8);
        assert_ne!(random_name("srv"), random_name("srv"));
    }
}
