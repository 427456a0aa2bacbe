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

use std::fmt::{Debug, Display};
use std::marker::PhantomData;
use std::str::FromStr;

use thiserror::Error;
use tf_provider::value::ValueString;
use tf_provider::{AttributePath, Diagnostics};

use crate::utils::DisplayJoinable;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LocalityError {
    #[error("invalid zone `{0}`: expected a zone such as `fr-par-1`")]
    InvalidZone(String),
    #[error("invalid region `{0}`: expected a region such as `fr-par`")]
    InvalidRegion(String),
    #[error("cannot parse localized id `{id}`: expected `{expected}`")]
    InvalidId { id: String, expected: &'static str },
}

/// Zone or region a Scaleway resource lives in
pub trait Locality: FromStr<Err = LocalityError> + Display + Debug + Clone + Eq {
    /// Kind of locality, used in error messages
    const KIND: &'static str;
    /// Localities known at build time
    const ALL: &'static [&'static str];
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Zone(String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Region(String);

impl Zone {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Region the zone belongs to: `fr-par-1` is in `fr-par`
    pub fn region(&self) -> Region {
        let end = self.0.rfind('-').unwrap_or(self.0.len());
        Region(self.0[..end].to_owned())
    }
}

impl Region {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn contains(&self, zone: &Zone) -> bool {
        zone.region() == *self
    }
}

fn is_lower_alpha(s: &str, len: usize) -> bool {
    s.len() == len && s.bytes().all(|b| b.is_ascii_lowercase())
}

fn is_region_format(s: &str) -> bool {
    matches!(
        s.split_once('-'),
        Some((country, city)) if is_lower_alpha(country, 2) && is_lower_alpha(city, 3)
    )
}

impl FromStr for Zone {
    type Err = LocalityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "par1" => return Ok(Zone("fr-par-1".to_owned())),
            "ams1" => return Ok(Zone("nl-ams-1".to_owned())),
            _ => (),
        }
        let valid = match s.rsplit_once('-') {
            Some((region, number)) => {
                is_region_format(region)
                    && !number.is_empty()
                    && number.bytes().all(|b| b.is_ascii_digit())
            }
            None => false,
        };
        if valid {
            Ok(Zone(s.to_owned()))
        } else {
            Err(LocalityError::InvalidZone(s.to_owned()))
        }
    }
}

impl FromStr for Region {
    type Err = LocalityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "par" => Ok(Region("fr-par".to_owned())),
            "ams" => Ok(Region("nl-ams".to_owned())),
            s if is_region_format(s) => Ok(Region(s.to_owned())),
            s => Err(LocalityError::InvalidRegion(s.to_owned())),
        }
    }
}

impl Display for Zone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Locality for Zone {
    const KIND: &'static str = "zone";
    const ALL: &'static [&'static str] = &[
        "fr-par-1", "fr-par-2", "fr-par-3", "nl-ams-1", "nl-ams-2", "nl-ams-3", "pl-waw-1",
        "pl-waw-2", "pl-waw-3",
    ];
}

impl Locality for Region {
    const KIND: &'static str = "region";
    const ALL: &'static [&'static str] = &["fr-par", "nl-ams", "pl-waw"];
}

/// Report unparsable or unknown localities on `attr_path`
pub fn validate_locality<L: Locality>(
    diags: &mut Diagnostics,
    value: &str,
    attr_path: AttributePath,
) {
    match value.parse::<L>() {
        Ok(locality) => {
            if !L::ALL.contains(&locality.to_string().as_str()) {
                diags.error(
                    format!("Unknown {} `{}`", L::KIND, locality),
                    format!("Expected one of: {}", L::ALL.iter().join_with(", ")),
                    attr_path,
                );
            }
        }
        Err(err) => diags.error(format!("Invalid {}", L::KIND), err.to_string(), attr_path),
    }
}

pub fn validate_zone(diags: &mut Diagnostics, zone: &ValueString<'_>, attr_path: AttributePath) {
    if let Some(zone) = zone.as_deref_option() {
        validate_locality::<Zone>(diags, zone, attr_path);
    }
}

pub fn validate_region(
    diags: &mut Diagnostics,
    region: &ValueString<'_>,
    attr_path: AttributePath,
) {
    if let Some(region) = region.as_deref_option() {
        validate_locality::<Region>(diags, region, attr_path);
    }
}

/// Identifier prefixed with its locality: `fr-par-1/11111111-1111-1111-1111-111111111111`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalizedId<L> {
    pub locality: L,
    pub id: String,
}

/// Identifier of a sub-resource: `fr-par-1/<parent id>/<id>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NestedLocalizedId<L> {
    pub locality: L,
    pub parent_id: String,
    pub id: String,
}

pub type ZonedId = LocalizedId<Zone>;
pub type RegionalId = LocalizedId<Region>;
pub type NestedZonedId = NestedLocalizedId<Zone>;
pub type NestedRegionalId = NestedLocalizedId<Region>;

impl<L: Locality> LocalizedId<L> {
    pub fn new(locality: L, id: impl Into<String>) -> Self {
        Self {
            locality,
            id: id.into(),
        }
    }
}

impl<L: Locality> NestedLocalizedId<L> {
    pub fn new(locality: L, parent_id: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            locality,
            parent_id: parent_id.into(),
            id: id.into(),
        }
    }
}

struct IdFormat<L>(PhantomData<L>);

impl<L: Locality> IdFormat<L> {
    fn expected(nested: bool) -> &'static str {
        match (L::KIND, nested) {
            ("zone", false) => "<zone>/<id>",
            ("zone", true) => "<zone>/<parent id>/<id>",
            (_, false) => "<region>/<id>",
            (_, true) => "<region>/<parent id>/<id>",
        }
    }

    fn split<const N: usize>(id: &str) -> Result<(L, [&str; N]), LocalityError> {
        let err = || LocalityError::InvalidId {
            id: id.to_owned(),
            expected: Self::expected(N > 1),
        };
        let mut parts = id.split('/');
        let locality = parts.next().ok_or_else(err)?.parse::<L>().map_err(|_| err())?;
        let mut segments = [""; N];
        for segment in segments.iter_mut() {
            *segment = parts.next().filter(|s| !s.is_empty()).ok_or_else(err)?;
        }
        if parts.next().is_some() {
            return Err(err());
        }
        Ok((locality, segments))
    }
}

impl<L: Locality> FromStr for LocalizedId<L> {
    type Err = LocalityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (locality, [id]) = IdFormat::<L>::split::<1>(s)?;
        Ok(Self::new(locality, id))
    }
}

impl<L: Locality> FromStr for NestedLocalizedId<L> {
    type Err = LocalityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (locality, [parent_id, id]) = IdFormat::<L>::split::<2>(s)?;
        Ok(Self::new(locality, parent_id, id))
    }
}

impl<L: Display> Display for LocalizedId<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.locality, self.id)
    }
}

impl<L: Display> Display for NestedLocalizedId<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.locality, self.parent_id, self.id)
    }
}

/// Strip the locality prefix from an identifier, if any.
///
/// References between resources may be given either as bare ids or as localized ids.
pub fn expand_id(id: &str) -> &str {
    id.rsplit('/').next().unwrap_or(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zone_region() {
        let zone: Zone = "nl-ams-3".parse().unwrap();
        assert_eq!(zone.region().as_str(), "nl-ams");
        assert!(Region::from_str("nl-ams").unwrap().contains(&zone));
        assert!(!Region::from_str("fr-par").unwrap().contains(&zone));
    }

    #[test]
    fn legacy_aliases() {
        assert_eq!(Zone::from_str("par1").unwrap().as_str(), "fr-par-1");
        assert_eq!(Zone::from_str("ams1").unwrap().as_str(), "nl-ams-1");
        assert_eq!(Region::from_str("par").unwrap().as_str(), "fr-par");
    }

    #[test]
    fn invalid_localities() {
        for zone in ["", "fr-par", "fr-par-", "FR-PAR-1", "fr-pa-1", "fr-par-x"] {
            assert!(zone.parse::<Zone>().is_err(), "{zone} should be rejected");
        }
        for region in ["", "fr-par-1", "fr", "frpar"] {
            assert!(region.parse::<Region>().is_err(), "{region} should be rejected");
        }
    }

    #[test]
    fn zoned_id() {
        let id: ZonedId = "fr-par-2/abc".parse().unwrap();
        assert_eq!(id.locality.as_str(), "fr-par-2");
        assert_eq!(id.id, "abc");
        assert_eq!(id.to_string(), "fr-par-2/abc");
    }

    #[test]
    fn regional_id_rejects_zone() {
        let err = "fr-par-1/abc".parse::<RegionalId>().unwrap_err();
        assert_eq!(
            err,
            LocalityError::InvalidId {
                id: "fr-par-1/abc".to_owned(),
                expected: "<region>/<id>",
            }
        );
    }

    #[test]
    fn nested_id() {
        let id: NestedZonedId = "fr-par-1/server/nic".parse().unwrap();
        assert_eq!(id.parent_id, "server");
        assert_eq!(id.id, "nic");
        assert_eq!(id.to_string(), "fr-par-1/server/nic");

        let id: NestedRegionalId = "pl-waw/instance/my_db".parse().unwrap();
        assert_eq!(id.locality.as_str(), "pl-waw");
        assert_eq!(id.id, "my_db");
    }

    #[test]
    fn wrong_segment_count() {
        assert!("fr-par-1/abc".parse::<NestedZonedId>().is_err());
        assert!("fr-par-1/a/b".parse::<ZonedId>().is_err());
        assert!("fr-par-1/".parse::<ZonedId>().is_err());
        assert!("fr-par-1//nic".parse::<NestedZonedId>().is_err());
        assert!("abc".parse::<ZonedId>().is_err());
    }

    #[test]
    fn expand() {
        assert_eq!(expand_id("fr-par-1/abc"), "abc");
        assert_eq!(expand_id("abc"), "abc");
        assert_eq!(expand_id("fr-par/parent/child"), "child");
    }

    #[test]
    fn validate_unknown_zone() {
        let mut diags = Diagnostics::default();
        validate_locality::<Zone>(&mut diags, "fr-par-1", AttributePath::new("zone"));
        assert!(diags.errors.is_empty());

        validate_locality::<Zone>(&mut diags, "xx-yyy-9", AttributePath::new("zone"));
        assert_eq!(diags.errors.len(), 1);

        validate_locality::<Region>(&mut diags, "nope", AttributePath::new("region"));
        assert_eq!(diags.errors.len(), 2);
    }
}
