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

//! Credentials and defaults resolution.
//!
//! Every setting is looked up, in order, in the provider block, the `SCW_*` environment
//! variables, the active profile of the `scw` configuration file, and built-in defaults.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::client::DEFAULT_API_URL;
use crate::locality::{Region, Zone};

const DEFAULT_ZONE: &str = "fr-par-1";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no secret key configured: set `secret_key` in the provider block or SCW_SECRET_KEY")]
    MissingSecretKey,
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
    #[error("profile `{0}` not found in the Scaleway configuration file")]
    UnknownProfile(String),
    #[error("cannot read Scaleway configuration file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot parse Scaleway configuration file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
}

/// Settings from a single source, any of which may be missing
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    #[serde(alias = "default_project_id")]
    pub project_id: Option<String>,
    #[serde(alias = "default_organization_id")]
    pub organization_id: Option<String>,
    #[serde(alias = "default_region")]
    pub region: Option<String>,
    #[serde(alias = "default_zone")]
    pub zone: Option<String>,
    pub api_url: Option<String>,
}

impl Profile {
    /// Fill the settings missing from `self` with those of `fallback`
    pub fn or(self, fallback: Profile) -> Profile {
        Profile {
            access_key: self.access_key.or(fallback.access_key),
            secret_key: self.secret_key.or(fallback.secret_key),
            project_id: self.project_id.or(fallback.project_id),
            organization_id: self.organization_id.or(fallback.organization_id),
            region: self.region.or(fallback.region),
            zone: self.zone.or(fallback.zone),
            api_url: self.api_url.or(fallback.api_url),
        }
    }

    /// Settings read from `SCW_*` environment variables
    pub fn from_env(env: impl Fn(&str) -> Option<String>) -> Profile {
        let var = |name: &str| env(name).filter(|value| !value.is_empty());
        Profile {
            access_key: var("SCW_ACCESS_KEY"),
            secret_key: var("SCW_SECRET_KEY"),
            project_id: var("SCW_DEFAULT_PROJECT_ID"),
            organization_id: var("SCW_DEFAULT_ORGANIZATION_ID"),
            region: var("SCW_DEFAULT_REGION"),
            zone: var("SCW_DEFAULT_ZONE"),
            api_url: var("SCW_API_URL"),
        }
    }
}

/// `scw` CLI configuration file
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    #[serde(flatten)]
    pub default: Profile,
    pub active_profile: Option<String>,
    pub profiles: BTreeMap<String, Profile>,
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Option<ConfigFile>, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_owned(),
                    source,
                })
            }
        };
        if content.trim().is_empty() {
            return Ok(Some(ConfigFile::default()));
        }
        serde_yaml::from_str(&content)
            .map(Some)
            .map_err(|source| ConfigError::Parse {
                path: path.to_owned(),
                source,
            })
    }

    /// Settings of the selected profile, falling back to the top-level settings
    pub fn profile(&self, name: Option<&str>) -> Result<Profile, ConfigError> {
        match name.or(self.active_profile.as_deref()) {
            Some(name) => match self.profiles.get(name) {
                Some(profile) => Ok(profile.clone().or(self.default.clone())),
                None => Err(ConfigError::UnknownProfile(name.to_owned())),
            },
            None => Ok(self.default.clone()),
        }
    }
}

/// Location of the `scw` configuration file
pub fn config_path(env: impl Fn(&str) -> Option<String>) -> Option<PathBuf> {
    if let Some(path) = env("SCW_CONFIG_PATH").filter(|p| !p.is_empty()) {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|dir| dir.join("scw").join("config.yaml"))
}

/// Fully resolved provider settings
#[derive(Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub access_key: Option<String>,
    pub secret_key: String,
    pub project_id: Option<String>,
    pub organization_id: Option<String>,
    pub region: Region,
    pub zone: Zone,
    pub api_url: String,
}

impl std::fmt::Debug for ResolvedConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedConfig")
            .field("access_key", &self.access_key)
            .field("secret_key", &"[REDACTED]")
            .field("project_id", &self.project_id)
            .field("organization_id", &self.organization_id)
            .field("region", &self.region)
            .field("zone", &self.zone)
            .field("api_url", &self.api_url)
            .finish()
    }
}

/// Resolve the provider settings from the provider block, the environment and the config file
pub fn resolve(
    block: Profile,
    profile_name: Option<&str>,
    env: impl Fn(&str) -> Option<String> + Copy,
) -> Result<ResolvedConfig, ConfigError> {
    let profile_name = profile_name
        .map(str::to_owned)
        .or_else(|| env("SCW_PROFILE").filter(|p| !p.is_empty()));

    let file = match config_path(env) {
        Some(path) => ConfigFile::load(&path)?,
        None => None,
    };
    let from_file = match (file, profile_name.as_deref()) {
        (Some(file), name) => file.profile(name)?,
        (None, Some(name)) => return Err(ConfigError::UnknownProfile(name.to_owned())),
        (None, None) => Profile::default(),
    };

    finalize(block.or(Profile::from_env(env)).or(from_file))
}

/// Validate the merged settings and apply defaults
pub fn finalize(profile: Profile) -> Result<ResolvedConfig, ConfigError> {
    let secret_key = profile.secret_key.ok_or(ConfigError::MissingSecretKey)?;
    validate_uuid("secret_key", &secret_key)?;
    if let Some(access_key) = &profile.access_key {
        validate_access_key(access_key)?;
    }
    if let Some(project_id) = &profile.project_id {
        validate_uuid("project_id", project_id)?;
    }
    if let Some(organization_id) = &profile.organization_id {
        validate_uuid("organization_id", organization_id)?;
    }

    let parse_zone = |zone: &str| {
        zone.parse::<Zone>().map_err(|err| ConfigError::Invalid {
            field: "zone",
            reason: err.to_string(),
        })
    };
    let region = profile
        .region
        .as_deref()
        .map(|region| {
            region.parse::<Region>().map_err(|err| ConfigError::Invalid {
                field: "region",
                reason: err.to_string(),
            })
        })
        .transpose()?;
    let zone = profile.zone.as_deref().map(parse_zone).transpose()?;

    let (region, zone) = match (region, zone) {
        (Some(region), Some(zone)) => {
            if !region.contains(&zone) {
                return Err(ConfigError::Invalid {
                    field: "zone",
                    reason: format!("zone `{zone}` is not in region `{region}`"),
                });
            }
            (region, zone)
        }
        (None, Some(zone)) => (zone.region(), zone),
        (Some(region), None) => {
            let zone = parse_zone(&format!("{region}-1"))?;
            (region, zone)
        }
        (None, None) => {
            let zone = parse_zone(DEFAULT_ZONE)?;
            (zone.region(), zone)
        }
    };

    Ok(ResolvedConfig {
        access_key: profile.access_key,
        secret_key,
        project_id: profile.project_id,
        organization_id: profile.organization_id,
        region,
        zone,
        api_url: profile.api_url.unwrap_or_else(|| DEFAULT_API_URL.to_owned()),
    })
}

pub fn validate_uuid(field: &'static str, value: &str) -> Result<(), ConfigError> {
    uuid::Uuid::parse_str(value)
        .map(|_| ())
        .map_err(|err| ConfigError::Invalid {
            field,
            reason: format!("`{value}` is not a UUID: {err}"),
        })
}

pub fn validate_access_key(value: &str) -> Result<(), ConfigError> {
    if value.len() == 20
        && value.starts_with("SCW")
        && value.bytes().all(|b| b.is_ascii_alphanumeric())
    {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field: "access_key",
            reason: "expected `SCW` followed by 17 alphanumeric characters".to_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use super::*;

    const SECRET: &str = "11111111-1111-1111-1111-111111111111";
    const PROJECT: &str = "22222222-2222-2222-2222-222222222222";

    fn with_secret(profile: Profile) -> Profile {
        Profile {
            secret_key: Some(SECRET.to_owned()),
            ..profile
        }
    }

    #[test]
    fn defaults() {
        let config = finalize(with_secret(Profile::default())).unwrap();
        assert_eq!(config.zone.as_str(), "fr-par-1");
        assert_eq!(config.region.as_str(), "fr-par");
        assert_eq!(config.api_url, DEFAULT_API_URL);
    }

    #[test]
    fn region_from_zone() {
        let config = finalize(with_secret(Profile {
            zone: Some("nl-ams-2".to_owned()),
            ..Default::default()
        }))
        .unwrap();
        assert_eq!(config.region.as_str(), "nl-ams");
    }

    #[test]
    fn zone_from_region() {
        let config = finalize(with_secret(Profile {
            region: Some("pl-waw".to_owned()),
            ..Default::default()
        }))
        .unwrap();
        assert_eq!(config.zone.as_str(), "pl-waw-1");
    }

    #[test]
    fn zone_outside_region() {
        let err = finalize(with_secret(Profile {
            region: Some("fr-par".to_owned()),
            zone: Some("nl-ams-1".to_owned()),
            ..Default::default()
        }))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "zone", .. }));
    }

    #[test]
    fn secret_key_required() {
        assert!(matches!(
            finalize(Profile::default()),
            Err(ConfigError::MissingSecretKey)
        ));
        assert!(matches!(
            finalize(Profile {
                secret_key: Some("not-a-uuid".to_owned()),
                ..Default::default()
            }),
            Err(ConfigError::Invalid { field: "secret_key", .. })
        ));
    }

    #[test]
    fn access_key_format() {
        assert!(validate_access_key("SCWXXXXXXXXXXXXXXXXX").is_ok());
        assert!(validate_access_key("SCW123").is_err());
        assert!(validate_access_key("ABCXXXXXXXXXXXXXXXXX").is_err());
    }

    #[test]
    fn precedence() {
        let env: HashMap<&str, &str> = [
            ("SCW_SECRET_KEY", SECRET),
            ("SCW_DEFAULT_ZONE", "nl-ams-1"),
            ("SCW_DEFAULT_PROJECT_ID", PROJECT),
        ]
        .into_iter()
        .collect();
        let block = Profile {
            zone: Some("fr-par-2".to_owned()),
            ..Default::default()
        };
        let merged = block.or(Profile::from_env(|name| env.get(name).map(|v| v.to_string())));
        let config = finalize(merged).unwrap();
        assert_eq!(config.zone.as_str(), "fr-par-2");
        assert_eq!(config.project_id.as_deref(), Some(PROJECT));
    }

    #[test]
    fn config_file_profiles() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "secret_key: {SECRET}\ndefault_zone: fr-par-1\nactive_profile: prod\nprofiles:\n  prod:\n    default_zone: nl-ams-1\n  dev:\n    default_project_id: {PROJECT}\n"
        )
        .unwrap();

        let config = ConfigFile::load(file.path()).unwrap().unwrap();

        let active = config.profile(None).unwrap();
        assert_eq!(active.zone.as_deref(), Some("nl-ams-1"));
        assert_eq!(active.secret_key.as_deref(), Some(SECRET));

        let dev = config.profile(Some("dev")).unwrap();
        assert_eq!(dev.zone.as_deref(), Some("fr-par-1"));
        assert_eq!(dev.project_id.as_deref(), Some(PROJECT));

        assert!(matches!(
            config.profile(Some("missing")),
            Err(ConfigError::UnknownProfile(_))
        ));
    }

    #[test]
    fn missing_config_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ConfigFile::load(&dir.path().join("config.yaml"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn resolve_reads_config_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "secret_key: {SECRET}\ndefault_region: nl-ams").unwrap();
        let path = file.path().to_string_lossy().into_owned();
        let env = |name: &str| (name == "SCW_CONFIG_PATH").then(|| path.clone());

        let config = resolve(Profile::default(), None, &env).unwrap();
        assert_eq!(config.zone.as_str(), "nl-ams-1");

        assert!(matches!(
            resolve(Profile::default(), Some("prod"), &env),
            Err(ConfigError::UnknownProfile(_))
        ));
    }

    #[test]
    fn debug_redacts_secret() {
        let config = finalize(with_secret(Profile::default())).unwrap();
        assert!(!format!("{config:?}").contains(SECRET));
    }
}
