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

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tf_provider::value::{Value, ValueList, ValueNumber, ValueString};
use tf_provider::{
    map, AttributePath, AttributeType, Block, Description, Diagnostics, NestedBlock, Schema,
};

use crate::adapter::{IdKind, ReplaceTriggers, ScalewayResource};
use crate::client::NotFoundExt;
use crate::expand::{
    expand_bool, expand_number, expand_string, expand_strings, flatten_bool, flatten_number,
    flatten_optional_string, flatten_string, flatten_tags, parse_id, unknown_if_null,
};
use crate::locality::{validate_zone, Zone, ZonedId};
use crate::meta::Meta;
use crate::schema;
use crate::utils::{impl_with_id, random_name, WithSchema, WithValidate};

use super::api::{
    CreateSecurityGroupRequest, InstanceApi, SecurityGroup, SecurityGroupRule,
    UpdateSecurityGroupRequest,
};

const POLICIES: &[&str] = &["accept", "drop"];
const PROTOCOLS: &[&str] = &["TCP", "UDP", "ICMP", "ANY"];
const DEFAULT_IP_RANGE: &str = "0.0.0.0/0";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleBlock<'a> {
    pub action: ValueString<'a>,
    pub protocol: ValueString<'a>,
    pub port: ValueNumber,
    pub port_range: ValueString<'a>,
    pub ip_range: ValueString<'a>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecurityGroupState<'a> {
    pub id: ValueString<'a>,
    pub zone: ValueString<'a>,
    pub project_id: ValueString<'a>,
    pub organization_id: ValueString<'a>,
    pub name: ValueString<'a>,
    pub description: ValueString<'a>,
    pub stateful: Value<bool>,
    pub inbound_default_policy: ValueString<'a>,
    pub outbound_default_policy: ValueString<'a>,
    pub tags: ValueList<ValueString<'a>>,
    pub inbound_rule: ValueList<Value<RuleBlock<'a>>>,
    pub outbound_rule: ValueList<Value<RuleBlock<'a>>>,
}

impl_with_id!(SecurityGroupState);

fn rule_block() -> Block {
    Block {
        version: 1,
        description: Description::plain("Security group rule"),
        attributes: map! {
            "action" => schema::required(AttributeType::String, "`accept` or `drop`"),
            "protocol" => schema::optional_computed(AttributeType::String, "`TCP`, `UDP`, `ICMP` or `ANY`, defaults to `TCP`"),
            "port" => schema::optional(AttributeType::Number, "Single destination port"),
            "port_range" => schema::optional(AttributeType::String, "Destination port range, as `<from>-<to>`"),
            "ip_range" => schema::optional_computed(AttributeType::String, "Source or destination range, defaults to `0.0.0.0/0`"),
        },
        ..Default::default()
    }
}

impl<'a> WithSchema for SecurityGroupState<'a> {
    fn schema() -> Schema {
        Schema {
            version: 1,
            block: Block {
                version: 1,
                description: Description::plain("Scaleway Instance security group"),
                attributes: map! {
                    "id" => schema::id("Zoned id of the security group"),
                    "zone" => schema::zone(),
                    "project_id" => schema::project_id(),
                    "organization_id" => schema::organization_id(),
                    "name" => schema::optional_computed(AttributeType::String, "Name of the security group"),
                    "description" => schema::optional(AttributeType::String, "Description of the security group"),
                    "stateful" => schema::optional_computed(AttributeType::Bool, "Whether the security group is stateful, defaults to `true`"),
                    "inbound_default_policy" => schema::optional_computed(AttributeType::String, "Default inbound policy, defaults to `accept`"),
                    "outbound_default_policy" => schema::optional_computed(AttributeType::String, "Default outbound policy, defaults to `accept`"),
                    "tags" => schema::tags(),
                },
                blocks: map! {
                    "inbound_rule" => NestedBlock::List(rule_block()),
                    "outbound_rule" => NestedBlock::List(rule_block()),
                },
                ..Default::default()
            },
        }
    }
}

fn validate_one_of(
    diags: &mut Diagnostics,
    what: &str,
    value: &ValueString<'_>,
    allowed: &[&str],
    attr_path: AttributePath,
) {
    if let Some(value) = value.as_deref_option() {
        if !allowed.contains(&value) {
            diags.error(
                format!("Invalid {what}"),
                format!("`{value}` is not one of {}", allowed.join(", ")),
                attr_path,
            );
        }
    }
}

impl<'a> WithValidate for RuleBlock<'a> {
    fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        validate_one_of(
            diags,
            "rule action",
            &self.action,
            POLICIES,
            attr_path.clone().attribute("action"),
        );
        validate_one_of(
            diags,
            "rule protocol",
            &self.protocol,
            PROTOCOLS,
            attr_path.clone().attribute("protocol"),
        );
        if self.port.as_ref_option().is_some() && self.port_range.as_ref_option().is_some() {
            diags.error_short(
                "`port` and `port_range` are mutually exclusive",
                attr_path.clone().attribute("port_range"),
            );
        }
        if let Some(range) = self.port_range.as_deref_option() {
            if let Err(err) = parse_port_range(range) {
                diags.error(
                    "Invalid port range",
                    format!("{err:#}"),
                    attr_path.attribute("port_range"),
                );
            }
        }
    }
}

impl<'a> WithValidate for SecurityGroupState<'a> {
    fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        validate_zone(diags, &self.zone, attr_path.clone().attribute("zone"));
        validate_one_of(
            diags,
            "inbound default policy",
            &self.inbound_default_policy,
            POLICIES,
            attr_path.clone().attribute("inbound_default_policy"),
        );
        validate_one_of(
            diags,
            "outbound default policy",
            &self.outbound_default_policy,
            POLICIES,
            attr_path.clone().attribute("outbound_default_policy"),
        );
        for (name, rules) in [
            ("inbound_rule", &self.inbound_rule),
            ("outbound_rule", &self.outbound_rule),
        ] {
            for (i, rule) in rules.iter().flatten().enumerate() {
                if let Value::Value(rule) = rule {
                    rule.validate(diags, attr_path.clone().attribute(name).index(i as i64));
                }
            }
        }
    }
}

fn parse_port_range(range: &str) -> Result<(u32, u32)> {
    let (from, to) = range
        .split_once('-')
        .ok_or_else(|| anyhow!("expected `<from>-<to>`, got `{range}`"))?;
    let from: u32 = from.trim().parse().context("invalid start port")?;
    let to: u32 = to.trim().parse().context("invalid end port")?;
    if from == 0 || to > 65535 || from > to {
        return Err(anyhow!("`{range}` is not a valid port range"));
    }
    Ok((from, to))
}

/// API rules for the rule blocks of one direction
fn expand_rules(
    direction: &str,
    rules: &ValueList<Value<RuleBlock<'_>>>,
    position: &mut u32,
) -> Result<Vec<SecurityGroupRule>> {
    let mut expanded = Vec::new();
    for rule in rules.iter().flatten() {
        let Value::Value(rule) = rule else {
            continue;
        };
        let (dest_port_from, dest_port_to) = match (
            expand_number(&rule.port),
            rule.port_range.as_deref_option(),
        ) {
            (Some(port), _) => (Some(u32::try_from(port).context("invalid port")?), None),
            (None, Some(range)) => {
                let (from, to) = parse_port_range(range)?;
                (Some(from), Some(to))
            }
            (None, None) => (None, None),
        };
        *position += 1;
        expanded.push(SecurityGroupRule {
            protocol: expand_string(&rule.protocol).unwrap_or_else(|| "TCP".to_owned()),
            direction: direction.to_owned(),
            action: expand_string(&rule.action).context("rule `action` is required")?,
            ip_range: expand_string(&rule.ip_range).unwrap_or_else(|| DEFAULT_IP_RANGE.to_owned()),
            dest_port_from,
            dest_port_to,
            position: *position,
            ..Default::default()
        });
    }
    Ok(expanded)
}

fn flatten_rule<'a>(rule: &SecurityGroupRule) -> Value<RuleBlock<'a>> {
    let (port, port_range) = match (rule.dest_port_from, rule.dest_port_to) {
        (Some(from), Some(to)) if from != to => (Value::Null, flatten_string(format!("{from}-{to}"))),
        (Some(port), _) => (flatten_number(port), Value::Null),
        _ => (Value::Null, Value::Null),
    };
    Value::Value(RuleBlock {
        action: flatten_string(rule.action.as_str()),
        protocol: flatten_string(rule.protocol.as_str()),
        port,
        port_range,
        ip_range: flatten_string(rule.ip_range.as_str()),
    })
}

/// Rule blocks of one direction, skipping the rules managed by Scaleway
fn flatten_rules<'a>(
    direction: &str,
    rules: &[SecurityGroupRule],
) -> ValueList<Value<RuleBlock<'a>>> {
    let mut rules = rules
        .iter()
        .filter(|rule| rule.editable && rule.direction == direction)
        .collect::<Vec<_>>();
    rules.sort_by_key(|rule| rule.position);
    Value::Value(rules.into_iter().map(flatten_rule).collect())
}

fn flatten_security_group<'a>(
    state: SecurityGroupState<'a>,
    zone: &Zone,
    security_group: SecurityGroup,
    rules: &[SecurityGroupRule],
) -> SecurityGroupState<'a> {
    SecurityGroupState {
        id: flatten_string(ZonedId::new(zone.clone(), &security_group.id).to_string()),
        zone: flatten_string(zone.to_string()),
        project_id: flatten_string(security_group.project),
        organization_id: flatten_string(security_group.organization),
        name: flatten_string(security_group.name),
        description: flatten_optional_string(Some(security_group.description)),
        stateful: flatten_bool(security_group.stateful),
        inbound_default_policy: flatten_string(security_group.inbound_default_policy),
        outbound_default_policy: flatten_string(security_group.outbound_default_policy),
        tags: flatten_tags(&state.tags, security_group.tags),
        inbound_rule: flatten_rules("inbound", rules),
        outbound_rule: flatten_rules("outbound", rules),
    }
}

async fn set_rules(api: &InstanceApi<'_>, id: &str, state: &SecurityGroupState<'_>) -> Result<()> {
    let mut position = 0;
    let mut rules = expand_rules("inbound", &state.inbound_rule, &mut position)?;
    rules.extend(expand_rules("outbound", &state.outbound_rule, &mut position)?);
    api.set_security_group_rules(id, &rules)
        .await
        .context("cannot set security group rules")
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SecurityGroupResource;

#[async_trait]
impl ScalewayResource for SecurityGroupResource {
    type State<'a> = SecurityGroupState<'a>;

    const NAME: &'static str = "instance_security_group";
    const ID_KIND: IdKind = IdKind::Zoned;

    fn plan_create<'a>(&self, meta: &Meta, state: &mut SecurityGroupState<'a>) -> Result<()> {
        state.zone = flatten_string(meta.zone(&state.zone)?.to_string());
        state.project_id = meta.plan_project_id(&state.project_id);
        state.organization_id = Value::Unknown;
        unknown_if_null(&mut state.name);
        if state.stateful.is_null() {
            state.stateful = flatten_bool(true);
        }
        for policy in [
            &mut state.inbound_default_policy,
            &mut state.outbound_default_policy,
        ] {
            if policy.is_null() {
                *policy = flatten_string("accept");
            }
        }
        for rules in [&mut state.inbound_rule, &mut state.outbound_rule] {
            if rules.is_null() {
                *rules = Value::Value(Vec::new());
            }
            for rule in rules.as_mut_option().into_iter().flatten() {
                if let Value::Value(rule) = rule {
                    if rule.protocol.is_null() {
                        rule.protocol = flatten_string("TCP");
                    }
                    if rule.ip_range.is_null() {
                        rule.ip_range = flatten_string(DEFAULT_IP_RANGE);
                    }
                }
            }
        }
        Ok(())
    }

    fn plan_update<'a>(
        &self,
        prior: &SecurityGroupState<'a>,
        proposed: &mut SecurityGroupState<'a>,
    ) -> Vec<AttributePath> {
        ReplaceTriggers::new()
            .check("zone", &prior.zone, &proposed.zone)
            .check("project_id", &prior.project_id, &proposed.project_id)
            .build()
    }

    async fn create<'a>(
        &self,
        meta: &Meta,
        planned: SecurityGroupState<'a>,
    ) -> Result<SecurityGroupState<'a>> {
        let zone = meta.zone(&planned.zone)?;
        let api = InstanceApi::new(&meta.client, &zone);

        let security_group = api
            .create_security_group(&CreateSecurityGroupRequest {
                name: expand_string(&planned.name).unwrap_or_else(|| random_name("sg")),
                description: expand_string(&planned.description).unwrap_or_default(),
                project: meta.project_id(&planned.project_id),
                stateful: expand_bool(&planned.stateful).unwrap_or(true),
                inbound_default_policy: expand_string(&planned.inbound_default_policy)
                    .unwrap_or_else(|| "accept".to_owned()),
                outbound_default_policy: expand_string(&planned.outbound_default_policy)
                    .unwrap_or_else(|| "accept".to_owned()),
                tags: expand_strings(&planned.tags).unwrap_or_default(),
            })
            .await
            .context("cannot create security group")?;

        set_rules(&api, &security_group.id, &planned).await?;
        let rules = api.list_security_group_rules(&security_group.id).await?;
        Ok(flatten_security_group(planned, &zone, security_group, &rules))
    }

    async fn read<'a>(
        &self,
        meta: &Meta,
        state: SecurityGroupState<'a>,
    ) -> Result<Option<SecurityGroupState<'a>>> {
        let id: ZonedId = parse_id(&state.id)?;
        let api = InstanceApi::new(&meta.client, &id.locality);

        let Some(security_group) = api.get_security_group(&id.id).await.found()? else {
            return Ok(None);
        };
        let rules = api.list_security_group_rules(&id.id).await?;
        Ok(Some(flatten_security_group(
            state,
            &id.locality,
            security_group,
            &rules,
        )))
    }

    async fn update<'a>(
        &self,
        meta: &Meta,
        prior: SecurityGroupState<'a>,
        planned: SecurityGroupState<'a>,
    ) -> Result<SecurityGroupState<'a>> {
        let id: ZonedId = parse_id(&prior.id)?;
        let api = InstanceApi::new(&meta.client, &id.locality);

        let changed = |prior: &ValueString, planned: &ValueString| {
            (prior != planned).then(|| expand_string(planned)).flatten()
        };
        let security_group = api
            .update_security_group(
                &id.id,
                &UpdateSecurityGroupRequest {
                    name: changed(&prior.name, &planned.name),
                    description: (prior.description != planned.description)
                        .then(|| expand_string(&planned.description).unwrap_or_default()),
                    stateful: (prior.stateful != planned.stateful)
                        .then(|| expand_bool(&planned.stateful))
                        .flatten(),
                    inbound_default_policy: changed(
                        &prior.inbound_default_policy,
                        &planned.inbound_default_policy,
                    ),
                    outbound_default_policy: changed(
                        &prior.outbound_default_policy,
                        &planned.outbound_default_policy,
                    ),
                    tags: (prior.tags != planned.tags)
                        .then(|| expand_strings(&planned.tags).unwrap_or_default()),
                },
            )
            .await
            .context("cannot update security group")?;

        if prior.inbound_rule != planned.inbound_rule
            || prior.outbound_rule != planned.outbound_rule
        {
            set_rules(&api, &id.id, &planned).await?;
        }
        let rules = api.list_security_group_rules(&id.id).await?;
        Ok(flatten_security_group(
            planned,
            &id.locality,
            security_group,
            &rules,
        ))
    }

    async fn delete<'a>(&self, meta: &Meta, state: SecurityGroupState<'a>) -> Result<()> {
        let id: ZonedId = parse_id(&state.id)?;
        let api = InstanceApi::new(&meta.client, &id.locality);

        api.delete_security_group(&id.id)
            .await
            .found()
            .context("cannot delete security group")?;
        Ok(())
    }
}
