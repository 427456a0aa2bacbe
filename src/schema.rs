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

use tf_provider::{Attribute, AttributeConstraint, AttributeType, Description};

pub(crate) fn attribute(
    attr_type: AttributeType,
    constraint: AttributeConstraint,
    description: &str,
) -> Attribute {
    Attribute {
        attr_type,
        description: Description::plain(description),
        constraint,
        ..Default::default()
    }
}

pub(crate) fn required(attr_type: AttributeType, description: &str) -> Attribute {
    attribute(attr_type, AttributeConstraint::Required, description)
}

pub(crate) fn optional(attr_type: AttributeType, description: &str) -> Attribute {
    attribute(attr_type, AttributeConstraint::Optional, description)
}

pub(crate) fn optional_computed(attr_type: AttributeType, description: &str) -> Attribute {
    attribute(attr_type, AttributeConstraint::OptionalComputed, description)
}

pub(crate) fn computed(attr_type: AttributeType, description: &str) -> Attribute {
    attribute(attr_type, AttributeConstraint::Computed, description)
}

pub(crate) fn sensitive(attribute: Attribute) -> Attribute {
    Attribute {
        sensitive: true,
        ..attribute
    }
}

pub(crate) fn id(description: &str) -> Attribute {
    computed(AttributeType::String, description)
}

pub(crate) fn zone() -> Attribute {
    optional_computed(
        AttributeType::String,
        "Zone of the resource, defaults to the provider zone",
    )
}

pub(crate) fn region() -> Attribute {
    optional_computed(
        AttributeType::String,
        "Region of the resource, defaults to the provider region",
    )
}

pub(crate) fn project_id() -> Attribute {
    optional_computed(
        AttributeType::String,
        "Project owning the resource, defaults to the provider project",
    )
}

pub(crate) fn organization_id() -> Attribute {
    computed(AttributeType::String, "Organization owning the resource")
}

pub(crate) fn tags() -> Attribute {
    optional(
        AttributeType::List(AttributeType::String.into()),
        "Tags associated with the resource",
    )
}

pub(crate) fn timestamp(description: &str) -> Attribute {
    computed(AttributeType::String, description)
}
