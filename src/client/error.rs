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

use serde::Deserialize;
use thiserror::Error;

/// Errors returned by the Scaleway API client.
///
/// Error messages never contain the secret key.
#[derive(Debug, Error)]
pub enum ScalewayError {
    /// Resource does not exist (or is not visible with the current credentials)
    #[error("{resource} `{resource_id}` not found")]
    NotFound {
        resource: String,
        resource_id: String,
    },

    /// Credentials rejected or lacking permissions
    #[error("authentication failed ({status}): {message}")]
    Auth { status: u16, message: String },

    /// Resource is in a transient state and cannot accept the request yet
    #[error("{resource} `{resource_id}` is in transient state `{current_state}`")]
    TransientState {
        resource: String,
        resource_id: String,
        current_state: String,
    },

    #[error("precondition failed: {message}")]
    PreconditionFailed { message: String },

    #[error("quotas exceeded: {message}")]
    QuotasExceeded { message: String },

    /// Request rejected because of invalid fields
    #[error("invalid arguments: {}", .fields.iter().map(|f| format!("{} ({})", f.argument_name, f.reason)).collect::<Vec<_>>().join(", "))]
    InvalidArguments { fields: Vec<InvalidField> },

    #[error("rate limited by the Scaleway API")]
    RateLimited,

    /// Any other API error response
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Network-level error (connection failed, timeout, etc.)
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Response body does not match the expected schema
    #[error("cannot decode response: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InvalidField {
    #[serde(default)]
    pub argument_name: String,
    #[serde(default)]
    pub reason: String,
}

/// Error body sent back by Scaleway APIs
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default, rename = "type")]
    kind: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    resource: String,
    #[serde(default)]
    resource_id: String,
    #[serde(default)]
    current_state: String,
    #[serde(default)]
    details: Vec<InvalidField>,
    #[serde(default)]
    fields: Option<serde_json::Map<String, serde_json::Value>>,
}

impl ScalewayError {
    /// Classify an error response from its status code and body
    pub fn from_response(status: u16, body: &str) -> Self {
        let body: ErrorBody = serde_json::from_str(body).unwrap_or_else(|_| ErrorBody {
            message: body.trim().to_owned(),
            ..Default::default()
        });

        match (status, body.kind.as_str()) {
            (404, _) | (_, "not_found") => ScalewayError::NotFound {
                resource: non_empty(body.resource, "resource"),
                resource_id: body.resource_id,
            },
            (401 | 403, _) | (_, "denied_authentication" | "permissions_denied") => {
                ScalewayError::Auth {
                    status,
                    message: non_empty(body.message, "access denied"),
                }
            }
            (_, "transient_state") => ScalewayError::TransientState {
                resource: non_empty(body.resource, "resource"),
                resource_id: body.resource_id,
                current_state: body.current_state,
            },
            (_, "precondition_failed") => ScalewayError::PreconditionFailed {
                message: body.message,
            },
            (_, "quotas_exceeded") => ScalewayError::QuotasExceeded {
                message: body.message,
            },
            (_, "invalid_arguments") => ScalewayError::InvalidArguments {
                fields: if body.details.is_empty() {
                    invalid_fields(body.fields)
                } else {
                    body.details
                },
            },
            (429, _) => ScalewayError::RateLimited,
            _ => ScalewayError::Api {
                status,
                message: non_empty(body.message, "unknown error"),
            },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ScalewayError::NotFound { .. })
    }

    /// Errors worth retrying after a delay
    pub fn is_retryable(&self) -> bool {
        match self {
            ScalewayError::TransientState { .. } | ScalewayError::RateLimited => true,
            ScalewayError::Api { status, .. } => matches!(status, 500 | 502 | 503 | 504),
            ScalewayError::Network(err) => err.is_timeout() || err.is_connect(),
            _ => false,
        }
    }
}

fn non_empty(value: String, default: &str) -> String {
    if value.is_empty() {
        default.to_owned()
    } else {
        value
    }
}

/// Older APIs report invalid fields as `{"fields": {"name": ["reason"]}}`
fn invalid_fields(fields: Option<serde_json::Map<String, serde_json::Value>>) -> Vec<InvalidField> {
    fields
        .into_iter()
        .flatten()
        .map(|(argument_name, reasons)| InvalidField {
            argument_name,
            reason: match reasons {
                serde_json::Value::Array(reasons) => reasons
                    .iter()
                    .filter_map(|r| r.as_str())
                    .collect::<Vec<_>>()
                    .join("; "),
                other => other.to_string(),
            },
        })
        .collect()
}

/// Turn not-found errors into `None`, to detect resources deleted outside of Terraform
pub trait NotFoundExt<T> {
    fn found(self) -> Result<Option<T>, ScalewayError>;
}

impl<T> NotFoundExt<T> for Result<T, ScalewayError> {
    fn found(self) -> Result<Option<T>, ScalewayError> {
        match self {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found() {
        let err = ScalewayError::from_response(
            404,
            r#"{"message":"resource is not found","resource":"instance_server","resource_id":"abc","type":"not_found"}"#,
        );
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "instance_server `abc` not found");
    }

    #[test]
    fn transient_state_is_retryable() {
        let err = ScalewayError::from_response(
            409,
            r#"{"message":"resource is in a transient state","resource":"instance_server","resource_id":"abc","current_state":"starting","type":"transient_state"}"#,
        );
        assert!(matches!(err, ScalewayError::TransientState { .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn invalid_arguments_details() {
        let err = ScalewayError::from_response(
            400,
            r#"{"details":[{"argument_name":"name","reason":"required","help_message":"name is required"}],"message":"invalid argument(s)","type":"invalid_arguments"}"#,
        );
        assert_eq!(err.to_string(), "invalid arguments: name (required)");
        assert!(!err.is_retryable());
    }

    #[test]
    fn invalid_arguments_legacy_fields() {
        let err = ScalewayError::from_response(
            400,
            r#"{"fields":{"commercial_type":["unknown type"]},"message":"Validation Error","type":"invalid_request_error"}"#,
        );
        assert!(matches!(err, ScalewayError::Api { status: 400, .. }));

        let err = ScalewayError::from_response(
            400,
            r#"{"fields":{"commercial_type":["unknown type"]},"type":"invalid_arguments"}"#,
        );
        assert_eq!(
            err.to_string(),
            "invalid arguments: commercial_type (unknown type)"
        );
    }

    #[test]
    fn auth() {
        let err = ScalewayError::from_response(
            403,
            r#"{"message":"insufficient permissions","type":"permissions_denied"}"#,
        );
        assert!(matches!(err, ScalewayError::Auth { status: 403, .. }));
    }

    #[test]
    fn non_json_body() {
        let err = ScalewayError::from_response(502, "Bad Gateway\n");
        assert_eq!(err.to_string(), "API error (502): Bad Gateway");
        assert!(err.is_retryable());
        assert!(matches!(
            ScalewayError::from_response(429, ""),
            ScalewayError::RateLimited
        ));
    }

    #[test]
    fn found() {
        let gone: Result<(), _> = Err(ScalewayError::NotFound {
            resource: "lb".to_owned(),
            resource_id: "x".to_owned(),
        });
        assert!(gone.found().unwrap().is_none());
        assert_eq!(Ok::<_, ScalewayError>(1).found().unwrap(), Some(1));
        assert!(Err::<(), _>(ScalewayError::RateLimited).found().is_err());
    }
}
