//! Operation registry and parameter binding
//!
//! Every backend operation the panel may invoke is listed in [`ApiMethod`];
//! a request naming anything else is rejected up front. Binding turns the
//! loosely-shaped parameter payload (positional array or named object, both
//! occur in the wild) into a typed [`ApiCall`].

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use thiserror::Error;

/// Binding failures, surfaced verbatim to the view layer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindError {
    #[error("Unknown API method: {0}")]
    UnknownMethod(String),

    #[error("Invalid parameters for {0}")]
    InvalidParams(&'static str),
}

/// The closed set of backend operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiMethod {
    Ping,
    AuthStatus,
    GetVorgaenge,
    GetVorgangById,
    PutVorgangById,
    GetDocumentById,
    GetSitzungen,
    GetEnumerations,
    UpdateEnumeration,
    DeleteEnumerationValue,
    GetAutoren,
    UpdateAutoren,
    DeleteAutorenByParams,
    GetGremien,
    UpdateGremien,
    DeleteGremienByParams,
    CreateApiKey,
    DeleteApiKey,
    LoadDashboardStats,
    LoadEnumerations,
}

impl ApiMethod {
    /// Resolve a wire name to an operation
    pub fn from_name(name: &str) -> Result<Self, BindError> {
        Ok(match name {
            "ping" => Self::Ping,
            "authStatus" => Self::AuthStatus,
            "getVorgaenge" => Self::GetVorgaenge,
            "getVorgangById" => Self::GetVorgangById,
            "putVorgangById" => Self::PutVorgangById,
            "getDocumentById" => Self::GetDocumentById,
            "getSitzungen" => Self::GetSitzungen,
            "getEnumerations" => Self::GetEnumerations,
            "updateEnumeration" => Self::UpdateEnumeration,
            "deleteEnumerationValue" => Self::DeleteEnumerationValue,
            "getAutoren" => Self::GetAutoren,
            "updateAutoren" => Self::UpdateAutoren,
            "deleteAutorenByParams" => Self::DeleteAutorenByParams,
            "getGremien" => Self::GetGremien,
            "updateGremien" => Self::UpdateGremien,
            "deleteGremienByParams" => Self::DeleteGremienByParams,
            "createApiKey" => Self::CreateApiKey,
            "deleteApiKey" => Self::DeleteApiKey,
            "loadDashboardStats" => Self::LoadDashboardStats,
            "loadEnumerations" => Self::LoadEnumerations,
            _ => return Err(BindError::UnknownMethod(name.to_string())),
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Ping => "ping",
            Self::AuthStatus => "authStatus",
            Self::GetVorgaenge => "getVorgaenge",
            Self::GetVorgangById => "getVorgangById",
            Self::PutVorgangById => "putVorgangById",
            Self::GetDocumentById => "getDocumentById",
            Self::GetSitzungen => "getSitzungen",
            Self::GetEnumerations => "getEnumerations",
            Self::UpdateEnumeration => "updateEnumeration",
            Self::DeleteEnumerationValue => "deleteEnumerationValue",
            Self::GetAutoren => "getAutoren",
            Self::UpdateAutoren => "updateAutoren",
            Self::DeleteAutorenByParams => "deleteAutorenByParams",
            Self::GetGremien => "getGremien",
            Self::UpdateGremien => "updateGremien",
            Self::DeleteGremienByParams => "deleteGremienByParams",
            Self::CreateApiKey => "createApiKey",
            Self::DeleteApiKey => "deleteApiKey",
            Self::LoadDashboardStats => "loadDashboardStats",
            Self::LoadEnumerations => "loadEnumerations",
        }
    }

    /// Read operations are the only ones eligible for caching
    pub fn is_read(&self) -> bool {
        self.name().starts_with("get")
    }

    /// Cache key for the parameterless invocation of this operation
    pub fn cache_key(&self) -> String {
        format!("{}_{{}}", self.name())
    }

    /// Bind a parameter payload to this operation
    ///
    /// Accepts the positional-array form and the named-object form. Missing
    /// optional parts (filters, `replacing` lists, expiry) default to empty.
    pub fn bind(self, params: &Value) -> Result<ApiCall, BindError> {
        match self {
            Self::Ping => Ok(ApiCall::Ping),
            Self::AuthStatus => Ok(ApiCall::AuthStatus),
            Self::LoadDashboardStats => Ok(ApiCall::LoadDashboardStats),
            Self::LoadEnumerations => Ok(ApiCall::LoadEnumerations),

            Self::GetVorgaenge => Ok(ApiCall::GetVorgaenge { params: filter_params(params) }),
            Self::GetSitzungen => Ok(ApiCall::GetSitzungen { params: filter_params(params) }),

            Self::GetVorgangById => Ok(ApiCall::GetVorgangById { id: bind_id(self, params)? }),
            Self::GetDocumentById => {
                Ok(ApiCall::GetDocumentById { id: bind_id(self, params)? })
            }

            Self::PutVorgangById => match params {
                Value::Array(items) if items.len() >= 2 => Ok(ApiCall::PutVorgangById {
                    id: value_as_string(&items[0]).ok_or(invalid(self))?,
                    data: items[1].clone(),
                }),
                Value::Object(fields) => Ok(ApiCall::PutVorgangById {
                    id: string_field(fields, "id").ok_or(invalid(self))?,
                    data: fields.get("data").cloned().ok_or(invalid(self))?,
                }),
                _ => Err(invalid(self)),
            },

            Self::GetEnumerations => match params {
                Value::Array(items) if !items.is_empty() => Ok(ApiCall::GetEnumerations {
                    name: value_as_string(&items[0]).ok_or(invalid(self))?,
                    params: items.get(1).map(filter_params).unwrap_or_default(),
                }),
                Value::Object(fields) => {
                    let name = enum_name(fields).ok_or(invalid(self))?;
                    let mut rest = fields.clone();
                    rest.remove("enumName");
                    rest.remove("name");
                    Ok(ApiCall::GetEnumerations {
                        name,
                        params: filter_params(&Value::Object(rest)),
                    })
                }
                _ => Err(invalid(self)),
            },

            Self::UpdateEnumeration => match params {
                Value::Array(items) if items.len() >= 2 => Ok(ApiCall::UpdateEnumeration {
                    name: value_as_string(&items[0]).ok_or(invalid(self))?,
                    values: value_list(&items[1]).ok_or(invalid(self))?,
                    replacing: items.get(2).and_then(value_list).unwrap_or_default(),
                }),
                Value::Object(fields) => Ok(ApiCall::UpdateEnumeration {
                    name: enum_name(fields).ok_or(invalid(self))?,
                    values: fields.get("values").and_then(value_list).ok_or(invalid(self))?,
                    replacing: fields.get("replacing").and_then(value_list).unwrap_or_default(),
                }),
                _ => Err(invalid(self)),
            },

            Self::DeleteEnumerationValue => match params {
                Value::Array(items) if items.len() >= 2 => Ok(ApiCall::DeleteEnumerationValue {
                    name: value_as_string(&items[0]).ok_or(invalid(self))?,
                    value: value_as_string(&items[1]).ok_or(invalid(self))?,
                }),
                Value::Object(fields) => Ok(ApiCall::DeleteEnumerationValue {
                    name: enum_name(fields).ok_or(invalid(self))?,
                    value: string_field(fields, "value").ok_or(invalid(self))?,
                }),
                _ => Err(invalid(self)),
            },

            Self::GetAutoren => Ok(ApiCall::GetAutoren { params: bind_filters(params) }),
            Self::GetGremien => Ok(ApiCall::GetGremien { params: bind_filters(params) }),
            Self::DeleteAutorenByParams => {
                Ok(ApiCall::DeleteAutorenByParams { params: bind_filters(params) })
            }
            Self::DeleteGremienByParams => {
                Ok(ApiCall::DeleteGremienByParams { params: bind_filters(params) })
            }

            Self::UpdateAutoren => {
                let (values, replacing) = bind_replace_set(self, params)?;
                Ok(ApiCall::UpdateAutoren { values, replacing })
            }
            Self::UpdateGremien => {
                let (values, replacing) = bind_replace_set(self, params)?;
                Ok(ApiCall::UpdateGremien { values, replacing })
            }

            Self::CreateApiKey => match params {
                Value::Array(items) if !items.is_empty() => Ok(ApiCall::CreateApiKey {
                    scope: value_as_string(&items[0]).ok_or(invalid(self))?,
                    expires_at: items.get(1).and_then(parse_datetime),
                }),
                Value::Object(fields) => Ok(ApiCall::CreateApiKey {
                    scope: string_field(fields, "scope").ok_or(invalid(self))?,
                    expires_at: fields.get("expires_at").and_then(parse_datetime),
                }),
                _ => Err(invalid(self)),
            },

            Self::DeleteApiKey => match params {
                Value::Array(items) if !items.is_empty() => Ok(ApiCall::DeleteApiKey {
                    key: value_as_string(&items[0]).ok_or(invalid(self))?,
                }),
                Value::Object(fields) => Ok(ApiCall::DeleteApiKey {
                    key: string_field(fields, "key").ok_or(invalid(self))?,
                }),
                _ => Err(invalid(self)),
            },
        }
    }
}

/// A fully bound operation, ready to execute
#[derive(Debug, Clone, PartialEq)]
pub enum ApiCall {
    Ping,
    AuthStatus,
    GetVorgaenge { params: Vec<(String, String)> },
    GetVorgangById { id: String },
    PutVorgangById { id: String, data: Value },
    GetDocumentById { id: String },
    GetSitzungen { params: Vec<(String, String)> },
    GetEnumerations { name: String, params: Vec<(String, String)> },
    UpdateEnumeration { name: String, values: Vec<Value>, replacing: Vec<Value> },
    DeleteEnumerationValue { name: String, value: String },
    GetAutoren { params: Vec<(String, String)> },
    UpdateAutoren { values: Vec<Value>, replacing: Vec<Value> },
    DeleteAutorenByParams { params: Vec<(String, String)> },
    GetGremien { params: Vec<(String, String)> },
    UpdateGremien { values: Vec<Value>, replacing: Vec<Value> },
    DeleteGremienByParams { params: Vec<(String, String)> },
    CreateApiKey { scope: String, expires_at: Option<DateTime<Utc>> },
    DeleteApiKey { key: String },
    LoadDashboardStats,
    LoadEnumerations,
}

/// Whether a parameter payload counts as "no parameters"
pub fn params_is_empty(params: &Value) -> bool {
    match params {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        Value::Object(fields) => fields.is_empty(),
        _ => false,
    }
}

fn invalid(method: ApiMethod) -> BindError {
    BindError::InvalidParams(method.name())
}

/// Single `id` parameter, positional or named
fn bind_id(method: ApiMethod, params: &Value) -> Result<String, BindError> {
    match params {
        Value::Array(items) if !items.is_empty() => {
            value_as_string(&items[0]).ok_or(invalid(method))
        }
        Value::Object(fields) => string_field(fields, "id").ok_or(invalid(method)),
        _ => Err(invalid(method)),
    }
}

/// Filter object, either wrapped in a one-element array or given directly
fn bind_filters(params: &Value) -> Vec<(String, String)> {
    match params {
        Value::Array(items) => items.first().map(filter_params).unwrap_or_default(),
        other => filter_params(other),
    }
}

/// Replace-set payload: `{objects, replacing}` directly or array-wrapped
fn bind_replace_set(
    method: ApiMethod,
    params: &Value,
) -> Result<(Vec<Value>, Vec<Value>), BindError> {
    let fields = match params {
        Value::Array(items) if !items.is_empty() => items[0].as_object(),
        Value::Object(fields) => Some(fields),
        _ => None,
    }
    .ok_or(invalid(method))?;
    let values = fields.get("objects").and_then(value_list).ok_or(invalid(method))?;
    let replacing = fields.get("replacing").and_then(value_list).unwrap_or_default();
    Ok((values, replacing))
}

/// Flatten an object into query pairs; null values are dropped
fn filter_params(params: &Value) -> Vec<(String, String)> {
    let Value::Object(fields) = params else {
        return Vec::new();
    };
    fields
        .iter()
        .filter_map(|(key, value)| value_as_string(value).map(|v| (key.clone(), v)))
        .collect()
}

fn value_as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn value_list(value: &Value) -> Option<Vec<Value>> {
    value.as_array().cloned()
}

fn string_field(fields: &Map<String, Value>, key: &str) -> Option<String> {
    fields.get(key).and_then(value_as_string)
}

/// `enumName` with `name` accepted as a fallback
fn enum_name(fields: &Map<String, Value>) -> Option<String> {
    string_field(fields, "enumName").or_else(|| string_field(fields, "name"))
}

fn parse_datetime(value: &Value) -> Option<DateTime<Utc>> {
    value
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}
