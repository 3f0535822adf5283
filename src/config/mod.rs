//! Configuration loading and management
//!
//! An API is described by one YAML document:
//!
//! ```yaml
//! server:
//!   mount_prefix: /api
//!   default_limit: 5
//!   key_policy: literal
//! auth:
//!   get: public
//!   post: authenticated
//! resources:
//!   - name: Person
//!     fields:
//!       name: { type: string, required: true }
//!       boss: { type: reference, target: Person, collection: reports }
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::core::auth::{AuthPolicy, PolicyAuthorizer, VerbPolicies};
use crate::core::error::ConfigError;
use crate::core::field::{FieldKind, MAX_STRING_LENGTH};
use crate::core::schema::{FieldDescriptor, Schema};

/// What happens to a `key` supplied on create
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyPolicy {
    /// The supplied key becomes the record key
    #[default]
    Literal,
    /// The store always allocates the key
    Generated,
}

/// Server-wide settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Path every resource route is mounted under (e.g. "/api")
    pub mount_prefix: String,

    /// Origin for generated URIs; taken from the Host header when unset
    pub base_url: Option<String>,

    /// Page size when a list request has no usable `limit`
    pub default_limit: usize,

    /// Upper bound on any list page
    pub max_limit: Option<usize>,

    pub key_policy: KeyPolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            mount_prefix: String::new(),
            base_url: None,
            default_limit: 5,
            max_limit: None,
            key_policy: KeyPolicy::Literal,
        }
    }
}

/// Per-verb policy strings: `public`, `authenticated`, `service_only`,
/// `deny` or `role:<name>`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub get: Option<String>,
    pub post: Option<String>,
    pub put: Option<String>,
    pub delete: Option<String>,
}

impl AuthConfig {
    /// Resolve into policies, unset verbs taking the fallback's policy
    fn policies(&self, fallback: &VerbPolicies) -> Result<VerbPolicies, ConfigError> {
        let resolve = |raw: &Option<String>, inherited: &AuthPolicy| match raw {
            Some(raw) => AuthPolicy::parse_policy(raw),
            None => Ok(inherited.clone()),
        };
        Ok(VerbPolicies {
            get: resolve(&self.get, &fallback.get)?,
            post: resolve(&self.post, &fallback.post)?,
            put: resolve(&self.put, &fallback.put)?,
            delete: resolve(&self.delete, &fallback.delete)?,
        })
    }
}

/// Field kinds as written in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Integer,
    Float,
    Boolean,
    String,
    Text,
    Blob,
    Date,
    Time,
    Datetime,
    Reference,
}

/// One declared field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldConfig {
    #[serde(rename = "type")]
    pub field_type: FieldType,

    #[serde(default)]
    pub required: bool,

    /// Only for `string`; at most 500
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,

    /// Only for `reference`: the referenced resource
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,

    /// Only for `reference`: relationship name exposed on the target
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
}

impl FieldConfig {
    fn to_descriptor(&self, resource: &str, field: &str) -> Result<FieldDescriptor, ConfigError> {
        let invalid = |message: &str| ConfigError::InvalidField {
            resource: resource.to_string(),
            field: field.to_string(),
            message: message.to_string(),
        };

        if self.max_length.is_some() && self.field_type != FieldType::String {
            return Err(invalid("max_length only applies to string fields"));
        }
        if self.field_type != FieldType::Reference
            && (self.target.is_some() || self.collection.is_some())
        {
            return Err(invalid("target and collection only apply to reference fields"));
        }

        let kind = match self.field_type {
            FieldType::Integer => FieldKind::Integer,
            FieldType::Float => FieldKind::Float,
            FieldType::Boolean => FieldKind::Boolean,
            FieldType::String => match self.max_length {
                None => FieldKind::string(),
                Some(n) if (1..=MAX_STRING_LENGTH).contains(&n) => {
                    FieldKind::String { max_length: n }
                }
                Some(_) => return Err(invalid("max_length must be between 1 and 500")),
            },
            FieldType::Text => FieldKind::Text,
            FieldType::Blob => FieldKind::Blob,
            FieldType::Date => FieldKind::Date,
            FieldType::Time => FieldKind::Time,
            FieldType::Datetime => FieldKind::DateTime,
            FieldType::Reference => match &self.target {
                Some(target) => FieldKind::reference(target),
                None => return Err(invalid("reference fields need a target")),
            },
        };

        let mut descriptor = FieldDescriptor::new(kind);
        descriptor.required = self.required;
        descriptor.collection = self.collection.clone();
        Ok(descriptor)
    }
}

/// One resource type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceConfig {
    pub name: String,

    /// Fields in declaration order
    #[serde(default)]
    pub fields: IndexMap<String, FieldConfig>,

    /// Overrides of the top-level policies for this resource
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthConfig>,
}

impl ResourceConfig {
    pub fn to_schema(&self) -> Result<Schema, ConfigError> {
        self.fields
            .iter()
            .try_fold(Schema::new(&self.name), |schema, (name, field)| {
                Ok(schema.field(name, field.to_descriptor(&self.name, name)?))
            })
    }
}

/// Complete configuration of an API
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default)]
    pub server: ServerConfig,

    /// Default policies; everything is public when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthConfig>,

    #[serde(default)]
    pub resources: Vec<ResourceConfig>,
}

impl ApiConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Load configuration from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Schemas for every configured resource, in file order
    pub fn schemas(&self) -> Result<Vec<Schema>, ConfigError> {
        self.resources.iter().map(ResourceConfig::to_schema).collect()
    }

    /// Policy authorizer for the configured defaults and overrides
    pub fn authorizer(&self) -> Result<PolicyAuthorizer, ConfigError> {
        let default = match &self.auth {
            Some(auth) => auth.policies(&VerbPolicies::default())?,
            None => VerbPolicies::default(),
        };

        let mut authorizer = PolicyAuthorizer::new(default.clone());
        for resource in &self.resources {
            if let Some(auth) = &resource.auth {
                authorizer = authorizer.with_resource(&resource.name, auth.policies(&default)?);
            }
        }
        Ok(authorizer)
    }
}
