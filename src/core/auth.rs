//! Authorization for resource operations
//!
//! Every operation asks an [`Authorizer`] whether a [`Principal`] may apply a
//! [`Verb`] to an [`AuthTarget`] before it mutates or encodes anything.
//! There is no implicit "no auth" mode: open APIs use [`AllowAll`].
//!
//! Principals come from the request through a [`PrincipalResolver`].

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use axum::http::HeaderMap;
use std::collections::HashMap;
use std::fmt;

use crate::core::error::ConfigError;
use crate::core::schema::Schema;
use crate::core::store::Record;

/// Header carrying the authenticated user id
pub const USER_ID_HEADER: &str = "x-user-id";
/// Comma-separated roles of the authenticated user
pub const USER_ROLES_HEADER: &str = "x-user-roles";
/// Name of a calling service
pub const SERVICE_NAME_HEADER: &str = "x-service-name";

/// Who is making the request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    /// No credentials were presented
    Anonymous,

    /// Authenticated user
    User { user_id: String, roles: Vec<String> },

    /// Service-to-service communication
    Service { service_name: String },
}

impl Principal {
    pub fn user(user_id: impl Into<String>, roles: &[&str]) -> Self {
        Principal::User {
            user_id: user_id.into(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
        }
    }

    /// Check if principal represents a service
    pub fn is_service(&self) -> bool {
        matches!(self, Principal::Service { .. })
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, Principal::Anonymous)
    }

    pub fn has_role(&self, role: &str) -> bool {
        match self {
            Principal::User { roles, .. } => roles.iter().any(|r| r == role),
            _ => false,
        }
    }
}

/// The operation being authorized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Get,
    Post,
    Put,
    Delete,
}

impl Verb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Get => "get",
            Verb::Post => "post",
            Verb::Put => "put",
            Verb::Delete => "delete",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a verb is applied to
#[derive(Debug, Clone, Copy)]
pub enum AuthTarget<'a> {
    /// The site index
    Site,

    /// A resource type as a whole (create)
    Schema(&'a Schema),

    /// A single record, `None` when the key does not exist
    Record {
        kind: &'a str,
        record: Option<&'a Record>,
    },

    /// A result set (list, bulk delete)
    Records { kind: &'a str, records: &'a [Record] },
}

impl AuthTarget<'_> {
    /// Resource type the target belongs to, if any
    pub fn resource(&self) -> Option<&str> {
        match self {
            AuthTarget::Site => None,
            AuthTarget::Schema(schema) => Some(schema.name()),
            AuthTarget::Record { kind, .. } | AuthTarget::Records { kind, .. } => Some(kind),
        }
    }
}

/// Decides whether a principal may apply a verb to a target
pub trait Authorizer: Send + Sync {
    fn authorize(&self, principal: &Principal, verb: Verb, target: &AuthTarget<'_>) -> bool;
}

/// Explicit "no authorization" policy
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl Authorizer for AllowAll {
    fn authorize(&self, _: &Principal, _: Verb, _: &AuthTarget<'_>) -> bool {
        true
    }
}

/// Authorization policy for a verb
#[derive(Debug, Clone)]
pub enum AuthPolicy {
    /// Public access (no auth required)
    Public,

    /// Any authenticated user or service
    Authenticated,

    /// User must have one of these roles
    HasRole(Vec<String>),

    /// Service-to-service only
    ServiceOnly,

    /// Nobody
    Deny,

    /// Combination of policies (AND)
    And(Vec<AuthPolicy>),

    /// Combination of policies (OR)
    Or(Vec<AuthPolicy>),

    /// Custom policy function
    Custom(fn(&Principal) -> bool),
}

impl AuthPolicy {
    /// Check if the principal satisfies this policy
    pub fn check(&self, principal: &Principal) -> bool {
        match self {
            AuthPolicy::Public => true,

            AuthPolicy::Authenticated => !principal.is_anonymous(),

            AuthPolicy::HasRole(required) => required.iter().any(|r| principal.has_role(r)),

            AuthPolicy::ServiceOnly => principal.is_service(),

            AuthPolicy::Deny => false,

            AuthPolicy::And(policies) => policies.iter().all(|p| p.check(principal)),

            AuthPolicy::Or(policies) => policies.iter().any(|p| p.check(principal)),

            AuthPolicy::Custom(f) => f(principal),
        }
    }

    /// Parse policy from string (for YAML config)
    pub fn parse_policy(s: &str) -> Result<Self, ConfigError> {
        match s {
            "public" => Ok(AuthPolicy::Public),
            "authenticated" => Ok(AuthPolicy::Authenticated),
            "service_only" => Ok(AuthPolicy::ServiceOnly),
            "deny" => Ok(AuthPolicy::Deny),
            s => match s.strip_prefix("role:") {
                Some(role) if !role.is_empty() => Ok(AuthPolicy::HasRole(vec![role.to_string()])),
                _ => Err(ConfigError::UnknownPolicy(s.to_string())),
            },
        }
    }
}

/// One policy per verb
#[derive(Debug, Clone)]
pub struct VerbPolicies {
    pub get: AuthPolicy,
    pub post: AuthPolicy,
    pub put: AuthPolicy,
    pub delete: AuthPolicy,
}

impl VerbPolicies {
    /// The same policy for every verb
    pub fn uniform(policy: AuthPolicy) -> Self {
        Self {
            get: policy.clone(),
            post: policy.clone(),
            put: policy.clone(),
            delete: policy,
        }
    }

    pub fn for_verb(&self, verb: Verb) -> &AuthPolicy {
        match verb {
            Verb::Get => &self.get,
            Verb::Post => &self.post,
            Verb::Put => &self.put,
            Verb::Delete => &self.delete,
        }
    }
}

impl Default for VerbPolicies {
    fn default() -> Self {
        Self::uniform(AuthPolicy::Public)
    }
}

/// Authorizer driven by per-verb policies, with per-resource overrides
///
/// The site index and unconfigured resources fall back to the default
/// policies.
#[derive(Debug, Clone, Default)]
pub struct PolicyAuthorizer {
    default: VerbPolicies,
    resources: HashMap<String, VerbPolicies>,
}

impl PolicyAuthorizer {
    pub fn new(default: VerbPolicies) -> Self {
        Self {
            default,
            resources: HashMap::new(),
        }
    }

    pub fn with_resource(mut self, resource: impl Into<String>, policies: VerbPolicies) -> Self {
        self.resources.insert(resource.into(), policies);
        self
    }

    fn policies_for(&self, resource: Option<&str>) -> &VerbPolicies {
        resource
            .and_then(|name| self.resources.get(name))
            .unwrap_or(&self.default)
    }
}

impl Authorizer for PolicyAuthorizer {
    fn authorize(&self, principal: &Principal, verb: Verb, target: &AuthTarget<'_>) -> bool {
        self.policies_for(target.resource())
            .for_verb(verb)
            .check(principal)
    }
}

/// Extracts the principal from request headers
#[async_trait]
pub trait PrincipalResolver: Send + Sync {
    async fn resolve(&self, headers: &HeaderMap) -> Result<Principal>;
}

/// Treats every request as anonymous (for development)
#[derive(Debug, Clone, Copy, Default)]
pub struct AnonymousResolver;

#[async_trait]
impl PrincipalResolver for AnonymousResolver {
    async fn resolve(&self, _headers: &HeaderMap) -> Result<Principal> {
        Ok(Principal::Anonymous)
    }
}

/// Trusts identity headers set by an upstream gateway
///
/// `x-service-name` wins over `x-user-id`; requests with neither are
/// anonymous.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderPrincipalResolver;

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Result<Option<&'a str>> {
    match headers.get(name) {
        None => Ok(None),
        Some(value) => {
            let value = value
                .to_str()
                .map_err(|_| anyhow!("header {} is not valid ASCII", name))?
                .trim();
            if value.is_empty() {
                return Err(anyhow!("header {} is empty", name));
            }
            Ok(Some(value))
        }
    }
}

#[async_trait]
impl PrincipalResolver for HeaderPrincipalResolver {
    async fn resolve(&self, headers: &HeaderMap) -> Result<Principal> {
        if let Some(service_name) = header_str(headers, SERVICE_NAME_HEADER)? {
            return Ok(Principal::Service {
                service_name: service_name.to_string(),
            });
        }

        let Some(user_id) = header_str(headers, USER_ID_HEADER)? else {
            return Ok(Principal::Anonymous);
        };

        let roles = header_str(headers, USER_ROLES_HEADER)?
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|r| !r.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Principal::User {
            user_id: user_id.to_string(),
            roles,
        })
    }
}
