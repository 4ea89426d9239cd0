//! Console resources and the request bodies built from bulk input

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::fields::{Field, Setter};
use crate::validation::{
    validate_email, validate_hostname, validate_not_empty, validate_priority, validate_role,
};

/// Collections exposed by the console API
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Resource {
    Users,
    Devices,
    Policies,
    Proxies,
}

impl Resource {
    /// Collection path relative to the API root
    pub fn path(&self) -> &'static str {
        match self {
            Resource::Users => "users",
            Resource::Devices => "devices",
            Resource::Policies => "policies",
            Resource::Proxies => "proxies",
        }
    }

    /// Page size the endpoint insists on regardless of configuration
    pub fn fixed_page_size(&self) -> Option<i64> {
        match self {
            Resource::Proxies => Some(100),
            _ => None,
        }
    }

    /// Effective page size for listing this resource
    pub fn page_size(&self, configured: i64) -> i64 {
        self.fixed_page_size().unwrap_or(configured)
    }
}

/// A resource body that can be built from bulk input
///
/// `fields` and `setters` must line up one-to-one; `BulkRunner::new` panics
/// otherwise.
pub trait BulkModel: Serialize + serde::de::DeserializeOwned + Clone + Default + Send + 'static {
    const RESOURCE: Resource;

    fn fields() -> Vec<Field>;

    fn setters() -> Vec<Setter<Self>>;

    /// Name used in failure reports
    fn identify(&self) -> Option<String>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub role: String,
    #[serde(default)]
    pub groups: Vec<String>,
    pub active: bool,
}

impl Default for User {
    fn default() -> Self {
        Self {
            id: None,
            email: String::new(),
            first_name: String::new(),
            last_name: String::new(),
            role: "viewer".to_string(),
            groups: Vec::new(),
            active: true,
        }
    }
}

impl BulkModel for User {
    const RESOURCE: Resource = Resource::Users;

    fn fields() -> Vec<Field> {
        vec![
            Field::string("email", "login email address")
                .mandatory()
                .validate_str(validate_email),
            Field::string("first_name", "given name"),
            Field::string("last_name", "family name"),
            Field::string("role", "admin, operator, auditor or viewer")
                .default_str("viewer")
                .validate_str(validate_role),
            Field::string_list("groups", "comma-separated group names"),
            Field::bool("active", "whether the account can sign in", true),
        ]
    }

    fn setters() -> Vec<Setter<Self>> {
        vec![
            Setter::string(|u: &mut User, v| u.email = v),
            Setter::string(|u: &mut User, v| u.first_name = v),
            Setter::string(|u: &mut User, v| u.last_name = v),
            Setter::string(|u: &mut User, v| u.role = v),
            Setter::string_list(|u: &mut User, v| u.groups = v),
            Setter::bool(|u: &mut User, v| u.active = v),
        ]
    }

    fn identify(&self) -> Option<String> {
        self.id.clone().or_else(|| Some(self.email.clone()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Device {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub serial: String,
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub os: String,
    #[serde(default)]
    pub owner_email: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl BulkModel for Device {
    const RESOURCE: Resource = Resource::Devices;

    fn fields() -> Vec<Field> {
        vec![
            Field::string("name", "display name")
                .mandatory()
                .validate_str(validate_not_empty),
            Field::string("serial", "hardware serial number")
                .mandatory()
                .validate_str(validate_not_empty),
            Field::string("hostname", "network hostname").validate_str(validate_hostname),
            Field::string("os", "operating system"),
            Field::string("owner_email", "email of the owning user").validate_str(validate_email),
            Field::string_list("tags", "comma-separated tags"),
        ]
    }

    fn setters() -> Vec<Setter<Self>> {
        vec![
            Setter::string(|d: &mut Device, v| d.name = v),
            Setter::string(|d: &mut Device, v| d.serial = v),
            Setter::string(|d: &mut Device, v| d.hostname = v),
            Setter::string(|d: &mut Device, v| d.os = v),
            Setter::string(|d: &mut Device, v| d.owner_email = v),
            Setter::string_list(|d: &mut Device, v| d.tags = v),
        ]
    }

    fn identify(&self) -> Option<String> {
        self.id.clone().or_else(|| Some(self.serial.clone()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub action: String,
    pub priority: i64,
    #[serde(default)]
    pub rule_ids: Vec<i64>,
    pub enabled: bool,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            id: None,
            name: String::new(),
            action: "block".to_string(),
            priority: 100,
            rule_ids: Vec::new(),
            enabled: true,
        }
    }
}

impl BulkModel for Policy {
    const RESOURCE: Resource = Resource::Policies;

    fn fields() -> Vec<Field> {
        vec![
            Field::string("name", "policy name")
                .mandatory()
                .validate_str(validate_not_empty),
            Field::string("action", "allow, block or isolate")
                .default_str("block")
                .validate_str(validate_action),
            Field::int("priority", "evaluation order, lowest first", 100)
                .validate_int(validate_priority),
            Field::int_list("rule_ids", "comma-separated rule ids"),
            Field::bool("enabled", "whether the policy is enforced", true),
        ]
    }

    fn setters() -> Vec<Setter<Self>> {
        vec![
            Setter::string(|p: &mut Policy, v| p.name = v),
            Setter::string(|p: &mut Policy, v| p.action = v),
            Setter::int(|p: &mut Policy, v| p.priority = v),
            Setter::int_list(|p: &mut Policy, v| p.rule_ids = v),
            Setter::bool(|p: &mut Policy, v| p.enabled = v),
        ]
    }

    fn identify(&self) -> Option<String> {
        self.id.clone().or_else(|| Some(self.name.clone()))
    }
}

fn validate_action(action: &str) -> Result<(), String> {
    match action {
        "allow" | "block" | "isolate" => Ok(()),
        _ => Err("action must be allow, block or isolate".to_string()),
    }
}

/// Target of delete batches: one object id per record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdRecord {
    pub id: String,
}

impl IdRecord {
    pub fn fields() -> Vec<Field> {
        vec![Field::string("id", "object id")
            .mandatory()
            .validate_str(validate_not_empty)]
    }

    pub fn setters() -> Vec<Setter<Self>> {
        vec![Setter::string(|r: &mut IdRecord, v| r.id = v)]
    }
}
