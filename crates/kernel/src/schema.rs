//! Declarative provisioning records: accounts, collection schemas, indexes.

use std::fmt;

use serde::{Deserialize, Serialize, Serializer};

const PLACEHOLDER_PREFIX: &str = "CHANGE_THIS_";

/// Opaque account secret. Never rendered by `Debug` or serialization.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Clear-text value, for handing to the database driver only.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// True while the value is still one of the `CHANGE_THIS_*` placeholders.
    pub fn is_placeholder(&self) -> bool {
        self.0.starts_with(PLACEHOLDER_PREFIX)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

impl Serialize for Credential {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("***")
    }
}

/// Built-in roles granted by the provisioning run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    Backup,
    Restore,
    ClusterMonitor,
    Read,
    ReadWrite,
    DbAdmin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Backup => "backup",
            Role::Restore => "restore",
            Role::ClusterMonitor => "clusterMonitor",
            Role::Read => "read",
            Role::ReadWrite => "readWrite",
            Role::DbAdmin => "dbAdmin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A role together with the database its grant applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleGrant {
    pub role: Role,
    pub db: String,
}

impl RoleGrant {
    pub fn new(role: Role, db: impl Into<String>) -> Self {
        Self { role, db: db.into() }
    }
}

/// A login principal with its authorization grants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Account {
    pub name: String,
    pub credential: Credential,
    pub roles: Vec<RoleGrant>,
}

impl Account {
    pub fn new(name: impl Into<String>, credential: Credential) -> Self {
        Self {
            name: name.into(),
            credential,
            roles: Vec::new(),
        }
    }

    pub fn grant(mut self, role: Role, db: impl Into<String>) -> Self {
        self.roles.push(RoleGrant::new(role, db));
        self
    }
}

/// Value types a validator can require of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BsonType {
    String,
    Date,
    Int,
    Long,
    Double,
    Bool,
    ObjectId,
    Object,
    Array,
}

impl BsonType {
    /// Alias used by `$jsonSchema` `bsonType`.
    pub fn as_str(self) -> &'static str {
        match self {
            BsonType::String => "string",
            BsonType::Date => "date",
            BsonType::Int => "int",
            BsonType::Long => "long",
            BsonType::Double => "double",
            BsonType::Bool => "bool",
            BsonType::ObjectId => "objectId",
            BsonType::Object => "object",
            BsonType::Array => "array",
        }
    }

    fn article(self) -> &'static str {
        match self {
            BsonType::Int | BsonType::ObjectId | BsonType::Object | BsonType::Array => "an",
            _ => "a",
        }
    }
}

impl fmt::Display for BsonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldRule {
    pub name: String,
    pub bson_type: BsonType,
    pub required: bool,
    pub description: String,
}

/// Structural validator attached to a collection at creation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionSchema {
    pub collection: String,
    pub fields: Vec<FieldRule>,
}

impl CollectionSchema {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            fields: Vec::new(),
        }
    }

    /// Add a required field; the description follows the engine's
    /// "must be a <type> and is required" wording.
    pub fn required(mut self, name: impl Into<String>, bson_type: BsonType) -> Self {
        self.fields.push(FieldRule {
            name: name.into(),
            bson_type,
            required: true,
            description: format!(
                "must be {} {} and is required",
                bson_type.article(),
                bson_type
            ),
        });
        self
    }

    pub fn required_fields(&self) -> impl Iterator<Item = &FieldRule> {
        self.fields.iter().filter(|field| field.required)
    }

    pub fn field(&self, name: &str) -> Option<&FieldRule> {
        self.fields.iter().find(|field| field.name == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Ascending,
    Descending,
}

impl Direction {
    /// Key value used in index documents.
    pub fn as_i32(self) -> i32 {
        match self {
            Direction::Ascending => 1,
            Direction::Descending => -1,
        }
    }
}

/// Single-field index definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct IndexSpec {
    pub field: String,
    pub direction: Direction,
    pub unique: bool,
}

impl IndexSpec {
    pub fn ascending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Ascending,
            unique: false,
        }
    }

    pub fn descending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Descending,
            unique: false,
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Engine-default name, e.g. `email_1` or `createdAt_-1`.
    pub fn name(&self) -> String {
        format!("{}_{}", self.field, self.direction.as_i32())
    }

    /// Same key pattern, regardless of options.
    pub fn same_keys(&self, other: &IndexSpec) -> bool {
        self.field == other.field && self.direction == other.direction
    }
}
