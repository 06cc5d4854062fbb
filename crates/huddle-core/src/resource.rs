//! Resource keys naming relay rooms.
//!
//! A key is `"{kind}:{id}"`, e.g. `page:42` or `task:7`. The registry never
//! checks whether the resource exists; it only needs a well-formed name.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::ProtocolError;

/// Kind of CRUD resource a room can be keyed on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    /// A block-based editor page.
    Page,
    /// A task (subtasks share their parent's room).
    Task,
    /// A CRM contact.
    Contact,
    /// A workspace (membership, settings).
    Workspace,
}

impl ResourceKind {
    /// Wire prefix for this kind.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Page => "page",
            Self::Task => "task",
            Self::Contact => "contact",
            Self::Workspace => "workspace",
        }
    }

    fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "page" => Some(Self::Page),
            "task" => Some(Self::Task),
            "contact" => Some(Self::Contact),
            "workspace" => Some(Self::Workspace),
            _ => None,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated room key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey {
    kind: ResourceKind,
    id: String,
}

impl ResourceKey {
    /// Build a key from its parts. The id must be non-blank and free of
    /// whitespace.
    pub fn new(kind: ResourceKind, id: impl Into<String>) -> Result<Self, ProtocolError> {
        let id = id.into();
        let raw = format!("{kind}:{id}");
        if id.trim().is_empty() {
            return Err(ProtocolError::invalid_resource(&raw, "empty id"));
        }
        if id.chars().any(char::is_whitespace) {
            return Err(ProtocolError::invalid_resource(&raw, "id contains whitespace"));
        }
        Ok(Self { kind, id })
    }

    /// Parse `kind:id`, trimming surrounding whitespace.
    pub fn parse(raw: &str) -> Result<Self, ProtocolError> {
        let trimmed = raw.trim();
        let Some((prefix, id)) = trimmed.split_once(':') else {
            return Err(ProtocolError::invalid_resource(raw, "expected 'kind:id'"));
        };
        let Some(kind) = ResourceKind::from_prefix(prefix) else {
            return Err(ProtocolError::invalid_resource(
                raw,
                format!("unknown kind '{prefix}'"),
            ));
        };
        Self::new(kind, id).map_err(|_| ProtocolError::invalid_resource(raw, "empty or invalid id"))
    }

    /// Convenience constructor for `page:{id}`.
    pub fn page(id: impl Into<String>) -> Result<Self, ProtocolError> {
        Self::new(ResourceKind::Page, id)
    }

    /// Convenience constructor for `task:{id}`.
    pub fn task(id: impl Into<String>) -> Result<Self, ProtocolError> {
        Self::new(ResourceKind::Task, id)
    }

    /// Resource kind.
    #[must_use]
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Resource id within its kind.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

impl FromStr for ResourceKey {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for ResourceKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ResourceKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
