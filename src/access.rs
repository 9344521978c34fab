use parking_lot::RwLock;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::error::AccessError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleEntry {
    pub id: String,
    pub name: String,
}

/// Allow-list for one guild. An empty list leaves that dimension open.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GuildAccess {
    pub allowed_channels: Vec<String>,
    pub allowed_roles: Vec<RoleEntry>,
}

impl GuildAccess {
    fn permits(&self, channel_id: Option<&str>, roles: &[String]) -> bool {
        let channel_ok = self.allowed_channels.is_empty()
            || channel_id.map_or(false, |c| self.allowed_channels.iter().any(|a| a == c));
        let role_ok = self.allowed_roles.is_empty()
            || self.allowed_roles.iter().any(|r| roles.contains(&r.id));
        channel_ok && role_ok
    }
}

/// Per-guild channel and role allow-lists backed by a JSON file.
pub struct AccessStore {
    path: PathBuf,
    guilds: RwLock<BTreeMap<String, GuildAccess>>,
}

impl AccessStore {
    /// Loads the store, dropping malformed entries. If anything was dropped,
    /// or the file could not be parsed at all, the cleaned store is written
    /// back. A missing file is an empty store.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, AccessError> {
        let path = path.into();
        let (guilds, dirty) = match fs::read_to_string(&path) {
            Ok(content) => parse_store(&content),
            Err(e) if e.kind() == ErrorKind::NotFound => (BTreeMap::new(), false),
            Err(e) => return Err(e.into()),
        };

        let store = Self {
            path,
            guilds: RwLock::new(guilds),
        };
        if dirty {
            warn!("Access store {} had invalid entries, rewriting", store.path.display());
            store.save()?;
        }
        info!("Access rules loaded for {} guild(s)", store.guilds.read().len());
        Ok(store)
    }

    pub fn is_allowed(&self, guild_id: Option<&str>, channel_id: Option<&str>, roles: &[String]) -> bool {
        let Some(guild_id) = guild_id else {
            return true;
        };
        self.guilds
            .read()
            .get(guild_id)
            .map_or(true, |access| access.permits(channel_id, roles))
    }

    fn save(&self) -> Result<(), AccessError> {
        let json = serde_json::to_string_pretty(&*self.guilds.read())?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}

fn is_snowflake(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn id_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if is_snowflake(s.trim()) => Some(s.trim().to_string()),
        Value::Number(n) if n.is_u64() => Some(n.to_string()),
        _ => None,
    }
}

/// Returns the valid entries and whether anything had to be dropped.
fn parse_store(content: &str) -> (BTreeMap<String, GuildAccess>, bool) {
    let root: Map<String, Value> = match serde_json::from_str::<Value>(content) {
        Ok(Value::Object(map)) => map,
        _ => return (BTreeMap::new(), true),
    };

    let mut dirty = false;
    let mut guilds = BTreeMap::new();
    for (guild_id, entry) in root {
        let Value::Object(entry) = entry else {
            dirty = true;
            continue;
        };
        if !is_snowflake(&guild_id) {
            dirty = true;
            continue;
        }

        let channels: Vec<Value> = match entry.get("allowed_channels") {
            Some(Value::Array(items)) => items.clone(),
            None => Vec::new(),
            Some(_) => {
                dirty = true;
                Vec::new()
            }
        };
        let allowed_channels: Vec<String> = channels.iter().filter_map(id_text).collect();
        dirty |= allowed_channels.len() != channels.len();

        let roles: Vec<Value> = match entry.get("allowed_roles") {
            Some(Value::Array(items)) => items.clone(),
            None => Vec::new(),
            Some(_) => {
                dirty = true;
                Vec::new()
            }
        };
        let allowed_roles: Vec<RoleEntry> = roles
            .iter()
            .filter_map(|role| {
                let id = id_text(role.get("id")?)?;
                let name = role.get("name").and_then(Value::as_str).unwrap_or_default().to_string();
                Some(RoleEntry { id, name })
            })
            .collect();
        dirty |= allowed_roles.len() != roles.len();

        guilds.insert(guild_id, GuildAccess { allowed_channels, allowed_roles });
    }
    (guilds, dirty)
}
