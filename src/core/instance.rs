//! Instance identities and the entity snapshots pushed by the backend

use serde::{Deserialize, Serialize};

/// Unique identifier for an instance, as assigned by the backend
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(pub String);

impl InstanceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for InstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for InstanceId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for InstanceId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Per-instance launch settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InstanceSettings {
    #[serde(rename = "ramMB")]
    pub ram_mb: u32,
    pub java_path: String,
    pub resolution_w: u32,
    pub resolution_h: u32,
    pub jvm_args: String,
    pub override_java: bool,
    pub override_ram: bool,
    pub gpu_preference: String,
    pub wrapper_command: String,
}

/// A configured, launchable game environment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    /// Unique identifier
    pub id: InstanceId,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Icon reference as stored by the backend
    #[serde(default)]
    pub icon: String,
    /// Game version this instance runs
    #[serde(default)]
    pub game_version: String,
    /// Modloader family ("vanilla", "fabric", "quilt")
    #[serde(default)]
    pub modloader_type: String,
    #[serde(default)]
    pub modloader_version: String,
    /// Creation timestamp as reported by the backend
    #[serde(default)]
    pub created: String,
    /// Backend install state ("not_installed", "downloading", "ready")
    #[serde(default)]
    pub install_state: String,
    #[serde(default)]
    pub settings: InstanceSettings,
    #[serde(default)]
    pub last_played: String,
    /// Accumulated play time in seconds
    #[serde(default)]
    pub play_time: i64,
}

impl Instance {
    pub fn new(id: impl Into<InstanceId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            icon: String::new(),
            game_version: String::new(),
            modloader_type: "vanilla".to_string(),
            modloader_version: String::new(),
            created: String::new(),
            install_state: "not_installed".to_string(),
            settings: InstanceSettings::default(),
            last_played: String::new(),
            play_time: 0,
        }
    }
}

/// The account a launch runs under
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub uuid: String,
    pub username: String,
    /// Account type ("offline", "elyby", ...)
    #[serde(rename = "type")]
    pub kind: String,
}

impl Account {
    pub fn offline(username: impl Into<String>) -> Self {
        Self {
            uuid: uuid::Uuid::new_v4().to_string(),
            username: username.into(),
            kind: "offline".to_string(),
        }
    }
}

/// The caller-visible list of instances.
///
/// Sync events only ever replace entries that are already listed; the list
/// itself is rebuilt through [`InstanceCache::replace_all`].
#[derive(Debug, Clone, Default)]
pub struct InstanceCache {
    instances: Vec<Instance>,
}

impl InstanceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole list (after a refresh)
    pub fn replace_all(&mut self, instances: Vec<Instance>) {
        self.instances = instances;
    }

    /// Replace the entry with the same id in place.
    ///
    /// Returns `false` when no entry matched; the snapshot is then dropped.
    pub fn apply_snapshot(&mut self, snapshot: Instance) -> bool {
        match self.instances.iter_mut().find(|i| i.id == snapshot.id) {
            Some(slot) => {
                *slot = snapshot;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: &InstanceId) -> Option<&Instance> {
        self.instances.iter().find(|i| &i.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Instance> {
        self.instances.iter()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_deserializes_camel_case() {
        let json = r#"{
            "id": "abc",
            "name": "Survival",
            "gameVersion": "1.20.1",
            "modloaderType": "fabric",
            "modloaderVersion": "0.15.0",
            "created": "2024-01-01T00:00:00Z",
            "installState": "ready",
            "settings": { "ramMB": 4096, "javaPath": "/usr/bin/java", "overrideRam": true },
            "somethingNew": 1
        }"#;

        let inst: Instance = serde_json::from_str(json).unwrap();
        assert_eq!(inst.id, InstanceId::from("abc"));
        assert_eq!(inst.game_version, "1.20.1");
        assert_eq!(inst.install_state, "ready");
        assert_eq!(inst.settings.ram_mb, 4096);
        assert!(inst.settings.override_ram);
        assert!(!inst.settings.override_java);
    }

    #[test]
    fn test_snapshot_keeps_play_metadata() {
        let json = r#"{
            "id": "abc",
            "name": "Survival",
            "icon": "grass.png",
            "gameVersion": "1.20.1",
            "lastPlayed": "2024-03-02T18:30:00Z",
            "playTime": 5400
        }"#;

        let inst: Instance = serde_json::from_str(json).unwrap();
        assert_eq!(inst.icon, "grass.png");
        assert_eq!(inst.last_played, "2024-03-02T18:30:00Z");
        assert_eq!(inst.play_time, 5400);

        let back = serde_json::to_value(&inst).unwrap();
        assert_eq!(back["icon"], "grass.png");
        assert_eq!(back["lastPlayed"], "2024-03-02T18:30:00Z");
        assert_eq!(back["playTime"], 5400);
    }

    #[test]
    fn test_instance_id_serializes_as_string() {
        let id = InstanceId::from("xyz");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"xyz\"");
    }

    #[test]
    fn test_account_type_field() {
        let acct: Account =
            serde_json::from_str(r#"{"uuid":"u1","username":"steve","type":"offline"}"#).unwrap();
        assert_eq!(acct.kind, "offline");
        assert_eq!(acct.username, "steve");
    }


    #[test]
    fn test_cache_apply_snapshot_replaces_in_place() {
        let mut cache = InstanceCache::new();
        cache.replace_all(vec![Instance::new("a", "A"), Instance::new("b", "B")]);

        let mut updated = Instance::new("b", "B");
        updated.install_state = "ready".to_string();
        assert!(cache.apply_snapshot(updated));

        let ids: Vec<&str> = cache.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(cache.get(&"b".into()).unwrap().install_state, "ready");
    }

    #[test]
    fn test_cache_ignores_unknown_snapshot() {
        let mut cache = InstanceCache::new();
        cache.replace_all(vec![Instance::new("a", "A")]);

        assert!(!cache.apply_snapshot(Instance::new("zzz", "Z")));
        assert_eq!(cache.len(), 1);
    }
}
