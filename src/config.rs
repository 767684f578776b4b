use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use anyhow::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Internal storage roots scanned on every refresh.
    #[serde(default)]
    pub storage_roots: Vec<String>,
    /// Also scan mounted volumes that carry a DCIM folder.
    #[serde(default = "default_true")]
    pub detect_removable_storage: bool,
    /// Locations that refuse direct file creation and go through the broker.
    #[serde(default)]
    pub brokered_roots: Vec<String>,
    /// Storage tree path -> grant token handed out by the broker.
    #[serde(default)]
    pub access_grants: BTreeMap<String, String>,
    #[serde(default)]
    pub show_hidden_folders: bool,
    #[serde(default)]
    pub excluded_folders: Vec<String>,
    #[serde(default = "default_true")]
    pub animate_gifs: bool,
    #[serde(default = "default_broker_timeout")]
    pub broker_timeout_secs: u64,
    #[serde(default = "default_watch_list_path")]
    pub watch_list_path: String,
}

fn default_true() -> bool {
    true
}

fn default_broker_timeout() -> u64 {
    30
}

fn default_watch_list_path() -> String {
    get_default_watch_list_path().unwrap_or_else(|_| String::from("~/.gallery-pipeline/watch_list.db"))
}

impl Default for Config {
    fn default() -> Self {
        let storage_roots = dirs::picture_dir()
            .map(|p| vec![p.to_string_lossy().to_string()])
            .unwrap_or_default();

        Self {
            storage_roots,
            detect_removable_storage: true,
            brokered_roots: Vec::new(),
            access_grants: BTreeMap::new(),
            show_hidden_folders: false,
            excluded_folders: Vec::new(),
            animate_gifs: true,
            broker_timeout_secs: default_broker_timeout(),
            watch_list_path: default_watch_list_path(),
        }
    }
}

impl Config {
    /// Load config directly from a file, writing the defaults if it is missing.
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            let contents = fs::read_to_string(config_path)?;
            let config: Config = toml::from_str(&contents)?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(config_path)?;
            Ok(config)
        }
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let toml_string = toml::to_string_pretty(self)?;
        fs::write(config_path, toml_string)?;
        Ok(())
    }

    pub fn add_storage_root(&mut self, root: String) -> bool {
        if self.storage_roots.contains(&root) {
            return false;
        }
        self.storage_roots.push(root);
        true
    }

    /// Records a grant obtained out of band for a storage tree.
    pub fn set_access_grant(&mut self, tree: String, token: String) {
        self.access_grants.insert(tree, token);
    }

    pub fn broker_timeout(&self) -> Duration {
        Duration::from_secs(self.broker_timeout_secs)
    }

    pub fn excluded_paths(&self) -> Vec<PathBuf> {
        self.excluded_folders.iter().map(PathBuf::from).collect()
    }
}

pub fn get_config_path() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| anyhow::anyhow!("Cannot find home directory"))?;
    Ok(home.join(".gallery-pipeline").join("config.toml"))
}

pub fn get_default_watch_list_path() -> Result<String> {
    let home = dirs::home_dir()
        .ok_or_else(|| anyhow::anyhow!("Cannot find home directory"))?;
    Ok(home
        .join(".gallery-pipeline")
        .join("watch_list.db")
        .to_string_lossy()
        .to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let config: Config = toml::from_str(
            r#"
            storage_roots = ["/storage/emulated/0"]
            watch_list_path = "/tmp/watch.db"
            "#,
        )
        .unwrap();

        assert_eq!(config.storage_roots, vec!["/storage/emulated/0".to_string()]);
        assert!(config.detect_removable_storage);
        assert!(config.animate_gifs);
        assert!(!config.show_hidden_folders);
        assert_eq!(config.broker_timeout(), Duration::from_secs(30));
        assert!(config.access_grants.is_empty());
    }

    #[test]
    fn load_from_writes_defaults_then_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::load_from(&path).unwrap();
        assert!(path.exists());

        config.storage_roots.clear();
        assert!(config.add_storage_root("/storage/emulated/0".into()));
        assert!(!config.add_storage_root("/storage/emulated/0".into()));
        config.set_access_grant("/storage/1234-ABCD".into(), "grant-1".into());
        config.animate_gifs = false;
        config.save_to(&path).unwrap();

        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded.storage_roots, vec!["/storage/emulated/0".to_string()]);
        assert_eq!(
            reloaded.access_grants.get("/storage/1234-ABCD").map(String::as_str),
            Some("grant-1")
        );
        assert!(!reloaded.animate_gifs);
    }
}
