use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub data: DataConfig,
    pub schema: Schema,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DataConfig {
    pub coverage: PathBuf,
    pub boundaries: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            coverage: PathBuf::from("data/coverage.geojson"),
            boundaries: PathBuf::from("data/boundaries.geojson"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub listen: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:3000".to_string(),
        }
    }
}

/// Attribute names looked up on dataset features, first match wins.
///
/// Names are compared after [`normalize_field_name`], so `"Network Provider"`
/// in a file matches `network_provider` here.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Schema {
    pub generation_fields: Vec<String>,
    pub site_id_fields: Vec<String>,
    pub operator_fields: Vec<String>,
    pub boundary_name_fields: Vec<String>,
    pub boundary_code_fields: Vec<String>,
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl Default for Schema {
    fn default() -> Self {
        Self {
            generation_fields: names(&["generation", "technology", "network", "tech", "radio"]),
            site_id_fields: names(&["site_id", "site", "id"]),
            operator_fields: names(&["operator", "network_provider", "provider"]),
            boundary_name_fields: names(&["name", "state", "admin1name", "name_1", "statename"]),
            boundary_code_fields: names(&[
                "code",
                "admin1pcode",
                "iso_code",
                "hasc_1",
                "statecode",
            ]),
        }
    }
}

/// Column/property name normalization: trimmed, spaces to underscores,
/// lowercased.
pub fn normalize_field_name(name: &str) -> String {
    name.trim().replace(' ', "_").to_lowercase()
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read config file")?;
        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_field_name() {
        assert_eq!(normalize_field_name(" Network Provider "), "network_provider");
        assert_eq!(normalize_field_name("LATITUDE"), "latitude");
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [data]
            coverage = "/srv/coverage.geojson"

            [schema]
            boundary_name_fields = ["statename"]
            "#,
        )
        .unwrap();

        assert_eq!(config.data.coverage, PathBuf::from("/srv/coverage.geojson"));
        assert_eq!(config.data.boundaries, PathBuf::from("data/boundaries.geojson"));
        assert_eq!(config.schema.boundary_name_fields, vec!["statename"]);
        assert!(config.schema.generation_fields.contains(&"technology".to_string()));
        assert_eq!(config.server.listen, "0.0.0.0:3000");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("netcover.toml");
        fs::write(&path, "[server]\nlisten = \"127.0.0.1:8080\"\n").unwrap();

        let config = Config::load_from_file(&path).unwrap();
        assert_eq!(config.server.listen, "127.0.0.1:8080");
        assert!(Config::load_from_file(dir.path().join("missing.toml")).is_err());
    }
}
