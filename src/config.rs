#![forbid(unsafe_code)]

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::{
    collections::{BTreeMap, HashMap},
    env, fs,
    path::{Path, PathBuf},
};

pub const DEFAULT_ENV_PATH: &str = ".env";
pub const DEFAULT_CREATORS_PATH: &str = "creators.toml";
pub const DEFAULT_DATA_DIR: &str = "data";

pub const SUPABASE_URL_VAR: &str = "SUPABASE_URL";
pub const SUPABASE_KEY_VAR: &str = "SUPABASE_KEY";

/// Endpoint and key for one Supabase-compatible project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreCredentials {
    pub url: String,
    pub key: String,
}

/// Command-line values that take precedence over the environment and the
/// `.env` file when resolving store credentials.
#[derive(Debug, Clone, Default)]
pub struct StoreOverrides {
    pub url: Option<String>,
    pub key: Option<String>,
    pub env_path: Option<PathBuf>,
}

/// Resolves the default store credentials or fails with a message naming the
/// variables. Commands that cannot run without the store call this at startup.
pub fn resolve_store_credentials(overrides: StoreOverrides) -> Result<StoreCredentials> {
    let env_path = overrides
        .env_path
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_ENV_PATH));
    match maybe_store_credentials(overrides)? {
        Some(credentials) => Ok(credentials),
        None => bail!(
            "{} and {} must be set; export them or add them to {}",
            SUPABASE_URL_VAR,
            SUPABASE_KEY_VAR,
            env_path.display()
        ),
    }
}

/// Like `resolve_store_credentials` but treats missing values as `None` so
/// callers can skip store work instead of aborting.
pub fn maybe_store_credentials(overrides: StoreOverrides) -> Result<Option<StoreCredentials>> {
    let env_path = overrides
        .env_path
        .as_deref()
        .unwrap_or_else(|| Path::new(DEFAULT_ENV_PATH));
    let file_vars = read_env_file(env_path)?;
    Ok(build_store_credentials(&file_vars, env_var_string, overrides))
}

fn build_store_credentials(
    file_vars: &HashMap<String, String>,
    env_lookup: impl Fn(&str) -> Option<String>,
    overrides: StoreOverrides,
) -> Option<StoreCredentials> {
    let url = overrides
        .url
        .and_then(non_blank)
        .or_else(|| lookup_value(SUPABASE_URL_VAR, file_vars, &env_lookup))?;
    let key = overrides
        .key
        .and_then(non_blank)
        .or_else(|| lookup_value(SUPABASE_KEY_VAR, file_vars, &env_lookup))?;
    Some(StoreCredentials { url, key })
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn env_var_string(key: &str) -> Option<String> {
    env::var(key).ok().and_then(non_blank)
}

fn lookup_value(
    key: &str,
    file_vars: &HashMap<String, String>,
    env_lookup: &impl Fn(&str) -> Option<String>,
) -> Option<String> {
    env_lookup(key).or_else(|| file_vars.get(key).cloned())
}

pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>> {
    let mut vars = HashMap::new();
    if !path.exists() {
        return Ok(vars);
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let line = trimmed.strip_prefix("export ").unwrap_or(trimmed);
        let Some((key, value_raw)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        vars.insert(key.to_string(), strip_quotes(value_raw.trim()).to_string());
    }
    Ok(vars)
}

fn strip_quotes(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .or_else(|| {
            value
                .strip_prefix('\'')
                .and_then(|inner| inner.strip_suffix('\''))
        })
        .unwrap_or(value)
}

/// One creator entry from `creators.toml`. Keys in the file are stable slugs;
/// the display name is carried as data so renaming a creator never orphans
/// their table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreatorConfig {
    pub display_name: String,
    pub table: String,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub supabase_url: Option<String>,
    #[serde(default)]
    pub supabase_key: Option<String>,
}

impl CreatorConfig {
    /// Effective credentials for this creator. The per-creator override only
    /// applies when both halves are non-empty; otherwise the default project
    /// credentials are used. `None` means the creator is not configured for
    /// uploads and must be skipped.
    pub fn credentials(&self, default: Option<&StoreCredentials>) -> Option<StoreCredentials> {
        let url = self.supabase_url.as_deref().map(str::trim).unwrap_or("");
        let key = self.supabase_key.as_deref().map(str::trim).unwrap_or("");
        if !url.is_empty() && !key.is_empty() {
            return Some(StoreCredentials {
                url: url.to_string(),
                key: key.to_string(),
            });
        }
        default.cloned()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreatorRegistry {
    #[serde(default)]
    creators: BTreeMap<String, CreatorConfig>,
}

impl CreatorRegistry {
    /// Loads the registry, treating a missing file as an empty registry so
    /// CSV-only workflows need no configuration at all.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw =
            fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("Parsing {}", path.display()))
    }

    pub fn get(&self, slug: &str) -> Option<&CreatorConfig> {
        self.creators.get(slug)
    }

    /// Finds the creator whose table matches a dataset file stem, if any.
    pub fn by_table(&self, table: &str) -> Option<&CreatorConfig> {
        self.creators.values().find(|creator| creator.table == table)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &CreatorConfig)> {
        self.creators.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.creators.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn make_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", contents).unwrap();
        file
    }

    fn credentials_from(contents: &str) -> Option<StoreCredentials> {
        let cfg = make_config(contents);
        let vars = read_env_file(cfg.path()).unwrap();
        build_store_credentials(&vars, |_| None, StoreOverrides::default())
    }

    #[test]
    fn credentials_read_from_file() {
        let credentials =
            credentials_from("SUPABASE_URL=\"https://proj.supabase.co\"\nSUPABASE_KEY=\"svc\"\n")
                .unwrap();
        assert_eq!(credentials.url, "https://proj.supabase.co");
        assert_eq!(credentials.key, "svc");
    }

    #[test]
    fn credentials_missing_key_resolves_to_none() {
        assert!(credentials_from("SUPABASE_URL=\"https://proj.supabase.co\"\n").is_none());
        assert!(credentials_from("").is_none());
    }

    #[test]
    fn credentials_prefer_env_over_file() {
        let cfg = make_config("SUPABASE_URL=\"https://file\"\nSUPABASE_KEY=\"file-key\"\n");
        let vars = read_env_file(cfg.path()).unwrap();
        let credentials = build_store_credentials(
            &vars,
            |key| {
                if key == SUPABASE_URL_VAR {
                    Some("https://env".to_string())
                } else {
                    None
                }
            },
            StoreOverrides::default(),
        )
        .unwrap();
        assert_eq!(credentials.url, "https://env");
        assert_eq!(credentials.key, "file-key");
    }

    #[test]
    fn credentials_override_precedence() {
        let mut vars = HashMap::new();
        vars.insert(SUPABASE_URL_VAR.to_string(), "https://file".to_string());
        vars.insert(SUPABASE_KEY_VAR.to_string(), "file-key".to_string());

        let credentials = build_store_credentials(
            &vars,
            |key| {
                if key == SUPABASE_KEY_VAR {
                    Some("env-key".to_string())
                } else {
                    None
                }
            },
            StoreOverrides {
                url: Some("https://override".to_string()),
                key: None,
                env_path: None,
            },
        )
        .unwrap();
        assert_eq!(credentials.url, "https://override");
        assert_eq!(credentials.key, "env-key");
    }

    #[test]
    fn credentials_blank_override_ignored() {
        let mut vars = HashMap::new();
        vars.insert(SUPABASE_URL_VAR.to_string(), "https://file".to_string());
        vars.insert(SUPABASE_KEY_VAR.to_string(), "file-key".to_string());

        let credentials = build_store_credentials(
            &vars,
            |_| None,
            StoreOverrides {
                url: Some("   ".to_string()),
                key: None,
                env_path: None,
            },
        )
        .unwrap();
        assert_eq!(credentials.url, "https://file");
    }

    #[test]
    fn resolve_store_credentials_names_both_variables() {
        let dir = tempfile::tempdir().unwrap();
        let overrides = StoreOverrides {
            url: None,
            key: None,
            env_path: Some(dir.path().join("missing.env")),
        };
        let err = match resolve_store_credentials(overrides) {
            Ok(_) => panic!("expected missing credentials to fail"),
            Err(err) => err.to_string(),
        };
        assert!(err.contains(SUPABASE_URL_VAR));
        assert!(err.contains(SUPABASE_KEY_VAR));
    }

    #[test]
    fn read_env_file_handles_export_and_quotes() {
        let cfg = make_config(
            r#"
            export SUPABASE_URL="https://proj.supabase.co"
            SUPABASE_KEY='secret'
            SPACED =  "kept"
            BARE=plain
            # comment
            INVALID_LINE
            "#,
        );
        let vars = read_env_file(cfg.path()).unwrap();
        assert_eq!(vars.get("SUPABASE_URL").unwrap(), "https://proj.supabase.co");
        assert_eq!(vars.get("SUPABASE_KEY").unwrap(), "secret");
        assert_eq!(vars.get("SPACED").unwrap(), "kept");
        assert_eq!(vars.get("BARE").unwrap(), "plain");
        assert!(!vars.contains_key("INVALID_LINE"));
    }

    #[test]
    fn read_env_file_missing_file_returns_empty() {
        let dir = tempfile::tempdir().unwrap();
        let vars = read_env_file(&dir.path().join("missing.env")).unwrap();
        assert!(vars.is_empty());
    }

    const REGISTRY: &str = r#"
[creators.mkbhd]
display_name = "Marques Brownlee"
channel = "https://www.youtube.com/@mkbhd"
table = "mkbhd_videos"
supabase_url = "https://mkbhd.supabase.co"
supabase_key = "mkbhd-key"

[creators.ijustine]
display_name = "Justine Ezarik"
table = "justine_videos"
supabase_url = ""
supabase_key = ""
"#;

    fn registry() -> CreatorRegistry {
        toml::from_str(REGISTRY).unwrap()
    }

    #[test]
    fn registry_parses_slug_keyed_entries() {
        let registry = registry();
        let creator = registry.get("mkbhd").unwrap();
        assert_eq!(creator.display_name, "Marques Brownlee");
        assert_eq!(creator.table, "mkbhd_videos");
        assert_eq!(creator.channel.as_deref(), Some("https://www.youtube.com/@mkbhd"));
        assert!(registry.get("nobody").is_none());
    }

    #[test]
    fn registry_finds_creator_by_table() {
        let registry = registry();
        let creator = registry.by_table("justine_videos").unwrap();
        assert_eq!(creator.display_name, "Justine Ezarik");
        assert!(registry.by_table("unknown_videos").is_none());
    }

    #[test]
    fn creator_override_credentials_win() {
        let registry = registry();
        let default = StoreCredentials {
            url: "https://default".to_string(),
            key: "default-key".to_string(),
        };
        let credentials = registry
            .get("mkbhd")
            .unwrap()
            .credentials(Some(&default))
            .unwrap();
        assert_eq!(credentials.url, "https://mkbhd.supabase.co");
        assert_eq!(credentials.key, "mkbhd-key");
    }

    #[test]
    fn creator_empty_override_falls_back_to_default() {
        let registry = registry();
        let default = StoreCredentials {
            url: "https://default".to_string(),
            key: "default-key".to_string(),
        };
        let credentials = registry
            .get("ijustine")
            .unwrap()
            .credentials(Some(&default))
            .unwrap();
        assert_eq!(credentials.url, "https://default");
    }

    #[test]
    fn creator_without_any_credentials_is_unconfigured() {
        let registry = registry();
        assert!(registry.get("ijustine").unwrap().credentials(None).is_none());
    }

    #[test]
    fn registry_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let registry = CreatorRegistry::load(&dir.path().join("creators.toml")).unwrap();
        assert!(registry.is_empty());
    }
}
