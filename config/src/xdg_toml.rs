//! Load the `[env]` table from `$XDG_CONFIG_HOME/<app>/config.toml`.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::LoadError;

fn config_path(app_name: &str) -> Option<PathBuf> {
    // Honor an explicit XDG_CONFIG_HOME before falling back to the platform dir.
    let base = std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(dirs::config_dir)?;
    let path = base.join(app_name).join("config.toml");
    path.exists().then_some(path)
}

#[derive(serde::Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    env: HashMap<String, String>,
}

/// Returns the `[env]` pairs. Missing file or section yields an empty map.
pub fn load_env_map(app_name: &str) -> Result<HashMap<String, String>, LoadError> {
    let path = match config_path(app_name) {
        Some(p) => p,
        None => return Ok(HashMap::new()),
    };
    let content = std::fs::read_to_string(&path).map_err(LoadError::XdgRead)?;
    let config: ConfigFile = toml::from_str(&content)?;
    Ok(config.env)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn with_xdg_home<R>(dir: &std::path::Path, f: impl FnOnce() -> R) -> R {
        let prev = env::var("XDG_CONFIG_HOME").ok();
        env::set_var("XDG_CONFIG_HOME", dir);
        let out = f();
        match prev {
            Some(p) => env::set_var("XDG_CONFIG_HOME", p),
            None => env::remove_var("XDG_CONFIG_HOME"),
        }
        out
    }

    #[test]
    fn missing_config_returns_empty_map() {
        let map = load_env_map("studio-xdg-test-nonexistent").unwrap();
        assert!(map.is_empty());
    }

    #[test]
    fn reads_env_table() {
        let dir = tempfile::tempdir().unwrap();
        let app = dir.path().join("studio-xdg-test");
        std::fs::create_dir_all(&app).unwrap();
        std::fs::write(app.join("config.toml"), "[env]\nFOO = \"bar\"\n").unwrap();

        let map = with_xdg_home(dir.path(), || load_env_map("studio-xdg-test")).unwrap();
        assert_eq!(map.get("FOO"), Some(&"bar".to_string()));
    }

    #[test]
    fn invalid_toml_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let app = dir.path().join("studio-xdg-bad");
        std::fs::create_dir_all(&app).unwrap();
        std::fs::write(app.join("config.toml"), "not toml [[[\n").unwrap();

        let result = with_xdg_home(dir.path(), || load_env_map("studio-xdg-bad"));
        assert!(matches!(result, Err(LoadError::XdgParse(_))));
    }
}
