//! Configuration for Studio: XDG `config.toml` and project `.env` applied to
//! the process environment with priority **existing env > .env > XDG**, plus
//! typed [`Settings`] read from the environment with documented defaults.

mod dotenv;
mod settings;
mod xdg_toml;

pub use settings::{ProviderSettings, Settings};

use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("read xdg config: {0}")]
    XdgRead(std::io::Error),
    #[error("parse xdg toml: {0}")]
    XdgParse(#[from] toml::de::Error),
    #[error("read .env: {0}")]
    DotenvRead(std::io::Error),
}

/// Loads config from `$XDG_CONFIG_HOME/<app_name>/config.toml` (`[env]`
/// table) and an optional project `.env`, then sets environment variables
/// only for keys that are **not** already set.
///
/// When a key is missing from the process environment, the value comes from
/// `.env` first, then the XDG table.
///
/// * `app_name`: e.g. `"studio"` — used for the XDG path.
/// * `override_dir`: if `Some`, look for `.env` there instead of the current
///   directory.
pub fn load_and_apply(app_name: &str, override_dir: Option<&Path>) -> Result<(), LoadError> {
    let xdg_map = xdg_toml::load_env_map(app_name)?;
    let dotenv_map = dotenv::load_env_map(override_dir).map_err(LoadError::DotenvRead)?;

    let mut keys: std::collections::HashSet<String> = xdg_map.keys().cloned().collect();
    keys.extend(dotenv_map.keys().cloned());

    for key in keys {
        if std::env::var(&key).is_ok() {
            continue; // existing env wins
        }
        if let Some(v) = dotenv_map.get(&key).or_else(|| xdg_map.get(&key)) {
            std::env::set_var(&key, v);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn existing_env_wins() {
        env::set_var("STUDIO_CONFIG_TEST_EXISTING", "from_env");
        let _ = load_and_apply("studio", None);
        assert_eq!(
            env::var("STUDIO_CONFIG_TEST_EXISTING").as_deref(),
            Ok("from_env")
        );
        env::remove_var("STUDIO_CONFIG_TEST_EXISTING");
    }

    #[test]
    fn no_config_files_is_ok() {
        let r = load_and_apply("studio-test-nonexistent-app", None);
        assert!(r.is_ok());
    }

    #[test]
    fn dotenv_applied_when_key_unset() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".env"), "STUDIO_CONFIG_TEST_DOTENV=hello\n").unwrap();
        env::remove_var("STUDIO_CONFIG_TEST_DOTENV");

        load_and_apply("studio-test-nonexistent-app", Some(dir.path())).unwrap();
        let val = env::var("STUDIO_CONFIG_TEST_DOTENV").unwrap();
        env::remove_var("STUDIO_CONFIG_TEST_DOTENV");
        assert_eq!(val, "hello");
    }
}
