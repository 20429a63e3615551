// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Loading of `gauger.toml` sections.

use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CONFIG_FILE_NAME: &str = "gauger.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    ReadError(PathBuf, String),

    #[error("Failed to parse config file {0}: {1}")]
    ParseError(PathBuf, String),
}

/// Default locations of `gauger.toml`, in lookup order
/// (current directory, user config dir, /etc).
pub fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(CONFIG_FILE_NAME)];
    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("gauger").join(CONFIG_FILE_NAME));
    }
    paths.push(PathBuf::from("/etc/gauger").join(CONFIG_FILE_NAME));
    paths
}

/// Deserialize section `key` of TOML `content`, read from `path`.
///
/// `Ok(None)` means the section is absent.
fn parse_section<T: DeserializeOwned>(
    path: &Path,
    content: &str,
    key: &str,
) -> Result<Option<T>, ConfigError> {
    let parse_err =
        |e: &dyn std::fmt::Display| ConfigError::ParseError(path.to_path_buf(), e.to_string());

    let table: toml::Table = toml::from_str(content).map_err(|e| parse_err(&e))?;
    let Some(section) = table.get(key) else {
        return Ok(None);
    };

    // Round-trip through text so serde defaults apply to missing keys.
    let section_toml = toml::to_string(section).map_err(|e| parse_err(&e))?;
    let cfg = toml::from_str::<T>(&section_toml).map_err(|e| parse_err(&e))?;
    Ok(Some(cfg))
}

fn load_section_from_file<T: DeserializeOwned>(
    path: &Path,
    key: &str,
) -> Result<Option<T>, ConfigError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::ReadError(path.to_path_buf(), e.to_string()))?;
    parse_section(path, &content, key)
}

/// A configuration type stored as one `[section]` of `gauger.toml`.
pub trait ConfigFile: Sized + Default + DeserializeOwned {
    /// Section key, e.g. `"gauger-server"`.
    fn section_key() -> &'static str;

    /// Parse the section out of an in-memory TOML document.
    fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let origin = Path::new("<inline>");
        parse_section::<Self>(origin, content, Self::section_key())?
            .ok_or_else(|| missing_section::<Self>(origin))
    }

    /// Load the section from a specific file. A file without the section
    /// is an error.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        load_section_from_file::<Self>(path, Self::section_key())?
            .ok_or_else(|| missing_section::<Self>(path))
    }

    /// Load the first default-path file that carries the section.
    ///
    /// Returns `(Default::default(), None)` when none does.
    fn load_from_default_paths() -> Result<(Self, Option<PathBuf>), ConfigError> {
        Self::load_from_paths(&config_search_paths())
    }

    fn load_from_paths(paths: &[PathBuf]) -> Result<(Self, Option<PathBuf>), ConfigError> {
        for path in paths {
            if path.exists() {
                if let Some(cfg) = load_section_from_file::<Self>(path, Self::section_key())? {
                    return Ok((cfg, Some(path.clone())));
                }
            }
        }
        Ok((Self::default(), None))
    }

    /// Explicit path if given, default search otherwise.
    fn load(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>), ConfigError> {
        match explicit {
            Some(path) => Ok((Self::load_from_file(path)?, Some(path.to_path_buf()))),
            None => Self::load_from_default_paths(),
        }
    }
}

fn missing_section<T: ConfigFile>(path: &Path) -> ConfigError {
    ConfigError::ParseError(
        path.to_path_buf(),
        format!("missing [{}] section", T::section_key()),
    )
}
