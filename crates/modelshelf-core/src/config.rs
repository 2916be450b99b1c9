//! Library configuration that callers can serialize/deserialize.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Keep models on disk between borrows (shadow files for modified members).
    pub on_disk: bool,

    /// Directory for shadow files. When unset a private temporary directory is
    /// created and removed with the library.
    pub temp_directory: Option<String>,

    /// Only keep members with one of these exposure types (case-insensitive).
    pub asn_exptypes: Option<Vec<String>>,

    /// Only keep the first N members (applied after `asn_exptypes`).
    pub asn_n_members: Option<usize>,
}

impl LibraryConfig {
    /// Create a config from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `MODELSHELF_ON_DISK`: `1`/`true`/`yes` enables the on-disk store
    /// - `MODELSHELF_TEMP_DIR`: shadow file directory
    /// - `MODELSHELF_ASN_EXPTYPES`: comma separated exposure types
    /// - `MODELSHELF_ASN_N_MEMBERS`: member limit
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(s) = std::env::var("MODELSHELF_ON_DISK") {
            if let Some(v) = parse_flag(&s) {
                cfg.on_disk = v;
            }
        }

        if let Ok(s) = std::env::var("MODELSHELF_TEMP_DIR") {
            if !s.trim().is_empty() {
                cfg.temp_directory = Some(s);
            }
        }

        if let Ok(s) = std::env::var("MODELSHELF_ASN_EXPTYPES") {
            let types = split_exptypes(&s);
            if !types.is_empty() {
                cfg.asn_exptypes = Some(types);
            }
        }

        if let Ok(s) = std::env::var("MODELSHELF_ASN_N_MEMBERS") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.asn_n_members = Some(v);
            }
        }

        cfg
    }

    /// Parse a YAML document; missing keys keep their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let mut cfg = Self::default();
        cfg.merge(&ConfigOverlay::from_yaml_str(yaml)?);
        Ok(cfg)
    }

    /// Overlay every key that `overlay` sets explicitly onto `self`.
    pub fn merge(&mut self, overlay: &ConfigOverlay) {
        if let Some(on_disk) = overlay.on_disk {
            self.on_disk = on_disk;
        }
        if overlay.temp_directory.is_some() {
            self.temp_directory = overlay.temp_directory.clone();
        }
        if overlay.asn_exptypes.is_some() {
            self.asn_exptypes = overlay.asn_exptypes.clone();
        }
        if overlay.asn_n_members.is_some() {
            self.asn_n_members = overlay.asn_n_members;
        }
    }
}

/// One configuration layer (a YAML file). Absent keys leave the layer below
/// untouched; present keys win, including `on_disk: false`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigOverlay {
    pub on_disk: Option<bool>,
    pub temp_directory: Option<String>,
    pub asn_exptypes: Option<Vec<String>>,
    pub asn_n_members: Option<usize>,
}

impl ConfigOverlay {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| Error::Config(format!("yaml: {e}")))
    }
}

fn parse_flag(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn split_exptypes(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}
