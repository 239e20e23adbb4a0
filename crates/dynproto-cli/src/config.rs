//! # CLI Configuration
//!
//! An optional YAML file names the path mappings and the schema files to
//! load at start-up, plus the marshaling options:
//!
//! ```yaml
//! paths:
//!   - virtual: proto
//!     real: /srv/schemas
//! schemas:
//!   - proto/shop/order.proto
//! marshal:
//!   enums_as_names: true
//! ```
//!
//! `--map VIRTUAL=REAL` and `--proto FILE` on the command line append to
//! whatever the file declares.

use std::path::Path;

use anyhow::{bail, Context};
use dynproto_marshal::{MarshalConfig, ProtoHost};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One virtual-prefix mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PathEntry {
    #[serde(rename = "virtual")]
    pub virtual_prefix: String,
    pub real: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CliConfig {
    pub paths: Vec<PathEntry>,
    pub schemas: Vec<String>,
    pub marshal: MarshalConfig,
}

impl CliConfig {
    /// Read a configuration file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path).with_context(|| format!("reading config {}", path.display()))?;
        Self::from_yaml(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn from_yaml(text: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Append `--map` and `--proto` flags.
    pub fn extend(&mut self, maps: &[String], protos: &[String]) -> anyhow::Result<()> {
        for map in maps {
            self.paths.push(parse_mapping(map)?);
        }
        self.schemas.extend(protos.iter().cloned());
        Ok(())
    }

    /// A host with every mapping registered and every schema parsed.
    pub fn build_host(&self) -> anyhow::Result<ProtoHost> {
        let host = ProtoHost::new(self.marshal.clone());
        for entry in &self.paths {
            host.map_path(&entry.virtual_prefix, &entry.real);
        }
        for schema in &self.schemas {
            host.try_parse(schema).with_context(|| format!("loading schema {schema}"))?;
            debug!(file = schema.as_str(), "schema loaded");
        }
        Ok(host)
    }
}

/// Split a `VIRTUAL=REAL` flag.
pub fn parse_mapping(flag: &str) -> anyhow::Result<PathEntry> {
    match flag.split_once('=') {
        Some((virtual_prefix, real)) if !real.is_empty() => {
            Ok(PathEntry { virtual_prefix: virtual_prefix.to_string(), real: real.to_string() })
        }
        _ => bail!("invalid mapping '{flag}': expected VIRTUAL=REAL"),
    }
}
