use anyhow::{Context, Result};
use clap::ValueEnum;
use std::path::Path;

use qemuconf_core::{store::ConfigMap, HostCapabilities, VmHardwareConfig};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum Format {
    #[default]
    Toml,
    Json,
}

impl Format {
    /// JSON for `.json` files, TOML otherwise.
    pub(crate) fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Toml,
        }
    }

    pub(crate) fn deserialize(self, text: &str) -> Result<ConfigMap> {
        Ok(match self {
            Self::Toml => toml::from_str(text)?,
            Self::Json => serde_json::from_str(text)?,
        })
    }

    pub(crate) fn serialize(self, map: &ConfigMap) -> Result<String> {
        Ok(match self {
            Self::Toml => toml::to_string(map)?,
            Self::Json => serde_json::to_string_pretty(map)? + "\n",
        })
    }
}

pub(crate) fn load(path: &Path, host: &HostCapabilities) -> Result<VmHardwareConfig> {
    let text = std::fs::read_to_string(path).with_context(|| format!("Couldn't read profile {}", path.display()))?;
    let map = Format::from_path(path)
        .deserialize(&text)
        .with_context(|| format!("Couldn't parse profile {}", path.display()))?;
    let (config, warnings) = VmHardwareConfig::from_store(&map, host);
    super::report(&warnings);
    Ok(config)
}

pub(crate) fn save(path: &Path, config: &VmHardwareConfig) -> Result<()> {
    let text = Format::from_path(path).serialize(&config.to_store())?;
    std::fs::write(path, text).with_context(|| format!("Couldn't write profile {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use qemuconf_core::store::ConfigValue;

    #[test]
    fn format_follows_extension() {
        assert_eq!(Format::from_path(Path::new("vm.json")), Format::Json);
        assert_eq!(Format::from_path(Path::new("vm.JSON")), Format::Json);
        assert_eq!(Format::from_path(Path::new("vm.toml")), Format::Toml);
        assert_eq!(Format::from_path(Path::new("vm")), Format::Toml);
    }

    #[test]
    fn both_formats_read_their_output() {
        let config = VmHardwareConfig::default();
        for format in [Format::Toml, Format::Json] {
            let text = format.serialize(&config.to_store()).unwrap();
            let map = format.deserialize(&text).unwrap();
            assert_eq!(map.get("memory_mb"), Some(&ConfigValue::Integer(1024)));
            assert_eq!(map.get("smp_passthrough"), Some(&ConfigValue::Bool(false)));
        }
    }
}
