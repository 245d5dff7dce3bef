//! Conversion between [`VmHardwareConfig`] and the flat key/value mapping kept by a config store.

use std::{collections::BTreeMap, fmt, num::NonZeroU32};

use derive_more::From;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

use crate::{
    cmdline::split_command_line,
    config::{EntrySource, Field, VmHardwareConfig},
    data::*,
    error::{Warning, WarningKind},
    host::HostCapabilities,
    parse::capture_extras,
};

#[derive(From, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Bool(bool),
    Integer(i64),
    String(String),
    List(Vec<String>),
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(value) => write!(f, "{value}"),
            Self::Integer(value) => write!(f, "{value}"),
            Self::String(value) => f.write_str(value),
            Self::List(values) => write!(f, "[{}]", values.join(", ")),
        }
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl ConfigValue {
    fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            Self::Integer(0) => Some(false),
            Self::Integer(1) => Some(true),
            Self::Integer(_) | Self::List(_) => None,
            Self::String(value) => match value.trim().to_ascii_lowercase().as_str() {
                "true" | "on" | "yes" => Some(true),
                "false" | "off" | "no" => Some(false),
                _ => None,
            },
        }
    }
    fn as_count(&self) -> Option<NonZeroU32> {
        match self {
            Self::Integer(value) => u32::try_from(*value).ok().and_then(NonZeroU32::new),
            Self::String(value) => parse_count(value),
            Self::Bool(_) | Self::List(_) => None,
        }
    }
    fn as_text(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }
}

pub type ConfigMap = BTreeMap<String, ConfigValue>;

struct StoreReader<'a> {
    map: &'a ConfigMap,
    config: VmHardwareConfig,
    warnings: Vec<Warning>,
}

impl<'a> StoreReader<'a> {
    fn get(&mut self, field: Field) -> Option<&'a ConfigValue> {
        let value = self.lookup(field)?;
        self.config.mark(field, EntrySource::UserSet);
        Some(value)
    }

    // Prefers the canonical key over a legacy alias.
    fn lookup(&self, field: Field) -> Option<&'a ConfigValue> {
        let map = self.map;
        map.get(field.as_ref()).or_else(|| match field {
            Field::CpuModel => map.get("cpu"),
            Field::VcpuCount => map.get("smp_cpus"),
            _ => None,
        })
    }

    fn read<T>(&mut self, field: Field, expected: &'static str, convert: impl FnOnce(&ConfigValue) -> Option<T>) -> Option<T> {
        let value = self.get(field)?;
        let converted = convert(value);
        if converted.is_none() {
            let raw = value.to_string();
            self.warnings.push(Warning::new(field, raw, WarningKind::Malformed(expected)));
        }
        converted
    }

    fn bool(&mut self, field: Field) -> Option<bool> {
        self.read(field, "a boolean", ConfigValue::as_bool)
    }
    fn count(&mut self, field: Field) -> Option<NonZeroU32> {
        self.read(field, "a positive integer", ConfigValue::as_count)
    }
    fn text(&mut self, field: Field) -> Option<String> {
        self.read(field, "a string", |value| value.as_text().map(str::to_string))
    }
}

impl VmHardwareConfig {
    /// Builds a configuration from a stored mapping. Absent keys take their defaults, ill-typed
    /// values fall back to the default with a warning, and unknown keys are carried along untouched.
    pub fn from_store(map: &ConfigMap, host: &HostCapabilities) -> (Self, Vec<Warning>) {
        let mut reader = StoreReader {
            map,
            config: Self::default(),
            warnings: Vec::new(),
        };

        if let Some(model) = reader.text(Field::CpuModel) {
            reader.config.cpu_model = CpuModel::new(&model);
        }
        if let Some(machine) = reader.get(Field::MachineType).cloned() {
            let raw = machine.to_string();
            match raw.parse() {
                Ok(machine_type) => reader.config.machine_type = machine_type,
                Err(_) => reader.warnings.push(Warning::new(
                    Field::MachineType,
                    raw,
                    WarningKind::UnknownMachineType(MachineType::default()),
                )),
            }
        }
        if let Some(memory) = reader.read(Field::MemoryMb, "a memory size", |value| match value {
            ConfigValue::String(text) => text.parse().ok(),
            value => value.as_count().map(MemoryMb::from),
        }) {
            reader.config.memory = memory;
        }
        if let Some(kvm) = reader.bool(Field::KvmAcceleration) {
            reader.config.kvm_acceleration = kvm;
        }
        if let Some(mitigations) = reader.bool(Field::CpuMitigations) {
            reader.config.cpu_mitigations = mitigations;
        }

        reader.config.smp = read_smp(&mut reader, host);

        if let Some(usb) = reader.bool(Field::EnableUsb) {
            reader.config.misc.usb = usb;
        }
        if let Some(rtc) = reader.bool(Field::EnableRtc) {
            reader.config.misc.rtc_localtime = rtc;
        }
        if let Some(nodefaults) = reader.bool(Field::DisableNodefaults) {
            reader.config.misc.nodefaults = nodefaults;
        }
        reader.config.misc.bios = reader.text(Field::BiosPath).filter(|bios| !bios.trim().is_empty());
        if let Some(boot) = reader.text(Field::BootOrder) {
            match boot.parse::<BootOrder>() {
                Ok(order) => reader.config.misc.boot = Some(order).filter(|order| !order.is_empty()),
                Err(_) => reader
                    .warnings
                    .push(Warning::new(Field::BootOrder, boot, WarningKind::UnsupportedSubOption)),
            }
        }
        reader.config.executable = reader.text(Field::Executable).filter(|exe| !exe.is_empty());
        if let Some(extra_args) = reader.read(Field::ExtraArgs, "a list of command-line options", read_extra_args) {
            reader.config.extra_args = extra_args;
        }

        let StoreReader {
            map,
            mut config,
            warnings,
        } = reader;
        config.store_extras = map
            .iter()
            .filter(|(key, _)| key.parse::<Field>().is_err())
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        log::debug!(
            "Loaded configuration from store ({} unknown keys, {} warnings)",
            config.store_extras.len(),
            warnings.len()
        );
        (config, warnings)
    }

    /// Every recognized key with its current value, followed by the unknown keys read earlier.
    pub fn to_store(&self) -> ConfigMap {
        let mut map = self.store_extras.clone();
        map.extend(Field::iter().map(|field| (field.to_string(), self.value(field))));
        map
    }
}

/// Each list entry holds the tokens of one option. A plain string is read as a whole command line.
fn read_extra_args(value: &ConfigValue) -> Option<ExtraArgs> {
    let groups: Vec<&str> = match value {
        ConfigValue::String(cmdline) => vec![cmdline.as_str()],
        ConfigValue::List(groups) => groups.iter().map(String::as_str).collect(),
        ConfigValue::Bool(_) | ConfigValue::Integer(_) => return None,
    };
    let mut extra_args = ExtraArgs::default();
    for group in groups {
        let tokens = split_command_line(group).ok()?;
        capture_extras(&tokens, &mut extra_args);
    }
    Some(extra_args)
}

fn read_smp(reader: &mut StoreReader<'_>, host: &HostCapabilities) -> Smp {
    let vcpus = reader.count(Field::VcpuCount);
    let manual = reader.count(Field::ManualVcpuCount);
    let sockets = reader.count(Field::SmpSockets);
    let cores = reader.count(Field::SmpCores);
    let threads = reader.count(Field::SmpThreads);
    let passthrough = reader.bool(Field::SmpPassthrough).unwrap_or(false);
    let topology_enabled = reader.bool(Field::TopologyEnabled).unwrap_or(false);

    let one = non_zero(1);
    let (sockets, cores, threads) = (sockets.unwrap_or(one), cores.unwrap_or(one), threads.unwrap_or(one));
    let topology = Topology::new(sockets, cores, threads);
    if topology.is_none() {
        reader.warnings.push(Warning::new(
            Field::SmpSockets,
            format!("{sockets}x{cores}x{threads}"),
            WarningKind::TopologyOverflow,
        ));
    }
    let topology = topology.unwrap_or_default();

    if passthrough && topology_enabled {
        reader
            .warnings
            .push(Warning::new(Field::TopologyEnabled, "true", WarningKind::ConflictingCpuModes));
    }

    // A stored passthrough count was derived from the host, the chosen count is kept separately.
    let explicit = if passthrough { manual.or(vcpus) } else { vcpus.or(manual) }.unwrap_or(DEFAULT_VCPUS);
    let mut smp = Smp::fixed(explicit);
    smp.set_topology_retained(topology);

    if passthrough {
        smp.enable_passthrough(host.passthrough_vcpus());
    } else if topology_enabled {
        if let Some(total) = vcpus.filter(|total| *total != topology.vcpus()) {
            reader.warnings.push(Warning::new(
                Field::VcpuCount,
                total.to_string(),
                WarningKind::TopologyMismatch {
                    total: total.get(),
                    product: topology.vcpus().get(),
                },
            ));
        }
        smp.enable_topology();
    }
    smp
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::non_zero;

    fn host(cpus: usize) -> HostCapabilities {
        HostCapabilities::from_count(cpus, vec![])
    }

    fn map(pairs: &[(&str, ConfigValue)]) -> ConfigMap {
        pairs.iter().map(|(key, value)| (key.to_string(), value.clone())).collect()
    }

    #[test]
    fn empty_store_gives_defaults() {
        let (config, warnings) = VmHardwareConfig::from_store(&ConfigMap::new(), &host(8));
        assert!(warnings.is_empty());
        assert!(config.same_settings(&VmHardwareConfig::default()));
        assert!(config.entries().iter().all(|entry| entry.source == EntrySource::Default));
    }

    #[test]
    fn legacy_keys_and_coercion() {
        let store = map(&[
            ("cpu", "host".into()),
            ("smp_cpus", 6i64.into()),
            ("memory_mb", "2048".into()),
            ("kvm_acceleration", "on".into()),
            ("machine_type", "q35".into()),
        ]);
        let (config, warnings) = VmHardwareConfig::from_store(&store, &host(8));
        assert!(warnings.is_empty(), "{warnings:?}");
        assert_eq!(config.cpu_model().as_str(), "host");
        assert_eq!(config.vcpu_count(), 6);
        assert_eq!(config.memory_mb(), 2048);
        assert!(config.kvm_acceleration());
        assert_eq!(config.machine_type(), MachineType::Q35);
        assert_eq!(config.source(Field::CpuModel), EntrySource::UserSet);
        assert_eq!(config.source(Field::CpuMitigations), EntrySource::Default);
    }

    #[test]
    fn bad_values_fall_back_with_warnings() {
        let store = map(&[
            ("memory_mb", "abc".into()),
            ("machine_type", "virt".into()),
            ("vcpu_count", 0i64.into()),
            ("cpu_mitigations", 7i64.into()),
        ]);
        let (config, warnings) = VmHardwareConfig::from_store(&store, &host(8));
        assert_eq!(config.memory_mb(), 1024);
        assert_eq!(config.machine_type(), MachineType::Pc);
        assert_eq!(config.vcpu_count(), 2);
        assert!(!config.cpu_mitigations());
        let fields: Vec<Field> = warnings.iter().map(|warning| warning.field).collect();
        assert_eq!(
            fields,
            [Field::MachineType, Field::MemoryMb, Field::CpuMitigations, Field::VcpuCount]
        );
    }

    #[test]
    fn passthrough_wins_over_topology() {
        let store = map(&[
            ("smp_passthrough", true.into()),
            ("topology_enabled", true.into()),
            ("smp_sockets", 2i64.into()),
            ("vcpu_count", 12i64.into()),
        ]);
        let (config, warnings) = VmHardwareConfig::from_store(&store, &host(6));
        assert!(config.smp_passthrough());
        assert!(!config.topology_enabled());
        assert_eq!(config.vcpu_count(), 3);
        assert_eq!(config.smp_sockets(), 2);
        assert_eq!(warnings[0].kind, WarningKind::ConflictingCpuModes);
    }

    #[test]
    fn topology_total_is_rederived() {
        let store = map(&[
            ("topology_enabled", true.into()),
            ("smp_sockets", 2i64.into()),
            ("smp_cores", 3i64.into()),
            ("vcpu_count", 4i64.into()),
        ]);
        let (config, warnings) = VmHardwareConfig::from_store(&store, &host(8));
        assert_eq!(config.vcpu_count(), 6);
        assert_eq!(warnings[0].kind, WarningKind::TopologyMismatch { total: 4, product: 6 });
    }

    #[test]
    fn unknown_keys_survive_a_round_trip() {
        let store = map(&[
            ("memory_mb", 4096i64.into()),
            ("window_geometry", "800x600".into()),
            ("enable_usb", true.into()),
            ("boot_order", "d,menu=on".into()),
            ("extra_args", "-device usb-tablet -nographic".into()),
        ]);
        let (config, _) = VmHardwareConfig::from_store(&store, &host(4));
        assert_eq!(config.store_extras().get("window_geometry"), Some(&"800x600".into()));
        assert_eq!(config.extra_args().get("device"), Some("usb-tablet"));

        let written = config.to_store();
        assert_eq!(written.get("window_geometry"), Some(&"800x600".into()));
        assert_eq!(written.get("memory_mb"), Some(&ConfigValue::Integer(4096)));
        assert_eq!(written.get("boot_order"), Some(&"d,menu=on".into()));
        assert_eq!(
            written.get("extra_args"),
            Some(&ConfigValue::List(vec!["-device usb-tablet".into(), "-nographic".into()]))
        );

        let (reloaded, warnings) = VmHardwareConfig::from_store(&written, &host(4));
        assert!(warnings.is_empty());
        assert!(reloaded.same_settings(&config));
        assert_eq!(reloaded.extra_args(), config.extra_args());
    }

    #[test]
    fn stray_positionals_stay_separate() {
        let (config, _) = crate::parse(&["-snapshot", "-enable-kvm", "disk.img", "-name", "my vm"], &host(4));
        let entries: Vec<(&str, &str)> = config
            .extra_args()
            .iter()
            .map(|arg| (arg.name.as_str(), arg.value.as_str()))
            .collect();
        assert_eq!(entries, [("snapshot", ""), ("", "disk.img"), ("name", "my vm")]);

        let written = config.to_store();
        assert_eq!(
            written.get("extra_args"),
            Some(&ConfigValue::List(vec!["-snapshot".into(), "disk.img".into(), "-name 'my vm'".into()]))
        );
        let (reloaded, warnings) = VmHardwareConfig::from_store(&written, &host(4));
        assert!(warnings.is_empty());
        assert_eq!(reloaded.extra_args(), config.extra_args());
    }

    #[test]
    fn malformed_extra_args_are_reported() {
        let store = map(&[("extra_args", ConfigValue::List(vec!["-name 'vm".into()]))]);
        let (config, warnings) = VmHardwareConfig::from_store(&store, &host(4));
        assert!(config.extra_args().is_empty());
        assert_eq!(warnings[0].field, Field::ExtraArgs);
    }

    #[test]
    fn chosen_count_survives_passthrough() {
        let caps = host(8);
        let mut config = VmHardwareConfig::default();
        config.set_vcpu_count(5, &caps).unwrap();
        config.set_smp_passthrough(true, &caps);
        let written = config.to_store();
        assert_eq!(written.get("vcpu_count"), Some(&ConfigValue::Integer(4)));
        assert_eq!(written.get("manual_vcpu_count"), Some(&ConfigValue::Integer(5)));

        let (mut reloaded, warnings) = VmHardwareConfig::from_store(&written, &caps);
        assert!(warnings.is_empty());
        assert_eq!(reloaded.vcpu_count(), 4);
        reloaded.set_smp_passthrough(false, &caps);
        assert_eq!(reloaded.vcpu_count(), 5);

        // Older profiles only carry the count shown while passthrough was on.
        let store = map(&[("smp_passthrough", true.into()), ("smp_cpus", 6i64.into())]);
        let (mut legacy, _) = VmHardwareConfig::from_store(&store, &caps);
        legacy.set_smp_passthrough(false, &caps);
        assert_eq!(legacy.vcpu_count(), 6);
    }

    #[test]
    fn store_survives_serialization() {
        let mut config = VmHardwareConfig::default();
        config.smp.set_topology(Topology::new(non_zero(2), non_zero(2), non_zero(1)).unwrap());
        let store = config.to_store();

        let json = serde_json::to_string(&store).unwrap();
        let from_json: ConfigMap = serde_json::from_str(&json).unwrap();
        let toml = toml::to_string(&store).unwrap();
        let from_toml: ConfigMap = toml::from_str(&toml).unwrap();
        assert_eq!(from_json, store);
        assert_eq!(from_toml, store);

        let (reloaded, warnings) = VmHardwareConfig::from_store(&from_toml, &host(4));
        assert!(warnings.is_empty());
        assert!(reloaded.topology_enabled());
        assert_eq!(reloaded.vcpu_count(), 4);
    }
}
