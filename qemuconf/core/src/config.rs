use std::{collections::BTreeMap, num::NonZeroU32};

use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};

use crate::{
    data::*,
    store::{ConfigMap, ConfigValue},
};

/// Recognized configuration keys, spelled as they appear in a stored profile.
#[derive(Display, EnumString, EnumIter, AsRefStr, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[strum(serialize_all = "snake_case")]
pub enum Field {
    #[strum(to_string = "cpu_model", serialize = "cpu")]
    CpuModel,
    MachineType,
    MemoryMb,
    KvmAcceleration,
    CpuMitigations,
    SmpPassthrough,
    TopologyEnabled,
    SmpSockets,
    SmpCores,
    SmpThreads,
    #[strum(to_string = "vcpu_count", serialize = "smp_cpus")]
    VcpuCount,
    /// The count chosen by the user, kept while passthrough or topology decides the active one.
    ManualVcpuCount,
    EnableUsb,
    EnableRtc,
    DisableNodefaults,
    BiosPath,
    BootOrder,
    #[strum(to_string = "qemu_executable")]
    Executable,
    ExtraArgs,
}

#[derive(Display, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[strum(serialize_all = "kebab-case")]
pub enum EntrySource {
    #[default]
    Default,
    CliParsed,
    UserSet,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ConfigEntry {
    pub name: Field,
    pub value: ConfigValue,
    pub source: EntrySource,
}

/// Hardware and runtime settings of one VM profile.
///
/// Fields are only reachable through accessors and the editing methods, each of which
/// leaves the configuration fully consistent.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VmHardwareConfig {
    pub(crate) cpu_model: CpuModel,
    pub(crate) machine_type: MachineType,
    pub(crate) memory: MemoryMb,
    pub(crate) kvm_acceleration: bool,
    pub(crate) cpu_mitigations: bool,
    pub(crate) smp: Smp,
    pub(crate) misc: Misc,
    pub(crate) executable: Option<String>,
    pub(crate) extra_args: ExtraArgs,
    pub(crate) store_extras: ConfigMap,
    pub(crate) sources: BTreeMap<Field, EntrySource>,
}

impl VmHardwareConfig {
    pub fn cpu_model(&self) -> &CpuModel {
        &self.cpu_model
    }
    pub fn machine_type(&self) -> MachineType {
        self.machine_type
    }
    pub fn memory(&self) -> MemoryMb {
        self.memory
    }
    pub fn memory_mb(&self) -> u32 {
        self.memory.get()
    }
    pub fn kvm_acceleration(&self) -> bool {
        self.kvm_acceleration
    }
    pub fn cpu_mitigations(&self) -> bool {
        self.cpu_mitigations
    }
    pub fn smp(&self) -> &Smp {
        &self.smp
    }
    pub fn vcpu_count(&self) -> u32 {
        self.smp.vcpu_count().get()
    }
    pub fn smp_passthrough(&self) -> bool {
        self.smp.passthrough()
    }
    pub fn topology_enabled(&self) -> bool {
        self.smp.topology_enabled()
    }
    pub fn smp_sockets(&self) -> u32 {
        self.smp.topology().sockets().get()
    }
    pub fn smp_cores(&self) -> u32 {
        self.smp.topology().cores().get()
    }
    pub fn smp_threads(&self) -> u32 {
        self.smp.topology().threads().get()
    }
    pub fn misc(&self) -> &Misc {
        &self.misc
    }
    pub fn executable(&self) -> Option<&str> {
        self.executable.as_deref()
    }
    pub fn extra_args(&self) -> &ExtraArgs {
        &self.extra_args
    }
    /// Keys found in a stored profile that are not recognized, kept for writing back.
    pub fn store_extras(&self) -> &ConfigMap {
        &self.store_extras
    }

    pub fn source(&self, field: Field) -> EntrySource {
        self.sources.get(&field).copied().unwrap_or_default()
    }
    pub(crate) fn mark(&mut self, field: Field, source: EntrySource) {
        self.sources.insert(field, source);
    }
    pub(crate) fn mark_all(&mut self, fields: &[Field], source: EntrySource) {
        fields.iter().for_each(|field| self.mark(*field, source));
    }

    /// Current value of a recognized field in its stored representation.
    pub fn value(&self, field: Field) -> ConfigValue {
        let count = |value: NonZeroU32| ConfigValue::Integer(value.get().into());
        let topology = self.smp.topology();
        match field {
            Field::CpuModel => self.cpu_model.as_str().into(),
            Field::MachineType => self.machine_type.to_string().into(),
            Field::MemoryMb => ConfigValue::Integer(self.memory.get().into()),
            Field::KvmAcceleration => self.kvm_acceleration.into(),
            Field::CpuMitigations => self.cpu_mitigations.into(),
            Field::SmpPassthrough => self.smp.passthrough().into(),
            Field::TopologyEnabled => self.smp.topology_enabled().into(),
            Field::SmpSockets => count(topology.sockets()),
            Field::SmpCores => count(topology.cores()),
            Field::SmpThreads => count(topology.threads()),
            Field::VcpuCount => count(self.smp.vcpu_count()),
            Field::ManualVcpuCount => count(self.smp.explicit_vcpus()),
            Field::EnableUsb => self.misc.usb.into(),
            Field::EnableRtc => self.misc.rtc_localtime.into(),
            Field::DisableNodefaults => self.misc.nodefaults.into(),
            Field::BiosPath => self.misc.bios.clone().unwrap_or_default().into(),
            Field::BootOrder => self.misc.boot.as_ref().map(ToString::to_string).unwrap_or_default().into(),
            Field::Executable => self.executable.clone().unwrap_or_default().into(),
            Field::ExtraArgs => ConfigValue::List(
                self.extra_args
                    .iter()
                    .map(|arg| crate::cmdline::join_args(&arg.to_args()))
                    .collect(),
            ),
        }
    }

    /// One entry per recognized field, in a stable order.
    pub fn entries(&self) -> Vec<ConfigEntry> {
        Field::iter()
            .map(|name| ConfigEntry {
                name,
                value: self.value(name),
                source: self.source(name),
            })
            .collect()
    }

    /// Compares every recognized setting, ignoring provenance and unrecognized options.
    pub fn same_settings(&self, other: &Self) -> bool {
        Field::iter()
            .filter(|field| !matches!(field, Field::ExtraArgs | Field::Executable))
            .all(|field| self.value(field) == other.value(field))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = VmHardwareConfig::default();
        assert_eq!(config.cpu_model().as_str(), "default");
        assert_eq!(config.machine_type(), MachineType::Pc);
        assert_eq!(config.memory_mb(), 1024);
        assert!(!config.kvm_acceleration());
        assert!(!config.cpu_mitigations());
        assert!(!config.smp_passthrough());
        assert!(!config.topology_enabled());
        assert_eq!((config.smp_sockets(), config.smp_cores(), config.smp_threads()), (1, 1, 1));
        assert_eq!(config.vcpu_count(), 2);
        assert!(config.extra_args().is_empty());
    }

    #[test]
    fn field_names() {
        assert_eq!(Field::CpuModel.to_string(), "cpu_model");
        assert_eq!(Field::VcpuCount.as_ref(), "vcpu_count");
        assert_eq!(Field::Executable.to_string(), "qemu_executable");
        assert_eq!("smp_cpus".parse::<Field>().unwrap(), Field::VcpuCount);
        assert_eq!("cpu".parse::<Field>().unwrap(), Field::CpuModel);
        assert_eq!("disable_nodefaults".parse::<Field>().unwrap(), Field::DisableNodefaults);
        assert_eq!(EntrySource::CliParsed.to_string(), "cli-parsed");
    }

    #[test]
    fn entries_report_defaults() {
        let config = VmHardwareConfig::default();
        let entries = config.entries();
        assert_eq!(entries.len(), Field::iter().count());
        assert!(entries.iter().all(|entry| entry.source == EntrySource::Default));
        let memory = entries.iter().find(|entry| entry.name == Field::MemoryMb).unwrap();
        assert_eq!(memory.value, ConfigValue::Integer(1024));
    }
}
