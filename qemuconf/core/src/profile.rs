//! A configuration together with the observers interested in its changes.

use crate::{
    config::{Field, VmHardwareConfig},
    data::{BootOrder, MachineType},
    error::{MutationError, Warning},
    host::HostCapabilities,
    parse::parse,
    store::ConfigMap,
};

/// One user edit, mirroring the editing methods of [`VmHardwareConfig`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Edit {
    CpuModel(String),
    MachineType(MachineType),
    MemoryMb(u32),
    KvmAcceleration(bool),
    CpuMitigations(bool),
    SmpPassthrough(bool),
    VcpuCount(u32),
    TopologyEnabled(bool),
    Topology { sockets: u32, cores: u32, threads: u32 },
    Usb(bool),
    RtcLocaltime(bool),
    NoDefaults(bool),
    BiosPath(Option<String>),
    BootOrder(Option<BootOrder>),
}

impl Edit {
    /// The field the edit is addressed to. SMP edits may change the other SMP fields as well.
    pub fn field(&self) -> Field {
        match self {
            Self::CpuModel(_) => Field::CpuModel,
            Self::MachineType(_) => Field::MachineType,
            Self::MemoryMb(_) => Field::MemoryMb,
            Self::KvmAcceleration(_) => Field::KvmAcceleration,
            Self::CpuMitigations(_) => Field::CpuMitigations,
            Self::SmpPassthrough(_) => Field::SmpPassthrough,
            Self::VcpuCount(_) => Field::VcpuCount,
            Self::TopologyEnabled(_) => Field::TopologyEnabled,
            Self::Topology { .. } => Field::SmpSockets,
            Self::Usb(_) => Field::EnableUsb,
            Self::RtcLocaltime(_) => Field::EnableRtc,
            Self::NoDefaults(_) => Field::DisableNodefaults,
            Self::BiosPath(_) => Field::BiosPath,
            Self::BootOrder(_) => Field::BootOrder,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ConfigChange {
    /// A single edit was applied.
    Edited { edit: Edit, warnings: Vec<Warning> },
    /// The whole configuration was replaced by one read from a command line or a store.
    Replaced { warnings: Vec<Warning> },
}

pub type Observer = Box<dyn FnMut(&ConfigChange, &VmHardwareConfig)>;

/// Owns the current configuration and notifies observers after every successful change.
/// Rejected edits leave the configuration untouched and notify nobody.
#[derive(Default)]
pub struct HardwareProfile {
    config: VmHardwareConfig,
    observers: Vec<Observer>,
}

impl HardwareProfile {
    pub fn new(config: VmHardwareConfig) -> Self {
        Self {
            config,
            observers: Vec::new(),
        }
    }

    pub fn config(&self) -> &VmHardwareConfig {
        &self.config
    }
    pub fn into_config(self) -> VmHardwareConfig {
        self.config
    }

    pub fn subscribe(&mut self, observer: impl FnMut(&ConfigChange, &VmHardwareConfig) + 'static) {
        self.observers.push(Box::new(observer));
    }

    pub fn apply(&mut self, edit: Edit, host: &HostCapabilities) -> Result<Vec<Warning>, MutationError> {
        let config = &mut self.config;
        let warnings = match &edit {
            Edit::CpuModel(model) => config.set_cpu_model(model, host),
            Edit::MachineType(machine_type) => {
                config.set_machine_type(*machine_type);
                Vec::new()
            }
            Edit::MemoryMb(megabytes) => config.set_memory_mb(*megabytes).map(|_| Vec::new())?,
            Edit::KvmAcceleration(enabled) => {
                config.set_kvm_acceleration(*enabled);
                Vec::new()
            }
            Edit::CpuMitigations(enabled) => {
                config.set_cpu_mitigations(*enabled);
                Vec::new()
            }
            Edit::SmpPassthrough(enabled) => {
                config.set_smp_passthrough(*enabled, host);
                Vec::new()
            }
            Edit::VcpuCount(vcpus) => config.set_vcpu_count(*vcpus, host)?,
            Edit::TopologyEnabled(enabled) => config.set_topology_enabled(*enabled, host),
            Edit::Topology { sockets, cores, threads } => config.set_topology(*sockets, *cores, *threads, host)?,
            Edit::Usb(enabled) => {
                config.set_usb(*enabled);
                Vec::new()
            }
            Edit::RtcLocaltime(enabled) => {
                config.set_rtc_localtime(*enabled);
                Vec::new()
            }
            Edit::NoDefaults(enabled) => {
                config.set_nodefaults(*enabled);
                Vec::new()
            }
            Edit::BiosPath(path) => {
                config.set_bios_path(path.as_deref());
                Vec::new()
            }
            Edit::BootOrder(boot) => {
                config.set_boot_order(boot.clone());
                Vec::new()
            }
        };
        log::debug!("Applied {edit:?} with {} warning(s)", warnings.len());

        self.notify(ConfigChange::Edited {
            edit,
            warnings: warnings.clone(),
        });
        Ok(warnings)
    }

    pub fn load_command_line<S: AsRef<str>>(&mut self, tokens: &[S], host: &HostCapabilities) -> Vec<Warning> {
        let (config, warnings) = parse(tokens, host);
        self.replace(config, warnings)
    }

    pub fn load_store(&mut self, map: &ConfigMap, host: &HostCapabilities) -> Vec<Warning> {
        let (config, warnings) = VmHardwareConfig::from_store(map, host);
        self.replace(config, warnings)
    }

    fn replace(&mut self, config: VmHardwareConfig, warnings: Vec<Warning>) -> Vec<Warning> {
        self.config = config;
        self.notify(ConfigChange::Replaced {
            warnings: warnings.clone(),
        });
        warnings
    }

    fn notify(&mut self, change: ConfigChange) {
        let config = &self.config;
        self.observers.iter_mut().for_each(|observer| observer(&change, config));
    }
}

impl std::fmt::Debug for HardwareProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HardwareProfile")
            .field("config", &self.config)
            .field("observers", &self.observers.len())
            .finish()
    }
}
