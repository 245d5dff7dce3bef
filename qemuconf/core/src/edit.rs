//! Single-field edits. Each method either applies fully and leaves the configuration
//! consistent, or returns an error without touching it.

use std::num::NonZeroU32;

use crate::{
    config::{EntrySource, Field, VmHardwareConfig},
    data::*,
    error::{MutationError, Warning, WarningKind},
    host::HostCapabilities,
};

fn oversubscription(host: &HostCapabilities, vcpus: NonZeroU32) -> Option<Warning> {
    host.oversubscribed(vcpus).then(|| {
        Warning::new(
            Field::VcpuCount,
            vcpus.to_string(),
            WarningKind::Oversubscribed {
                requested: vcpus.get(),
                host: host.logical_cpus().get(),
            },
        )
    })
}

fn count(field: Field, value: u32) -> Result<NonZeroU32, MutationError> {
    NonZeroU32::new(value).ok_or(MutationError::Zero(field))
}

const SMP_FIELDS: [Field; 7] = [
    Field::VcpuCount,
    Field::ManualVcpuCount,
    Field::SmpPassthrough,
    Field::TopologyEnabled,
    Field::SmpSockets,
    Field::SmpCores,
    Field::SmpThreads,
];

impl VmHardwareConfig {
    /// An empty name, or one the host does not offer, is replaced with the host's first
    /// model (or `default` when the host lists none).
    pub fn set_cpu_model(&mut self, model: &str, host: &HostCapabilities) -> Vec<Warning> {
        let mut warnings = Vec::new();
        let fallback = || host.fallback_cpu_model().map(CpuModel::new).unwrap_or_default();

        let requested = CpuModel::new(model);
        self.cpu_model = if model.trim().is_empty() {
            fallback()
        } else if requested.is_default() || host.offers_cpu_model(requested.name()) {
            requested
        } else {
            warnings.push(Warning::new(Field::CpuModel, model, WarningKind::UnknownCpuModel));
            fallback()
        };
        self.mark(Field::CpuModel, EntrySource::UserSet);
        warnings
    }

    pub fn set_machine_type(&mut self, machine_type: MachineType) {
        self.machine_type = machine_type;
        self.mark(Field::MachineType, EntrySource::UserSet);
    }

    pub fn set_memory_mb(&mut self, megabytes: u32) -> Result<(), MutationError> {
        self.memory = MemoryMb::new(megabytes).ok_or(MutationError::Zero(Field::MemoryMb))?;
        self.mark(Field::MemoryMb, EntrySource::UserSet);
        Ok(())
    }

    pub fn set_kvm_acceleration(&mut self, enabled: bool) {
        self.kvm_acceleration = enabled;
        self.mark(Field::KvmAcceleration, EntrySource::UserSet);
    }

    pub fn set_cpu_mitigations(&mut self, enabled: bool) {
        self.cpu_mitigations = enabled;
        self.mark(Field::CpuMitigations, EntrySource::UserSet);
    }

    /// Enabling derives the vCPU count from the host and leaves topology mode.
    /// Disabling restores the last explicitly chosen count.
    pub fn set_smp_passthrough(&mut self, enabled: bool, host: &HostCapabilities) {
        match (enabled, self.smp.passthrough()) {
            (true, _) => self.smp.enable_passthrough(host.passthrough_vcpus()),
            (false, true) => self.smp.disable(),
            (false, false) => {}
        }
        self.mark_all(&SMP_FIELDS, EntrySource::UserSet);
    }

    /// Rejected while passthrough or topology decides the count. Exceeding the host's
    /// logical CPUs is allowed and only reported.
    pub fn set_vcpu_count(&mut self, vcpus: u32, host: &HostCapabilities) -> Result<Vec<Warning>, MutationError> {
        match self.smp.mode() {
            VcpuMode::Passthrough { .. } => return Err(MutationError::PassthroughActive),
            VcpuMode::Topology => return Err(MutationError::TopologyActive),
            VcpuMode::Fixed => {}
        }
        let vcpus = count(Field::VcpuCount, vcpus)?;
        self.smp.set_vcpus(vcpus);
        self.mark(Field::VcpuCount, EntrySource::UserSet);
        Ok(oversubscription(host, vcpus).into_iter().collect())
    }

    /// Switches between a plain count and the stored topology without changing the topology itself.
    pub fn set_topology_enabled(&mut self, enabled: bool, host: &HostCapabilities) -> Vec<Warning> {
        let warnings = match (enabled, self.smp.topology_enabled()) {
            (true, _) => {
                self.smp.enable_topology();
                oversubscription(host, self.smp.vcpu_count()).into_iter().collect()
            }
            (false, true) => {
                self.smp.disable();
                Vec::new()
            }
            (false, false) => Vec::new(),
        };
        self.mark_all(&SMP_FIELDS, EntrySource::UserSet);
        warnings
    }

    /// Sets the topology, enables topology mode and derives the vCPU count from it.
    pub fn set_topology(
        &mut self,
        sockets: u32,
        cores: u32,
        threads: u32,
        host: &HostCapabilities,
    ) -> Result<Vec<Warning>, MutationError> {
        let topology = Topology::new(
            count(Field::SmpSockets, sockets)?,
            count(Field::SmpCores, cores)?,
            count(Field::SmpThreads, threads)?,
        )
        .ok_or(MutationError::TopologyOverflow { sockets, cores, threads })?;

        self.smp.set_topology(topology);
        self.mark_all(&SMP_FIELDS, EntrySource::UserSet);
        Ok(oversubscription(host, topology.vcpus()).into_iter().collect())
    }

    pub fn set_usb(&mut self, enabled: bool) {
        self.misc.usb = enabled;
        self.mark(Field::EnableUsb, EntrySource::UserSet);
    }

    pub fn set_rtc_localtime(&mut self, enabled: bool) {
        self.misc.rtc_localtime = enabled;
        self.mark(Field::EnableRtc, EntrySource::UserSet);
    }

    pub fn set_nodefaults(&mut self, enabled: bool) {
        self.misc.nodefaults = enabled;
        self.mark(Field::DisableNodefaults, EntrySource::UserSet);
    }

    /// An empty path clears the firmware override.
    pub fn set_bios_path(&mut self, path: Option<&str>) {
        self.misc.bios = path.map(str::trim).filter(|path| !path.is_empty()).map(str::to_string);
        self.mark(Field::BiosPath, EntrySource::UserSet);
    }

    pub fn set_boot_order(&mut self, boot: Option<BootOrder>) {
        self.misc.boot = boot.filter(|boot| !boot.is_empty());
        self.mark(Field::BootOrder, EntrySource::UserSet);
    }
}
