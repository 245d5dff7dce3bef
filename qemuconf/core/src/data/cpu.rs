use super::non_zero;
use derive_more::Display;
use std::num::NonZeroU32;

pub const DEFAULT_CPU_MODEL: &str = "default";
pub const DEFAULT_VCPUS: NonZeroU32 = non_zero(2);

/// CPU model as passed to `-cpu`. It may carry feature flags (`host,+avx2`);
/// only the part before the first comma names the model.
#[derive(Display, Clone, Debug, PartialEq, Eq)]
pub struct CpuModel(String);

impl CpuModel {
    pub(crate) fn new(model: &str) -> Self {
        match model.trim() {
            "" => Self::default(),
            model => Self(model.to_string()),
        }
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
    pub fn name(&self) -> &str {
        self.0.split(',').next().unwrap_or_default()
    }
    pub fn is_default(&self) -> bool {
        self.0 == DEFAULT_CPU_MODEL
    }
}

impl Default for CpuModel {
    fn default() -> Self {
        Self(DEFAULT_CPU_MODEL.to_string())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Topology {
    sockets: NonZeroU32,
    cores: NonZeroU32,
    threads: NonZeroU32,
    vcpus: NonZeroU32,
}

impl Topology {
    /// Returns `None` when the product does not fit in a `u32`.
    pub fn new(sockets: NonZeroU32, cores: NonZeroU32, threads: NonZeroU32) -> Option<Self> {
        let vcpus = sockets.checked_mul(cores)?.checked_mul(threads)?;
        Some(Self {
            sockets,
            cores,
            threads,
            vcpus,
        })
    }
    pub fn sockets(&self) -> NonZeroU32 {
        self.sockets
    }
    pub fn cores(&self) -> NonZeroU32 {
        self.cores
    }
    pub fn threads(&self) -> NonZeroU32 {
        self.threads
    }
    pub fn vcpus(&self) -> NonZeroU32 {
        self.vcpus
    }
}

impl Default for Topology {
    fn default() -> Self {
        let one = non_zero(1);
        Self {
            sockets: one,
            cores: one,
            threads: one,
            vcpus: one,
        }
    }
}

/// How the vCPU count is decided. Exactly one mode is active at a time, which keeps
/// host passthrough and manual topology mutually exclusive.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VcpuMode {
    #[default]
    Fixed,
    Topology,
    Passthrough { vcpus: NonZeroU32 },
}

/// SMP settings. The topology is retained while another mode is active so that
/// switching back restores it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Smp {
    mode: VcpuMode,
    // Last explicitly chosen count. Kept equal to the topology product while in topology mode.
    vcpus: NonZeroU32,
    topology: Topology,
}

impl Default for Smp {
    fn default() -> Self {
        Self {
            mode: VcpuMode::Fixed,
            vcpus: DEFAULT_VCPUS,
            topology: Topology::default(),
        }
    }
}

impl Smp {
    pub fn mode(&self) -> VcpuMode {
        self.mode
    }
    pub fn vcpu_count(&self) -> NonZeroU32 {
        match self.mode {
            VcpuMode::Passthrough { vcpus } => vcpus,
            VcpuMode::Fixed | VcpuMode::Topology => self.vcpus,
        }
    }
    /// The last explicitly chosen count, equal to the topology product in topology mode.
    pub fn explicit_vcpus(&self) -> NonZeroU32 {
        self.vcpus
    }
    pub fn topology(&self) -> Topology {
        self.topology
    }
    pub fn topology_enabled(&self) -> bool {
        self.mode == VcpuMode::Topology
    }
    pub fn passthrough(&self) -> bool {
        matches!(self.mode, VcpuMode::Passthrough { .. })
    }

    pub(crate) fn fixed(vcpus: NonZeroU32) -> Self {
        Self {
            vcpus,
            ..Self::default()
        }
    }
    pub(crate) fn with_topology(topology: Topology) -> Self {
        Self {
            mode: VcpuMode::Topology,
            vcpus: topology.vcpus(),
            topology,
        }
    }

    pub(crate) fn set_vcpus(&mut self, vcpus: NonZeroU32) {
        self.vcpus = vcpus;
    }
    pub(crate) fn set_topology_retained(&mut self, topology: Topology) {
        self.topology = topology;
        if self.topology_enabled() {
            self.vcpus = topology.vcpus();
        }
    }
    pub(crate) fn set_topology(&mut self, topology: Topology) {
        self.topology = topology;
        self.enable_topology();
    }
    pub(crate) fn enable_topology(&mut self) {
        self.mode = VcpuMode::Topology;
        self.vcpus = self.topology.vcpus();
    }
    pub(crate) fn enable_passthrough(&mut self, vcpus: NonZeroU32) {
        self.mode = VcpuMode::Passthrough { vcpus };
    }
    /// Leaves topology or passthrough mode. The last explicit count becomes active again.
    pub(crate) fn disable(&mut self) {
        self.mode = VcpuMode::Fixed;
    }
}
