use std::borrow::Cow;

use crate::{
    arg,
    config::VmHardwareConfig,
    data::{CpuModel, Smp, VcpuMode},
    oarg,
    utils::{plural_if, ArgDisplay, EmulatorArgs, QemuArg},
};

impl VmHardwareConfig {
    pub(crate) fn cpu_args(&self) -> CpuArgs {
        CpuArgs {
            model: self.cpu_model.clone(),
        }
    }
    pub(crate) fn smp_args(&self) -> SmpArgs {
        SmpArgs { smp: self.smp }
    }
}

pub(crate) struct CpuArgs {
    model: CpuModel,
}

impl EmulatorArgs for CpuArgs {
    fn display(&self) -> impl IntoIterator<Item = ArgDisplay> {
        Some(ArgDisplay {
            name: Cow::Borrowed("CPU"),
            value: Cow::Owned(self.model.to_string()),
        })
    }
    fn qemu_args(&self) -> impl IntoIterator<Item = QemuArg> {
        [arg!("-cpu"), oarg!(self.model.to_string())]
    }
}

pub(crate) struct SmpArgs {
    smp: Smp,
}

impl EmulatorArgs for SmpArgs {
    fn display(&self) -> impl IntoIterator<Item = ArgDisplay> {
        let vcpus = self.smp.vcpu_count().get();
        let topology = self.smp.topology();
        let (sockets, cores, threads) = (topology.sockets().get(), topology.cores().get(), topology.threads().get());
        let value = match self.smp.mode() {
            VcpuMode::Fixed => vcpus.to_string(),
            VcpuMode::Passthrough { .. } => format!("{vcpus} (host passthrough)"),
            VcpuMode::Topology => format!(
                "{vcpus} ({sockets} socket{}, {cores} core{}, {threads} thread{})",
                plural_if(sockets > 1),
                plural_if(cores > 1),
                plural_if(threads > 1),
            ),
        };
        Some(ArgDisplay {
            name: Cow::Borrowed("vCPUs"),
            value: Cow::Owned(value),
        })
    }
    fn qemu_args(&self) -> impl IntoIterator<Item = QemuArg> {
        let vcpus = self.smp.vcpu_count();
        let smp = if self.smp.topology_enabled() {
            let topology = self.smp.topology();
            format!(
                "{vcpus},sockets={},cores={},threads={}",
                topology.sockets(),
                topology.cores(),
                topology.threads()
            )
        } else {
            vcpus.to_string()
        };
        [arg!("-smp"), oarg!(smp)]
    }
}
