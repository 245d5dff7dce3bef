use std::borrow::Cow;

use crate::{
    arg,
    config::VmHardwareConfig,
    data::{MachineType, MemoryMb},
    oarg,
    utils::{ArgDisplay, EmulatorArgs, QemuArg},
};

impl VmHardwareConfig {
    pub(crate) fn machine_args(&self) -> MachineArgs {
        MachineArgs {
            machine_type: self.machine_type,
        }
    }
    pub(crate) fn ram_args(&self) -> RamArgs {
        RamArgs { memory: self.memory }
    }
    pub(crate) fn acceleration(&self) -> Acceleration {
        Acceleration {
            kvm: self.kvm_acceleration,
            mitigations: self.cpu_mitigations,
        }
    }
}

pub(crate) struct MachineArgs {
    machine_type: MachineType,
}

impl EmulatorArgs for MachineArgs {
    fn display(&self) -> impl IntoIterator<Item = ArgDisplay> {
        let name: &'static str = self.machine_type.into();
        Some(ArgDisplay {
            name: Cow::Borrowed("Machine"),
            value: Cow::Borrowed(name),
        })
    }
    fn qemu_args(&self) -> impl IntoIterator<Item = QemuArg> {
        let name: &'static str = self.machine_type.into();
        [arg!("-machine"), arg!(name)]
    }
}

pub(crate) struct RamArgs {
    memory: MemoryMb,
}

impl EmulatorArgs for RamArgs {
    fn display(&self) -> impl IntoIterator<Item = ArgDisplay> {
        Some(ArgDisplay {
            name: Cow::Borrowed("RAM"),
            value: Cow::Owned(format!("{} MiB", self.memory.get())),
        })
    }
    fn qemu_args(&self) -> impl IntoIterator<Item = QemuArg> {
        [arg!("-m"), oarg!(self.memory.to_string())]
    }
}

pub(crate) struct Acceleration {
    kvm: bool,
    mitigations: bool,
}

impl EmulatorArgs for Acceleration {
    fn display(&self) -> impl IntoIterator<Item = ArgDisplay> {
        let toggle = |enabled: bool| Cow::Borrowed(if enabled { "Enabled" } else { "Disabled" });
        [
            ArgDisplay {
                name: Cow::Borrowed("Acceleration"),
                value: if self.kvm { Cow::Borrowed("KVM") } else { Cow::Borrowed("None (TCG)") },
            },
            ArgDisplay {
                name: Cow::Borrowed("Mitigations"),
                value: toggle(self.mitigations),
            },
        ]
    }
    fn qemu_args(&self) -> impl IntoIterator<Item = QemuArg> {
        let mut args = Vec::with_capacity(3);
        if self.kvm {
            args.push(arg!("-enable-kvm"));
        }
        args.push(arg!("-cpu-mitigations"));
        args.push(if self.mitigations { arg!("on") } else { arg!("off") });
        args
    }
}
