use itertools::chain;

use crate::{
    config::VmHardwareConfig,
    utils::{ArgDisplay, EmulatorArgs, QemuArg},
};

mod cpu;
mod machine;
mod misc;

use cpu::{CpuArgs, SmpArgs};
use machine::{Acceleration, MachineArgs, RamArgs};
use misc::MiscArgs;

/// Produces the hypervisor arguments for `config`.
///
/// The order is fixed: `-cpu`, `-smp`, `-machine`, `-m`, `-enable-kvm` (when enabled) and
/// `-cpu-mitigations`, followed by any of `-usb`, `-rtc`, `-nodefaults`, `-bios` and `-boot` that are set.
/// Unrecognized options kept in [`VmHardwareConfig::extra_args`] are not emitted.
pub fn generate(config: &VmHardwareConfig) -> Vec<String> {
    config.hardware_args().qemu_args().into_iter().map(QemuArg::into_owned).collect()
}

impl VmHardwareConfig {
    pub(crate) fn hardware_args(&self) -> HardwareArgs {
        HardwareArgs {
            cpu_args: self.cpu_args(),
            smp_args: self.smp_args(),
            machine_args: self.machine_args(),
            ram_args: self.ram_args(),
            acceleration: self.acceleration(),
            misc_args: self.misc_args(),
        }
    }

    /// Name/value pairs describing each option group, for summaries.
    pub fn display(&self) -> Vec<ArgDisplay> {
        self.hardware_args().display().into_iter().collect()
    }
}

pub(crate) struct HardwareArgs {
    cpu_args: CpuArgs,
    smp_args: SmpArgs,
    machine_args: MachineArgs,
    ram_args: RamArgs,
    acceleration: Acceleration,
    misc_args: MiscArgs,
}

impl EmulatorArgs for HardwareArgs {
    fn display(&self) -> impl IntoIterator<Item = ArgDisplay> {
        chain!(
            self.cpu_args.display(),
            self.smp_args.display(),
            self.machine_args.display(),
            self.ram_args.display(),
            self.acceleration.display(),
            self.misc_args.display(),
        )
    }
    fn qemu_args(&self) -> impl IntoIterator<Item = QemuArg> {
        chain!(
            self.cpu_args.qemu_args(),
            self.smp_args.qemu_args(),
            self.machine_args.qemu_args(),
            self.ram_args.qemu_args(),
            self.acceleration.qemu_args(),
            self.misc_args.qemu_args(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        data::{non_zero, BootOrder, MachineType, MemoryMb, Topology},
        host::HostCapabilities,
        parse,
    };

    #[test]
    fn defaults() {
        assert_eq!(
            generate(&VmHardwareConfig::default()),
            ["-cpu", "default", "-smp", "2", "-machine", "pc", "-m", "1024M", "-cpu-mitigations", "off"]
        );
    }

    #[test]
    fn mitigations_are_always_explicit() {
        let mut config = VmHardwareConfig::default();
        assert_eq!(generate(&config).last().map(String::as_str), Some("off"));
        config.cpu_mitigations = true;
        let args = generate(&config);
        assert_eq!(args[args.len() - 2..], ["-cpu-mitigations", "on"]);
    }

    #[test]
    fn topology_encoding() {
        let mut config = VmHardwareConfig::default();
        config.smp.set_topology(Topology::new(non_zero(1), non_zero(4), non_zero(2)).unwrap());
        assert!(generate(&config).contains(&"8,sockets=1,cores=4,threads=2".to_string()));

        config.smp.disable();
        let args = generate(&config);
        assert_eq!(args[2..4], ["-smp", "8"]);
    }

    #[test]
    fn passthrough_uses_resolved_count() {
        let mut config = VmHardwareConfig::default();
        config.smp.set_topology(Topology::new(non_zero(2), non_zero(2), non_zero(2)).unwrap());
        config.smp.enable_passthrough(non_zero(6));
        assert_eq!(generate(&config)[2..4], ["-smp", "6"]);
    }

    #[test]
    fn misc_options_follow_the_core_groups() {
        let mut config = VmHardwareConfig {
            machine_type: MachineType::Q35,
            memory: MemoryMb::new(4096).unwrap(),
            kvm_acceleration: true,
            ..Default::default()
        };
        config.misc.usb = true;
        config.misc.rtc_localtime = true;
        config.misc.nodefaults = true;
        config.misc.bios = Some("OVMF.fd".into());
        config.misc.boot = Some("c,menu=on".parse::<BootOrder>().unwrap());
        assert_eq!(
            generate(&config),
            [
                "-cpu", "default", "-smp", "2", "-machine", "q35", "-m", "4096M", "-enable-kvm", "-cpu-mitigations", "off",
                "-usb", "-rtc", "base=localtime,clock=host", "-nodefaults", "-bios", "OVMF.fd", "-boot", "c,menu=on",
            ]
        );
    }

    #[test]
    fn generation_is_idempotent() {
        let host = HostCapabilities::from_count(8, vec![]);
        let mut config = VmHardwareConfig::default();
        for vcpus in [1, 2, 7] {
            for memory in [1, 512, 3000] {
                config.smp = crate::data::Smp::fixed(non_zero(vcpus));
                config.memory = MemoryMb::new(memory).unwrap();
                config.kvm_acceleration = vcpus % 2 == 0;
                let generated = generate(&config);
                let (parsed, _) = parse(&generated, &host);
                assert_eq!(generate(&parsed), generated);
            }
        }
    }

    #[test]
    fn display_lists_each_group() {
        let names: Vec<String> = VmHardwareConfig::default()
            .display()
            .into_iter()
            .map(|display| display.name.into_owned())
            .collect();
        assert_eq!(names, ["CPU", "vCPUs", "Machine", "RAM", "Acceleration", "Mitigations"]);
    }
}
