use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::{path::PathBuf, str::FromStr};

use qemuconf_core::{
    data::{BootOrder, MachineType},
    profile::{Edit, HardwareProfile},
    HostCapabilities,
};

use super::profile::{self, Format};

#[derive(Debug, Parser)]
pub(crate) struct EditArgs {
    profile: PathBuf,
    #[arg(long, display_order = 1, help = "CPU model, e.g. 'host' or 'qemu64'")]
    cpu: Option<String>,
    #[arg(long, display_order = 1)]
    machine: Option<MachineType>,
    #[arg(long, display_order = 1, value_name = "MB")]
    memory: Option<u32>,
    #[arg(long, display_order = 1, value_name = "BOOL")]
    kvm: Option<bool>,
    #[arg(long, display_order = 1, value_name = "BOOL")]
    mitigations: Option<bool>,
    #[arg(long, display_order = 2, value_name = "BOOL", help = "Derive the vCPU count from the host")]
    passthrough: Option<bool>,
    #[arg(long, display_order = 2, value_name = "N")]
    vcpus: Option<u32>,
    #[arg(long, display_order = 2, value_name = "S,C,T", conflicts_with = "no_topology")]
    topology: Option<TopologyArg>,
    #[arg(long, display_order = 2, help = "Go back to a plain vCPU count, keeping the topology for later")]
    no_topology: bool,
    #[arg(long, display_order = 3, value_name = "BOOL")]
    usb: Option<bool>,
    #[arg(long, display_order = 3, value_name = "BOOL", help = "Keep the guest clock in local time")]
    rtc: Option<bool>,
    #[arg(long, display_order = 3, value_name = "BOOL")]
    nodefaults: Option<bool>,
    #[arg(long, display_order = 3, value_name = "PATH", help = "Firmware image, empty to remove")]
    bios: Option<String>,
    #[arg(long, display_order = 3, value_name = "ORDER", help = "Boot order, e.g. 'dc' or 'order=c,menu=on'")]
    boot: Option<BootOrder>,
    #[arg(long, short, display_order = 4, help = "Write the edited profile here instead of printing it")]
    output: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TopologyArg {
    sockets: u32,
    cores: u32,
    threads: u32,
}

impl FromStr for TopologyArg {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self> {
        let mut values = s.split(',').map(|value| value.trim().parse::<u32>());
        match (values.next(), values.next(), values.next(), values.next()) {
            (Some(sockets), Some(cores), Some(threads), None) => Ok(Self {
                sockets: sockets?,
                cores: cores?,
                threads: threads?,
            }),
            _ => Err(anyhow!("Expected SOCKETS,CORES,THREADS")),
        }
    }
}

impl EditArgs {
    /// Edits in the order they are applied.
    fn edits(&self) -> Vec<Edit> {
        [
            self.cpu.clone().map(Edit::CpuModel),
            self.machine.map(Edit::MachineType),
            self.memory.map(Edit::MemoryMb),
            self.kvm.map(Edit::KvmAcceleration),
            self.mitigations.map(Edit::CpuMitigations),
            self.passthrough.map(Edit::SmpPassthrough),
            self.vcpus.map(Edit::VcpuCount),
            self.topology.map(|t| Edit::Topology {
                sockets: t.sockets,
                cores: t.cores,
                threads: t.threads,
            }),
            self.no_topology.then_some(Edit::TopologyEnabled(false)),
            self.usb.map(Edit::Usb),
            self.rtc.map(Edit::RtcLocaltime),
            self.nodefaults.map(Edit::NoDefaults),
            self.bios.clone().map(|bios| Edit::BiosPath(Some(bios))),
            self.boot.clone().map(|boot| Edit::BootOrder(Some(boot))),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    pub(crate) fn run(self, host: &HostCapabilities) -> Result<()> {
        let mut profile = HardwareProfile::new(profile::load(&self.profile, host)?);
        profile.subscribe(|change, config| log::debug!("{change:?}, now {} vCPUs", config.vcpu_count()));

        for edit in self.edits() {
            let field = edit.field();
            let warnings = profile
                .apply(edit, host)
                .with_context(|| format!("Couldn't change {field}"))?;
            super::report(&warnings);
        }

        match &self.output {
            Some(output) => profile::save(output, profile.config()),
            None => {
                print!("{}", Format::from_path(&self.profile).serialize(&profile.config().to_store())?);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edit_args(args: &[&str]) -> EditArgs {
        EditArgs::try_parse_from(["edit", "vm.toml"].into_iter().chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn topology_argument() {
        assert_eq!(
            "2, 4,1".parse::<TopologyArg>().unwrap(),
            TopologyArg {
                sockets: 2,
                cores: 4,
                threads: 1
            }
        );
        assert!("2,4".parse::<TopologyArg>().is_err());
        assert!("2,4,1,1".parse::<TopologyArg>().is_err());
        assert!("2,x,1".parse::<TopologyArg>().is_err());
    }

    #[test]
    fn edits_follow_a_fixed_order() {
        let args = edit_args(&["--topology", "1,2,2", "--memory", "4096", "--machine", "q35", "--kvm", "true"]);
        assert_eq!(
            args.edits(),
            [
                Edit::MachineType(MachineType::Q35),
                Edit::MemoryMb(4096),
                Edit::KvmAcceleration(true),
                Edit::Topology {
                    sockets: 1,
                    cores: 2,
                    threads: 2
                },
            ]
        );
    }

    #[test]
    fn rejects_conflicting_topology_flags() {
        assert!(EditArgs::try_parse_from(["edit", "vm.toml", "--topology", "1,1,1", "--no-topology"]).is_err());
        assert!(EditArgs::try_parse_from(["edit", "vm.toml", "--machine", "microvm"]).is_err());
    }
}
