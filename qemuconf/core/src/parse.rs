use std::iter::Peekable;

use strum::EnumString;

use crate::{
    config::{EntrySource, Field, VmHardwareConfig},
    data::{BootOrder, CpuModel, ExtraArgs, MachineType, MemoryMb},
    error::{Warning, WarningKind},
    host::HostCapabilities,
};

mod smp;

/// Flags with a dedicated place in [`VmHardwareConfig`]. Anything else is kept verbatim.
#[derive(EnumString, strum::Display, Clone, Copy, Debug, PartialEq, Eq)]
enum Flag {
    #[strum(serialize = "-cpu")]
    Cpu,
    #[strum(serialize = "-smp")]
    Smp,
    #[strum(serialize = "-machine")]
    Machine,
    #[strum(serialize = "-m")]
    Memory,
    #[strum(serialize = "-enable-kvm")]
    EnableKvm,
    #[strum(serialize = "-cpu-mitigations")]
    CpuMitigations,
    #[strum(serialize = "-usb")]
    Usb,
    #[strum(serialize = "-rtc")]
    Rtc,
    #[strum(serialize = "-nodefaults")]
    NoDefaults,
    #[strum(serialize = "-bios")]
    Bios,
    #[strum(serialize = "-boot")]
    Boot,
}

impl Flag {
    fn takes_argument(self) -> bool {
        !matches!(self, Self::EnableKvm | Self::Usb | Self::NoDefaults)
    }
    fn field(self) -> Field {
        match self {
            Self::Cpu => Field::CpuModel,
            Self::Smp => Field::VcpuCount,
            Self::Machine => Field::MachineType,
            Self::Memory => Field::MemoryMb,
            Self::EnableKvm => Field::KvmAcceleration,
            Self::CpuMitigations => Field::CpuMitigations,
            Self::Usb => Field::EnableUsb,
            Self::Rtc => Field::EnableRtc,
            Self::NoDefaults => Field::DisableNodefaults,
            Self::Bios => Field::BiosPath,
            Self::Boot => Field::BootOrder,
        }
    }
}

fn is_recognized(token: &str) -> bool {
    token.parse::<Flag>().is_ok()
}

// Negative numbers are values, not flags.
fn looks_like_flag(token: &str) -> bool {
    let mut chars = token.chars();
    chars.next() == Some('-') && chars.next().is_some_and(|c| !c.is_ascii_digit())
}

/// Builds a configuration from hypervisor command-line tokens.
///
/// Tokens are read left to right in a single pass. Unknown flags are stored in
/// [`ExtraArgs`], malformed values keep the default and add a [`Warning`]. Parsing never fails.
pub fn parse<S: AsRef<str>>(tokens: &[S], host: &HostCapabilities) -> (VmHardwareConfig, Vec<Warning>) {
    let mut parser = Parser {
        host,
        config: VmHardwareConfig::default(),
        warnings: Vec::new(),
    };
    let mut tokens = tokens.iter().map(|token| token.as_ref()).peekable();

    if let Some(executable) = tokens.next_if(|token| token.contains("qemu-system-")) {
        parser.config.executable = Some(executable.to_string());
        parser.config.mark(Field::Executable, EntrySource::CliParsed);
    }

    while let Some(token) = tokens.next() {
        match token.parse::<Flag>() {
            Ok(flag) if flag.takes_argument() => match tokens.next_if(|next| !is_recognized(next)) {
                Some(value) => parser.apply(flag, value),
                None => parser.warn(flag.field(), token, WarningKind::MissingArgument),
            },
            Ok(flag) => parser.apply_switch(flag),
            Err(_) => capture_unknown(token, &mut tokens, &mut parser.config.extra_args),
        }
    }

    parser.finish()
}

/// Files every token into `extras` using the same pairing rules as [`parse`].
pub(crate) fn capture_extras<S: AsRef<str>>(tokens: &[S], extras: &mut ExtraArgs) {
    let mut tokens = tokens.iter().map(|token| token.as_ref()).peekable();
    while let Some(token) = tokens.next() {
        capture_unknown(token, &mut tokens, extras);
    }
}

fn capture_unknown<'a, I>(token: &'a str, rest: &mut Peekable<I>, extras: &mut ExtraArgs)
where
    I: Iterator<Item = &'a str>,
{
    if looks_like_flag(token) {
        let value = rest.next_if(|next| !looks_like_flag(next));
        log::debug!("Keeping unrecognized flag {token} {}", value.unwrap_or_default());
        extras.push(token, value);
    } else {
        log::debug!("Keeping stray argument {token}");
        extras.push("", Some(token));
    }
}

struct Parser<'a> {
    host: &'a HostCapabilities,
    config: VmHardwareConfig,
    warnings: Vec<Warning>,
}

impl Parser<'_> {
    fn warn(&mut self, field: Field, raw: &str, kind: WarningKind) {
        log::trace!("{field}: {kind} ({raw})");
        self.warnings.push(Warning::new(field, raw, kind));
    }

    fn apply(&mut self, flag: Flag, value: &str) {
        log::debug!("Applying {flag} {value}");
        let field = flag.field();
        match flag {
            Flag::Cpu => {
                let model = CpuModel::new(value);
                if !model.is_default() && !self.host.offers_cpu_model(model.name()) {
                    self.warn(field, value, WarningKind::UnknownCpuModel);
                }
                self.config.cpu_model = model;
            }
            Flag::Smp => {
                let Some(smp) = smp::parse_smp(value, &mut self.warnings) else {
                    return;
                };
                self.config.smp = smp;
                self.config.mark_all(
                    &[
                        Field::ManualVcpuCount,
                        Field::SmpPassthrough,
                        Field::TopologyEnabled,
                        Field::SmpSockets,
                        Field::SmpCores,
                        Field::SmpThreads,
                    ],
                    EntrySource::CliParsed,
                );
            }
            Flag::Machine => {
                let mut options = value.split(',').map(str::trim);
                let name = options.next().unwrap_or_default();
                let name = name.strip_prefix("type=").unwrap_or(name);
                match name.parse::<MachineType>() {
                    Ok(machine_type) => self.config.machine_type = machine_type,
                    Err(_) => {
                        let fallback = MachineType::default();
                        self.warn(field, value, WarningKind::UnknownMachineType(fallback));
                        self.config.machine_type = fallback;
                    }
                }
                if options.any(|option| !option.is_empty()) {
                    self.warn(field, value, WarningKind::UnsupportedSubOption);
                }
            }
            Flag::Memory => match value.parse::<MemoryMb>() {
                Ok(memory) => self.config.memory = memory,
                Err(_) => return self.warn(field, value, WarningKind::Malformed("a memory size such as 512M or 2G")),
            },
            Flag::CpuMitigations => self.config.cpu_mitigations = value.trim().eq_ignore_ascii_case("on"),
            Flag::Rtc => {
                let localtime = value.split(',').any(|option| option.trim() == "base=localtime");
                if !localtime {
                    self.config.extra_args.push("-rtc", Some(value));
                    return;
                }
                self.config.misc.rtc_localtime = true;
            }
            Flag::Bios => self.config.misc.bios = Some(value.trim().to_string()).filter(|bios| !bios.is_empty()),
            Flag::Boot => match value.parse::<BootOrder>() {
                Ok(boot) => self.config.misc.boot = Some(boot).filter(|boot| !boot.is_empty()),
                Err(_) => return self.warn(field, value, WarningKind::UnsupportedSubOption),
            },
            Flag::EnableKvm | Flag::Usb | Flag::NoDefaults => return self.apply_switch(flag),
        }
        self.config.mark(field, EntrySource::CliParsed);
    }

    fn apply_switch(&mut self, flag: Flag) {
        log::debug!("Applying {flag}");
        match flag {
            Flag::EnableKvm => self.config.kvm_acceleration = true,
            Flag::Usb => self.config.misc.usb = true,
            Flag::NoDefaults => self.config.misc.nodefaults = true,
            _ => return,
        }
        self.config.mark(flag.field(), EntrySource::CliParsed);
    }

    fn finish(mut self) -> (VmHardwareConfig, Vec<Warning>) {
        let vcpus = self.config.smp.vcpu_count();
        if self.host.oversubscribed(vcpus) {
            let host = self.host.logical_cpus().get();
            self.warn(
                Field::VcpuCount,
                &vcpus.to_string(),
                WarningKind::Oversubscribed {
                    requested: vcpus.get(),
                    host,
                },
            );
        }
        (self.config, self.warnings)
    }
}
