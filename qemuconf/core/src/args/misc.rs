use std::borrow::Cow;

use crate::{
    arg,
    config::VmHardwareConfig,
    data::{Misc, RTC_LOCALTIME},
    oarg,
    utils::{ArgDisplay, EmulatorArgs, QemuArg},
};

impl VmHardwareConfig {
    pub(crate) fn misc_args(&self) -> MiscArgs {
        MiscArgs { misc: self.misc.clone() }
    }
}

pub(crate) struct MiscArgs {
    misc: Misc,
}

impl EmulatorArgs for MiscArgs {
    fn display(&self) -> impl IntoIterator<Item = ArgDisplay> {
        let mut display = Vec::new();
        let flags: Vec<&str> = [
            (self.misc.usb, "USB"),
            (self.misc.rtc_localtime, "RTC localtime"),
            (self.misc.nodefaults, "no default devices"),
        ]
        .into_iter()
        .filter_map(|(enabled, name)| enabled.then_some(name))
        .collect();
        if !flags.is_empty() {
            display.push(ArgDisplay {
                name: Cow::Borrowed("Platform"),
                value: Cow::Owned(flags.join(", ")),
            });
        }
        if let Some(bios) = &self.misc.bios {
            display.push(ArgDisplay {
                name: Cow::Borrowed("BIOS"),
                value: Cow::Owned(bios.clone()),
            });
        }
        if let Some(boot) = &self.misc.boot {
            display.push(ArgDisplay {
                name: Cow::Borrowed("Boot"),
                value: Cow::Owned(boot.to_string()),
            });
        }
        display
    }
    fn qemu_args(&self) -> impl IntoIterator<Item = QemuArg> {
        let mut args = Vec::new();
        if self.misc.usb {
            args.push(arg!("-usb"));
        }
        if self.misc.rtc_localtime {
            args.extend([arg!("-rtc"), arg!(RTC_LOCALTIME)]);
        }
        if self.misc.nodefaults {
            args.push(arg!("-nodefaults"));
        }
        if let Some(bios) = &self.misc.bios {
            args.extend([arg!("-bios"), oarg!(bios.clone())]);
        }
        if let Some(boot) = &self.misc.boot {
            args.extend([arg!("-boot"), oarg!(boot.to_string())]);
        }
        args
    }
}
