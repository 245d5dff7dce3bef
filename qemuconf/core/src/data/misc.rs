use std::{fmt, str::FromStr};

pub const RTC_LOCALTIME: &str = "base=localtime,clock=host";

/// Optional platform toggles that are only emitted when set.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Misc {
    pub usb: bool,
    pub rtc_localtime: bool,
    pub nodefaults: bool,
    pub bios: Option<String>,
    pub boot: Option<BootOrder>,
}

/// `-boot` argument: a drive order such as `c` or `dc`, plus the boot menu toggle.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BootOrder {
    pub order: Option<String>,
    pub menu: bool,
}

impl BootOrder {
    pub fn is_empty(&self) -> bool {
        self.order.is_none() && !self.menu
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unsupported boot option '{0}'")]
pub struct BootOrderError(String);

impl FromStr for BootOrder {
    type Err = BootOrderError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let mut boot = Self::default();
        for (idx, part) in input.split(',').map(str::trim).filter(|p| !p.is_empty()).enumerate() {
            match part.split_once('=') {
                None if idx == 0 && part.chars().all(|c| c.is_ascii_lowercase()) => boot.order = Some(part.to_string()),
                Some(("order", order)) if !order.is_empty() => boot.order = Some(order.to_string()),
                Some(("menu", toggle)) if toggle.eq_ignore_ascii_case("on") => boot.menu = true,
                Some(("menu", toggle)) if toggle.eq_ignore_ascii_case("off") => boot.menu = false,
                _ => return Err(BootOrderError(part.to_string())),
            }
        }
        Ok(boot)
    }
}

impl fmt::Display for BootOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.order, self.menu) {
            (Some(order), true) => write!(f, "{order},menu=on"),
            (Some(order), false) => f.write_str(order),
            (None, true) => f.write_str("menu=on"),
            (None, false) => Ok(()),
        }
    }
}
