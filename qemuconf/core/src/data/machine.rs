use super::non_zero;
use derive_more::{Display, From};
use std::{num::NonZeroU32, str::FromStr};
use strum::{EnumIter, EnumString, IntoStaticStr, VariantNames};

#[derive(strum::Display, EnumString, EnumIter, VariantNames, IntoStaticStr, Clone, Copy, Default, Debug, PartialEq, Eq)]
#[strum(serialize_all = "lowercase")]
pub enum MachineType {
    #[default]
    Pc,
    Q35,
    Isapc,
}

pub const DEFAULT_MEMORY: MemoryMb = MemoryMb(non_zero(1024));

// Values offered by front-ends for quick selection, 256M through 32G.
// Any other positive size is still accepted.
pub const MEMORY_CANDIDATES_MB: [u32; 8] = [256, 512, 1024, 2048, 4096, 8192, 16384, 32768];

/// Guest RAM, always held as a whole number of mebibytes.
#[derive(Display, From, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[display("{_0}M")]
pub struct MemoryMb(NonZeroU32);

impl MemoryMb {
    pub fn new(megabytes: u32) -> Option<Self> {
        NonZeroU32::new(megabytes).map(Self)
    }
    pub fn get(&self) -> u32 {
        self.0.get()
    }
    pub fn is_candidate(&self) -> bool {
        MEMORY_CANDIDATES_MB.contains(&self.get())
    }
}

impl Default for MemoryMb {
    fn default() -> Self {
        DEFAULT_MEMORY
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("'{0}' is not a memory size in megabytes or gigabytes")]
pub struct MemoryParseError(String);

impl FromStr for MemoryMb {
    type Err = MemoryParseError;

    /// Accepts `N`, `NM`/`Nm` and `NG`/`Ng`. Gigabyte values may be fractional and are
    /// truncated after conversion, so `1.5G` becomes 1536.
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let err = || MemoryParseError(input.to_string());
        let value = input.trim();

        let megabytes = match value.char_indices().last() {
            Some((idx, 'g' | 'G')) => {
                let gigabytes: f64 = value[..idx].parse().map_err(|_| err())?;
                let megabytes = gigabytes * 1024.0;
                if !megabytes.is_finite() || megabytes < 0.0 || megabytes > u32::MAX as f64 {
                    return Err(err());
                }
                megabytes as u32
            }
            Some((idx, 'm' | 'M')) => value[..idx].parse().map_err(|_| err())?,
            Some(_) => value.parse().map_err(|_| err())?,
            None => return Err(err()),
        };

        Self::new(megabytes).ok_or_else(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_suffixes() {
        assert_eq!("2G".parse::<MemoryMb>().unwrap().get(), 2048);
        assert_eq!("2g".parse::<MemoryMb>().unwrap().get(), 2048);
        assert_eq!("1.5G".parse::<MemoryMb>().unwrap().get(), 1536);
        assert_eq!("512M".parse::<MemoryMb>().unwrap().get(), 512);
        assert_eq!("512m".parse::<MemoryMb>().unwrap().get(), 512);
        assert_eq!("1024".parse::<MemoryMb>().unwrap().get(), 1024);
    }

    #[test]
    fn memory_rejects_garbage() {
        for input in ["abc", "", "G", "0", "0M", "-512", "12.5M", "0.0001G", "NaNG", "infG", "2T"] {
            assert!(input.parse::<MemoryMb>().is_err(), "{input} should not parse");
        }
    }

    #[test]
    fn memory_display_uses_megabyte_suffix() {
        assert_eq!(MemoryMb::new(2048).unwrap().to_string(), "2048M");
        assert_eq!(DEFAULT_MEMORY.to_string(), "1024M");
    }

    #[test]
    fn candidates_are_advisory() {
        assert!(MemoryMb::new(4096).unwrap().is_candidate());
        assert!(!MemoryMb::new(3000).unwrap().is_candidate());
    }

    #[test]
    fn machine_types() {
        assert_eq!("q35".parse::<MachineType>().unwrap(), MachineType::Q35);
        assert_eq!("isapc".parse::<MachineType>().unwrap(), MachineType::Isapc);
        assert!("virt".parse::<MachineType>().is_err());
        assert!("Q35".parse::<MachineType>().is_err());
        assert_eq!(MachineType::default().to_string(), "pc");
        assert_eq!(MachineType::VARIANTS, ["pc", "q35", "isapc"]);
    }
}
