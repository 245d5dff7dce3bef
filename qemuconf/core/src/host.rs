use std::num::NonZeroU32;

use crate::data::non_zero;

/// Snapshot of what the host offers, resolved by the caller before any parsing or editing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HostCapabilities {
    logical_cpus: NonZeroU32,
    cpu_models: Vec<String>,
}

impl HostCapabilities {
    pub fn new(logical_cpus: NonZeroU32, cpu_models: Vec<String>) -> Self {
        Self { logical_cpus, cpu_models }
    }

    /// Clamps a reported CPU count of zero to one.
    pub fn from_count(logical_cpus: usize, cpu_models: Vec<String>) -> Self {
        let logical_cpus = u32::try_from(logical_cpus)
            .ok()
            .and_then(NonZeroU32::new)
            .unwrap_or(non_zero(1));
        Self::new(logical_cpus, cpu_models)
    }

    pub fn logical_cpus(&self) -> NonZeroU32 {
        self.logical_cpus
    }
    pub fn cpu_models(&self) -> &[String] {
        &self.cpu_models
    }

    /// Half of the host's logical CPUs, never less than one.
    pub fn passthrough_vcpus(&self) -> NonZeroU32 {
        NonZeroU32::new(self.logical_cpus.get() / 2).unwrap_or(non_zero(1))
    }

    /// Without a model list nothing can be checked, so every model is accepted.
    pub fn offers_cpu_model(&self, name: &str) -> bool {
        self.cpu_models.is_empty() || self.cpu_models.iter().any(|model| model == name)
    }

    pub(crate) fn fallback_cpu_model(&self) -> Option<&str> {
        self.cpu_models.first().map(String::as_str)
    }

    pub(crate) fn oversubscribed(&self, vcpus: NonZeroU32) -> bool {
        vcpus > self.logical_cpus
    }
}

impl Default for HostCapabilities {
    fn default() -> Self {
        Self::new(non_zero(1), Vec::new())
    }
}

/// Extracts model names from the output of `qemu-system-* -cpu help`.
///
/// Names are read from the block following `Available CPUs:` up to the first blank line.
/// x86 builds prefix every entry with the architecture (`x86 Skylake-Client ...`); the prefix is skipped.
pub fn parse_cpu_help(output: &str) -> Vec<String> {
    let mut models: Vec<String> = Vec::new();
    let lines = output
        .lines()
        .map(str::trim)
        .skip_while(|line| !line.starts_with("Available CPUs:"))
        .skip(1)
        .take_while(|line| !line.is_empty());

    for line in lines {
        let mut words = line.split_whitespace();
        let name = match words.next() {
            Some("x86" | "i386") => words.next(),
            name => name,
        };
        if let Some(name) = name {
            if !models.iter().any(|model| model == name) {
                models.push(name.to_string());
            }
        }
    }
    log::trace!("Found {} CPU models in help output", models.len());
    models
}
