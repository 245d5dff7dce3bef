use thiserror::Error;

use crate::{config::Field, data::MachineType};

/// Advisory notice produced while parsing, loading or editing a configuration.
/// Warnings never stop processing; the caller decides whether to surface them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{field}: {kind} ('{raw_value}')")]
pub struct Warning {
    pub field: Field,
    pub raw_value: String,
    pub kind: WarningKind,
}

impl Warning {
    pub(crate) fn new(field: Field, raw_value: impl Into<String>, kind: WarningKind) -> Self {
        Self {
            field,
            raw_value: raw_value.into(),
            kind,
        }
    }

    pub fn message(&self) -> String {
        self.kind.to_string()
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WarningKind {
    #[error("Expected {0}, keeping the previous value")]
    Malformed(&'static str),
    #[error("Flag requires an argument")]
    MissingArgument,
    #[error("CPU model is not offered by the hypervisor")]
    UnknownCpuModel,
    #[error("Unsupported machine type, using {0}")]
    UnknownMachineType(MachineType),
    #[error("Unsupported sub-option was ignored")]
    UnsupportedSubOption,
    #[error("{requested} vCPUs exceed the {host} logical CPUs available on the host")]
    Oversubscribed { requested: u32, host: u32 },
    #[error("vCPU total {total} does not match the topology ({product}), using {product}")]
    TopologyMismatch { total: u32, product: u32 },
    #[error("Topology describes more vCPUs than can be represented")]
    TopologyOverflow,
    #[error("Host passthrough and manual topology are both enabled, keeping passthrough")]
    ConflictingCpuModes,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MutationError {
    #[error("The vCPU count is derived from the host while passthrough is enabled")]
    PassthroughActive,
    #[error("The vCPU count is derived from the topology while it is enabled")]
    TopologyActive,
    #[error("{0} must be greater than zero")]
    Zero(Field),
    #[error("Topology {sockets}x{cores}x{threads} exceeds the supported vCPU range")]
    TopologyOverflow { sockets: u32, cores: u32, threads: u32 },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CmdlineError {
    #[error("Unterminated {0} quote in command line")]
    UnbalancedQuote(char),
    #[error("Command line ends with a dangling escape character")]
    TrailingEscape,
}
