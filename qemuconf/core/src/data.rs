pub mod cpu;
pub mod extra;
pub mod machine;
pub mod misc;

pub use cpu::*;
pub use extra::*;
pub use machine::*;
pub use misc::*;

use std::num::NonZeroU32;

/// Parses a strictly positive decimal count, as accepted for vCPUs, topology and memory.
pub(crate) fn parse_count(input: &str) -> Option<NonZeroU32> {
    input.trim().parse::<u32>().ok().and_then(NonZeroU32::new)
}

pub(crate) const fn non_zero(value: u32) -> NonZeroU32 {
    match NonZeroU32::new(value) {
        Some(value) => value,
        None => panic!("value must be non-zero"),
    }
}
