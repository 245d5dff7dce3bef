use std::num::NonZeroU32;

use crate::{
    config::Field,
    data::{non_zero, parse_count, Smp, Topology},
    error::{Warning, WarningKind},
};

/// Reads `-smp <total>[,sockets=S][,cores=C][,threads=T]`.
///
/// Returns `None` when neither a total nor a topology could be read, in which case the
/// previous SMP settings stay in place. Any topology key switches to topology mode, with
/// missing keys counting as one.
///
/// Extra comma segments alone do not enable topology mode: `4,maxcpus=8` carries no
/// topology, and treating it as one would collapse the count to 1x1x1.
pub(super) fn parse_smp(value: &str, warnings: &mut Vec<Warning>) -> Option<Smp> {
    let mut total: Option<NonZeroU32> = None;
    let mut sockets: Option<NonZeroU32> = None;
    let mut cores: Option<NonZeroU32> = None;
    let mut threads: Option<NonZeroU32> = None;
    let mut topology_requested = false;

    let segments = value.split(',').map(str::trim).filter(|segment| !segment.is_empty());
    for (idx, segment) in segments.enumerate() {
        let Some((key, count)) = segment.split_once('=') else {
            if idx == 0 {
                total = parse_count(segment);
                if total.is_none() {
                    warnings.push(Warning::new(Field::VcpuCount, segment, WarningKind::Malformed("a positive vCPU count")));
                }
            } else {
                warnings.push(Warning::new(Field::VcpuCount, segment, WarningKind::UnsupportedSubOption));
            }
            continue;
        };

        let key = key.trim();
        topology_requested |= matches!(key, "sockets" | "cores" | "threads");
        let (field, slot) = match key {
            "cpus" => (Field::VcpuCount, &mut total),
            "sockets" => (Field::SmpSockets, &mut sockets),
            "cores" => (Field::SmpCores, &mut cores),
            "threads" => (Field::SmpThreads, &mut threads),
            _ => {
                warnings.push(Warning::new(Field::VcpuCount, segment, WarningKind::UnsupportedSubOption));
                continue;
            }
        };
        *slot = parse_count(count);
        if slot.is_none() {
            warnings.push(Warning::new(field, segment, WarningKind::Malformed("a positive integer")));
        }
    }

    if !topology_requested {
        return total.map(Smp::fixed);
    }

    let one = non_zero(1);
    let (sockets, cores, threads) = (sockets.unwrap_or(one), cores.unwrap_or(one), threads.unwrap_or(one));
    let Some(topology) = Topology::new(sockets, cores, threads) else {
        warnings.push(Warning::new(Field::VcpuCount, value, WarningKind::TopologyOverflow));
        return total.map(Smp::fixed);
    };

    if let Some(total) = total.filter(|total| *total != topology.vcpus()) {
        warnings.push(Warning::new(
            Field::VcpuCount,
            value,
            WarningKind::TopologyMismatch {
                total: total.get(),
                product: topology.vcpus().get(),
            },
        ));
    }
    Some(Smp::with_topology(topology))
}
