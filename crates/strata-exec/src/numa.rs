//! NUMA node binding.
//!
//! Binds the calling thread to one node's CPUs and asks for interleaved
//! allocation across that node before workers are spawned; threads created
//! afterwards inherit both. Every failure is an `Error::ResourceBind` for the
//! caller to log; nothing here is fatal.

use strata_core::prelude::{Error, Result};

/// Parse a sysfs cpulist such as `0-3,8,10-11`.
pub fn parse_cpu_list(list: &str) -> Result<Vec<usize>> {
    let bad = || Error::ResourceBind(format!("malformed cpu list '{}'", list.trim()));
    let mut cpus = Vec::new();
    for part in list.trim().split(',').filter(|p| !p.is_empty()) {
        match part.split_once('-') {
            Some((lo, hi)) => {
                let lo: usize = lo.trim().parse().map_err(|_| bad())?;
                let hi: usize = hi.trim().parse().map_err(|_| bad())?;
                if lo > hi {
                    return Err(bad());
                }
                cpus.extend(lo..=hi);
            }
            None => cpus.push(part.trim().parse().map_err(|_| bad())?),
        }
    }
    Ok(cpus)
}

/// CPUs belonging to `node`.
#[cfg(target_os = "linux")]
pub fn node_cpus(node: usize) -> Result<Vec<usize>> {
    let path = format!("/sys/devices/system/node/node{node}/cpulist");
    let list = std::fs::read_to_string(&path)
        .map_err(|e| Error::ResourceBind(format!("{path}: {e}")))?;
    let cpus = parse_cpu_list(&list)?;
    if cpus.is_empty() {
        return Err(Error::ResourceBind(format!("NUMA node {node} has no CPUs")));
    }
    Ok(cpus)
}

#[cfg(not(target_os = "linux"))]
pub fn node_cpus(node: usize) -> Result<Vec<usize>> {
    Err(Error::ResourceBind(format!(
        "NUMA node {node}: binding is only supported on Linux"
    )))
}

/// Restrict the calling thread to `node`'s CPUs and interleave its memory
/// on that node. Returns the CPUs bound to.
pub fn bind_to_node(node: usize) -> Result<Vec<usize>> {
    let cpus = node_cpus(node)?;
    sys::set_affinity(&cpus)?;
    sys::interleave_memory(node)?;
    Ok(cpus)
}

#[cfg(target_os = "linux")]
#[allow(unsafe_code)]
mod sys {
    use std::io;
    use std::mem;

    use strata_core::prelude::{Error, Result};

    const MPOL_INTERLEAVE: libc::c_int = 3;

    pub fn set_affinity(cpus: &[usize]) -> Result<()> {
        let limit = libc::CPU_SETSIZE as usize;
        // SAFETY: cpu_set_t is a plain bitmask; all-zero is the empty set.
        let mut set: libc::cpu_set_t = unsafe { mem::zeroed() };
        for &cpu in cpus {
            if cpu >= limit {
                return Err(Error::ResourceBind(format!("cpu {cpu} exceeds CPU_SETSIZE")));
            }
            // SAFETY: cpu < CPU_SETSIZE, checked above.
            unsafe { libc::CPU_SET(cpu, &mut set) };
        }
        // SAFETY: pid 0 is the calling thread; set is initialised and sized.
        let rc = unsafe { libc::sched_setaffinity(0, mem::size_of::<libc::cpu_set_t>(), &set) };
        if rc != 0 {
            return Err(Error::ResourceBind(format!(
                "sched_setaffinity: {}",
                io::Error::last_os_error()
            )));
        }
        Ok(())
    }

    pub fn interleave_memory(node: usize) -> Result<()> {
        let bits = <libc::c_ulong>::BITS as usize;
        let mut mask: Vec<libc::c_ulong> = vec![0; node / bits + 1];
        mask[node / bits] |= 1 << (node % bits);
        let maxnode = (mask.len() * bits + 1) as libc::c_ulong;
        // SAFETY: mask outlives the call and holds `maxnode` bits.
        let rc = unsafe {
            libc::syscall(
                libc::SYS_set_mempolicy,
                MPOL_INTERLEAVE,
                mask.as_ptr(),
                maxnode,
            )
        };
        if rc != 0 {
            return Err(Error::ResourceBind(format!(
                "set_mempolicy(MPOL_INTERLEAVE, node {node}): {}",
                io::Error::last_os_error()
            )));
        }
        Ok(())
    }
}

#[cfg(not(target_os = "linux"))]
mod sys {
    use strata_core::prelude::{Error, Result};

    pub fn set_affinity(_cpus: &[usize]) -> Result<()> {
        Err(Error::ResourceBind("CPU affinity is only supported on Linux".into()))
    }

    pub fn interleave_memory(_node: usize) -> Result<()> {
        Err(Error::ResourceBind("memory policy is only supported on Linux".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sysfs_cpu_lists() {
        assert_eq!(parse_cpu_list("0-3,8,10-11\n").unwrap(), vec![0, 1, 2, 3, 8, 10, 11]);
        assert_eq!(parse_cpu_list("5").unwrap(), vec![5]);
        assert!(parse_cpu_list("").unwrap().is_empty());
        assert!(parse_cpu_list("3-1").is_err());
        assert!(parse_cpu_list("a-b").is_err());
    }

    #[test]
    fn missing_node_is_a_bind_error() {
        assert!(matches!(
            node_cpus(100_000),
            Err(Error::ResourceBind(_))
        ));
    }
}
