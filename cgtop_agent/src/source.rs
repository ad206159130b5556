//! Raw counter reads from the control-group filesystem and the system-wide
//! network statistics file. Every read is best-effort: a missing or
//! unreadable file yields `None` for that field and never an error, since the
//! tree can change shape between listing and reading.

use std::fs;
use std::path::{Path, PathBuf};

pub const CPU_STAT_FILE: &str = "cpu.stat";
pub const CPU_USAGE_KEY: &str = "usage_usec";
pub const MEMORY_FILE: &str = "memory.current";
pub const PROCS_FILE: &str = "cgroup.procs";
pub const FREEZE_FILE: &str = "cgroup.freeze";

/// Interface name prefixes counted towards the global network counter.
/// Loopback is deliberately absent.
pub const NET_IFACE_PREFIXES: &[&str] = &[
    "eth", "en", "wl", "ww", "veth", "br", "bond", "docker", "virbr", "tun", "tap",
];

/// Unparsed-to-domain values for one node directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawSample {
    /// Cumulative CPU time in microseconds.
    pub cpu_usage_usec: Option<u64>,
    pub memory_bytes: Option<u64>,
    pub pid_count: Option<u64>,
    pub frozen: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct CgroupFs {
    net_dev: PathBuf,
}

impl CgroupFs {
    pub fn new(net_dev: impl Into<PathBuf>) -> Self {
        Self {
            net_dev: net_dev.into(),
        }
    }

    /// Read all counters of one node directory.
    /// Returns `None` when the directory itself is gone by the time we look.
    pub fn sample(&self, dir: &Path) -> Option<RawSample> {
        let sample = RawSample {
            cpu_usage_usec: read_cpu_usage(dir),
            memory_bytes: read_u64(&dir.join(MEMORY_FILE)),
            pid_count: read_pid_count(dir),
            frozen: read_frozen(dir),
        };
        // A node vanishing mid-read shows up as a missing directory afterwards.
        if fs::metadata(dir).map(|m| m.is_dir()).unwrap_or(false) {
            Some(sample)
        } else {
            None
        }
    }

    /// Cumulative rx+tx bytes over recognized interfaces, or `None` if the
    /// statistics file cannot be read.
    pub fn net_total_bytes(&self) -> Option<u64> {
        let s = fs::read_to_string(&self.net_dev).ok()?;
        Some(parse_net_dev(&s))
    }
}

fn read_u64(path: &Path) -> Option<u64> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}

fn read_cpu_usage(dir: &Path) -> Option<u64> {
    let s = fs::read_to_string(dir.join(CPU_STAT_FILE)).ok()?;
    parse_cpu_usage(&s)
}

fn read_pid_count(dir: &Path) -> Option<u64> {
    let s = fs::read_to_string(dir.join(PROCS_FILE)).ok()?;
    Some(s.split_whitespace().count() as u64)
}

fn read_frozen(dir: &Path) -> Option<bool> {
    let s = fs::read_to_string(dir.join(FREEZE_FILE)).ok()?;
    match s.trim() {
        "1" => Some(true),
        "0" => Some(false),
        _ => None,
    }
}

/// Extract the `usage_usec` counter from `cpu.stat` contents.
pub fn parse_cpu_usage(s: &str) -> Option<u64> {
    s.lines().find_map(|line| {
        let mut it = line.split_whitespace();
        if it.next()? == CPU_USAGE_KEY {
            it.next()?.parse().ok()
        } else {
            None
        }
    })
}

/// Sum rx and tx byte counters from `/proc/net/dev` formatted text.
///
/// ```text
/// Inter-|   Receive                            |  Transmit
///  face |bytes    packets errs drop ...         |bytes    packets ...
///   eth0: 1234    10      0    0    0 0 0 0      5678     20 ...
/// ```
pub fn parse_net_dev(s: &str) -> u64 {
    let mut total: u64 = 0;
    for line in s.lines() {
        let Some((iface, rest)) = line.split_once(':') else {
            continue;
        };
        let iface = iface.trim();
        if !NET_IFACE_PREFIXES.iter().any(|p| iface.starts_with(p)) {
            continue;
        }
        let fields: Vec<&str> = rest.split_whitespace().collect();
        // 8 receive columns precede the transmit block.
        let rx = fields.first().and_then(|v| v.parse::<u64>().ok()).unwrap_or(0);
        let tx = fields.get(8).and_then(|v| v.parse::<u64>().ok()).unwrap_or(0);
        total = total.saturating_add(rx).saturating_add(tx);
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;

    const NET_DEV: &str = "\
Inter-|   Receive                                                |  Transmit
 face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
    lo: 9999999    100    0    0    0     0          0         0  9999999     100    0    0    0     0       0          0
  eth0:    1000     10    0    0    0     0          0         0     2000      20    0    0    0     0       0          0
wlp3s0:     300      3    0    0    0     0          0         0      400       4    0    0    0     0       0          0
 dummy:     555      5    0    0    0     0          0         0      555       5    0    0    0     0       0          0
";

    #[test]
    fn net_dev_sums_recognized_interfaces_only() {
        assert_eq!(parse_net_dev(NET_DEV), 1000 + 2000 + 300 + 400);
    }

    #[test]
    fn cpu_usage_line_is_found() {
        let s = "usage_usec 1300000\nuser_usec 1000000\nsystem_usec 300000\n";
        assert_eq!(parse_cpu_usage(s), Some(1_300_000));
        assert_eq!(parse_cpu_usage("user_usec 5\n"), None);
        // prefix of another key must not match
        assert_eq!(parse_cpu_usage("usage_usec_total 5\n"), None);
    }

    #[test]
    fn sample_reads_files_and_tolerates_missing_ones() {
        let td = tempfile::tempdir().unwrap();
        let dir = td.path().join("a");
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join(CPU_STAT_FILE), "usage_usec 42\n").unwrap();
        fs::write(dir.join(MEMORY_FILE), "1048576\n").unwrap();
        fs::write(dir.join(PROCS_FILE), "1\n22\n333\n").unwrap();

        let src = CgroupFs::new(td.path().join("no-such-net-dev"));
        let s = src.sample(&dir).unwrap();
        assert_eq!(s.cpu_usage_usec, Some(42));
        assert_eq!(s.memory_bytes, Some(1_048_576));
        assert_eq!(s.pid_count, Some(3));
        assert_eq!(s.frozen, None);
        assert_eq!(src.net_total_bytes(), None);
    }

    #[test]
    fn vanished_directory_yields_none() {
        let td = tempfile::tempdir().unwrap();
        let src = CgroupFs::new("/proc/net/dev");
        assert!(src.sample(&td.path().join("gone")).is_none());
    }

    #[test]
    fn freeze_flag_parsing() {
        let td = tempfile::tempdir().unwrap();
        fs::write(td.path().join(FREEZE_FILE), "1\n").unwrap();
        assert_eq!(read_frozen(td.path()), Some(true));
        fs::write(td.path().join(FREEZE_FILE), "0").unwrap();
        assert_eq!(read_frozen(td.path()), Some(false));
    }
}
