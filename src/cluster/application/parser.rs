//! Parsers for scheduler command output.
//!
//! All functions are pure and lenient: a malformed line is skipped (and logged
//! at debug level), never fatal to the rest of the output.

use crate::core::domain::model::{
    ControlDetails, JobRecord, JobSet, MemoryStats, NodeActivity, NodeControlFields,
    NodeInventory, NodeRecord, QueueSummary,
};
use std::str::FromStr;

const INVENTORY_HEADER_TOKEN: &str = "PARTITION";
const NODE_NAME_PREFIX: &str = "NodeName=";
const LAST_BUSY_PREFIX: &str = "LastBusyTime=";

/// Reads the leading digits of `token` (`"48+"` is 48). Anything else is the
/// zero sentinel.
pub fn lenient_number<T: FromStr + Default>(token: &str) -> T {
    let end = token
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(token.len());
    token[..end].parse().unwrap_or_default()
}

fn content_lines(stdout: &str) -> impl Iterator<Item = &str> {
    stdout.lines().map(str::trim).filter(|line| !line.is_empty())
}

/// Parses `sinfo -o "%P %n %T %c %m"` output.
///
/// Columns are `partition name state cpus memoryMB`; an optional header line
/// containing `PARTITION` is dropped. Lines with fewer than five columns are
/// skipped. A node listed under several partitions keeps the last entry.
pub fn parse_inventory(stdout: &str) -> NodeInventory {
    let mut lines = content_lines(stdout).peekable();
    if lines
        .peek()
        .is_some_and(|first| first.contains(INVENTORY_HEADER_TOKEN))
    {
        lines.next();
    }

    let mut inventory = NodeInventory::new();
    for line in lines {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 5 {
            tracing::debug!(line, "skipping short inventory line");
            continue;
        }
        let record = NodeRecord::new(
            fields[1],
            fields[0].replace('*', ""),
            fields[2],
            lenient_number(fields[3]),
            lenient_number(fields[4]),
        );
        inventory.insert(record.name.clone(), record);
    }
    inventory
}

/// Parses the `total used free` megabyte triple printed by the remote `free -m` pipeline.
pub fn parse_free_memory(stdout: &str) -> Option<MemoryStats> {
    let tokens: Vec<&str> = stdout.split_whitespace().collect();
    let [total, used, free] = tokens.as_slice() else {
        return None;
    };
    Some(MemoryStats::from_mb(
        total.parse().ok()?,
        used.parse().ok()?,
        free.parse().ok()?,
    ))
}

/// Parses `scontrol show node ...` output into allow-listed fields per node.
///
/// A line starting with `NodeName=` opens a new record; `Key=Value` tokens on
/// that line and on following lines are folded into it.
pub fn parse_control(stdout: &str) -> ControlDetails {
    let mut details = ControlDetails::new();
    let mut current: Option<String> = None;
    for line in content_lines(stdout) {
        if let Some(rest) = line.strip_prefix(NODE_NAME_PREFIX) {
            let name = rest.split_whitespace().next().unwrap_or_default().to_string();
            details.insert(name.clone(), NodeControlFields::default());
            current = Some(name);
        }
        let Some(fields) = current.as_ref().and_then(|name| details.get_mut(name)) else {
            continue;
        };
        for (key, value) in line.split_whitespace().filter_map(|t| t.split_once('=')) {
            fields.insert(key, value);
        }
    }
    details
}

/// Parses `squeue -h -o %u`: one submitting user per line.
pub fn parse_queue_users(stdout: &str) -> QueueSummary {
    content_lines(stdout).fold(QueueSummary::default(), |mut summary, user| {
        summary.total_jobs += 1;
        *summary.per_user.entry(user.to_string()).or_insert(0) += 1;
        summary
    })
}

/// Parses `squeue -u <user> -h -o "%i %j %T %N"`.
///
/// Lines with fewer than four columns are skipped; pending jobs have no
/// node column and are therefore not tracked.
pub fn parse_user_jobs(stdout: &str) -> JobSet {
    let mut jobs = JobSet::new();
    for line in content_lines(stdout) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 4 {
            tracing::debug!(line, "skipping short job line");
            continue;
        }
        jobs.insert(
            fields[0].to_string(),
            JobRecord::new(fields[1], fields[2], fields[3]),
        );
    }
    jobs
}

/// Parses `squeue -w <node> -h -o "%u %j %M"`, reporting the first job.
pub fn parse_node_jobs(stdout: &str) -> Option<NodeActivity> {
    let first = content_lines(stdout).next()?;
    let fields: Vec<&str> = first.split_whitespace().collect();
    match fields.as_slice() {
        [user, job_name, elapsed, ..] => Some(NodeActivity::Running {
            user: user.to_string(),
            job_name: job_name.to_string(),
            elapsed: elapsed.to_string(),
        }),
        _ => None,
    }
}

/// Extracts the value of `LastBusyTime=` from control-query output.
pub fn parse_last_busy(stdout: &str) -> Option<NodeActivity> {
    let (_, rest) = stdout.split_once(LAST_BUSY_PREFIX)?;
    let timestamp = rest.split_whitespace().next()?;
    Some(NodeActivity::IdleSince(timestamp.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::model::CanonicalState;

    const SINFO: &str = "\
PARTITION HOSTNAMES STATE CPUS MEMORY
alto* huk01 idle 48 128000
alto* huk02 mixed 48+ 128000
medio huk03 allocated 32 64000
alto huk01 idle 48 128000
broken line
";

    #[test]
    fn test_inventory_strips_header_and_markers() {
        let inventory = parse_inventory(SINFO);
        assert_eq!(inventory.len(), 3);
        let huk01 = &inventory["huk01"];
        assert_eq!(huk01.partition, "alto");
        assert_eq!(huk01.canonical_state, CanonicalState::Idle);
        assert_eq!(huk01.cpu_total, 48);
        assert_eq!(huk01.memory_total_mb, 128000);
        assert_eq!(inventory["huk02"].cpu_total, 48);
        assert_eq!(inventory["huk03"].canonical_state, CanonicalState::Allocated);
    }

    #[test]
    fn test_inventory_skips_three_field_line() {
        let inventory = parse_inventory("alto huk01 idle\n");
        assert!(inventory.is_empty());
        assert!(!inventory.contains_key("huk01"));
    }

    #[test]
    fn test_inventory_without_header_and_bad_numbers() {
        let inventory = parse_inventory("gpu huk90 down* N/A 1000\n");
        let record = &inventory["huk90"];
        assert_eq!(record.cpu_total, 0);
        assert_eq!(record.memory_total_mb, 1000);
        assert_eq!(record.canonical_state, CanonicalState::DownOrUnknown);
        assert!(parse_inventory("").is_empty());
    }

    #[test]
    fn test_lenient_number() {
        assert_eq!(lenient_number::<u32>("48"), 48);
        assert_eq!(lenient_number::<u32>("48+"), 48);
        assert_eq!(lenient_number::<u64>("N/A"), 0);
        assert_eq!(lenient_number::<u64>(""), 0);
    }

    #[test]
    fn test_free_memory_requires_exactly_three_numbers() {
        let stats = parse_free_memory("  2048 1024 512\n").unwrap();
        assert_eq!(stats.total_gb, 2.0);
        assert_eq!(stats.free_gb, 0.5);
        assert_eq!(parse_free_memory("2048 1024"), None);
        assert_eq!(parse_free_memory("2048 1024 512 7"), None);
        assert_eq!(parse_free_memory("total used free"), None);
        assert_eq!(parse_free_memory(""), None);
    }

    #[test]
    fn test_control_blocks_fold_allowed_keys() {
        let output = "\
NodeName=huk01 Arch=x86_64 CoresPerSocket=24
   CPUAlloc=12 CPUTot=48 CPULoad=11.50
   RealMemory=128000 AllocMem=64000 FreeMem=60000
NodeName=huk02 Arch=x86_64
   CPUAlloc=0 CPUTot=48
";
        let details = parse_control(output);
        assert_eq!(details.len(), 2);
        let huk01 = &details["huk01"];
        assert_eq!(huk01.cpu_alloc(), Some(12));
        assert_eq!(huk01.cpu_total(), Some(48));
        assert_eq!(huk01.cpu_load(), Some(11.5));
        assert_eq!(huk01.real_memory_mb(), Some(128000));
        assert_eq!(huk01.alloc_mem_mb(), Some(64000));
        assert_eq!(huk01.get("FreeMem"), None);
        assert_eq!(huk01.get("Arch"), None);
        assert_eq!(huk01.get("NodeName"), None);
        assert_eq!(details["huk02"].real_memory_mb(), None);
    }

    #[test]
    fn test_control_ignores_fields_before_first_node() {
        let details = parse_control("RealMemory=1\nNodeName=huk05\nCPUTot=8\n");
        assert_eq!(details.len(), 1);
        assert_eq!(details["huk05"].cpu_total(), Some(8));
        assert_eq!(details["huk05"].real_memory_mb(), None);
    }

    #[test]
    fn test_queue_users_grouped() {
        let summary = parse_queue_users("ana\nbob\n\nana\n  carlos  \n");
        assert_eq!(summary.total_jobs, 4);
        assert_eq!(summary.per_user["ana"], 2);
        assert_eq!(summary.per_user["bob"], 1);
        assert_eq!(summary.per_user["carlos"], 1);
        assert_eq!(parse_queue_users(""), QueueSummary::default());
    }

    #[test]
    fn test_user_jobs_skip_malformed() {
        let jobs = parse_user_jobs("101 train RUNNING huk01\n102 eval PENDING\n103 sweep RUNNING huk07\n");
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs["101"], JobRecord::new("train", "RUNNING", "huk01"));
        assert!(!jobs.contains_key("102"));
    }

    #[test]
    fn test_node_activity_parsers() {
        assert_eq!(
            parse_node_jobs("bob train 1-02:03:04\nana other 5:00\n"),
            Some(NodeActivity::Running {
                user: "bob".into(),
                job_name: "train".into(),
                elapsed: "1-02:03:04".into()
            })
        );
        assert_eq!(parse_node_jobs("bob\n"), None);
        assert_eq!(parse_node_jobs(""), None);
        assert_eq!(
            parse_last_busy("   LastBusyTime=2024-10-27T10:00:00 ResumeAfterTime=None\n"),
            Some(NodeActivity::IdleSince("2024-10-27T10:00:00".into()))
        );
        assert_eq!(parse_last_busy("State=IDLE"), None);
    }
}
