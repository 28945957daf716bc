use crate::exec::CommandRunner;
use crate::{BrewServicesOptions, CommandSpec, Error, ListeningPort, PortProtocol};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use std::collections::{BTreeSet, HashSet, VecDeque};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Failure of port detection. The store never surfaces these.
#[derive(Clone, Debug, thiserror::Error)]
#[non_exhaustive]
pub enum PortDetectionError {
    /// `lsof` exited with something other than 0 or 1.
    #[error("port detection failed (exit {exit_code}): {stderr}")]
    SocketQueryFailed { exit_code: i32, stderr: String },

    /// The service has no running process.
    #[error("service is not running (no PID)")]
    NoProcessId,

    /// `pgrep`/`lsof` could not be run.
    #[error(transparent)]
    Command(#[from] Error),
}

/// Finds the listening sockets of a process tree.
#[async_trait]
pub trait PortProbe: fmt::Debug + Send + Sync {
    async fn detect_ports(
        &self,
        pid: u32,
        cancel: &CancellationToken,
    ) -> std::result::Result<Vec<ListeningPort>, PortDetectionError>;
}

/// `PortProbe` built on `pgrep -P` (descendant discovery) and `lsof` (socket query).
#[derive(Clone, Debug)]
pub struct PortDetector {
    runner: Arc<dyn CommandRunner>,
    lsof: PathBuf,
    pgrep: PathBuf,
    lsof_timeout: Duration,
    pgrep_timeout: Duration,
}

impl PortDetector {
    pub fn new(runner: Arc<dyn CommandRunner>, opts: &BrewServicesOptions) -> Self {
        Self {
            runner,
            lsof: opts.lsof_path.clone(),
            pgrep: opts.pgrep_path.clone(),
            lsof_timeout: opts.lsof_timeout,
            pgrep_timeout: opts.pgrep_timeout,
        }
    }

    /// `pid` and every process transitively spawned by it, in discovery order.
    async fn descendants(
        &self,
        pid: u32,
        cancel: &CancellationToken,
    ) -> std::result::Result<Vec<u32>, PortDetectionError> {
        let mut seen = HashSet::from([pid]);
        let mut all = vec![pid];
        let mut queue = VecDeque::from([pid]);

        while let Some(current) = queue.pop_front() {
            let spec = CommandSpec::new(self.pgrep.clone())
                .args(["-P".to_string(), current.to_string()])
                .timeout(self.pgrep_timeout);
            let r = self.runner.execute(&spec, cancel).await?;
            if r.cancelled {
                return Err(Error::Cancelled.into());
            }
            // pgrep exits 1 when there are no children.
            if !r.is_success() {
                continue;
            }
            for child in parse_pids(&r.stdout) {
                if seen.insert(child) {
                    all.push(child);
                    queue.push_back(child);
                }
            }
        }
        Ok(all)
    }
}

#[async_trait]
impl PortProbe for PortDetector {
    async fn detect_ports(
        &self,
        pid: u32,
        cancel: &CancellationToken,
    ) -> std::result::Result<Vec<ListeningPort>, PortDetectionError> {
        if pid == 0 {
            return Err(PortDetectionError::NoProcessId);
        }

        let pids = self.descendants(pid, cancel).await?;
        let pid_list = pids
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(",");

        #[cfg(feature = "tracing")]
        tracing::info!(pid, descendants = pids.len() - 1, "detecting listening ports");

        let spec = CommandSpec::new(self.lsof.clone())
            .args(["-nP", "-iTCP", "-sTCP:LISTEN", "-a", "-p"])
            .args([pid_list])
            .timeout(self.lsof_timeout);
        let r = self.runner.execute(&spec, cancel).await?;
        if r.cancelled {
            return Err(Error::Cancelled.into());
        }
        match r.exit_code {
            0 => Ok(parse_lsof_output(&r.stdout)),
            // lsof exits 1 when nothing matched.
            1 => Ok(Vec::new()),
            code => Err(PortDetectionError::SocketQueryFailed {
                exit_code: code,
                stderr: crate::error::truncate_for_error(&r.stderr, 8 * 1024).into_owned(),
            }),
        }
    }
}

fn parse_pids(output: &str) -> impl Iterator<Item = u32> + '_ {
    output.lines().filter_map(|l| l.trim().parse::<u32>().ok())
}

/// Parse `lsof -nP` rows: `COMMAND PID USER FD TYPE DEVICE SIZE/OFF NODE NAME ...`.
///
/// The port is the text after the last `:` of `NAME`. Results are unique per
/// (protocol, port) and sorted by port.
pub(crate) fn parse_lsof_output(output: &str) -> Vec<ListeningPort> {
    let mut seen = BTreeSet::new();
    let mut out = Vec::new();

    for line in output.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 9 {
            continue;
        }
        let protocol = if parts[7].starts_with("TCP") {
            PortProtocol::Tcp
        } else if parts[7].starts_with("UDP") {
            PortProtocol::Udp
        } else {
            continue;
        };
        let Some(port) = parts[8]
            .rsplit(':')
            .next()
            .and_then(|p| p.parse::<u16>().ok())
        else {
            continue;
        };
        if seen.insert((protocol, port)) {
            out.push(ListeningPort::new(port, protocol));
        }
    }

    out.sort_by_key(|p| p.port);
    out
}
