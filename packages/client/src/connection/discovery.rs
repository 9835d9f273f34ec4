//! LAN discovery of signaling servers.
//!
//! A candidate is any `ws://` URL built from the loopback alias plus the
//! first few host addresses of every local IPv4 subnet. Each candidate gets a
//! short-lived test connection; it counts as found only if it greets with a
//! recognized success string before the probe timeout.

use std::{
    collections::HashSet,
    net::{IpAddr, Ipv4Addr},
    sync::Arc,
    time::Duration,
};

use futures_util::StreamExt;
use tokio::{sync::Semaphore, task::JoinSet};
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};

use crate::error::ClientError;

pub const DEFAULT_SERVER_PORT: u16 = 8887;
pub const DEFAULT_SERVER_PATH: &str = "/ws";

/// Address tried by the "canonical local" fallback
pub const CANONICAL_LOCAL_URL: &str = "ws://localhost:8887/ws";

const SUCCESS_MARKERS: [&str; 4] = ["Connected", "Welcome", "WELCOME", "connected"];
const FAILURE_MARKERS: [&str; 4] = ["ERROR", "DISCONNECTED", "disconnected", "Failed"];

/// Discovery settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryConfig {
    pub port: u16,
    pub path: String,
    /// Hosts `.1` through `.host_suffixes` are probed on each subnet
    pub host_suffixes: u8,
    pub probe_timeout: Duration,
    pub max_parallel: usize,
    /// Minimum barrier for the whole pass; probes still running are aborted
    pub pass_timeout: Duration,
}

impl DiscoveryConfig {
    /// Barrier for a pass over `candidates` probes.
    ///
    /// At least one probe window per batch of `max_parallel`, so the last
    /// batch is never aborted before it had a chance to run.
    pub fn pass_budget(&self, candidates: usize) -> Duration {
        let batches = candidates.div_ceil(self.max_parallel.max(1));
        let batches = u32::try_from(batches).unwrap_or(u32::MAX);
        self.probe_timeout.saturating_mul(batches).max(self.pass_timeout)
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_SERVER_PORT,
            path: DEFAULT_SERVER_PATH.to_string(),
            host_suffixes: 20,
            probe_timeout: Duration::from_secs(2),
            max_parallel: 32,
            pass_timeout: Duration::from_secs(5),
        }
    }
}

/// How a server's first text message reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Greeting {
    Success,
    Failure,
    Unrecognized,
}

/// Failure markers win over success markers ("Failed to connect" contains "connect").
pub fn classify_greeting(text: &str) -> Greeting {
    if FAILURE_MARKERS.iter().any(|m| text.contains(m)) {
        Greeting::Failure
    } else if SUCCESS_MARKERS.iter().any(|m| text.contains(m)) {
        Greeting::Success
    } else {
        Greeting::Unrecognized
    }
}

/// Local IPv4 addresses, excluding loopback and link-local
pub fn local_ipv4_addrs() -> Vec<Ipv4Addr> {
    let mut addrs = Vec::new();

    match local_ip_address::list_afinet_netifas() {
        Ok(interfaces) => {
            for (_, ip) in interfaces {
                if let IpAddr::V4(v4) = ip
                    && !v4.is_loopback()
                    && !v4.is_link_local()
                {
                    addrs.push(v4);
                }
            }
        }
        Err(e) => tracing::warn!("Failed to list network interfaces: {}", e),
    }

    addrs.sort();
    addrs.dedup();
    addrs
}

/// Build the candidate list: loopback alias first, then each subnet's low hosts
pub fn candidate_urls(config: &DiscoveryConfig, local: &[Ipv4Addr]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut urls = Vec::new();
    let mut push = |host: String| {
        let url = format!("ws://{}:{}{}", host, config.port, config.path);
        if seen.insert(url.clone()) {
            urls.push(url);
        }
    };

    push("localhost".to_string());
    for addr in local {
        let [a, b, c, _] = addr.octets();
        for suffix in 1..=config.host_suffixes {
            push(Ipv4Addr::new(a, b, c, suffix).to_string());
        }
    }

    urls
}

/// Open a test connection and wait for a recognized greeting.
///
/// The connection is always closed before returning.
pub async fn probe(url: &str, timeout: Duration) -> bool {
    let attempt = async {
        let (mut ws, _) = connect_async(url).await.ok()?;

        let mut found = false;
        while let Some(message) = ws.next().await {
            match message {
                Ok(Message::Text(text)) => match classify_greeting(text.as_str()) {
                    Greeting::Success => {
                        found = true;
                        break;
                    }
                    Greeting::Failure => break,
                    Greeting::Unrecognized => continue,
                },
                Ok(Message::Close(_)) | Err(_) => break,
                Ok(_) => continue,
            }
        }

        if let Err(e) = ws.close(None).await {
            tracing::trace!("Closing test connection to {} failed: {}", url, e);
        }
        Some(found)
    };

    match tokio::time::timeout(timeout, attempt).await {
        Ok(Some(found)) => found,
        Ok(None) => false,
        Err(_) => {
            tracing::trace!("Probe of {} timed out", url);
            false
        }
    }
}

/// Probe every candidate built from the local interfaces
pub async fn discover(config: &DiscoveryConfig) -> Vec<String> {
    let candidates = candidate_urls(config, &local_ipv4_addrs());
    discover_among(config, candidates).await
}

/// Probe the given candidates in parallel and return the responsive ones in candidate order
pub async fn discover_among(config: &DiscoveryConfig, candidates: Vec<String>) -> Vec<String> {
    let budget = config.pass_budget(candidates.len());
    tracing::info!(
        "Probing {} candidate server(s) within {:?}",
        candidates.len(),
        budget
    );

    let semaphore = Arc::new(Semaphore::new(config.max_parallel.max(1)));
    let mut probes = JoinSet::new();

    for (index, url) in candidates.into_iter().enumerate() {
        let semaphore = semaphore.clone();
        let probe_timeout = config.probe_timeout;
        probes.spawn(async move {
            let _permit = semaphore.acquire_owned().await.ok()?;
            probe(&url, probe_timeout).await.then_some((index, url))
        });
    }

    let mut found = Vec::new();
    let barrier = tokio::time::timeout(budget, async {
        while let Some(result) = probes.join_next().await {
            match result {
                Ok(Some(hit)) => found.push(hit),
                Ok(None) => {}
                Err(e) => tracing::debug!("Probe task ended abnormally: {}", e),
            }
        }
    })
    .await;

    if barrier.is_err() {
        tracing::warn!("Discovery pass timed out, aborting {} probe(s)", probes.len());
        probes.abort_all();
    }

    found.sort_by_key(|(index, _)| *index);
    let servers: Vec<String> = found.into_iter().map(|(_, url)| url).collect();
    tracing::info!("Discovery found {} server(s)", servers.len());
    servers
}

/// Turn operator input into a server URL.
///
/// Accepts a full `ws://` / `wss://` URL, `host:port`, or a bare host. Bare
/// hosts must be `localhost` or a dotted-quad IPv4 address.
pub fn parse_manual_address(
    input: &str,
    default_port: u16,
    path: &str,
) -> Result<String, ClientError> {
    let input = input.trim();
    if input.starts_with("ws://") || input.starts_with("wss://") {
        return Ok(input.to_string());
    }

    let invalid = || ClientError::InvalidAddress(input.to_string());
    let (host, port) = match input.split_once(':') {
        Some((host, port)) => (host, port.parse::<u16>().map_err(|_| invalid())?),
        None => (input, default_port),
    };

    if host != "localhost" && host.parse::<Ipv4Addr>().is_err() {
        return Err(invalid());
    }

    Ok(format!("ws://{}:{}{}", host, port, path))
}
