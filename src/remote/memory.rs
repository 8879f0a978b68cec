//! In-memory remote store.
//!
//! Hosts, shares, files and directory links live in memory, and failures can
//! be injected at every call of the session. Used by the test suite; also
//! handy for exercising a configuration without touching the network.

use std::collections::HashMap;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context as TaskContext, Poll};
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use tokio::io::{AsyncRead, ReadBuf};

use crate::config::HostConfig;
use crate::remote::{FetchStream, RemoteEntry, RemoteSession, RemoteStore};

/// Link chains longer than this are treated as unresolvable.
const MAX_LINK_HOPS: usize = 16;

#[derive(Debug, Clone)]
enum Node {
    File(Arc<Vec<u8>>),
    Dir,
    Link(Option<String>),
}

#[derive(Debug, Clone)]
enum FetchFailure {
    Open(String),
    AfterBytes(usize),
    Stall,
}

#[derive(Debug, Clone, Default)]
struct MemoryShare {
    name: String,
    /// Share-relative paths in insertion order, which is also listing order
    nodes: Vec<(String, Node)>,
}

impl MemoryShare {
    fn find(&self, path: &str) -> Option<&Node> {
        self.nodes
            .iter()
            .find(|(p, _)| p.eq_ignore_ascii_case(path))
            .map(|(_, node)| node)
    }

    fn insert(&mut self, path: &str, node: Node) {
        let segments: Vec<&str> = path.split('/').collect();
        for depth in 1..segments.len() {
            let parent = segments[..depth].join("/");
            if self.find(&parent).is_none() {
                self.nodes.push((parent, Node::Dir));
            }
        }

        match self.nodes.iter_mut().find(|(p, _)| p.eq_ignore_ascii_case(path)) {
            Some(existing) => existing.1 = node,
            None => self.nodes.push((path.to_string(), node)),
        }
    }

    /// Replace link prefixes of `path` with their targets.
    fn resolve(&self, path: &str) -> Result<String> {
        let mut current = path.to_string();

        'hops: for _ in 0..MAX_LINK_HOPS {
            for (link, node) in &self.nodes {
                let Node::Link(target) = node else { continue };
                let lower = current.to_ascii_lowercase();
                let link_lower = link.to_ascii_lowercase();

                let rest = if lower == link_lower {
                    String::new()
                } else if lower.starts_with(&format!("{}/", link_lower)) {
                    current[link.len() + 1..].to_string()
                } else {
                    continue;
                };

                let target = target
                    .as_ref()
                    .ok_or_else(|| anyhow!("link {} has no target", link))?;
                current = match (target.is_empty(), rest.is_empty()) {
                    (_, true) => target.clone(),
                    (true, false) => rest,
                    (false, false) => format!("{}/{}", target, rest),
                };
                continue 'hops;
            }
            return Ok(current);
        }

        bail!("too many levels of links resolving {}", path)
    }
}

#[derive(Debug, Clone, Default)]
struct MemoryHost {
    shares: Vec<MemoryShare>,
    connect_error: Option<String>,
    connect_delay: Option<Duration>,
    list_shares_error: Option<String>,
    list_delay: Option<Duration>,
    list_errors: HashMap<(String, String), String>,
    fetch_failures: HashMap<(String, String), FetchFailure>,
}

impl MemoryHost {
    fn share(&self, name: &str) -> Result<&MemoryShare> {
        self.shares
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| anyhow!("The network name cannot be found: {}", name))
    }

    fn share_mut(&mut self, name: &str) -> &mut MemoryShare {
        let index = match self.shares.iter().position(|s| s.name.eq_ignore_ascii_case(name)) {
            Some(index) => index,
            None => {
                self.shares.push(MemoryShare {
                    name: name.to_string(),
                    nodes: Vec::new(),
                });
                self.shares.len() - 1
            }
        };
        &mut self.shares[index]
    }
}

fn key(share: &str, path: &str) -> (String, String) {
    (share.to_ascii_lowercase(), clean(path).to_ascii_lowercase())
}

fn clean(path: &str) -> String {
    path.split(|c| c == '/' || c == '\\')
        .filter(|s| !s.is_empty() && *s != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// In-memory [`RemoteStore`] with failure injection.
#[derive(Debug, Default)]
pub struct MemoryStore {
    hosts: HashMap<String, Arc<MemoryHost>>,
    opened: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn host_mut(&mut self, address: &str) -> &mut MemoryHost {
        let entry = self
            .hosts
            .entry(address.to_ascii_lowercase())
            .or_default();
        Arc::make_mut(entry)
    }

    /// Add an empty share.
    pub fn add_share(&mut self, address: &str, share: &str) -> &mut Self {
        self.host_mut(address).share_mut(share);
        self
    }

    /// Add a file; missing parent directories are created.
    pub fn add_file(&mut self, address: &str, share: &str, path: &str, content: impl Into<Vec<u8>>) -> &mut Self {
        let node = Node::File(Arc::new(content.into()));
        self.host_mut(address).share_mut(share).insert(&clean(path), node);
        self
    }

    pub fn add_dir(&mut self, address: &str, share: &str, path: &str) -> &mut Self {
        self.host_mut(address).share_mut(share).insert(&clean(path), Node::Dir);
        self
    }

    /// Add a directory link pointing at a share-relative `target`.
    pub fn add_dir_link(&mut self, address: &str, share: &str, path: &str, target: Option<&str>) -> &mut Self {
        let node = Node::Link(target.map(clean));
        self.host_mut(address).share_mut(share).insert(&clean(path), node);
        self
    }

    pub fn fail_connect(&mut self, address: &str, reason: &str) -> &mut Self {
        self.host_mut(address).connect_error = Some(reason.to_string());
        self
    }

    pub fn delay_connect(&mut self, address: &str, delay: Duration) -> &mut Self {
        self.host_mut(address).connect_delay = Some(delay);
        self
    }

    pub fn fail_list_shares(&mut self, address: &str, reason: &str) -> &mut Self {
        self.host_mut(address).list_shares_error = Some(reason.to_string());
        self
    }

    /// Delay every directory listing on the host.
    pub fn delay_list(&mut self, address: &str, delay: Duration) -> &mut Self {
        self.host_mut(address).list_delay = Some(delay);
        self
    }

    pub fn fail_list(&mut self, address: &str, share: &str, path: &str, reason: &str) -> &mut Self {
        self.host_mut(address)
            .list_errors
            .insert(key(share, path), reason.to_string());
        self
    }

    /// Fail opening the file.
    pub fn fail_fetch(&mut self, address: &str, share: &str, path: &str, reason: &str) -> &mut Self {
        self.host_mut(address)
            .fetch_failures
            .insert(key(share, path), FetchFailure::Open(reason.to_string()));
        self
    }

    /// Deliver `bytes` bytes of the file, then fail the read.
    pub fn fail_fetch_after(&mut self, address: &str, share: &str, path: &str, bytes: usize) -> &mut Self {
        self.host_mut(address)
            .fetch_failures
            .insert(key(share, path), FetchFailure::AfterBytes(bytes));
        self
    }

    /// Open the file normally but never deliver a byte.
    pub fn stall_fetch(&mut self, address: &str, share: &str, path: &str) -> &mut Self {
        self.host_mut(address)
            .fetch_failures
            .insert(key(share, path), FetchFailure::Stall);
        self
    }

    /// Number of sessions opened so far
    pub fn opened_sessions(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Number of sessions closed so far
    pub fn closed_sessions(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn open(&self, host: &HostConfig, _client_name: &str) -> Result<Box<dyn RemoteSession>> {
        let data = self
            .hosts
            .get(&host.address.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| anyhow!("host {} is unreachable", host.address))?;

        if let Some(delay) = data.connect_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(reason) = &data.connect_error {
            bail!("{}", reason);
        }

        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemorySession {
            host: data,
            closed: Arc::clone(&self.closed),
        }))
    }
}

struct MemorySession {
    host: Arc<MemoryHost>,
    closed: Arc<AtomicUsize>,
}

#[async_trait]
impl RemoteSession for MemorySession {
    async fn list_shares(&mut self) -> Result<Vec<String>> {
        if let Some(reason) = &self.host.list_shares_error {
            bail!("{}", reason);
        }
        Ok(self.host.shares.iter().map(|s| s.name.clone()).collect())
    }

    async fn list_entries(&mut self, share: &str, path: &str) -> Result<Vec<RemoteEntry>> {
        if let Some(delay) = self.host.list_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(reason) = self.host.list_errors.get(&key(share, path)) {
            bail!("{}", reason);
        }

        let data = self.host.share(share)?;
        let dir = data.resolve(&clean(path))?;

        if !dir.is_empty() {
            match data.find(&dir) {
                Some(Node::Dir) => {}
                Some(_) => bail!("The directory name is invalid: {}", path),
                None => bail!("The system cannot find the path specified: {}", path),
            }
        }

        let prefix = if dir.is_empty() {
            String::new()
        } else {
            format!("{}/", dir.to_ascii_lowercase())
        };

        let entries = data
            .nodes
            .iter()
            .filter_map(|(p, node)| {
                let lower = p.to_ascii_lowercase();
                let name = lower.strip_prefix(&prefix)?;
                if name.is_empty() || name.contains('/') {
                    return None;
                }
                let name = &p[p.len() - name.len()..];
                Some(match node {
                    Node::File(content) => RemoteEntry::file(name, content.len() as u64),
                    Node::Dir => RemoteEntry::directory(name),
                    Node::Link(target) => RemoteEntry::directory_link(name, target.as_deref()),
                })
            })
            .collect();

        Ok(entries)
    }

    async fn fetch(&mut self, share: &str, path: &str) -> Result<FetchStream> {
        let failure = self.host.fetch_failures.get(&key(share, path)).cloned();
        if let Some(FetchFailure::Open(reason)) = &failure {
            bail!("{}", reason);
        }

        let data = self.host.share(share)?;
        let resolved = data.resolve(&clean(path))?;
        let content = match data.find(&resolved) {
            Some(Node::File(content)) => Arc::clone(content),
            Some(_) => bail!("Access is denied: {} is not a file", path),
            None => bail!("The system cannot find the file specified: {}", path),
        };

        let stream: FetchStream = match failure {
            Some(FetchFailure::AfterBytes(limit)) => Box::new(MemoryReader::new(content, Some(limit))),
            Some(FetchFailure::Stall) => Box::new(StalledReader),
            _ => Box::new(MemoryReader::new(content, None)),
        };
        Ok(stream)
    }

    async fn close(&mut self) -> Result<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Reader over shared file content, optionally failing after a byte count.
struct MemoryReader {
    content: Arc<Vec<u8>>,
    position: usize,
    fail_at: Option<usize>,
}

impl MemoryReader {
    fn new(content: Arc<Vec<u8>>, fail_at: Option<usize>) -> Self {
        Self {
            content,
            position: 0,
            fail_at,
        }
    }
}

impl AsyncRead for MemoryReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut TaskContext<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let end = match self.fail_at {
            Some(limit) if self.position >= limit => {
                return Poll::Ready(Err(io::Error::new(
                    io::ErrorKind::ConnectionReset,
                    "connection reset by peer",
                )));
            }
            Some(limit) => limit.min(self.content.len()),
            None => self.content.len(),
        };

        let available = end.saturating_sub(self.position);
        let count = available.min(buf.remaining());
        let start = self.position;
        buf.put_slice(&self.content[start..start + count]);
        self.position += count;

        // Reaching the failure point on a short file is still a failure.
        if count == 0 && self.fail_at.is_some() {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "connection reset by peer",
            )));
        }

        Poll::Ready(Ok(()))
    }
}

struct StalledReader;

impl AsyncRead for StalledReader {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut TaskContext<'_>,
        _buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Poll::Pending
    }
}
