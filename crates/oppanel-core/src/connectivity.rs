//! Network reachability hints.
//!
//! The answer is advisory: a terminal reported online may still fail its next
//! remote call, and the queue copes with that by retrying.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use reqwest::Url;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::{timeout, MissedTickBehavior};

/// Synchronous "are we online" query.
pub trait Connectivity {
    fn is_online(&self) -> bool;
}

/// Reachability flag flipped by the embedding application.
///
/// Clones share the flag, so the component receiving platform online/offline
/// events and the queue manager can hold separate handles.
#[derive(Debug, Clone)]
pub struct ConnectivityFlag {
    online: Arc<AtomicBool>,
}

impl ConnectivityFlag {
    pub fn new(online: bool) -> Self {
        Self {
            online: Arc::new(AtomicBool::new(online)),
        }
    }

    pub fn set_online(&self, online: bool) {
        let previous = self.online.swap(online, Ordering::SeqCst);
        if previous != online {
            tracing::info!(
                "Connectivity changed: {}",
                if online { "online" } else { "offline" }
            );
        }
    }
}

impl Default for ConnectivityFlag {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Connectivity for ConnectivityFlag {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}

/// Probes reachability by opening a TCP connection to the remote host.
///
/// The probe is async and never answers [`Connectivity`] directly. Run it
/// through [`TcpProbe::spawn_monitor`] and hand the refreshed
/// [`ConnectivityFlag`] to the queue manager.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    host: String,
    port: u16,
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            timeout,
        }
    }

    /// Build a probe for the host and port of an `http(s)` URL.
    pub fn for_url(url: &str, timeout: Duration) -> Option<Self> {
        let parsed = Url::parse(url.trim()).ok()?;
        let host = parsed.host_str()?.to_string();
        let port = parsed.port_or_known_default()?;
        Some(Self::new(host, port, timeout))
    }

    /// Resolve the host and try each address until one accepts.
    ///
    /// Resolution and every connect attempt are bounded by the probe timeout.
    pub async fn check(&self) -> bool {
        let lookup = tokio::net::lookup_host((self.host.as_str(), self.port));
        let addrs: Vec<SocketAddr> = match timeout(self.timeout, lookup).await {
            Ok(Ok(addrs)) => addrs.collect(),
            Ok(Err(error)) => {
                tracing::debug!("Could not resolve {}: {}", self.host, error);
                return false;
            }
            Err(_) => {
                tracing::debug!("Resolving {} timed out", self.host);
                return false;
            }
        };

        for addr in addrs {
            if let Ok(Ok(_)) = timeout(self.timeout, TcpStream::connect(addr)).await {
                return true;
            }
        }
        false
    }

    /// Refresh `flag` from [`TcpProbe::check`] every `every`.
    ///
    /// The first check runs immediately. The task runs until aborted.
    pub fn spawn_monitor(self, flag: ConnectivityFlag, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                flag.set_online(self.check().await);
            }
        })
    }
}

impl<C: Connectivity + ?Sized> Connectivity for Arc<C> {
    fn is_online(&self) -> bool {
        (**self).is_online()
    }
}
