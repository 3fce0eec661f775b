//! mDNS discovery feed backed by mdns-sd
//!
//! Implements [`DiscoveryFeed`] by browsing the requested service types and
//! forwarding resolved services into the session's channel. mdns-sd
//! delivers events on its own blocking channel, so each browse gets a
//! forwarding thread.

use std::thread;

use mdns_sd::{ServiceDaemon, ServiceEvent};
use tokio::sync::mpsc;

use crate::common::prelude::*;
use crate::core::Advertisement;
use crate::session::DiscoveryFeed;

const CHANNEL_CAPACITY: usize = 32;

/// Real local-network discovery feed
#[derive(Default)]
pub struct MdnsFeed {
    daemon: Option<ServiceDaemon>,
    browsing: Vec<String>,
}

impl MdnsFeed {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DiscoveryFeed for MdnsFeed {
    fn start(&mut self, service_types: &[&str]) -> Result<mpsc::Receiver<Advertisement>> {
        let daemon = ServiceDaemon::new().map_err(|e| Error::discovery(e.to_string()))?;
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

        for service_type in service_types {
            let events = daemon
                .browse(service_type)
                .map_err(|e| Error::discovery(format!("browse {service_type}: {e}")))?;
            info!(service_type = %service_type, "browsing");

            let tx = tx.clone();
            let service_type = service_type.to_string();
            self.browsing.push(service_type.clone());
            thread::spawn(move || {
                while let Ok(event) = events.recv() {
                    let ServiceEvent::ServiceResolved(info) = event else {
                        continue;
                    };
                    let raw = Advertisement {
                        name: info.get_fullname().to_string(),
                        service_type: service_type.clone(),
                        addresses: info.get_addresses().iter().copied().collect(),
                        port: info.get_port(),
                    };
                    debug!(name = %raw.name, port = raw.port, "resolved service");
                    if tx.blocking_send(raw).is_err() {
                        // Session is gone; stop forwarding
                        break;
                    }
                }
            });
        }

        self.daemon = Some(daemon);
        Ok(rx)
    }

    fn stop(&mut self) {
        if let Some(daemon) = self.daemon.take() {
            for service_type in self.browsing.drain(..) {
                if let Err(e) = daemon.stop_browse(&service_type) {
                    warn!(service_type = %service_type, "stop browse failed: {e}");
                }
            }
            if let Err(e) = daemon.shutdown() {
                warn!("mdns daemon shutdown failed: {e}");
            }
        }
    }
}

impl Drop for MdnsFeed {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_before_start_is_noop() {
        let mut feed = MdnsFeed::new();
        feed.stop();
        assert!(feed.daemon.is_none());
        assert!(feed.browsing.is_empty());
    }
}
