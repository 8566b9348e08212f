//! Connected-client fan-out.
//!
//! Each client has a bounded outbound queue drained by its writer thread.
//! A client whose queue is closed or full is dropped from the hub; dropping
//! the sender ends the writer thread, which shuts the socket down.

use std::collections::BTreeMap;

use crossbeam_channel::{Sender, TrySendError};

pub type ClientId = u64;

#[derive(Default)]
pub struct ClientHub {
    clients: BTreeMap<ClientId, Sender<Vec<u8>>>,
}

impl ClientHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, id: ClientId, tx: Sender<Vec<u8>>) {
        self.clients.insert(id, tx);
    }

    pub fn remove(&mut self, id: ClientId) -> bool {
        self.clients.remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Queue a frame for one client. Returns `false` if the client was dropped.
    pub fn send_to(&mut self, id: ClientId, frame: Vec<u8>) -> bool {
        let Some(tx) = self.clients.get(&id) else {
            return false;
        };
        if deliver(id, tx, frame) {
            true
        } else {
            self.clients.remove(&id);
            false
        }
    }

    /// Queue a frame for every client. Returns how many received it.
    pub fn broadcast(&mut self, frame: &[u8]) -> usize {
        let mut dead = Vec::new();
        for (id, tx) in &self.clients {
            if !deliver(*id, tx, frame.to_vec()) {
                dead.push(*id);
            }
        }
        for id in &dead {
            self.clients.remove(id);
        }
        self.clients.len()
    }
}

fn deliver(id: ClientId, tx: &Sender<Vec<u8>>, frame: Vec<u8>) -> bool {
    match tx.try_send(frame) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            tracing::warn!(client = id, "outbound queue full; dropping client");
            false
        }
        Err(TrySendError::Disconnected(_)) => {
            tracing::debug!(client = id, "client writer gone");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;

    #[test]
    fn broadcast_reaches_all_clients() {
        let mut hub = ClientHub::new();
        let (tx1, rx1) = bounded(4);
        let (tx2, rx2) = bounded(4);
        hub.add(1, tx1);
        hub.add(2, tx2);
        assert_eq!(hub.broadcast(b"frame"), 2);
        assert_eq!(rx1.try_recv().unwrap(), b"frame");
        assert_eq!(rx2.try_recv().unwrap(), b"frame");
    }

    #[test]
    fn disconnected_clients_are_pruned() {
        let mut hub = ClientHub::new();
        let (tx1, rx1) = bounded(4);
        let (tx2, rx2) = bounded(4);
        hub.add(1, tx1);
        hub.add(2, tx2);
        drop(rx2);
        assert_eq!(hub.broadcast(b"x"), 1);
        assert_eq!(hub.len(), 1);
        assert!(rx1.try_recv().is_ok());
    }

    #[test]
    fn full_queue_drops_client() {
        let mut hub = ClientHub::new();
        let (tx, _rx) = bounded(1);
        hub.add(7, tx);
        assert!(hub.send_to(7, vec![1]));
        assert!(!hub.send_to(7, vec![2]));
        assert!(hub.is_empty());
        assert!(!hub.send_to(7, vec![3]));
    }
}
