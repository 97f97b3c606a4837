use std::collections::BTreeMap;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::Sender;
use tracing::{debug, warn};

use valet_proto::Role;

/// Outgoing line queue of one connection.
pub type Outbox = Sender<String>;

/// Lines queued per connection before further lines to it are dropped.
pub const OUTBOX_DEPTH: usize = 64;

/// Connected clients per role, keyed by their numeric handle.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    apps: BTreeMap<u32, Outbox>,
    robots: BTreeMap<u32, Outbox>,
}

impl ClientRegistry {
    /// Registers a client under the smallest handle not in use for its role.
    pub fn register(&mut self, role: Role, outbox: Outbox) -> u32 {
        let table = self.table_mut(role);
        let mut id = 1;
        for taken in table.keys() {
            if *taken != id { break; }
            id += 1;
        }
        table.insert(id, outbox);
        id
    }

    pub fn deregister(&mut self, role: Role, id: u32) -> bool {
        self.table_mut(role).remove(&id).is_some()
    }

    /// Queues `line` for one client. False if it is not registered, its
    /// connection is already gone, or it has stopped reading.
    pub fn send_to(&self, role: Role, id: u32, line: &str) -> bool {
        match self.table(role).get(&id) {
            Some(tx) => offer(tx, role, id, line),
            None => false,
        }
    }

    /// Queues `line` for every client of `role`, returning how many took it.
    pub fn broadcast(&self, role: Role, line: &str) -> usize {
        let delivered = self.table(role).iter().filter(|(id, tx)| offer(tx, role, **id, line)).count();
        debug!("registry: {:?} to {} {}(s)", line, delivered, role);
        delivered
    }

    pub fn ids(&self, role: Role) -> Vec<u32> {
        self.table(role).keys().copied().collect()
    }

    fn table(&self, role: Role) -> &BTreeMap<u32, Outbox> {
        match role {
            Role::App => &self.apps,
            Role::Robot => &self.robots,
        }
    }

    fn table_mut(&mut self, role: Role) -> &mut BTreeMap<u32, Outbox> {
        match role {
            Role::App => &mut self.apps,
            Role::Robot => &mut self.robots,
        }
    }
}

// Never waits: a client with a full outbox misses the line.
fn offer(tx: &Outbox, role: Role, id: u32, line: &str) -> bool {
    match tx.try_send(line.to_string()) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            warn!("registry: {} #{} is not reading, dropped {:?}", role, id, line);
            false
        }
        Err(TrySendError::Closed(_)) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::channel;

    fn outbox() -> Outbox {
        channel(OUTBOX_DEPTH).0
    }

    #[test]
    fn freed_handle_is_reused_first() {
        let mut reg = ClientRegistry::default();
        let a = reg.register(Role::App, outbox());
        let b = reg.register(Role::App, outbox());
        let c = reg.register(Role::App, outbox());
        assert_eq!((a, b, c), (1, 2, 3));

        assert!(reg.deregister(Role::App, b));
        let d = reg.register(Role::App, outbox());
        assert_eq!(d, 2);
        assert_eq!(reg.ids(Role::App), vec![1, 2, 3]);
    }

    #[test]
    fn roles_are_numbered_separately() {
        let mut reg = ClientRegistry::default();
        assert_eq!(reg.register(Role::App, outbox()), 1);
        assert_eq!(reg.register(Role::Robot, outbox()), 1);
        assert!(!reg.deregister(Role::Robot, 2));
    }

    #[test]
    fn send_and_broadcast() {
        let mut reg = ClientRegistry::default();
        let (tx1, mut rx1) = channel(OUTBOX_DEPTH);
        let (tx2, rx2) = channel(OUTBOX_DEPTH);
        reg.register(Role::App, tx1);
        reg.register(Role::App, tx2);
        drop(rx2);

        assert_eq!(reg.broadcast(Role::App, "COMPLETE"), 1);
        assert_eq!(rx1.try_recv().unwrap(), "COMPLETE");
        assert!(reg.send_to(Role::App, 1, "MOVE,aMM"));
        assert!(!reg.send_to(Role::App, 2, "MOVE,aMM"));
        assert!(!reg.send_to(Role::Robot, 1, "PARK"));
    }

    #[test]
    fn stalled_reader_misses_lines_without_blocking_others() {
        let mut reg = ClientRegistry::default();
        let (slow, mut slow_rx) = channel(2);
        let (fast, mut fast_rx) = channel(OUTBOX_DEPTH);
        reg.register(Role::App, slow);
        reg.register(Role::App, fast);

        for n in 0..5 {
            reg.broadcast(Role::App, &format!("MOVE,{}", n));
        }
        assert!(!reg.send_to(Role::App, 1, "COMPLETE"));
        assert!(reg.send_to(Role::App, 2, "COMPLETE"));

        assert_eq!(slow_rx.try_recv().unwrap(), "MOVE,0");
        assert_eq!(slow_rx.try_recv().unwrap(), "MOVE,1");
        assert!(slow_rx.try_recv().is_err());
        let fast_lines: Vec<String> = std::iter::from_fn(|| fast_rx.try_recv().ok()).collect();
        assert_eq!(fast_lines.len(), 6);
        assert_eq!(fast_lines.last().map(String::as_str), Some("COMPLETE"));
    }
}
