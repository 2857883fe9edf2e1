use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

use crate::realtime::connection::{Connection, ConnectionId, Outbound};
use crate::realtime::protocol::ServerEvent;

type Buckets = HashMap<Uuid, HashMap<ConnectionId, Arc<Connection>>>;

/// In-memory map of user id to that user's live, authenticated connections.
///
/// A user has an entry iff at least one connection is registered for them.
/// Every mutation, and the `USER_ONLINE`/`USER_OFFLINE` frame it causes, happens
/// under one write lock, so connect and disconnect races for the same user
/// cannot lose updates or reorder presence events.
#[derive(Debug, Default)]
pub struct PresenceRegistry {
    users: RwLock<Buckets>,
}

/// Outcome of one heartbeat pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub probed: usize,
    pub reaped: usize,
    pub went_offline: Vec<Uuid>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Buckets> {
        self.users.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Buckets> {
        self.users.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a connection for `user_id`. The first connection of a user
    /// announces `USER_ONLINE` to everyone already connected. Returns whether
    /// this was the user's first connection.
    pub fn register(&self, user_id: Uuid, connection: Arc<Connection>) -> bool {
        if !connection.bind_user(user_id) {
            debug!(conn_id = %connection.id(), "connection already bound to another user");
            return false;
        }

        // Presence frames are queued before the lock is released so observers
        // see transitions for one user in the order the registry applied them.
        let mut users = self.write();
        let first = !users.contains_key(&user_id);
        if first {
            info!(user_id = %user_id, "user online");
            Self::deliver(&flatten(&users), &ServerEvent::UserOnline { user_id });
        }
        users
            .entry(user_id)
            .or_default()
            .insert(connection.id(), connection);
        first
    }

    /// Remove a connection. No-op for connections that never authenticated.
    /// When the user's last connection goes, the entry is deleted and
    /// `USER_OFFLINE` is broadcast. Returns whether the user went offline.
    pub fn unregister(&self, connection: &Connection) -> bool {
        let Some(user_id) = connection.user() else {
            return false;
        };

        let mut users = self.write();
        let Some(set) = users.get_mut(&user_id) else {
            return false;
        };
        set.remove(&connection.id());
        if !set.is_empty() {
            return false;
        }

        users.remove(&user_id);
        info!(user_id = %user_id, "user offline");
        Self::deliver(&flatten(&users), &ServerEvent::UserOffline { user_id });
        true
    }

    pub fn is_online(&self, user_id: Uuid) -> bool {
        self.read().get(&user_id).is_some_and(|set| !set.is_empty())
    }

    pub fn online_users(&self) -> Vec<Uuid> {
        self.read().keys().copied().collect()
    }

    pub fn connection_count(&self) -> usize {
        self.read().values().map(HashMap::len).sum()
    }

    pub(crate) fn connections_of(&self, user_id: Uuid) -> Vec<Arc<Connection>> {
        self.read()
            .get(&user_id)
            .map(|set| set.values().cloned().collect())
            .unwrap_or_default()
    }

    pub(crate) fn all_connections(&self) -> Vec<Arc<Connection>> {
        flatten(&self.read())
    }

    /// One heartbeat pass. Connections that did not answer the previous probe
    /// are terminated and removed; the rest are probed again and marked
    /// unconfirmed until their pong arrives.
    pub fn sweep(&self) -> SweepReport {
        let mut report = SweepReport::default();
        let mut users = self.write();

        users.retain(|user_id, set| {
            set.retain(|conn_id, connection| {
                if connection.take_alive() {
                    connection.push(Outbound::Ping);
                    report.probed += 1;
                    true
                } else {
                    debug!(user_id = %user_id, conn_id = %conn_id, "no pong since last probe, terminating");
                    connection.terminate();
                    report.reaped += 1;
                    false
                }
            });
            if set.is_empty() {
                report.went_offline.push(*user_id);
                false
            } else {
                true
            }
        });

        let remaining = flatten(&users);
        for user_id in &report.went_offline {
            info!(user_id = %user_id, "user offline (heartbeat)");
            Self::deliver(&remaining, &ServerEvent::UserOffline { user_id: *user_id });
        }
        report
    }

    /// Run `sweep` every `interval` until the task is aborted.
    pub fn spawn_heartbeat(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // the first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let report = self.sweep();
                if report.reaped > 0 {
                    info!(reaped = report.reaped, probed = report.probed, "heartbeat reaped dead connections");
                } else {
                    debug!(probed = report.probed, "heartbeat");
                }
            }
        })
    }
}

fn flatten(users: &Buckets) -> Vec<Arc<Connection>> {
    users.values().flat_map(|set| set.values().cloned()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use tokio::sync::mpsc::Receiver;

    fn drain(rx: &mut Receiver<Outbound>) -> Vec<Outbound> {
        let mut items = Vec::new();
        while let Ok(item) = rx.try_recv() {
            items.push(item);
        }
        items
    }

    fn event_types(rx: &mut Receiver<Outbound>) -> Vec<String> {
        drain(rx)
            .into_iter()
            .filter_map(|item| match item {
                Outbound::Text(text) => serde_json::from_str::<Value>(&text)
                    .ok()
                    .and_then(|v| v["type"].as_str().map(str::to_string)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn online_while_any_connection_remains() {
        let registry = PresenceRegistry::new();
        let user = Uuid::new_v4();
        let (tab1, _rx1) = Connection::new(8);
        let (tab2, _rx2) = Connection::new(8);

        assert!(registry.register(user, tab1.clone()));
        assert!(!registry.register(user, tab2.clone()));
        assert!(registry.is_online(user));
        assert_eq!(registry.connection_count(), 2);

        assert!(!registry.unregister(&tab1));
        assert!(registry.is_online(user));

        assert!(registry.unregister(&tab2));
        assert!(!registry.is_online(user));
        assert!(registry.online_users().is_empty());
    }

    #[test]
    fn presence_changes_are_broadcast_once() {
        let registry = PresenceRegistry::new();
        let (observer, mut observer_rx) = Connection::new(8);
        registry.register(Uuid::new_v4(), observer);

        let user = Uuid::new_v4();
        let (tab1, _rx1) = Connection::new(8);
        let (tab2, _rx2) = Connection::new(8);
        registry.register(user, tab1.clone());
        registry.register(user, tab2.clone());
        assert_eq!(event_types(&mut observer_rx), vec!["USER_ONLINE"]);

        registry.unregister(&tab1);
        registry.unregister(&tab2);
        registry.unregister(&tab2);
        assert_eq!(event_types(&mut observer_rx), vec!["USER_OFFLINE"]);
    }

    fn last_presence_event(rx: &mut Receiver<Outbound>, user: Uuid) -> Option<String> {
        drain(rx)
            .into_iter()
            .filter_map(|item| match item {
                Outbound::Text(text) => serde_json::from_str::<Value>(&text).ok(),
                _ => None,
            })
            .filter(|event| event["data"]["userId"] == serde_json::json!(user))
            .filter_map(|event| event["type"].as_str().map(str::to_string))
            .last()
    }

    #[test]
    fn reconnect_racing_last_disconnect_leaves_observers_consistent() {
        use std::sync::Barrier;

        for _ in 0..2_000 {
            let registry = PresenceRegistry::new();
            let (observer, mut observer_rx) = Connection::new(8);
            registry.register(Uuid::new_v4(), observer);

            let user = Uuid::new_v4();
            let (tab1, _rx1) = Connection::new(8);
            let (tab2, _rx2) = Connection::new(8);
            registry.register(user, tab1.clone());
            drain(&mut observer_rx);

            let barrier = Barrier::new(2);
            std::thread::scope(|scope| {
                scope.spawn(|| {
                    barrier.wait();
                    registry.unregister(&tab1);
                });
                scope.spawn(|| {
                    barrier.wait();
                    registry.register(user, tab2.clone());
                });
            });

            assert!(registry.is_online(user));
            match last_presence_event(&mut observer_rx, user).as_deref() {
                None | Some("USER_ONLINE") => {}
                other => panic!("observer last saw {:?} while user is online", other),
            }
        }
    }

    #[test]
    fn unauthenticated_connection_unregister_is_noop() {
        let registry = PresenceRegistry::new();
        let (conn, _rx) = Connection::new(1);
        assert!(!registry.unregister(&conn));
        assert_eq!(registry.connection_count(), 0);
    }

    #[test]
    fn sweep_probes_then_reaps_silent_connections() {
        let registry = PresenceRegistry::new();
        let (observer, mut observer_rx) = Connection::new(8);
        let observer_user = Uuid::new_v4();
        registry.register(observer_user, observer.clone());

        let user = Uuid::new_v4();
        let (silent, mut silent_rx) = Connection::new(8);
        registry.register(user, silent);
        drain(&mut observer_rx);

        let first = registry.sweep();
        assert_eq!(first.probed, 2);
        assert_eq!(first.reaped, 0);
        assert_eq!(drain(&mut silent_rx), vec![Outbound::Ping]);

        // only the observer answers
        observer.mark_alive();
        let second = registry.sweep();
        assert_eq!(second.reaped, 1);
        assert_eq!(second.went_offline, vec![user]);
        assert!(!registry.is_online(user));
        assert!(registry.is_online(observer_user));

        let types = event_types(&mut observer_rx);
        assert_eq!(types, vec!["USER_OFFLINE"]);
    }
}
