use std::{collections::HashSet, sync::Arc};

use dashmap::{mapref::entry::Entry, DashMap};
use tokio::sync::mpsc;
use tracing::{debug, error};
use uuid::Uuid;

use crate::websocket::listener::RecipientCriteria;

pub type ConnectionId = Uuid;
pub type UserId = Uuid;
pub type ConnectionSender = mpsc::UnboundedSender<String>;

pub mod rooms {
    use uuid::Uuid;

    pub fn user(user_id: Uuid) -> String {
        format!("user:{user_id}")
    }

    pub fn conversation(conversation_id: Uuid) -> String {
        format!("conversation:{conversation_id}")
    }
}

#[derive(Debug)]
struct Connection {
    user_id: UserId,
    sender: ConnectionSender,
    /// Set once the client sent `join`; only joined connections count
    /// towards presence
    joined: bool,
}

#[derive(Debug, Default)]
struct RelayState {
    connections: DashMap<ConnectionId, Connection>,
    rooms: DashMap<String, HashSet<ConnectionId>>,
    /// Joined connection count per online user
    online: DashMap<UserId, usize>,
}

/// Process-local registry of chat sockets, their rooms and user presence.
#[derive(Debug, Clone, Default)]
pub struct ChatRelay {
    state: Arc<RelayState>,
}

impl ChatRelay {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(&self, user_id: UserId, sender: ConnectionSender) -> ConnectionId {
        let connection_id = Uuid::new_v4();
        self.state.connections.insert(
            connection_id,
            Connection {
                user_id,
                sender,
                joined: false,
            },
        );
        connection_id
    }

    pub fn user_of(&self, connection_id: ConnectionId) -> Option<UserId> {
        self.state
            .connections
            .get(&connection_id)
            .map(|connection| connection.user_id)
    }

    /// Marks the connection's user online and puts the connection in the
    /// user's room. Returns `true` when the user was offline before.
    pub fn join(&self, connection_id: ConnectionId) -> bool {
        let user_id = {
            let Some(mut connection) = self.state.connections.get_mut(&connection_id) else {
                return false;
            };
            if connection.joined {
                return false;
            }
            connection.joined = true;
            connection.user_id
        };

        self.join_room(connection_id, &rooms::user(user_id));

        let mut count = self.state.online.entry(user_id).or_insert(0);
        *count += 1;
        *count == 1
    }

    pub fn join_room(&self, connection_id: ConnectionId, room: &str) {
        self.state
            .rooms
            .entry(room.to_string())
            .or_default()
            .insert(connection_id);
    }

    /// Forgets the connection. Returns the user id when this was the user's
    /// last joined connection, i.e. the user just went offline.
    pub fn disconnect(&self, connection_id: ConnectionId) -> Option<UserId> {
        let (_, connection) = self.state.connections.remove(&connection_id)?;

        self.state.rooms.retain(|_, members| {
            members.remove(&connection_id);
            !members.is_empty()
        });

        if !connection.joined {
            return None;
        }

        // Decrement and removal under one entry guard; a concurrent `join`
        // runs entirely before or after
        match self.state.online.entry(connection.user_id) {
            Entry::Occupied(mut entry) => {
                let count = entry.get_mut();
                *count = count.saturating_sub(1);
                if *count == 0 {
                    entry.remove();
                    Some(connection.user_id)
                } else {
                    None
                }
            }
            Entry::Vacant(_) => None,
        }
    }

    pub fn online_users(&self) -> Vec<UserId> {
        let mut users: Vec<UserId> = self.state.online.iter().map(|entry| *entry.key()).collect();
        users.sort_unstable();
        users
    }

    pub fn is_online(&self, user_id: UserId) -> bool {
        self.state.online.contains_key(&user_id)
    }

    pub fn connection_count(&self) -> usize {
        self.state.connections.len()
    }

    fn send(&self, connection_id: ConnectionId, payload: &str) -> bool {
        let Some(connection) = self.state.connections.get(&connection_id) else {
            return false;
        };

        if let Err(e) = connection.sender.send(payload.to_string()) {
            error!("Failed to queue message for connection {}: {}", connection_id, e);
            return false;
        }
        true
    }

    pub fn send_to_connection(&self, connection_id: ConnectionId, payload: &str) -> bool {
        self.send(connection_id, payload)
    }

    /// Sends to every connection of the user, joined or not.
    pub fn send_to_user(&self, user_id: UserId, payload: &str) -> usize {
        let targets: Vec<ConnectionId> = self
            .state
            .connections
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .map(|entry| *entry.key())
            .collect();

        self.send_to_all_of(&targets, payload)
    }

    pub fn send_to_room(&self, room: &str, payload: &str, except: Option<ConnectionId>) -> usize {
        let targets: Vec<ConnectionId> = match self.state.rooms.get(room) {
            Some(members) => members
                .iter()
                .copied()
                .filter(|connection_id| Some(*connection_id) != except)
                .collect(),
            None => return 0,
        };

        self.send_to_all_of(&targets, payload)
    }

    pub fn send_to_all(&self, payload: &str) -> usize {
        let targets: Vec<ConnectionId> = self
            .state
            .connections
            .iter()
            .map(|entry| *entry.key())
            .collect();

        self.send_to_all_of(&targets, payload)
    }

    fn send_to_all_of(&self, targets: &[ConnectionId], payload: &str) -> usize {
        targets
            .iter()
            .filter(|connection_id| self.send(**connection_id, payload))
            .count()
    }

    /// Delivers an event addressed by `criteria` to the local sockets.
    pub fn deliver(&self, criteria: &RecipientCriteria, payload: &str) -> usize {
        let delivered = match criteria {
            RecipientCriteria::User { user_id } => self.send_to_user(*user_id, payload),
            RecipientCriteria::Room { room, except } => self.send_to_room(room, payload, *except),
            RecipientCriteria::Connection { connection_id } => {
                usize::from(self.send_to_connection(*connection_id, payload))
            }
            RecipientCriteria::All => self.send_to_all(payload),
        };

        debug!("📨 Delivered event to {} connection(s) ({:?})", delivered, criteria);
        delivered
    }
}
