use std::collections::HashSet;

use crate::connection::ConnectionId;

/// Name of the one room every connection joins.
pub const GLOBAL_GROUP: &str = "chat_global";

/// A named set of connection ids that receive each other's messages.
#[derive(Debug, Default)]
pub struct BroadcastGroup {
    pub name: String,
    pub members: HashSet<ConnectionId>,
}

impl BroadcastGroup {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            members: HashSet::new(),
        }
    }

    /// Adds a member. Joining twice has no effect.
    pub fn join(&mut self, id: ConnectionId) {
        self.members.insert(id);
    }

    /// Removes a member, returning whether it was present.
    pub fn leave(&mut self, id: &ConnectionId) -> bool {
        self.members.remove(id)
    }

    /// Every member except `sender`.
    pub fn recipients<'a>(
        &'a self,
        sender: &'a ConnectionId,
    ) -> impl Iterator<Item = &'a ConnectionId> + 'a {
        self.members.iter().filter(move |id| *id != sender)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
