//! Connected clients in ranking order.

use std::collections::HashMap;

use kanjiquiz_core::error::{QuizError, Result};
use kanjiquiz_core::protocol::payloads::ClientInfo;

#[derive(Debug, Clone, Default)]
pub struct Roster {
    clients: Vec<ClientInfo>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clients(&self) -> &[ClientInfo] {
        &self.clients
    }

    pub fn ids(&self) -> Vec<String> {
        self.clients.iter().map(|c| c.id.clone()).collect()
    }

    pub fn get(&self, id: &str) -> Option<&ClientInfo> {
        self.clients.iter().find(|c| c.id == id)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Insert, or update in place if the id is known.
    pub fn add(&mut self, client: ClientInfo) {
        match self.clients.iter_mut().find(|c| c.id == client.id) {
            Some(existing) => *existing = client,
            None => self.clients.push(client),
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<ClientInfo> {
        let pos = self.clients.iter().position(|c| c.id == id)?;
        Some(self.clients.remove(pos))
    }

    /// Replace with the host's list, keeping the current order of clients
    /// that are still present and appending new ones.
    pub fn replace_all(&mut self, fresh: Vec<ClientInfo>) {
        let mut fresh: Vec<Option<ClientInfo>> = fresh.into_iter().map(Some).collect();
        let mut next = Vec::with_capacity(fresh.len());
        for old in &self.clients {
            if let Some(slot) = fresh
                .iter_mut()
                .find(|f| f.as_ref().is_some_and(|f| f.id == old.id))
            {
                next.extend(slot.take());
            }
        }
        next.extend(fresh.into_iter().flatten());
        self.clients = next;
    }

    pub fn set_admin(&mut self, id: &str) -> Result<()> {
        let c = self
            .clients
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| QuizError::NoAdmin(id.to_string()))?;
        c.is_admin = true;
        Ok(())
    }

    /// Fails when `id` is not in the roster: the list is out of sync.
    pub fn is_admin(&self, id: &str) -> Result<bool> {
        self.get(id)
            .map(|c| c.is_admin)
            .ok_or_else(|| QuizError::NoAdmin(id.to_string()))
    }

    /// Order by descending correct count. Stable: ties keep their order.
    pub fn rank(&mut self, correct: &HashMap<String, usize>) {
        self.clients
            .sort_by_key(|c| std::cmp::Reverse(correct.get(&c.id).copied().unwrap_or(0)));
    }

    pub fn clear(&mut self) {
        self.clients.clear();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn client(id: &str) -> ClientInfo {
        ClientInfo {
            id: id.into(),
            key: format!("key-{id}"),
            name: id.to_uppercase(),
            is_admin: false,
        }
    }

    #[test]
    fn rank_is_stable_on_ties() {
        let mut r = Roster::new();
        for id in ["a", "b", "c", "d"] {
            r.add(client(id));
        }
        let counts = HashMap::from([("c".to_string(), 2), ("b".to_string(), 1), ("d".to_string(), 1)]);
        r.rank(&counts);
        assert_eq!(r.ids(), vec!["c", "b", "d", "a"]);
    }

    #[test]
    fn admin_lookup_on_unknown_id_fails() {
        let mut r = Roster::new();
        r.add(client("a"));
        r.set_admin("a").unwrap();
        assert!(r.is_admin("a").unwrap());
        assert!(matches!(r.is_admin("zz"), Err(QuizError::NoAdmin(_))));
        assert!(matches!(r.set_admin("zz"), Err(QuizError::NoAdmin(_))));
    }

    #[test]
    fn replace_keeps_known_order() {
        let mut r = Roster::new();
        for id in ["b", "a"] {
            r.add(client(id));
        }
        r.replace_all(vec![client("a"), client("c"), client("b")]);
        assert_eq!(r.ids(), vec!["b", "a", "c"]);

        r.replace_all(vec![client("c")]);
        assert_eq!(r.ids(), vec!["c"]);
    }
}
