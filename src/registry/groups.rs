//! Group bookkeeping for sessions launched together

use std::collections::HashMap;
use std::path::PathBuf;

use crate::{GroupLayout, SessionGroup, SessionGroupId, SessionId};

/// Manages session groups
pub struct GroupManager {
    /// All known groups
    groups: HashMap<SessionGroupId, SessionGroup>,

    /// Next group ID
    next_id: SessionGroupId,
}

impl GroupManager {
    /// Create a new group manager
    pub fn new() -> Self {
        Self {
            groups: HashMap::new(),
            next_id: 1,
        }
    }

    /// Create a new empty group
    pub fn create_group(&mut self, layout: GroupLayout, broadcast: bool) -> SessionGroupId {
        let id = self.next_id;
        self.next_id += 1;
        self.groups.insert(id, SessionGroup::new(id, layout, broadcast));
        id
    }

    /// Add a session to a group. Returns false if the group is gone.
    pub fn add_session(&mut self, group_id: SessionGroupId, session_id: SessionId, path: PathBuf) -> bool {
        match self.groups.get_mut(&group_id) {
            Some(group) => {
                group.add_session(session_id, path);
                true
            }
            None => false,
        }
    }

    /// Drop a session from whichever group holds it.
    ///
    /// A group emptied by this removal is dropped; other groups are left
    /// alone, including ones still being filled.
    pub fn remove_session(&mut self, session_id: &str) {
        let mut emptied = Vec::new();
        for group in self.groups.values_mut() {
            if let Some(idx) = group.session_ids.iter().position(|id| id == session_id) {
                group.session_ids.remove(idx);
                group.paths.remove(idx);
                if group.session_count() == 0 {
                    emptied.push(group.id);
                }
            }
        }
        for id in emptied {
            self.groups.remove(&id);
        }
    }

    /// Get a group by ID
    pub fn get(&self, id: SessionGroupId) -> Option<&SessionGroup> {
        self.groups.get(&id)
    }

    /// Get all groups, oldest first
    pub fn groups(&self) -> Vec<&SessionGroup> {
        let mut groups: Vec<_> = self.groups.values().collect();
        groups.sort_by_key(|g| g.id);
        groups
    }

    /// Get all session IDs in a group
    pub fn session_ids_in_group(&self, group_id: SessionGroupId) -> Vec<SessionId> {
        self.groups
            .get(&group_id)
            .map(|g| g.session_ids.clone())
            .unwrap_or_default()
    }

    /// Remove a group
    pub fn remove_group(&mut self, group_id: SessionGroupId) -> Option<SessionGroup> {
        self.groups.remove(&group_id)
    }

    /// Remove every group
    pub fn clear(&mut self) {
        self.groups.clear();
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

impl Default for GroupManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_sequential() {
        let mut manager = GroupManager::new();
        let first = manager.create_group(GroupLayout::Tabs, false);
        let second = manager.create_group(GroupLayout::Grid, true);
        assert_eq!(second, first + 1);
        assert_eq!(manager.groups().len(), 2);
        assert!(manager.get(second).unwrap().broadcast);
    }

    #[test]
    fn test_remove_session_drops_empty_group() {
        let mut manager = GroupManager::new();
        let id = manager.create_group(GroupLayout::Horizontal, false);
        manager.add_session(id, "a".into(), PathBuf::from("/a"));
        manager.add_session(id, "b".into(), PathBuf::from("/b"));

        manager.remove_session("a");
        assert_eq!(manager.session_ids_in_group(id), vec!["b".to_string()]);
        assert_eq!(manager.get(id).unwrap().paths, vec![PathBuf::from("/b")]);

        manager.remove_session("b");
        assert!(manager.get(id).is_none());
        assert!(manager.is_empty());
    }

    #[test]
    fn test_remove_session_keeps_unrelated_empty_group() {
        let mut manager = GroupManager::new();
        let filling = manager.create_group(GroupLayout::Grid, false);

        manager.remove_session("other");
        assert!(manager.get(filling).is_some());

        assert!(manager.add_session(filling, "a".into(), PathBuf::from("/a")));
        assert_eq!(manager.session_ids_in_group(filling), vec!["a".to_string()]);
    }

    #[test]
    fn test_add_session_to_missing_group() {
        let mut manager = GroupManager::new();
        assert!(!manager.add_session(7, "a".into(), PathBuf::from("/a")));
        assert!(manager.is_empty());
    }

    #[test]
    fn test_remove_group() {
        let mut manager = GroupManager::new();
        let id = manager.create_group(GroupLayout::Vertical, false);
        assert!(manager.remove_group(id).is_some());
        assert!(manager.remove_group(id).is_none());
        assert!(manager.session_ids_in_group(id).is_empty());
    }
}
