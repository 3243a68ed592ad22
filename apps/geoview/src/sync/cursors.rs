use std::collections::BTreeMap;

use geoview_proto::CursorSync;

use super::state::CursorState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorChange {
    Added,
    Moved,
    Removed,
    Ignored,
}

/// Cursors of the other sessions in the room.
///
/// Entries appear on first sighting and only leave on an explicit removal.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CursorTable {
    entries: BTreeMap<String, CursorState>,
}

impl CursorTable {
    pub fn apply(&mut self, own_session: Option<&str>, sync: &CursorSync) -> CursorChange {
        if sync.session_id.is_empty() || own_session == Some(sync.session_id.as_str()) {
            return CursorChange::Ignored;
        }
        if sync.is_removal() {
            return match self.entries.remove(&sync.session_id) {
                Some(_) => CursorChange::Removed,
                None => CursorChange::Ignored,
            };
        }
        let Some(cursor) = sync.cursor else {
            return CursorChange::Ignored;
        };
        self.upsert(&sync.session_id, cursor.into())
    }

    pub fn upsert(&mut self, session_id: &str, cursor: CursorState) -> CursorChange {
        match self.entries.insert(session_id.to_string(), cursor) {
            Some(_) => CursorChange::Moved,
            None => CursorChange::Added,
        }
    }

    pub fn get(&self, session_id: &str) -> Option<&CursorState> {
        self.entries.get(session_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &CursorState)> {
        self.entries.iter()
    }
}
