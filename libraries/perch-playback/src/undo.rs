//! Undo/redo for library mutations.
//!
//! Library commands are values with computable inverses, so undo never
//! replays UI state: undoing `SaveTrack` issues `RemoveSavedTrack` against
//! the remote API, exactly as if the user had asked for it.

use perch_core::ResourceId;

/// A reversible library mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LibraryCommand {
    SaveTrack(ResourceId),
    RemoveSavedTrack(ResourceId),
    AddToPlaylist {
        playlist_uri: String,
        item: ResourceId,
    },
    RemoveFromPlaylist {
        playlist_uri: String,
        item: ResourceId,
    },
    FollowPlaylist(String),
    UnfollowPlaylist(String),
}

impl LibraryCommand {
    /// The command that exactly reverses this one.
    pub fn inverse(&self) -> LibraryCommand {
        match self {
            Self::SaveTrack(id) => Self::RemoveSavedTrack(id.clone()),
            Self::RemoveSavedTrack(id) => Self::SaveTrack(id.clone()),
            Self::AddToPlaylist { playlist_uri, item } => Self::RemoveFromPlaylist {
                playlist_uri: playlist_uri.clone(),
                item: item.clone(),
            },
            Self::RemoveFromPlaylist { playlist_uri, item } => Self::AddToPlaylist {
                playlist_uri: playlist_uri.clone(),
                item: item.clone(),
            },
            Self::FollowPlaylist(uri) => Self::UnfollowPlaylist(uri.clone()),
            Self::UnfollowPlaylist(uri) => Self::FollowPlaylist(uri.clone()),
        }
    }
}

/// Paired undo/redo stacks of library commands.
///
/// The dispatcher registers the INVERSE of each forward command before
/// issuing it, so a later undo pops a ready-to-issue command. A fresh forward
/// mutation clears the redo stack.
#[derive(Debug, Default)]
pub struct UndoStack {
    undo: Vec<LibraryCommand>,
    redo: Vec<LibraryCommand>,
}

impl UndoStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fresh forward mutation: push its inverse onto the undo
    /// stack and invalidate the redo history.
    pub fn record(&mut self, command: &LibraryCommand) {
        self.undo.push(command.inverse());
        self.redo.clear();
    }

    /// Pop the next command to issue for undo; its inverse moves to the redo
    /// stack.
    pub fn pop_undo(&mut self) -> Option<LibraryCommand> {
        let command = self.undo.pop()?;
        self.redo.push(command.inverse());
        Some(command)
    }

    /// Pop the next command to issue for redo; its inverse moves back to the
    /// undo stack.
    pub fn pop_redo(&mut self) -> Option<LibraryCommand> {
        let command = self.redo.pop()?;
        self.undo.push(command.inverse());
        Some(command)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use perch_core::{IdCategory, ResourceId};

    fn track(id: &str) -> ResourceId {
        ResourceId {
            category: IdCategory::Track,
            id: id.to_owned(),
        }
    }

    #[test]
    fn inverse_round_trips() {
        let command = LibraryCommand::AddToPlaylist {
            playlist_uri: "spotify:playlist:p1".to_owned(),
            item: track("t1"),
        };
        assert_eq!(command.inverse().inverse(), command);
    }

    #[test]
    fn undo_then_redo_replays_the_original_mutation() {
        let mut stack = UndoStack::new();
        let save = LibraryCommand::SaveTrack(track("t1"));

        stack.record(&save);
        assert!(stack.can_undo());
        assert!(!stack.can_redo());

        // Undo issues the inverse of the recorded mutation.
        let undo = stack.pop_undo().unwrap();
        assert_eq!(undo, LibraryCommand::RemoveSavedTrack(track("t1")));
        assert!(stack.can_redo());

        // Redo issues the original mutation again.
        let redo = stack.pop_redo().unwrap();
        assert_eq!(redo, save);
        assert!(stack.can_undo());
    }

    #[test]
    fn fresh_mutation_clears_redo() {
        let mut stack = UndoStack::new();
        stack.record(&LibraryCommand::SaveTrack(track("t1")));
        stack.pop_undo().unwrap();
        assert!(stack.can_redo());

        stack.record(&LibraryCommand::FollowPlaylist("spotify:playlist:p1".to_owned()));
        assert!(!stack.can_redo());
        assert!(stack.can_undo());
    }

    #[test]
    fn empty_stack_pops_nothing() {
        let mut stack = UndoStack::new();
        assert!(stack.pop_undo().is_none());
        assert!(stack.pop_redo().is_none());
    }
}
