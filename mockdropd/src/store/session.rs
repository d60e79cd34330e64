use tracing::debug;

use super::commit::{CommitOutcome, CommitRequest};
use super::error::StoreError;
use super::item::{random_token, validate_path};
use super::{Store, StoreState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSession {
    pub id: String,
    pub buffer: Vec<u8>,
}

impl UploadSession {
    /// Truncates the buffer to `offset` and appends `data`, so a chunk
    /// resent after a lost response replaces itself instead of duplicating.
    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<(), StoreError> {
        let len = self.buffer.len() as u64;
        if offset > len {
            return Err(StoreError::IncorrectOffset {
                correct_offset: len,
            });
        }
        self.buffer.truncate(offset as usize);
        self.buffer.extend_from_slice(data);
        Ok(())
    }
}

impl Store {
    pub fn start_upload_session(&self, initial: &[u8]) -> String {
        let id = random_token();
        let session = UploadSession {
            id: id.clone(),
            buffer: initial.to_vec(),
        };
        self.state.write().sessions.insert(id.clone(), session);
        debug!(session_id = %id, size = initial.len(), "upload session started");
        id
    }

    pub fn append_upload_session(
        &self,
        session_id: &str,
        offset: u64,
        data: &[u8],
    ) -> Result<(), StoreError> {
        self.state.write().session_mut(session_id)?.write_at(offset, data)
    }

    /// Writes the final chunk and commits the buffer. The session survives a
    /// failed commit and can be finished again.
    pub fn finish_upload_session(
        &self,
        session_id: &str,
        offset: u64,
        data: &[u8],
        request: &CommitRequest,
    ) -> Result<CommitOutcome, StoreError> {
        let path = validate_path(&request.path)?;
        if path.is_empty() {
            return Err(StoreError::RootUnsupported);
        }
        let mut state = self.state.write();
        state.session_mut(session_id)?.write_at(offset, data)?;

        let parent_id = state.parent_folder(path)?.id.clone();
        let content = state
            .sessions
            .get(session_id)
            .map(|session| session.buffer.clone())
            .unwrap_or_default();
        let outcome = state.commit_file(&parent_id, path, request, &content)?;
        state.sessions.remove(session_id);
        debug!(
            session_id,
            path = %outcome.item.path_display,
            size = content.len(),
            "upload session finished"
        );
        Ok(outcome)
    }

    /// Bytes buffered so far, or `None` for an unknown or finished session.
    pub fn upload_session_len(&self, session_id: &str) -> Option<u64> {
        self.state
            .read()
            .sessions
            .get(session_id)
            .map(|session| session.buffer.len() as u64)
    }
}

impl StoreState {
    fn session_mut(&mut self, session_id: &str) -> Result<&mut UploadSession, StoreError> {
        self.sessions
            .get_mut(session_id)
            .ok_or_else(|| StoreError::InvalidSession(session_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_at_truncates_before_appending() {
        let mut session = UploadSession {
            id: "s".to_string(),
            buffer: b"12345".to_vec(),
        };
        session.write_at(3, b"xy").unwrap();
        assert_eq!(session.buffer, b"123xy");
        session.write_at(5, b"z").unwrap();
        assert_eq!(session.buffer, b"123xyz");
        assert_eq!(
            session.write_at(9, b"!"),
            Err(StoreError::IncorrectOffset { correct_offset: 6 })
        );
    }
}
