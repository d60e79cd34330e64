use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    Folder,
    File,
}

impl ConflictKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictKind::Folder => "folder",
            ConflictKind::File => "file",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("path not found: {0}")]
    NotFound(String),
    #[error("{} already exists at {path}", .kind.as_str())]
    Conflict { path: String, kind: ConflictKind },
    #[error("no free name left for {0}")]
    RenameExhausted(String),
    #[error("invalid cursor: {0}")]
    InvalidCursor(String),
    #[error("invalid upload session id: {0}")]
    InvalidSession(String),
    #[error("incorrect offset, expected at most {correct_offset}")]
    IncorrectOffset { correct_offset: u64 },
    #[error("not a folder: {0}")]
    NotFolder(String),
    #[error("not a file: {0}")]
    NotFile(String),
    #[error("the root folder is unsupported")]
    RootUnsupported,
    #[error("malformed path: {0}")]
    MalformedPath(String),
    #[error("cannot move a folder into itself: {0}")]
    RelocationIntoSelf(String),
    #[error("range {start}-{end} is not satisfiable for {size} bytes")]
    InvalidRange { start: u64, end: u64, size: u64 },
}
