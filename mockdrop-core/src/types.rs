use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MetadataTag {
    File,
    Folder,
    Deleted,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Metadata {
    #[serde(rename = ".tag", default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<MetadataTag>,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default)]
    pub path_lower: String,
    #[serde(default)]
    pub path_display: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_modified: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_modified: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
}

impl Metadata {
    pub fn is_folder(&self) -> bool {
        self.tag == Some(MetadataTag::Folder)
    }

    pub fn is_deleted(&self) -> bool {
        self.tag == Some(MetadataTag::Deleted)
    }

    /// Same metadata without the `.tag` discriminator, the shape returned by
    /// `create_folder` and `upload_session/finish`.
    pub fn untagged(mut self) -> Self {
        self.tag = None;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SpaceUsage {
    pub used: u64,
    pub allocation: SpaceAllocation,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SpaceAllocation {
    #[serde(rename = ".tag")]
    pub tag: String,
    pub allocated: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CreateFolderArg {
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct GetMetadataArg {
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ListFolderArg {
    pub path: String,
    #[serde(default)]
    pub recursive: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ListFolderContinueArg {
    pub cursor: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ListFolderResult {
    pub entries: Vec<Metadata>,
    pub cursor: String,
    pub has_more: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DeleteArg {
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RelocationArg {
    pub from_path: String,
    pub to_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DownloadArg {
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct UploadSessionStartResult {
    pub session_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct UploadSessionCursor {
    pub session_id: String,
    pub offset: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = ".tag", rename_all = "snake_case")]
pub enum WriteMode {
    #[default]
    Add,
    Overwrite,
    Update { update: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CommitInfo {
    pub path: String,
    #[serde(default)]
    pub mode: WriteMode,
    #[serde(default)]
    pub autorename: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_modified: Option<String>,
    #[serde(default)]
    pub mute: bool,
}

impl CommitInfo {
    pub fn add(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            mode: WriteMode::Add,
            autorename: false,
            client_modified: None,
            mute: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct UploadSessionFinishArg {
    pub cursor: UploadSessionCursor,
    pub commit: CommitInfo,
}

/// Inclusive byte span for ranged downloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteSpan {
    pub start: u64,
    pub end: u64,
}

impl ByteSpan {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start).saturating_add(1)
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ApiErrorBody {
    pub error_summary: String,
    pub error: ApiErrorDetails,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ApiErrorDetails {
    #[serde(rename = ".tag")]
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<LookupError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_lookup: Option<LookupError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_offset: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LookupError {
    #[serde(rename = ".tag")]
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflict: Option<ConflictDetails>,
}

impl LookupError {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            conflict: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ConflictDetails {
    #[serde(rename = ".tag")]
    pub tag: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn write_mode_uses_dot_tag() {
        let mode: WriteMode = serde_json::from_value(json!({".tag": "update", "update": "abc"}))
            .unwrap();
        assert_eq!(
            mode,
            WriteMode::Update {
                update: "abc".into()
            }
        );
        assert_eq!(
            serde_json::to_value(WriteMode::Overwrite).unwrap(),
            json!({".tag": "overwrite"})
        );
    }

    #[test]
    fn commit_info_defaults_to_add() {
        let commit: CommitInfo = serde_json::from_value(json!({"path": "/a.txt"})).unwrap();
        assert_eq!(commit, CommitInfo::add("/a.txt"));
    }

    #[test]
    fn untagged_metadata_omits_tag() {
        let md = Metadata {
            tag: Some(MetadataTag::Folder),
            name: "Docs".into(),
            id: "id:abc".into(),
            path_lower: "/docs".into(),
            path_display: "/Docs".into(),
            ..Metadata::default()
        };
        let value = serde_json::to_value(md.untagged()).unwrap();
        assert!(value.get(".tag").is_none());
        assert_eq!(value["path_display"], "/Docs");
        assert!(value.get("size").is_none());
    }

    #[test]
    fn byte_span_len_is_inclusive() {
        assert_eq!(ByteSpan::new(2, 3).len(), 2);
        assert!(!ByteSpan::new(0, 0).is_empty());
    }
}
