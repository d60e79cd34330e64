//! Conversions between store values and their JSON wire shapes.

use axum::http::HeaderMap;
use mockdrop_core::{API_ARG_HEADER, CommitInfo, Metadata, MetadataTag};
use serde::de::DeserializeOwned;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use super::error::ApiError;
use crate::store::{ChangeEntry, CommitRequest, Item, ItemKind, Tombstone, WriteMode};

pub fn metadata(item: &Item) -> Metadata {
    let mut metadata = Metadata {
        tag: Some(MetadataTag::Folder),
        name: item.name.clone(),
        id: item.id.clone(),
        path_lower: item.path_lower.clone(),
        path_display: item.path_display.clone(),
        ..Metadata::default()
    };
    if let ItemKind::File(file) = &item.kind {
        metadata.tag = Some(MetadataTag::File);
        metadata.client_modified = format_time(file.client_modified);
        metadata.server_modified = format_time(file.server_modified);
        metadata.rev = Some(file.rev.clone());
        metadata.size = Some(file.size);
        metadata.content_hash = Some(file.content_hash.clone());
    }
    metadata
}

pub fn deleted_metadata(tombstone: &Tombstone) -> Metadata {
    Metadata {
        tag: Some(MetadataTag::Deleted),
        name: tombstone.name.clone(),
        path_lower: tombstone.path_lower.clone(),
        path_display: tombstone.path_display.clone(),
        ..Metadata::default()
    }
}

pub fn entry_metadata(entry: &ChangeEntry) -> Metadata {
    match entry {
        ChangeEntry::Item(item) => metadata(item),
        ChangeEntry::Deleted(tombstone) => deleted_metadata(tombstone),
    }
}

fn format_time(time: OffsetDateTime) -> Option<String> {
    time.format(&Rfc3339).ok()
}

pub fn commit_request(commit: CommitInfo) -> Result<CommitRequest, ApiError> {
    let client_modified = commit
        .client_modified
        .as_deref()
        .map(|value| {
            OffsetDateTime::parse(value, &Rfc3339)
                .map_err(|err| ApiError::bad_request(format!("invalid client_modified: {err}")))
        })
        .transpose()?;
    let mode = match commit.mode {
        mockdrop_core::WriteMode::Add => WriteMode::Add,
        mockdrop_core::WriteMode::Overwrite => WriteMode::Overwrite,
        mockdrop_core::WriteMode::Update { update } => WriteMode::Update(update),
    };
    Ok(CommitRequest {
        path: commit.path,
        mode,
        autorename: commit.autorename,
        client_modified,
    })
}

/// Decodes a JSON request body. An empty body reads as `null`.
pub fn json_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    let body = if body.is_empty() { b"null".as_slice() } else { body };
    serde_json::from_slice(body)
        .map_err(|err| ApiError::bad_request(format!("could not decode request body: {err}")))
}

/// Decodes the JSON argument carried in the `Dropbox-API-Arg` header.
pub fn api_arg<T: DeserializeOwned>(headers: &HeaderMap) -> Result<T, ApiError> {
    let value = headers
        .get(API_ARG_HEADER)
        .ok_or_else(|| ApiError::bad_request(format!("missing {API_ARG_HEADER} header")))?;
    serde_json::from_slice(value.as_bytes()).map_err(|err| {
        ApiError::bad_request(format!("could not decode {API_ARG_HEADER} header: {err}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Store, WriteMode};
    use axum::http::HeaderValue;
    use mockdrop_core::DownloadArg;

    #[test]
    fn file_metadata_carries_content_fields() {
        let store = Store::new();
        let item = store
            .commit_file(&CommitRequest::new("/Docs.txt", WriteMode::Add), b"abc")
            .unwrap()
            .item;
        let md = metadata(&item);
        assert_eq!(md.tag, Some(MetadataTag::File));
        assert_eq!(md.size, Some(3));
        assert!(md.id.starts_with("id:"));
        assert!(md.server_modified.as_deref().is_some_and(|t| t.ends_with('Z')));

        let folder = metadata(&store.create_folder("/Dir").unwrap());
        assert!(folder.is_folder());
        assert!(folder.rev.is_none());
    }

    #[test]
    fn commit_info_converts_modes_and_times() {
        let mut commit = CommitInfo::add("/a.txt");
        commit.mode = mockdrop_core::WriteMode::Update {
            update: "abc".to_string(),
        };
        commit.client_modified = Some("2024-05-01T10:00:00Z".to_string());
        let request = commit_request(commit).unwrap();
        assert_eq!(request.mode, WriteMode::Update("abc".to_string()));
        assert_eq!(
            request.client_modified.map(|t| t.unix_timestamp()),
            Some(1_714_557_600)
        );

        let mut bad = CommitInfo::add("/a.txt");
        bad.client_modified = Some("yesterday".to_string());
        assert!(commit_request(bad).is_err());
    }

    #[test]
    fn api_arg_requires_header() {
        let mut headers = HeaderMap::new();
        assert!(api_arg::<DownloadArg>(&headers).is_err());
        headers.insert(
            "dropbox-api-arg",
            HeaderValue::from_static(r#"{"path":"/\u00dc"}"#),
        );
        let arg: DownloadArg = api_arg(&headers).unwrap();
        assert_eq!(arg.path, "/Ü");
    }
}
