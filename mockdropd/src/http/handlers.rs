use axum::Json;
use axum::body::Bytes;
use axum::http::header::{ACCEPT_RANGES, CONTENT_RANGE, CONTENT_TYPE, ETAG, RANGE};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use mockdrop_core::{
    CommitInfo, CreateFolderArg, DeleteArg, DownloadArg, GetMetadataArg,
    ListFolderArg, ListFolderContinueArg, ListFolderResult, Metadata, RelocationArg,
    SpaceAllocation, SpaceUsage, UploadSessionCursor, UploadSessionFinishArg,
    UploadSessionStartResult, header_json,
};
use serde_json::Value;

use super::Tenant;
use super::error::{ApiError, Scope};
use super::range::{RangeError, parse_range};
use super::wire::{api_arg, commit_request, entry_metadata, json_body, metadata};
use crate::store::{ListFolderPage, StoreError};

type ApiResult<T> = Result<T, ApiError>;

pub async fn get_space_usage(Tenant(store): Tenant) -> Json<SpaceUsage> {
    let usage = store.space_usage();
    Json(SpaceUsage {
        used: usage.used,
        allocation: SpaceAllocation {
            tag: "individual".to_string(),
            allocated: usage.allocated,
        },
    })
}

pub async fn create_folder(Tenant(store): Tenant, body: Bytes) -> ApiResult<Json<Metadata>> {
    let arg: CreateFolderArg = json_body(&body)?;
    let item = store
        .create_folder(&arg.path)
        .map_err(|err| ApiError::from_store(err, &Scope::Path))?;
    Ok(Json(metadata(&item).untagged()))
}

pub async fn get_metadata(Tenant(store): Tenant, body: Bytes) -> ApiResult<Json<Metadata>> {
    let arg: GetMetadataArg = json_body(&body)?;
    let item = store
        .get_metadata(&arg.path)
        .map_err(|err| ApiError::from_store(err, &Scope::Path))?;
    Ok(Json(metadata(&item)))
}

pub async fn list_folder(
    Tenant(store): Tenant,
    body: Bytes,
) -> ApiResult<Json<ListFolderResult>> {
    let arg: ListFolderArg = json_body(&body)?;
    let page = store
        .list_folder(&arg.path, arg.recursive)
        .map_err(|err| ApiError::from_store(err, &Scope::Path))?;
    Ok(Json(list_folder_result(page)))
}

pub async fn list_folder_continue(
    Tenant(store): Tenant,
    body: Bytes,
) -> ApiResult<Json<ListFolderResult>> {
    let arg: ListFolderContinueArg = json_body(&body)?;
    let page = store
        .list_folder_continue(&arg.cursor)
        .map_err(|err| ApiError::from_store(err, &Scope::Path))?;
    Ok(Json(list_folder_result(page)))
}

fn list_folder_result(page: ListFolderPage) -> ListFolderResult {
    ListFolderResult {
        entries: page.entries.iter().map(entry_metadata).collect(),
        cursor: page.cursor,
        has_more: page.has_more,
    }
}

pub async fn delete(Tenant(store): Tenant, body: Bytes) -> ApiResult<Json<Metadata>> {
    let arg: DeleteArg = json_body(&body)?;
    let item = store
        .delete(&arg.path)
        .map_err(|err| ApiError::from_store(err, &Scope::PathLookup))?;
    Ok(Json(metadata(&item)))
}

pub async fn copy(Tenant(store): Tenant, body: Bytes) -> ApiResult<Json<Metadata>> {
    let arg: RelocationArg = json_body(&body)?;
    let item = store
        .copy(&arg.from_path, &arg.to_path)
        .map_err(|err| ApiError::from_store(err, &relocation_scope(&arg)))?;
    Ok(Json(metadata(&item)))
}

pub async fn move_item(Tenant(store): Tenant, body: Bytes) -> ApiResult<Json<Metadata>> {
    let arg: RelocationArg = json_body(&body)?;
    let item = store
        .move_item(&arg.from_path, &arg.to_path)
        .map_err(|err| ApiError::from_store(err, &relocation_scope(&arg)))?;
    Ok(Json(metadata(&item)))
}

fn relocation_scope(arg: &RelocationArg) -> Scope {
    Scope::Relocation {
        from: arg.from_path.trim_end_matches('/').to_string(),
    }
}

pub async fn upload(
    Tenant(store): Tenant,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<Metadata>> {
    let commit: CommitInfo = api_arg(&headers)?;
    let request = commit_request(commit)?;
    let outcome = store
        .commit_file(&request, &body)
        .map_err(|err| ApiError::from_store(err, &Scope::PathLookup))?;
    Ok(Json(metadata(&outcome.item).untagged()))
}

pub async fn upload_session_start(
    Tenant(store): Tenant,
    body: Bytes,
) -> Json<UploadSessionStartResult> {
    let session_id = store.start_upload_session(&body);
    Json(UploadSessionStartResult { session_id })
}

pub async fn upload_session_append(
    Tenant(store): Tenant,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let cursor: UploadSessionCursor = api_arg(&headers)?;
    store
        .append_upload_session(&cursor.session_id, cursor.offset, &body)
        .map_err(|err| ApiError::from_store(err, &Scope::PathLookup))?;
    Ok(Json(Value::Null))
}

pub async fn upload_session_finish(
    Tenant(store): Tenant,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<Metadata>> {
    let arg: UploadSessionFinishArg = api_arg(&headers)?;
    let request = commit_request(arg.commit)?;
    let outcome = store
        .finish_upload_session(&arg.cursor.session_id, arg.cursor.offset, &body, &request)
        .map_err(|err| ApiError::from_store(err, &Scope::PathLookup))?;
    Ok(Json(metadata(&outcome.item).untagged()))
}

pub async fn download(Tenant(store): Tenant, headers: HeaderMap) -> ApiResult<Response> {
    let arg: DownloadArg = api_arg(&headers)?;
    let scope = Scope::Path;
    let item = store
        .get_metadata(&arg.path)
        .map_err(|err| ApiError::from_store(err, &scope))?;
    let Some(file) = item.file() else {
        return Err(ApiError::from_store(
            StoreError::NotFile(item.path_display.clone()),
            &scope,
        ));
    };

    let span = match headers.get(RANGE) {
        None => None,
        Some(value) => {
            let value = value
                .to_str()
                .map_err(|_| ApiError::bad_request("Range header is not ASCII"))?;
            match parse_range(value, file.size) {
                Ok(span) => Some(span),
                Err(RangeError::MultipleRanges) => {
                    return Err(ApiError::bad_request(RangeError::MultipleRanges.to_string()));
                }
                Err(err @ RangeError::Unsatisfiable(_)) => {
                    return Err(ApiError::new(
                        StatusCode::RANGE_NOT_SATISFIABLE,
                        "invalid_range",
                        err.to_string(),
                    ));
                }
            }
        }
    };

    let (item, data) = store
        .download(&arg.path, span)
        .map_err(|err| ApiError::from_store(err, &scope))?;
    let md = metadata(&item);
    let result = header_json(&md)
        .map_err(|err| ApiError::internal(format!("could not encode metadata: {err}")))?;

    let mut response_headers = HeaderMap::new();
    response_headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/octet-stream"));
    response_headers.insert(ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    response_headers.insert(
        HeaderName::from_static("dropbox-api-result"),
        header_value(result)?,
    );
    if let Some(rev) = &md.rev {
        response_headers.insert(ETAG, header_value(format!("W/\"{rev}\""))?);
    }

    let status = match span {
        Some(span) => {
            let size = md.size.unwrap_or_default();
            let range = format!("bytes {}-{}/{size}", span.start, span.end);
            response_headers.insert(CONTENT_RANGE, header_value(range)?);
            StatusCode::PARTIAL_CONTENT
        }
        None => StatusCode::OK,
    };
    Ok((status, response_headers, data).into_response())
}

fn header_value(value: String) -> ApiResult<HeaderValue> {
    HeaderValue::try_from(value)
        .map_err(|err| ApiError::internal(format!("invalid response header value: {err}")))
}
