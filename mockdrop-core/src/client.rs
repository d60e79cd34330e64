use std::fmt::Write as _;

use reqwest::header::{AUTHORIZATION, CONTENT_RANGE, CONTENT_TYPE, ETAG, RANGE};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use url::Url;

use crate::types::{
    ApiErrorBody, ByteSpan, CommitInfo, CreateFolderArg, DeleteArg, DownloadArg, GetMetadataArg,
    ListFolderArg, ListFolderContinueArg, ListFolderResult, Metadata, RelocationArg, SpaceUsage,
    UploadSessionCursor, UploadSessionFinishArg, UploadSessionStartResult,
};

const DEFAULT_API_URL: &str = "https://api.dropboxapi.com";
const DEFAULT_CONTENT_URL: &str = "https://content.dropboxapi.com";

pub const API_ARG_HEADER: &str = "Dropbox-API-Arg";
pub const API_RESULT_HEADER: &str = "Dropbox-API-Result";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("api returned {status}: {body}")]
    Api {
        status: StatusCode,
        body: String,
        error: Option<ApiErrorBody>,
    },
    #[error("response is missing the {0} header")]
    MissingHeader(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorClass {
    Auth,
    RateLimit,
    Transient,
    Permanent,
}

#[derive(Debug)]
pub struct Download {
    pub status: StatusCode,
    pub metadata: Metadata,
    pub etag: Option<String>,
    pub content_range: Option<String>,
    pub data: Vec<u8>,
}

#[derive(Clone)]
pub struct DropboxClient {
    http: Client,
    api_url: Url,
    content_url: Url,
    token: String,
}

impl DropboxClient {
    pub fn new(token: impl Into<String>) -> Result<Self, ClientError> {
        Self::with_base_urls(DEFAULT_API_URL, DEFAULT_CONTENT_URL, token)
    }

    /// Client that sends both RPC and content requests to one host, which is
    /// how the mock server is usually deployed.
    pub fn with_base_url(base_url: &str, token: impl Into<String>) -> Result<Self, ClientError> {
        Self::with_base_urls(base_url, base_url, token)
    }

    pub fn with_base_urls(
        api_url: &str,
        content_url: &str,
        token: impl Into<String>,
    ) -> Result<Self, ClientError> {
        Ok(Self {
            http: Client::new(),
            api_url: Url::parse(api_url)?,
            content_url: Url::parse(content_url)?,
            token: token.into(),
        })
    }

    pub async fn get_space_usage(&self) -> Result<SpaceUsage, ClientError> {
        let url = self.api_endpoint("/2/users/get_space_usage")?;
        let response = self.authorized(self.http.post(url)).send().await?;
        Self::handle_response(response).await
    }

    pub async fn get_metadata(&self, path: &str) -> Result<Metadata, ClientError> {
        self.rpc(
            "/2/files/get_metadata",
            &GetMetadataArg {
                path: path.to_string(),
            },
        )
        .await
    }

    pub async fn list_folder(
        &self,
        path: &str,
        recursive: bool,
    ) -> Result<ListFolderResult, ClientError> {
        self.rpc(
            "/2/files/list_folder",
            &ListFolderArg {
                path: path.to_string(),
                recursive,
            },
        )
        .await
    }

    pub async fn list_folder_continue(&self, cursor: &str) -> Result<ListFolderResult, ClientError> {
        self.rpc(
            "/2/files/list_folder/continue",
            &ListFolderContinueArg {
                cursor: cursor.to_string(),
            },
        )
        .await
    }

    pub async fn create_folder(&self, path: &str) -> Result<Metadata, ClientError> {
        self.rpc(
            "/2/files/create_folder",
            &CreateFolderArg {
                path: path.to_string(),
            },
        )
        .await
    }

    pub async fn delete(&self, path: &str) -> Result<Metadata, ClientError> {
        self.rpc(
            "/2/files/delete",
            &DeleteArg {
                path: path.to_string(),
            },
        )
        .await
    }

    pub async fn copy(&self, from_path: &str, to_path: &str) -> Result<Metadata, ClientError> {
        self.rpc(
            "/2/files/copy",
            &RelocationArg {
                from_path: from_path.to_string(),
                to_path: to_path.to_string(),
            },
        )
        .await
    }

    pub async fn move_item(&self, from_path: &str, to_path: &str) -> Result<Metadata, ClientError> {
        self.rpc(
            "/2/files/move",
            &RelocationArg {
                from_path: from_path.to_string(),
                to_path: to_path.to_string(),
            },
        )
        .await
    }

    pub async fn upload_session_start(
        &self,
        data: Vec<u8>,
    ) -> Result<UploadSessionStartResult, ClientError> {
        let url = self.content_endpoint("/2/files/upload_session/start")?;
        let response = self
            .authorized(self.http.post(url))
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(data)
            .send()
            .await?;
        Self::handle_response(response).await
    }

    pub async fn upload_session_append(
        &self,
        cursor: &UploadSessionCursor,
        data: Vec<u8>,
    ) -> Result<(), ClientError> {
        let url = self.content_endpoint("/2/files/upload_session/append")?;
        let response = self
            .authorized(self.http.post(url))
            .header(CONTENT_TYPE, "application/octet-stream")
            .header(API_ARG_HEADER, header_json(cursor)?)
            .body(data)
            .send()
            .await?;
        Self::check_status(response).await?;
        Ok(())
    }

    pub async fn upload_session_finish(
        &self,
        cursor: UploadSessionCursor,
        commit: CommitInfo,
        data: Vec<u8>,
    ) -> Result<Metadata, ClientError> {
        let url = self.content_endpoint("/2/files/upload_session/finish")?;
        let arg = UploadSessionFinishArg { cursor, commit };
        let response = self
            .authorized(self.http.post(url))
            .header(CONTENT_TYPE, "application/octet-stream")
            .header(API_ARG_HEADER, header_json(&arg)?)
            .body(data)
            .send()
            .await?;
        Self::handle_response(response).await
    }

    /// Single-request upload for small files.
    pub async fn upload(&self, commit: CommitInfo, data: Vec<u8>) -> Result<Metadata, ClientError> {
        let url = self.content_endpoint("/2/files/upload")?;
        let response = self
            .authorized(self.http.post(url))
            .header(CONTENT_TYPE, "application/octet-stream")
            .header(API_ARG_HEADER, header_json(&commit)?)
            .body(data)
            .send()
            .await?;
        Self::handle_response(response).await
    }

    pub async fn download(
        &self,
        path: &str,
        span: Option<ByteSpan>,
    ) -> Result<Download, ClientError> {
        let url = self.content_endpoint("/2/files/download")?;
        let arg = DownloadArg {
            path: path.to_string(),
        };
        let mut request = self
            .authorized(self.http.post(url))
            .header(API_ARG_HEADER, header_json(&arg)?);
        if let Some(span) = span {
            request = request.header(RANGE, format!("bytes={}-{}", span.start, span.end));
        }
        let response = Self::check_status(request.send().await?).await?;

        let status = response.status();
        let headers = response.headers();
        let result = headers
            .get(API_RESULT_HEADER)
            .ok_or(ClientError::MissingHeader(API_RESULT_HEADER))?;
        let metadata: Metadata = serde_json::from_slice(result.as_bytes())?;
        let etag = header_string(headers, ETAG);
        let content_range = header_string(headers, CONTENT_RANGE);
        let data = response.bytes().await?.to_vec();

        Ok(Download {
            status,
            metadata,
            etag,
            content_range,
            data,
        })
    }

    async fn rpc<A: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        arg: &A,
    ) -> Result<T, ClientError> {
        let url = self.api_endpoint(path)?;
        let response = self
            .authorized(self.http.post(url))
            .json(arg)
            .send()
            .await?;
        Self::handle_response(response).await
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.header(AUTHORIZATION, self.auth_header_value())
    }

    fn auth_header_value(&self) -> String {
        format!("Bearer {}", self.token)
    }

    fn api_endpoint(&self, path: &str) -> Result<Url, ClientError> {
        Ok(self.api_url.join(path)?)
    }

    fn content_endpoint(&self, path: &str) -> Result<Url, ClientError> {
        Ok(self.content_url.join(path)?)
    }

    async fn handle_response<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let response = Self::check_status(response).await?;
        Ok(response.json::<T>().await?)
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let error = serde_json::from_str::<ApiErrorBody>(&body).ok();
        Err(ClientError::Api {
            status,
            body,
            error,
        })
    }
}

impl ClientError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn api_error(&self) -> Option<&ApiErrorBody> {
        match self {
            ClientError::Api { error, .. } => error.as_ref(),
            _ => None,
        }
    }

    pub fn error_summary(&self) -> Option<&str> {
        self.api_error().map(|err| err.error_summary.as_str())
    }

    /// Top-level `.tag` of a structured API error, e.g. `path`.
    pub fn tag(&self) -> Option<&str> {
        self.api_error().map(|err| err.error.tag.as_str())
    }

    /// Nested lookup tag from either `path` or `path_lookup`, e.g. `not_found`.
    pub fn path_tag(&self) -> Option<&str> {
        let details = &self.api_error()?.error;
        details
            .path
            .as_ref()
            .or(details.path_lookup.as_ref())
            .map(|lookup| lookup.tag.as_str())
    }

    pub fn classification(&self) -> Option<ApiErrorClass> {
        self.status().map(classify_api_status)
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self.classification(),
            Some(ApiErrorClass::RateLimit | ApiErrorClass::Transient)
        )
    }
}

fn classify_api_status(status: StatusCode) -> ApiErrorClass {
    if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
        ApiErrorClass::Auth
    } else if status == StatusCode::TOO_MANY_REQUESTS {
        ApiErrorClass::RateLimit
    } else if status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT {
        ApiErrorClass::Transient
    } else {
        ApiErrorClass::Permanent
    }
}

/// JSON for the `Dropbox-API-Arg` and `Dropbox-API-Result` headers:
/// non-ASCII characters are escaped so the value stays a valid header.
pub fn header_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let json = serde_json::to_string(value)?;
    let mut out = String::with_capacity(json.len());
    for ch in json.chars() {
        if ch.is_ascii() {
            out.push(ch);
        } else {
            let mut units = [0u16; 2];
            for unit in ch.encode_utf16(&mut units) {
                let _ = write!(out, "\\u{unit:04x}");
            }
        }
    }
    Ok(out)
}

fn header_string(
    headers: &reqwest::header::HeaderMap,
    name: reqwest::header::HeaderName,
) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}
