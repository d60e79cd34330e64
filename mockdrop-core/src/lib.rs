mod client;
mod types;

pub use client::{
    API_ARG_HEADER, API_RESULT_HEADER, ApiErrorClass, ClientError, Download, DropboxClient,
    header_json,
};
pub use types::{
    ApiErrorBody, ApiErrorDetails, ByteSpan, CommitInfo, ConflictDetails, CreateFolderArg,
    DeleteArg, DownloadArg, GetMetadataArg, ListFolderArg, ListFolderContinueArg,
    ListFolderResult, LookupError, Metadata, MetadataTag, RelocationArg, SpaceAllocation,
    SpaceUsage, UploadSessionCursor, UploadSessionFinishArg, UploadSessionStartResult, WriteMode,
};
