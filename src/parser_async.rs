use std::path::Path;

use tokio::{
    fs::File,
    io::{AsyncRead, AsyncReadExt},
};

use crate::parser::{extract_bytes, ExtractionResult};

/// Async version of [`extract`](crate::extract).
///
/// The whole stream is read into memory before decoding, since the box and
/// IFD walks need random access.
pub async fn extract_async<R: AsyncRead + Unpin>(mut reader: R) -> ExtractionResult {
    let mut buf = Vec::new();
    match reader.read_to_end(&mut buf).await {
        Ok(_) => extract_bytes(&buf),
        Err(e) => ExtractionResult::failed(e.into()),
    }
}

/// Async version of [`extract_file`](crate::extract_file).
#[tracing::instrument(skip_all, fields(path = %path.as_ref().display()))]
pub async fn extract_file_async<P: AsRef<Path>>(path: P) -> ExtractionResult {
    match File::open(path.as_ref()).await {
        Ok(file) => extract_async(file).await,
        Err(e) => ExtractionResult::failed(e.into()),
    }
}
