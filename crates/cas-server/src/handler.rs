//! Request handlers.

use std::io::{self, SeekFrom};

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::{Bytes, BytesMut};
use cas_index::NamedObjects;
use cas_store::{ContentStore, Ingested};
use cas_types::{ContentId, ObjectKey};
use chrono::{DateTime, Utc};
use futures_util::{stream, Stream, StreamExt};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, Take};

use crate::conditional::{self, Precondition};
use crate::error::{ServerError, ServerResult};
use crate::range::{self, RangeRequest};

/// Size of each chunk read from a blob while streaming a response.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Shared handles for all handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    pub store: ContentStore,
    pub named: NamedObjects,
    pub allow_empty_body: bool,
}

pub async fn health() -> &'static str {
    "ok\n"
}

pub async fn invalid_path() -> ServerError {
    ServerError::BadRequest("invalid path".to_string())
}

/// `POST /objects`
pub async fn put_object(State(state): State<AppState>, body: Body) -> ServerResult<Json<Ingested>> {
    let input = request_stream(body, state.allow_empty_body).await?;
    Ok(Json(state.store.put(input).await?))
}

/// `GET` and `HEAD /objects/{id}`
pub async fn get_object(
    State(state): State<AppState>,
    Path(id): Path<String>,
    method: Method,
    headers: HeaderMap,
) -> ServerResult<Response> {
    let id = ContentId::parse(&id)?;
    let blob = state.store.get(&id).await?;
    let served = Served {
        digest: id,
        content_type: blob.content_type,
        size: blob.size,
        last_modified: DateTime::<Utc>::from(blob.modified),
    };
    served.respond(&method, &headers, Some(blob.file)).await
}

/// `PUT /{bucket}/{key}`
pub async fn put_named(
    State(state): State<AppState>,
    Path((bucket, key)): Path<(String, String)>,
    body: Body,
) -> ServerResult<Response> {
    let key = ObjectKey::new(&bucket, &key)?;
    let input = request_stream(body, state.allow_empty_body).await?;
    let entry = state.named.put_named(&key, input).await?;
    Ok((
        StatusCode::CREATED,
        [(header::ETAG, conditional::etag_for(&entry.digest))],
    )
        .into_response())
}

/// `GET` and `HEAD /{bucket}/{key}`
pub async fn get_named(
    State(state): State<AppState>,
    Path((bucket, key)): Path<(String, String)>,
    method: Method,
    headers: HeaderMap,
) -> ServerResult<Response> {
    let key = ObjectKey::new(&bucket, &key)?;
    let (entry, file) = if method == Method::HEAD {
        (state.named.head_named(&key).await?, None)
    } else {
        let object = state.named.get_named(&key).await?;
        (object.entry, Some(object.blob.file))
    };
    let served = Served {
        digest: entry.digest,
        content_type: entry.media_type,
        size: entry.size,
        last_modified: entry.modified_at,
    };
    served.respond(&method, &headers, file).await
}

/// `DELETE /{bucket}/{key}`
pub async fn delete_named(
    State(state): State<AppState>,
    Path((bucket, key)): Path<(String, String)>,
) -> ServerResult<StatusCode> {
    let key = ObjectKey::new(&bucket, &key)?;
    state.named.delete_named(&key).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Validators and representation metadata of an object being served.
struct Served {
    digest: ContentId,
    content_type: String,
    size: u64,
    last_modified: DateTime<Utc>,
}

impl Served {
    async fn respond(self, method: &Method, headers: &HeaderMap, file: Option<File>) -> ServerResult<Response> {
        let etag = conditional::etag_for(&self.digest);
        let mut out = HeaderMap::new();
        out.insert(header::ETAG, header_value(&etag)?);
        out.insert(
            header::LAST_MODIFIED,
            header_value(&conditional::http_date(self.last_modified))?,
        );
        out.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));

        let honor_range = match conditional::evaluate(headers, &etag, self.last_modified) {
            Precondition::Failed => return Ok((StatusCode::PRECONDITION_FAILED, out).into_response()),
            Precondition::NotModified => return Ok((StatusCode::NOT_MODIFIED, out).into_response()),
            Precondition::Proceed { honor_range } => honor_range,
        };

        let range_header = headers
            .get(header::RANGE)
            .filter(|_| honor_range)
            .and_then(|v| v.to_str().ok());
        let (status, start, len) = match range::resolve(range_header, self.size) {
            RangeRequest::Full => (StatusCode::OK, 0, self.size),
            RangeRequest::Partial(r) => {
                out.insert(header::CONTENT_RANGE, header_value(&r.content_range(self.size))?);
                (StatusCode::PARTIAL_CONTENT, r.start, r.len())
            }
            RangeRequest::Unsatisfiable => {
                out.insert(header::CONTENT_RANGE, header_value(&range::unsatisfied_range(self.size))?);
                return Ok((StatusCode::RANGE_NOT_SATISFIABLE, out).into_response());
            }
        };

        out.insert(header::CONTENT_TYPE, header_value(&self.content_type)?);
        out.insert(header::CONTENT_LENGTH, HeaderValue::from(len));

        let body = match file {
            Some(file) if *method != Method::HEAD => file_body(file, start, len).await?,
            _ => Body::empty(),
        };
        Ok((status, out, body).into_response())
    }
}

fn header_value(s: &str) -> ServerResult<HeaderValue> {
    HeaderValue::from_str(s).map_err(|e| ServerError::Internal(format!("bad header value {s:?}: {e}")))
}

/// Stream `len` bytes of `file` starting at `start`.
async fn file_body(mut file: File, start: u64, len: u64) -> io::Result<Body> {
    file.seek(SeekFrom::Start(start)).await?;
    let chunks = stream::try_unfold(file.take(len), next_chunk);
    Ok(Body::from_stream(chunks))
}

async fn next_chunk(mut reader: Take<File>) -> io::Result<Option<(Bytes, Take<File>)>> {
    let mut buf = BytesMut::with_capacity(CHUNK_SIZE);
    if reader.read_buf(&mut buf).await? == 0 {
        return Ok(None);
    }
    Ok(Some((buf.freeze(), reader)))
}

/// The request body as a byte stream, rejecting an empty body unless allowed.
///
/// Emptiness is decided by reading up to the first data frame, so nothing
/// is stored for a rejected request.
async fn request_stream(
    body: Body,
    allow_empty: bool,
) -> ServerResult<impl Stream<Item = Result<Bytes, axum::Error>>> {
    let mut rest = body.into_data_stream();
    let first = loop {
        match rest.next().await {
            Some(Ok(chunk)) if chunk.is_empty() => continue,
            Some(Err(e)) => return Err(ServerError::BadRequest(format!("reading request body: {e}"))),
            other => break other,
        }
    };
    if first.is_none() && !allow_empty {
        return Err(ServerError::BadRequest("empty request body".to_string()));
    }
    Ok(stream::iter(first).chain(rest))
}
