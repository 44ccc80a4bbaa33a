//! Newline-framed JSON-RPC transport for the MCP service.
//!
//! Lines are read as raw bytes, so input that is not UTF-8 or not JSON gets a
//! JSON-RPC error reply instead of ending the session. Only well-formed client
//! messages reach the service.

use std::{io, sync::Arc};

use futures::{Sink, Stream, sink, stream};
use rmcp::{
    ErrorData,
    model::{ClientJsonRpcMessage, ErrorCode, ServerJsonRpcMessage},
};
use serde_json::{Value, json};
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt},
    sync::Mutex,
};
use tracing::{debug, warn};

/// Methods this server answers. A malformed request for one of these is an
/// invalid-params fault; any other undecodable method is not found.
const SERVED_METHODS: &[&str] = &["initialize", "ping", "tools/list", "tools/call"];

type SharedWriter<W> = Arc<Mutex<W>>;

/// Splits a byte reader/writer pair into the sink and stream halves rmcp
/// serves on.
pub fn line_transport<R, W>(
    reader: R,
    writer: W,
) -> (
    impl Sink<ServerJsonRpcMessage, Error = io::Error> + Send + Unpin + 'static,
    impl Stream<Item = ClientJsonRpcMessage> + Send + Unpin + 'static,
)
where
    R: AsyncBufRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let writer = Arc::new(Mutex::new(writer));

    let outgoing = Box::pin(sink::unfold(writer.clone(), |writer, message: ServerJsonRpcMessage| async move {
        let line = serde_json::to_vec(&message)?;
        write_line(&writer, &line).await?;
        Ok::<_, io::Error>(writer)
    }));

    let incoming = Box::pin(stream::unfold((reader, writer, Vec::new()), |(mut reader, writer, mut buf)| async move {
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => {
                    debug!("stdin closed");
                    return None;
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(error = %err, "failed to read from client");
                    return None;
                }
            }

            match decode_line(&buf) {
                Decoded::Message(message) => return Some((message, (reader, writer, buf))),
                Decoded::Skip => {}
                Decoded::Reject(reply) => {
                    let line = match serde_json::to_vec(&reply) {
                        Ok(line) => line,
                        Err(err) => {
                            warn!(error = %err, "failed to encode error reply");
                            continue;
                        }
                    };
                    if let Err(err) = write_line(&writer, &line).await {
                        warn!(error = %err, "failed to write error reply");
                        return None;
                    }
                }
            }
        }
    }));

    (outgoing, incoming)
}

async fn write_line<W: AsyncWrite + Unpin>(writer: &SharedWriter<W>, line: &[u8]) -> io::Result<()> {
    let mut writer = writer.lock().await;
    writer.write_all(line).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}

#[derive(Debug)]
enum Decoded {
    Message(ClientJsonRpcMessage),
    Skip,
    /// Error reply to write back without involving the service.
    Reject(Value),
}

fn decode_line(raw: &[u8]) -> Decoded {
    let line = raw.trim_ascii();
    if line.is_empty() {
        return Decoded::Skip;
    }

    let value: Value = match serde_json::from_slice(line) {
        Ok(value) => value,
        Err(err) => {
            warn!(error = %err, "unparseable line from client");
            return reject(Value::Null, ErrorData::parse_error(format!("Parse error: {err}"), None));
        }
    };

    let Some(object) = value.as_object() else {
        return reject(Value::Null, ErrorData::invalid_request("Invalid Request: expected an object", None));
    };

    let id = object.get("id").cloned();
    let method = object.get("method").and_then(Value::as_str).map(str::to_owned);

    // A null id cannot be answered by id, and is not a notification either.
    if id == Some(Value::Null) && method.is_some() {
        return reject(Value::Null, ErrorData::invalid_request("Invalid Request: id must not be null", None));
    }

    match serde_json::from_value::<ClientJsonRpcMessage>(value) {
        Ok(message) => Decoded::Message(message),
        Err(err) => match (id, method) {
            (Some(id), Some(method)) if SERVED_METHODS.contains(&method.as_str()) => {
                reject(id, ErrorData::invalid_params(format!("Invalid params: {err}"), None))
            }
            (Some(id), Some(method)) => {
                reject(id, ErrorData::new(ErrorCode::METHOD_NOT_FOUND, format!("Method not found: {method}"), None))
            }
            (Some(id), None) => reject(id, ErrorData::invalid_request(format!("Invalid Request: {err}"), None)),
            (None, _) => {
                debug!(error = %err, "ignoring undecodable notification");
                Decoded::Skip
            }
        },
    }
}

fn reject(id: Value, error: ErrorData) -> Decoded {
    Decoded::Reject(json!({ "jsonrpc": "2.0", "id": id, "error": error }))
}
