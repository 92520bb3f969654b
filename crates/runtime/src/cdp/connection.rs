//! DevTools websocket connection with request/response correlation.
//!
//! # Message Flow
//!
//! 1. `send` allocates a sequential id and parks a oneshot sender under it
//! 2. The request is serialized and written to the websocket
//! 3. The read loop parses every inbound frame
//! 4. Frames with an `id` complete the parked sender; frames without one are events
//! 5. When the socket closes, every parked sender receives [`Error::Closed`]
//!
//! Requests addressed to an attached target carry the flattened `sessionId`.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, trace};

use crate::error::{Error, Result};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Value>>>>>;

#[derive(Debug, Serialize)]
struct Request<'a> {
	id: u64,
	method: &'a str,
	params: Value,
	#[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
	session_id: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct Incoming {
	id: Option<u64>,
	result: Option<Value>,
	error: Option<ProtocolError>,
	method: Option<String>,
	#[serde(rename = "sessionId")]
	session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProtocolError {
	code: i64,
	message: String,
	data: Option<String>,
}

/// A live DevTools websocket shared by every context and page of one browser.
pub struct CdpConnection {
	last_id: AtomicU64,
	pending: PendingMap,
	sink: tokio::sync::Mutex<SplitSink<WsStream, Message>>,
	closed: Arc<AtomicBool>,
	reader: Mutex<Option<JoinHandle<()>>>,
}

impl CdpConnection {
	/// Opens the websocket and spawns the read loop.
	pub async fn connect(ws_url: &str) -> Result<Arc<Self>> {
		let (stream, _) = connect_async(ws_url)
			.await
			.map_err(|e| Error::Launch(format!("Failed to connect to {ws_url}: {e}")))?;
		let (sink, source) = stream.split();

		let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
		let closed = Arc::new(AtomicBool::new(false));
		let reader = tokio::spawn(read_loop(source, Arc::clone(&pending), Arc::clone(&closed)));

		debug!(target = "warden.cdp", %ws_url, "connected");
		Ok(Arc::new(Self {
			last_id: AtomicU64::new(0),
			pending,
			sink: tokio::sync::Mutex::new(sink),
			closed,
			reader: Mutex::new(Some(reader)),
		}))
	}

	pub fn is_closed(&self) -> bool {
		self.closed.load(Ordering::SeqCst)
	}

	/// Sends `method` and waits for the matching response.
	pub async fn send(&self, method: &str, params: Value, session_id: Option<&str>) -> Result<Value> {
		if self.is_closed() {
			return Err(Error::Closed);
		}

		let id = self.last_id.fetch_add(1, Ordering::SeqCst) + 1;
		let (tx, rx) = oneshot::channel();
		self.pending.lock().insert(id, tx);

		let text = serde_json::to_string(&Request {
			id,
			method,
			params,
			session_id,
		})?;
		trace!(target = "warden.cdp", id, %method, "send");

		if let Err(e) = self.sink.lock().await.send(Message::Text(text)).await {
			self.pending.lock().remove(&id);
			return Err(Error::Protocol(format!("Failed to send {method}: {e}")));
		}

		rx.await.map_err(|_| Error::Closed)?
	}

	/// Closes the websocket and stops the read loop.
	pub async fn disconnect(&self) {
		let _ = self.sink.lock().await.close().await;
		if let Some(reader) = self.reader.lock().take() {
			reader.abort();
		}
		self.closed.store(true, Ordering::SeqCst);
		fail_pending(&self.pending);
	}
}

async fn read_loop(mut source: SplitStream<WsStream>, pending: PendingMap, closed: Arc<AtomicBool>) {
	while let Some(frame) = source.next().await {
		let text = match frame {
			Ok(Message::Text(text)) => text,
			Ok(Message::Close(_)) => break,
			Ok(_) => continue,
			Err(e) => {
				debug!(target = "warden.cdp", error = %e, "websocket read failed");
				break;
			}
		};
		dispatch(&text, &pending);
	}

	debug!(target = "warden.cdp", "message loop ended (socket closed)");
	closed.store(true, Ordering::SeqCst);
	fail_pending(&pending);
}

fn fail_pending(pending: &PendingMap) {
	for (_, tx) in pending.lock().drain() {
		let _ = tx.send(Err(Error::Closed));
	}
}

fn dispatch(text: &str, pending: &PendingMap) {
	let incoming: Incoming = match serde_json::from_str(text) {
		Ok(incoming) => incoming,
		Err(e) => {
			debug!(target = "warden.cdp", error = %e, "unparseable frame");
			return;
		}
	};

	let Some(id) = incoming.id else {
		trace!(
			target = "warden.cdp",
			method = incoming.method.as_deref().unwrap_or("?"),
			session = incoming.session_id.as_deref().unwrap_or("-"),
			"event"
		);
		return;
	};

	let Some(tx) = pending.lock().remove(&id) else {
		debug!(target = "warden.cdp", id, "response for unknown request");
		return;
	};

	let result = match incoming.error {
		Some(err) => Err(protocol_error(err)),
		None => Ok(incoming.result.unwrap_or(Value::Null)),
	};
	let _ = tx.send(result);
}

fn protocol_error(err: ProtocolError) -> Error {
	match err.data {
		Some(data) => Error::Protocol(format!("{} ({}): {data}", err.message, err.code)),
		None => Error::Protocol(format!("{} ({})", err.message, err.code)),
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	fn parked(pending: &PendingMap, id: u64) -> oneshot::Receiver<Result<Value>> {
		let (tx, rx) = oneshot::channel();
		pending.lock().insert(id, tx);
		rx
	}

	#[tokio::test]
	async fn response_completes_matching_request() {
		let pending: PendingMap = Arc::default();
		let rx = parked(&pending, 7);

		dispatch(r#"{"id":7,"result":{"frameId":"F1"}}"#, &pending);

		assert_eq!(rx.await.unwrap().unwrap(), json!({"frameId": "F1"}));
		assert!(pending.lock().is_empty());
	}

	#[tokio::test]
	async fn error_response_becomes_protocol_error() {
		let pending: PendingMap = Arc::default();
		let rx = parked(&pending, 1);

		dispatch(r#"{"id":1,"error":{"code":-32000,"message":"Cannot navigate to invalid URL"}}"#, &pending);

		let err = rx.await.unwrap().unwrap_err();
		assert!(err.to_string().contains("Cannot navigate to invalid URL"));
	}

	#[tokio::test]
	async fn events_leave_pending_untouched() {
		let pending: PendingMap = Arc::default();
		let _rx = parked(&pending, 3);

		dispatch(r#"{"method":"Page.loadEventFired","params":{},"sessionId":"S"}"#, &pending);
		dispatch("not json", &pending);

		assert_eq!(pending.lock().len(), 1);
	}

	#[tokio::test]
	async fn closing_fails_outstanding_requests() {
		let pending: PendingMap = Arc::default();
		let rx = parked(&pending, 9);

		fail_pending(&pending);

		assert!(matches!(rx.await.unwrap(), Err(Error::Closed)));
	}

	#[test]
	fn request_carries_session_id_only_when_attached() {
		let browser = serde_json::to_value(Request {
			id: 1,
			method: "Target.getTargets",
			params: json!({}),
			session_id: None,
		})
		.unwrap();
		assert!(browser.get("sessionId").is_none());

		let page = serde_json::to_value(Request {
			id: 2,
			method: "Runtime.evaluate",
			params: json!({}),
			session_id: Some("S1"),
		})
		.unwrap();
		assert_eq!(page["sessionId"], "S1");
	}
}
