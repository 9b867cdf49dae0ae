// WebSocket server: accepts client connections and forwards their frames
// into the central event loop.

use futures_util::stream::{SplitSink, Stream};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::{info, warn};

/// Stable identifier for one client connection.
pub type ConnId = u64;

/// Events emitted by the WebSocket server to the application layer.
#[derive(Debug)]
pub enum NetEvent {
    /// A client completed the handshake. `sender` carries outbound JSON
    /// text frames back to this client.
    Connected {
        conn: ConnId,
        addr: String,
        sender: mpsc::Sender<String>,
    },
    /// A text message was received from the client (raw JSON string).
    Message { conn: ConnId, text: String },
    /// The connection closed, cleanly or otherwise.
    Disconnected { conn: ConnId },
}

/// Run the WebSocket server, forwarding events through `tx`.
///
/// Accepts connections forever; each connection runs in its own task, so a
/// slow or broken client never blocks the accept loop.
pub async fn run(listener: TcpListener, tx: mpsc::Sender<NetEvent>) -> anyhow::Result<()> {
    let local_addr = listener.local_addr()?;
    info!("WebSocket server listening on {local_addr}");

    let mut next_conn: ConnId = 1;
    loop {
        let (stream, addr) = listener.accept().await?;
        let conn = next_conn;
        next_conn += 1;
        let tx = tx.clone();
        tokio::spawn(async move {
            handle_connection(stream, conn, addr.to_string(), tx).await;
        });
    }
}

/// Drive one connection: handshake, writer task, then the read loop.
async fn handle_connection(
    stream: TcpStream,
    conn: ConnId,
    addr: String,
    tx: mpsc::Sender<NetEvent>,
) {
    let ws_stream = match tokio_tungstenite::accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!("WebSocket handshake failed for {addr}: {e}");
            return;
        }
    };
    info!("Client {conn} connected from {addr}");

    let (write, read) = ws_stream.split();
    let (out_tx, out_rx) = mpsc::channel::<String>(256);

    if tx
        .send(NetEvent::Connected {
            conn,
            addr: addr.clone(),
            sender: out_tx,
        })
        .await
        .is_err()
    {
        return;
    }

    // Outbound half: drain the per-connection channel into the socket.
    // A failed write ends the task; the read half notices the close.
    let writer = tokio::spawn(write_outbound(write, out_rx));

    let _ = process_messages(read, conn, &tx, &addr).await;

    let _ = tx.send(NetEvent::Disconnected { conn }).await;
    writer.abort();
    info!("Client {conn} disconnected");
}

async fn write_outbound<S>(
    mut write: SplitSink<WebSocketStream<S>, Message>,
    mut rx: mpsc::Receiver<String>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    while let Some(text) = rx.recv().await {
        if write.send(Message::Text(text.into())).await.is_err() {
            break;
        }
    }
}

/// Process raw WebSocket [`Message`] items from any [`Stream`], forwarding
/// text payloads through `tx` tagged with `conn`. Pure-logic function with
/// no socket IO; the primary unit-test target. Returns `Err(())` if the
/// channel is closed (receiver dropped), signalling the caller to stop.
pub async fn process_messages<St>(
    mut stream: St,
    conn: ConnId,
    tx: &mpsc::Sender<NetEvent>,
    addr: &str,
) -> Result<(), ()>
where
    St: Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    while let Some(msg_result) = stream.next().await {
        match msg_result {
            Ok(Message::Text(text)) => {
                let event = NetEvent::Message {
                    conn,
                    text: text.to_string(),
                };
                if tx.send(event).await.is_err() {
                    return Err(());
                }
            }
            Ok(Message::Close(_)) => {
                info!("Client {addr} sent close frame");
                break;
            }
            Err(e) => {
                warn!("WebSocket error from {addr}: {e}");
                break;
            }
            _ => {
                // Ignore Binary, Ping, Pong, Frame variants.
            }
        }
    }
    Ok(())
}
