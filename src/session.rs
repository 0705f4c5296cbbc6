// ABOUTME: Per-connection SMPP session: bind, submit dispatch, unbind
// ABOUTME: One reader task plus one writer task; receipts share the writer

use crate::connection::Connection;
use crate::codec::{Encodable, PduHeader, encode_pdu};
use crate::datatypes::{
    BindKind, BindRequest, BindResponse, CommandId, CommandStatus, DeliverSm, EnquireLinkResponse,
    SubmitSm, UnbindResponse,
};
use crate::frame::Frame;
use crate::handler;
use crate::server::Services;
use bytes::Bytes;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Duration, timeout};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

/// Ceiling on how long a sender waits for its PDU to reach the socket.
/// DeliverSM and large responses wait up to this long; exceeding it is
/// not an error, the write simply completes asynchronously.
const FLUSH_WAIT_CEILING: Duration = Duration::from_millis(30);

/// Response bodies below this size ride the TCP send buffer without any
/// flush wait. The peer serializes submits behind enquire_link_resp, so
/// the keep-alive path must never stall on a busy socket.
const SMALL_BODY_BYTES: usize = 100;

/// Depth of the per-session outbound queue.
const WRITER_QUEUE_DEPTH: usize = 128;

struct Outbound {
    bytes: Bytes,
    ack: Option<oneshot::Sender<()>>,
}

/// Session state shared between the reader and its receipt tasks.
pub struct SessionShared {
    client_id: String,
    peer_ip: String,
    authenticated: AtomicBool,
    /// Sequence counter for unsolicited deliver_sm, starting at 1.
    /// Responses never use it; they echo the peer's sequence.
    sequence: AtomicU32,
    tx: mpsc::Sender<Outbound>,
    /// Pending receipt tasks, cancelled when the session dies.
    pub tasks: TaskTracker,
    pub cancel: CancellationToken,
}

impl SessionShared {
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn peer_ip(&self) -> &str {
        &self.peer_ip
    }

    pub fn is_bound(&self) -> bool {
        self.authenticated.load(Ordering::Acquire)
    }

    fn set_bound(&self, bound: bool) {
        self.authenticated.store(bound, Ordering::Release);
    }

    fn next_sequence(&self) -> u32 {
        self.sequence.fetch_add(1, Ordering::Relaxed)
    }

    async fn send(&self, bytes: Bytes, wait_for_flush: bool) -> bool {
        if !wait_for_flush {
            return self.tx.send(Outbound { bytes, ack: None }).await.is_ok();
        }

        let (ack_tx, ack_rx) = oneshot::channel();
        if self
            .tx
            .send(Outbound {
                bytes,
                ack: Some(ack_tx),
            })
            .await
            .is_err()
        {
            return false;
        }

        // Bounded wait; a slow socket is not a failure.
        let _ = timeout(FLUSH_WAIT_CEILING, ack_rx).await;
        true
    }

    /// Queue a response PDU, applying the flush policy by body size.
    pub async fn send_pdu<P: Encodable>(&self, pdu: &P) -> bool {
        let bytes = pdu.to_bytes();
        let wait = bytes.len().saturating_sub(PduHeader::SIZE) >= SMALL_BODY_BYTES;
        self.send(bytes, wait).await
    }

    /// Queue a bare error response (header only).
    pub async fn send_error_response(
        &self,
        command_id: CommandId,
        status: CommandStatus,
        sequence_number: u32,
    ) -> bool {
        let bytes = encode_pdu(command_id as u32, status as u32, sequence_number, b"");
        self.send(bytes, false).await
    }

    /// Push a delivery receipt to the peer.
    ///
    /// Returns false without writing anything when the session is no
    /// longer bound; the caller records the drop.
    pub async fn send_deliver_sm(
        &self,
        source_addr: &str,
        destination_addr: &str,
        text: &[u8],
    ) -> bool {
        if !self.is_bound() {
            warn!(client_id = %self.client_id, "deliver_sm skipped, not authenticated");
            return false;
        }

        let sequence = self.next_sequence();
        let pdu = DeliverSm::delivery_receipt(sequence, source_addr, destination_addr, text);
        let sent = self.send(pdu.to_bytes(), true).await;

        if sent {
            info!(
                client_id = %self.client_id,
                source = %source_addr,
                destination = %destination_addr,
                sequence,
                "deliver_sm sent"
            );
        }
        sent
    }
}

/// Compare two byte strings without short-circuiting on the first
/// mismatch, so bind probing cannot time credential prefixes.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// One accepted ESME connection.
pub struct Session {
    conn: Connection<OwnedReadHalf>,
    shared: Arc<SessionShared>,
    services: Arc<Services>,
    bound_as: Option<BindKind>,
}

impl Session {
    pub fn new(stream: TcpStream, services: Arc<Services>, shutdown: &CancellationToken) -> Session {
        let (client_id, peer_ip) = match stream.peer_addr() {
            Ok(addr) => (addr.to_string(), addr.ip().to_string()),
            Err(_) => ("unknown".to_string(), "unknown".to_string()),
        };

        let (read_half, write_half) = stream.into_split();
        let (tx, rx) = mpsc::channel(WRITER_QUEUE_DEPTH);

        tokio::spawn(run_writer(write_half, rx, client_id.clone()));

        let shared = Arc::new(SessionShared {
            client_id,
            peer_ip,
            authenticated: AtomicBool::new(false),
            sequence: AtomicU32::new(1),
            tx,
            tasks: TaskTracker::new(),
            cancel: shutdown.child_token(),
        });

        Session {
            conn: Connection::new(read_half),
            shared,
            services,
            bound_as: None,
        }
    }

    /// Run the session to completion: read PDUs in arrival order,
    /// dispatch them, tear everything down when the peer goes away.
    pub async fn run(mut self) {
        info!(client_id = %self.shared.client_id, "client connected");

        loop {
            let frame = tokio::select! {
                _ = self.shared.cancel.cancelled() => break,
                result = self.conn.read_frame() => match result {
                    Ok(Some(frame)) => frame,
                    Ok(None) => break,
                    Err(err) => {
                        // Framing is not resynchronized after an error.
                        error!(
                            client_id = %self.shared.client_id,
                            error = %err,
                            "pdu processing error"
                        );
                        break;
                    }
                },
            };

            debug!(
                client_id = %self.shared.client_id,
                command = frame.command_name(),
                sequence = frame.sequence_number(),
                "pdu received"
            );

            match frame {
                Frame::EnquireLink(pdu) => {
                    // Fast path: header-only response, no flush wait.
                    self.shared
                        .send_pdu(&EnquireLinkResponse::new(pdu.sequence_number))
                        .await;
                }
                Frame::Bind(bind) => {
                    if !self.handle_bind(bind).await {
                        break;
                    }
                }
                Frame::SubmitSm(pdu) => self.handle_submit_sm(pdu).await,
                Frame::Unbind(pdu) => {
                    info!(client_id = %self.shared.client_id, "unbind request");
                    self.shared
                        .send_pdu(&UnbindResponse::new(pdu.sequence_number))
                        .await;
                    self.shared.set_bound(false);
                    break;
                }
                Frame::DeliverSmResp(resp) => {
                    debug!(
                        client_id = %self.shared.client_id,
                        sequence = resp.sequence_number,
                        status = resp.command_status,
                        "deliver_sm_resp received"
                    );
                }
                Frame::Unknown {
                    command_id,
                    sequence_number,
                } => {
                    // Commands outside our set are ignored, the session
                    // stays up.
                    debug!(
                        client_id = %self.shared.client_id,
                        command_id = format_args!("{command_id:#010x}"),
                        sequence = sequence_number,
                        "unsupported command ignored"
                    );
                }
            }
        }

        self.shared.set_bound(false);
        self.shared.cancel.cancel();
        self.shared.tasks.close();

        info!(
            client_id = %self.shared.client_id,
            bound_as = self.bound_as.map(|k| k.as_str()).unwrap_or("none"),
            "client disconnected"
        );
    }

    /// Authenticate a bind request. Returns false when the session must
    /// close (bad credentials).
    async fn handle_bind(&mut self, bind: BindRequest) -> bool {
        let settings = &self.services.settings;
        let id_ok = constant_time_eq(bind.system_id.as_bytes(), settings.smpp_system_id.as_bytes());
        let pw_ok = constant_time_eq(bind.password.as_bytes(), settings.smpp_password.as_bytes());

        if id_ok && pw_ok {
            self.shared.set_bound(true);
            self.bound_as = Some(bind.kind);
            info!(
                client_id = %self.shared.client_id,
                system_id = %bind.system_id,
                bound_as = bind.kind.as_str(),
                "bind success"
            );
            self.shared
                .send_pdu(&BindResponse::ok(
                    bind.kind,
                    bind.sequence_number,
                    "SMPPGateway",
                ))
                .await;
            true
        } else {
            warn!(
                client_id = %self.shared.client_id,
                system_id = %bind.system_id,
                "bind failed"
            );
            self.shared
                .send_pdu(&BindResponse::error(
                    bind.kind,
                    bind.sequence_number,
                    CommandStatus::InvalidPassword,
                ))
                .await;
            false
        }
    }

    /// Hand the submit to the decision pipeline on its own task, so the
    /// reader keeps draining PDUs (a keep-alive must never queue behind
    /// a pending HLR lookup).
    async fn handle_submit_sm(&mut self, pdu: SubmitSm) {
        if !self.shared.is_bound() {
            self.shared
                .send_error_response(
                    CommandId::SubmitSmResp,
                    CommandStatus::IncorrectBindStatus,
                    pdu.sequence_number,
                )
                .await;
            return;
        }

        let services = self.services.clone();
        let shared = self.shared.clone();
        let tracker = self.shared.tasks.clone();

        tracker.spawn(async move {
            let outcome = handler::handle_submit_sm(&services, &shared, &pdu).await;

            // The response goes onto the writer queue before the receipt
            // task exists, so the receipt can never overtake it.
            shared.send_pdu(&outcome.response).await;

            if let Some(job) = outcome.dlr {
                handler::dispatch_dlr(services, shared, job);
            }
        });
    }
}

async fn run_writer(mut socket: OwnedWriteHalf, mut rx: mpsc::Receiver<Outbound>, client_id: String) {
    while let Some(outbound) = rx.recv().await {
        if let Err(err) = socket.write_all(&outbound.bytes).await {
            error!(client_id = %client_id, error = %err, "socket write error");
            break;
        }
        if let Some(ack) = outbound.ack {
            let _ = ack.send(());
        }
    }
    // Remaining queued PDUs (if the write failed) are dropped with the
    // receiver; the socket closes when the half is dropped.
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_time_eq_basic() {
        assert!(constant_time_eq(b"secret08", b"secret08"));
        assert!(!constant_time_eq(b"secret08", b"secret09"));
        assert!(!constant_time_eq(b"secret08", b"secret0"));
        assert!(!constant_time_eq(b"", b"x"));
        assert!(constant_time_eq(b"", b""));
    }
}
