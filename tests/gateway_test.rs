// End-to-end gateway scenarios over real sockets.
//
// Each test stands up the full stack (listener, sessions, resolver) with
// an in-memory record cache and a stub HLR HTTP server, then speaks raw
// SMPP from the client side.

use smpp_hlr_gateway::config::Settings;
use smpp_hlr_gateway::hlr::cache::RecordCache;
use smpp_hlr_gateway::hlr::client::HlrClient;
use smpp_hlr_gateway::hlr::record::HlrRecord;
use smpp_hlr_gateway::metrics::Metrics;
use smpp_hlr_gateway::server::{GatewayServer, Services};

use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio::time::{Duration, timeout};
use tokio_util::sync::CancellationToken;

// SMPP wire constants used by the client side of the tests
const BIND_TRANSCEIVER: u32 = 0x0000_0009;
const BIND_TRANSCEIVER_RESP: u32 = 0x8000_0009;
const SUBMIT_SM: u32 = 0x0000_0004;
const SUBMIT_SM_RESP: u32 = 0x8000_0004;
const DELIVER_SM: u32 = 0x0000_0005;
const ENQUIRE_LINK: u32 = 0x0000_0015;
const ENQUIRE_LINK_RESP: u32 = 0x8000_0015;

const ESME_ROK: u32 = 0x00;
const ESME_RINVBNDSTS: u32 = 0x04;
const ESME_RSYSERR: u32 = 0x08;
const ESME_RINVDSTADR: u32 = 0x0B;
const ESME_RINVPASWD: u32 = 0x0E;

/// Unbounded-TTL map cache standing in for Redis.
struct MemoryCache {
    entries: Mutex<HashMap<String, HlrRecord>>,
}

impl MemoryCache {
    fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl RecordCache for MemoryCache {
    async fn get(&self, msisdn: &str) -> Option<HlrRecord> {
        self.entries.lock().await.get(msisdn).cloned()
    }

    async fn set(&self, msisdn: &str, record: &HlrRecord) {
        self.entries
            .lock()
            .await
            .insert(msisdn.to_string(), record.clone());
    }

    async fn delete(&self, msisdn: &str) {
        self.entries.lock().await.remove(msisdn);
    }

    async fn close(&self) {
        self.entries.lock().await.clear();
    }
}

/// How the stub HLR answers.
#[derive(Clone)]
enum HlrStub {
    /// Respond 200 with `{"<msisdn>": <record>}` for known numbers and
    /// `{}` for unknown ones.
    Respond(HashMap<String, Value>),
    /// Accept the request and never answer.
    Hang,
}

/// Serve the stub on an ephemeral port, counting requests.
async fn spawn_hlr_stub(stub: HlrStub) -> (SocketAddr, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let hits_counter = hits.clone();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let stub = stub.clone();
            let hits = hits_counter.clone();

            tokio::spawn(async move {
                let mut request = Vec::new();
                let mut chunk = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut chunk).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => request.extend_from_slice(&chunk[..n]),
                    }
                }
                hits.fetch_add(1, Ordering::SeqCst);

                match stub {
                    HlrStub::Hang => {
                        // Hold the socket open past any client timeout
                        tokio::time::sleep(Duration::from_secs(60)).await;
                    }
                    HlrStub::Respond(records) => {
                        let request_line = String::from_utf8_lossy(&request);
                        let msisdn = request_line
                            .lines()
                            .next()
                            .and_then(|line| line.split_whitespace().nth(1))
                            .and_then(|path| path.rsplit('/').next())
                            .unwrap_or("")
                            .to_string();

                        let body = match records.get(&msisdn) {
                            Some(record) => {
                                let mut payload = serde_json::Map::new();
                                payload.insert(msisdn.clone(), record.clone());
                                Value::Object(payload).to_string()
                            }
                            None => "{}".to_string(),
                        };
                        let response = format!(
                            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                    }
                }
            });
        }
    });

    (addr, hits)
}

struct TestGateway {
    addr: SocketAddr,
    hlr_hits: Arc<AtomicUsize>,
    shutdown: CancellationToken,
}

impl TestGateway {
    async fn start(stub: HlrStub) -> Self {
        Self::start_with(stub, |_| {}).await
    }

    async fn start_with(stub: HlrStub, tweak: impl FnOnce(&mut Settings)) -> Self {
        let (hlr_addr, hlr_hits) = spawn_hlr_stub(stub).await;

        let mut settings = Settings {
            hlr_base_url: format!("http://{hlr_addr}"),
            db_enabled: false,
            metrics_enabled: false,
            cache_warmup_enabled: false,
            dlr_delay_seconds: 0.0,
            ..Settings::default()
        };
        tweak(&mut settings);

        let metrics = Arc::new(Metrics::new().unwrap());
        let cache: Arc<dyn RecordCache> = Arc::new(MemoryCache::new());
        let resolver = HlrClient::new(&settings, cache, None, metrics.clone()).unwrap();

        let services = Arc::new(Services {
            settings,
            resolver,
            metrics,
        });

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = CancellationToken::new();

        let server_shutdown = shutdown.clone();
        tokio::spawn(async move {
            GatewayServer::new(services)
                .serve(listener, server_shutdown)
                .await;
        });

        Self {
            addr,
            hlr_hits,
            shutdown,
        }
    }

    async fn connect(&self) -> TcpStream {
        TcpStream::connect(self.addr).await.unwrap()
    }
}

impl Drop for TestGateway {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn pdu(command_id: u32, status: u32, sequence: u32, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(16 + body.len());
    out.extend_from_slice(&((16 + body.len()) as u32).to_be_bytes());
    out.extend_from_slice(&command_id.to_be_bytes());
    out.extend_from_slice(&status.to_be_bytes());
    out.extend_from_slice(&sequence.to_be_bytes());
    out.extend_from_slice(body);
    out
}

fn bind_transceiver(sequence: u32, system_id: &str, password: &str) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(system_id.as_bytes());
    body.push(0);
    body.extend_from_slice(password.as_bytes());
    body.push(0);
    body.extend_from_slice(b"\0"); // system_type
    body.push(0x34); // interface_version
    body.push(0x01); // addr_ton
    body.push(0x01); // addr_npi
    body.push(0x00); // address_range
    pdu(BIND_TRANSCEIVER, 0, sequence, &body)
}

fn submit_sm(sequence: u32, source: &str, destination: &str, message: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.push(0x00); // service_type
    body.push(0x01); // source_addr_ton
    body.push(0x01); // source_addr_npi
    body.extend_from_slice(source.as_bytes());
    body.push(0);
    body.push(0x01); // dest_addr_ton
    body.push(0x01); // dest_addr_npi
    body.extend_from_slice(destination.as_bytes());
    body.push(0);
    body.extend_from_slice(&[0x00, 0x00, 0x00]); // esm_class, protocol_id, priority
    body.push(0x00); // schedule_delivery_time
    body.push(0x00); // validity_period
    body.extend_from_slice(&[0x01, 0x00, 0x00, 0x00]); // reg_delivery..sm_default
    body.push(message.len() as u8);
    body.extend_from_slice(message);
    pdu(SUBMIT_SM, 0, sequence, &body)
}

struct ReadPdu {
    command_id: u32,
    command_status: u32,
    sequence: u32,
    body: Vec<u8>,
}

async fn read_pdu(stream: &mut TcpStream) -> ReadPdu {
    let mut header = [0u8; 16];
    stream.read_exact(&mut header).await.unwrap();

    let command_length = u32::from_be_bytes([header[0], header[1], header[2], header[3]]);
    let command_id = u32::from_be_bytes([header[4], header[5], header[6], header[7]]);
    let command_status = u32::from_be_bytes([header[8], header[9], header[10], header[11]]);
    let sequence = u32::from_be_bytes([header[12], header[13], header[14], header[15]]);

    let mut body = vec![0u8; command_length as usize - 16];
    stream.read_exact(&mut body).await.unwrap();

    ReadPdu {
        command_id,
        command_status,
        sequence,
        body,
    }
}

async fn read_pdu_within(stream: &mut TcpStream, window: Duration) -> Option<ReadPdu> {
    timeout(window, read_pdu(stream)).await.ok()
}

async fn bind(stream: &mut TcpStream) {
    stream
        .write_all(&bind_transceiver(1, "testuser", "testpass"))
        .await
        .unwrap();
    let resp = read_pdu(stream).await;
    assert_eq!(resp.command_id, BIND_TRANSCEIVER_RESP);
    assert_eq!(resp.command_status, ESME_ROK);
    assert_eq!(resp.body, b"SMPPGateway\0");
}

fn valid_record() -> Value {
    json!({"error": 0, "status": 0, "present": "yes", "mcc": "310", "mnc": "260", "type": "mobile"})
}

fn invalid_record() -> Value {
    json!({"error": 1, "status": 1, "present": "na"})
}

/// The short_message of a deliver_sm, extracted by walking the body the
/// same way the gateway builds it.
fn deliver_sm_text(body: &[u8]) -> Vec<u8> {
    fn skip_cstring(body: &[u8], offset: &mut usize) {
        while body[*offset] != 0 {
            *offset += 1;
        }
        *offset += 1;
    }

    let mut offset = 0usize;
    skip_cstring(body, &mut offset); // service_type
    offset += 2;
    skip_cstring(body, &mut offset); // source_addr
    offset += 2;
    skip_cstring(body, &mut offset); // destination_addr
    offset += 3;
    skip_cstring(body, &mut offset); // schedule_delivery_time
    skip_cstring(body, &mut offset); // validity_period
    offset += 4;
    let sm_length = body[offset] as usize;
    offset += 1;
    body[offset..offset + sm_length].to_vec()
}

#[tokio::test]
async fn bind_succeeds_with_correct_credentials() {
    let gateway = TestGateway::start(HlrStub::Respond(HashMap::new())).await;
    let mut stream = gateway.connect().await;
    bind(&mut stream).await;
}

#[tokio::test]
async fn bind_with_wrong_password_is_rejected_and_closes() {
    let gateway = TestGateway::start(HlrStub::Respond(HashMap::new())).await;
    let mut stream = gateway.connect().await;

    stream
        .write_all(&bind_transceiver(6, "testuser", "wrong"))
        .await
        .unwrap();

    let resp = read_pdu(&mut stream).await;
    assert_eq!(resp.command_id, BIND_TRANSCEIVER_RESP);
    assert_eq!(resp.command_status, ESME_RINVPASWD);
    assert!(resp.body.is_empty());

    // The server closes the connection after a failed bind
    let mut probe = [0u8; 1];
    let n = timeout(Duration::from_secs(1), stream.read(&mut probe))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(n, 0);
}

#[tokio::test]
async fn submit_before_bind_gets_invalid_bind_status() {
    let gateway = TestGateway::start(HlrStub::Respond(HashMap::new())).await;
    let mut stream = gateway.connect().await;

    stream
        .write_all(&submit_sm(2, "1234", "40722570240", b"hi"))
        .await
        .unwrap();

    let resp = read_pdu(&mut stream).await;
    assert_eq!(resp.command_id, SUBMIT_SM_RESP);
    assert_eq!(resp.command_status, ESME_RINVBNDSTS);

    // Session stays open: a keep-alive still gets its response
    stream
        .write_all(&pdu(ENQUIRE_LINK, 0, 3, b""))
        .await
        .unwrap();
    let resp = read_pdu(&mut stream).await;
    assert_eq!(resp.command_id, ENQUIRE_LINK_RESP);
    assert_eq!(resp.sequence, 3);
}

#[tokio::test]
async fn valid_number_is_rejected_without_receipt() {
    let records = HashMap::from([("13476841841".to_string(), valid_record())]);
    let gateway = TestGateway::start(HlrStub::Respond(records)).await;
    let mut stream = gateway.connect().await;
    bind(&mut stream).await;

    stream
        .write_all(&submit_sm(2, "1234", "13476841841", b"hello"))
        .await
        .unwrap();

    let resp = read_pdu(&mut stream).await;
    assert_eq!(resp.command_id, SUBMIT_SM_RESP);
    assert_eq!(resp.command_status, ESME_RINVDSTADR);
    assert_eq!(resp.body, b"\0"); // empty message_id

    // No deliver_sm follows
    assert!(
        read_pdu_within(&mut stream, Duration::from_millis(300))
            .await
            .is_none()
    );
}

#[tokio::test]
async fn invalid_number_is_accepted_and_confirmed_delivered() {
    let records = HashMap::from([("40722570240999".to_string(), invalid_record())]);
    let gateway = TestGateway::start(HlrStub::Respond(records)).await;
    let mut stream = gateway.connect().await;
    bind(&mut stream).await;

    stream
        .write_all(&submit_sm(7, "1234", "40722570240999", b"hello"))
        .await
        .unwrap();

    let resp = read_pdu(&mut stream).await;
    assert_eq!(resp.command_id, SUBMIT_SM_RESP);
    assert_eq!(resp.command_status, ESME_ROK);
    assert_eq!(resp.sequence, 7);

    let message_id = String::from_utf8(resp.body[..resp.body.len() - 1].to_vec()).unwrap();
    assert_eq!(message_id.len(), 16);

    // Exactly one deliver_sm arrives on the same session
    let dlr = read_pdu_within(&mut stream, Duration::from_secs(2))
        .await
        .expect("expected a deliver_sm receipt");
    assert_eq!(dlr.command_id, DELIVER_SM);
    assert_eq!(dlr.command_status, ESME_ROK);
    assert_eq!(dlr.sequence, 1); // session-local counter starts at 1

    // esm_class = 0x04 sits right after the three addressing fields
    let text = String::from_utf8(deliver_sm_text(&dlr.body)).unwrap();
    assert!(
        text.starts_with(&format!("id:{message_id} sub:001 dlvrd:000 submit date:")),
        "unexpected receipt text: {text}"
    );
    assert!(text.contains("stat:DELIVRD err:000 text:"));

    assert!(
        read_pdu_within(&mut stream, Duration::from_millis(300))
            .await
            .is_none(),
        "only one receipt per accepted submit"
    );
}

#[tokio::test]
async fn unsupported_network_error_is_accepted_with_receipt() {
    let records = HashMap::from([(
        "491700000001".to_string(),
        json!({"error": 191, "status": 0}),
    )]);
    let gateway = TestGateway::start(HlrStub::Respond(records)).await;
    let mut stream = gateway.connect().await;
    bind(&mut stream).await;

    stream
        .write_all(&submit_sm(2, "1234", "491700000001", b"x"))
        .await
        .unwrap();

    let resp = read_pdu(&mut stream).await;
    assert_eq!(resp.command_status, ESME_ROK);

    let dlr = read_pdu_within(&mut stream, Duration::from_secs(2))
        .await
        .expect("expected a deliver_sm receipt");
    assert_eq!(dlr.command_id, DELIVER_SM);
    let text = String::from_utf8(deliver_sm_text(&dlr.body)).unwrap();
    assert!(text.contains("stat:DELIVRD err:000"));
}

#[tokio::test]
async fn empty_hlr_response_synthesizes_an_invalid_record() {
    // Stub answers 200 with {} for numbers it does not know
    let gateway = TestGateway::start(HlrStub::Respond(HashMap::new())).await;
    let mut stream = gateway.connect().await;
    bind(&mut stream).await;

    stream
        .write_all(&submit_sm(2, "1234", "000000", b"x"))
        .await
        .unwrap();

    let resp = read_pdu(&mut stream).await;
    assert_eq!(resp.command_status, ESME_ROK);
    assert!(
        read_pdu_within(&mut stream, Duration::from_secs(2))
            .await
            .is_some()
    );
}

#[tokio::test]
async fn hlr_timeout_rejects_with_system_error() {
    let gateway = TestGateway::start_with(HlrStub::Hang, |settings| {
        settings.hlr_timeout_seconds = 0.2;
    })
    .await;
    let mut stream = gateway.connect().await;
    bind(&mut stream).await;

    stream
        .write_all(&submit_sm(2, "1234", "40722570240", b"x"))
        .await
        .unwrap();

    let resp = read_pdu(&mut stream).await;
    assert_eq!(resp.command_id, SUBMIT_SM_RESP);
    assert_eq!(resp.command_status, ESME_RSYSERR);

    // No receipt for a timed-out lookup
    assert!(
        read_pdu_within(&mut stream, Duration::from_millis(300))
            .await
            .is_none()
    );
}

#[tokio::test]
async fn second_submit_for_same_msisdn_is_served_from_cache() {
    let records = HashMap::from([("40722570240999".to_string(), invalid_record())]);
    let gateway = TestGateway::start(HlrStub::Respond(records)).await;
    let mut stream = gateway.connect().await;
    bind(&mut stream).await;

    for sequence in [2u32, 3u32] {
        stream
            .write_all(&submit_sm(sequence, "1234", "40722570240999", b"x"))
            .await
            .unwrap();

        let resp = read_pdu(&mut stream).await;
        assert_eq!(resp.command_id, SUBMIT_SM_RESP);
        assert_eq!(resp.command_status, ESME_ROK);
        assert_eq!(resp.sequence, sequence);

        // Drain the receipt before the next round
        let dlr = read_pdu_within(&mut stream, Duration::from_secs(2))
            .await
            .expect("expected a deliver_sm receipt");
        assert_eq!(dlr.command_id, DELIVER_SM);
    }

    assert_eq!(
        gateway.hlr_hits.load(Ordering::SeqCst),
        1,
        "second lookup must not reach the HLR"
    );
}

#[tokio::test]
async fn unknown_commands_are_ignored_without_closing() {
    let gateway = TestGateway::start(HlrStub::Respond(HashMap::new())).await;
    let mut stream = gateway.connect().await;
    bind(&mut stream).await;

    // query_sm is outside the gateway's command set
    stream
        .write_all(&pdu(0x0000_0003, 0, 9, b"msgid\0\x01\x011234\0"))
        .await
        .unwrap();

    // The session is still alive and answering
    stream
        .write_all(&pdu(ENQUIRE_LINK, 0, 10, b""))
        .await
        .unwrap();
    let resp = read_pdu(&mut stream).await;
    assert_eq!(resp.command_id, ENQUIRE_LINK_RESP);
    assert_eq!(resp.sequence, 10);
}

#[tokio::test]
async fn unbind_is_acknowledged_and_ends_the_session() {
    let gateway = TestGateway::start(HlrStub::Respond(HashMap::new())).await;
    let mut stream = gateway.connect().await;
    bind(&mut stream).await;

    stream
        .write_all(&pdu(0x0000_0006, 0, 4, b""))
        .await
        .unwrap();

    let resp = read_pdu(&mut stream).await;
    assert_eq!(resp.command_id, 0x8000_0006);
    assert_eq!(resp.sequence, 4);

    let mut probe = [0u8; 1];
    let n = timeout(Duration::from_secs(1), stream.read(&mut probe))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(n, 0);
}

#[tokio::test]
async fn concurrent_cold_lookups_collapse_to_one_hlr_call() {
    let records = HashMap::from([("40722570240999".to_string(), invalid_record())]);
    let gateway = TestGateway::start(HlrStub::Respond(records)).await;

    // Five sessions submit to the same cold number at once
    let mut handles = Vec::new();
    for _ in 0..5 {
        let mut stream = gateway.connect().await;
        handles.push(tokio::spawn(async move {
            bind(&mut stream).await;
            stream
                .write_all(&submit_sm(2, "1234", "40722570240999", b"x"))
                .await
                .unwrap();
            let resp = read_pdu(&mut stream).await;
            assert_eq!(resp.command_status, ESME_ROK);
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(
        gateway.hlr_hits.load(Ordering::SeqCst),
        1,
        "cold-cache burst must produce a single provider call"
    );
}
