// ABOUTME: The submit_sm decision pipeline and the deferred receipt dispatcher
// ABOUTME: Valid numbers are rejected; invalid ones are accepted and "delivered"

use crate::config::TimeoutPolicy;
use crate::datatypes::dlr::{build_dlr_text, generate_message_id};
use crate::datatypes::{CommandStatus, SubmitSm, SubmitSmResponse};
use crate::hlr::record::{Classification, HlrRecord};
use crate::hlr::HlrError;
use crate::server::Services;
use crate::session::SessionShared;
use chrono::{DateTime, Local};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// What the session does with a submit: send the response, then (maybe)
/// dispatch the receipt job. Keeping the two apart lets the session put
/// the response on the writer queue first, so the receipt can never
/// reach the wire before it.
pub struct SubmitOutcome {
    pub response: SubmitSmResponse,
    pub dlr: Option<DlrJob>,
}

/// A deferred DELIVRD receipt for an accepted message.
pub struct DlrJob {
    pub message_id: String,
    /// ESME's source address; becomes the receipt's destination.
    pub source_addr: String,
    /// The targeted MSISDN; becomes the receipt's source.
    pub destination_addr: String,
    pub record: HlrRecord,
    pub submitted_at: DateTime<Local>,
}

/// Map an invalid-class HLR outcome to the receipt's err field.
///
/// Every outcome maps to "000". Real operators sometimes expect distinct
/// codes (1 = unknown subscriber, 255 = absent subscriber); keep the
/// uniform value until a downstream asks for more.
fn dlr_error_code(_record: &HlrRecord) -> &'static str {
    "000"
}

/// Metric label for the receipt. Accepted messages exist only because
/// the number was unreachable, so there is a single reason today.
fn dlr_reason(_record: &HlrRecord) -> &'static str {
    "invalid_number"
}

/// Decide the fate of one submit_sm.
///
/// Valid destination: reject with ESME_RINVDSTADR so nothing is ever
/// accepted for a live subscriber. Invalid destination: accept with a
/// fresh message_id and schedule exactly one DELIVRD receipt. Resolver
/// failures reject with ESME_RSYSERR and schedule nothing.
pub async fn handle_submit_sm(
    services: &Arc<Services>,
    session: &Arc<SessionShared>,
    pdu: &SubmitSm,
) -> SubmitOutcome {
    let started = Instant::now();
    let metrics = &services.metrics;
    let message_id = generate_message_id();

    info!(
        client_id = session.client_id(),
        message_id = %message_id,
        source = %pdu.source_addr,
        destination = %pdu.destination_addr,
        message_length = pdu.short_message.len(),
        "submit_sm received"
    );

    let outcome = match services
        .resolver
        .lookup(&pdu.destination_addr, Some(session.peer_ip()))
        .await
    {
        Ok(record) => match record.classification() {
            Classification::Valid => {
                metrics.submit_total.with_label_values(&["rejected"]).inc();
                info!(
                    message_id = %message_id,
                    destination = %pdu.destination_addr,
                    hlr_error = record.error(),
                    hlr_status = record.status(),
                    "submit_sm rejected, valid number"
                );
                SubmitOutcome {
                    response: SubmitSmResponse::error(
                        pdu.sequence_number,
                        CommandStatus::InvalidDestinationAddress,
                    ),
                    dlr: None,
                }
            }
            Classification::Invalid => {
                metrics.submit_total.with_label_values(&["accepted"]).inc();
                info!(
                    message_id = %message_id,
                    destination = %pdu.destination_addr,
                    hlr_error = record.error(),
                    hlr_status = record.status(),
                    "submit_sm accepted, invalid number"
                );
                SubmitOutcome {
                    response: SubmitSmResponse::ok(pdu.sequence_number, message_id.clone()),
                    dlr: Some(DlrJob {
                        message_id,
                        source_addr: pdu.source_addr.clone(),
                        destination_addr: pdu.destination_addr.clone(),
                        record,
                        submitted_at: Local::now(),
                    }),
                }
            }
        },
        Err(HlrError::Timeout) => {
            metrics.submit_total.with_label_values(&["rejected"]).inc();
            warn!(
                message_id = %message_id,
                destination = %pdu.destination_addr,
                "submit_sm rejected, hlr timeout"
            );
            let status = match services.settings.hlr_timeout_policy {
                TimeoutPolicy::Reject => CommandStatus::SystemError,
            };
            SubmitOutcome {
                response: SubmitSmResponse::error(pdu.sequence_number, status),
                dlr: None,
            }
        }
        Err(err) => {
            metrics.submit_total.with_label_values(&["rejected"]).inc();
            warn!(
                message_id = %message_id,
                destination = %pdu.destination_addr,
                error = %err,
                "submit_sm error"
            );
            SubmitOutcome {
                response: SubmitSmResponse::error(pdu.sequence_number, CommandStatus::SystemError),
                dlr: None,
            }
        }
    };

    metrics
        .submit_processing_seconds
        .observe(started.elapsed().as_secs_f64());

    outcome
}

/// Spawn the deferred receipt task for an accepted submit.
///
/// The task sleeps for the configured delay, then pushes a DELIVRD
/// deliver_sm with the addresses flipped (the receipt originates from
/// the number the ESME targeted). It is tracked by the session so that
/// teardown cancels receipts still waiting out their delay.
pub fn dispatch_dlr(services: Arc<Services>, session: Arc<SessionShared>, job: DlrJob) {
    let tracker = session.tasks.clone();
    let cancel = session.cancel.clone();
    let delay = Duration::from_secs_f64(services.settings.dlr_delay_seconds);

    tracker.spawn(async move {
        let metrics = &services.metrics;
        metrics.active_tasks.inc();

        tokio::select! {
            _ = cancel.cancelled() => {
                warn!(message_id = %job.message_id, "dlr task cancelled");
                metrics.active_tasks.dec();
                return;
            }
            _ = tokio::time::sleep(delay) => {}
        }

        let text = build_dlr_text(
            &job.message_id,
            "DELIVRD",
            dlr_error_code(&job.record),
            job.submitted_at,
            Local::now(),
        );

        let sent = session
            .send_deliver_sm(&job.destination_addr, &job.source_addr, text.as_bytes())
            .await;

        if sent {
            metrics
                .delivrd_total
                .with_label_values(&[dlr_reason(&job.record)])
                .inc();
            info!(
                message_id = %job.message_id,
                destination = %job.destination_addr,
                dlr_text = %&text[..text.len().min(50)],
                "dlr DELIVRD sent"
            );
        } else {
            metrics.dlr_dropped_total.inc();
        }

        metrics.active_tasks.dec();
    });
}
