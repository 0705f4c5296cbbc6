// ABOUTME: Builders for delivery receipt identifiers and receipt text
// ABOUTME: Produces the Appendix B "id:... stat:... err:... text:" body

use chrono::{DateTime, Local};
use uuid::Uuid;

/// Length of the message identifiers handed to ESMEs.
const MESSAGE_ID_LEN: usize = 16;

/// Generate a message identifier for an accepted submit_sm.
///
/// 16 hex characters from a v4 UUID. The id is returned in the
/// submit_sm_resp and repeated verbatim in the receipt, so the ESME can
/// correlate the two.
pub fn generate_message_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(MESSAGE_ID_LEN);
    id
}

/// Format a timestamp the way receipt dates are written: YYMMDDhhmm in
/// gateway local time.
pub fn format_smpp_date(at: DateTime<Local>) -> String {
    at.format("%y%m%d%H%M").to_string()
}

/// Build the delivery receipt text (SMPP v3.4 Appendix B):
///
/// `id:MSGID sub:001 dlvrd:000 submit date:YYMMDDhhmm done date:YYMMDDhhmm stat:STAT err:NNN text:`
///
/// One space between fields, nothing after the trailing `text:`.
pub fn build_dlr_text(
    message_id: &str,
    stat: &str,
    err: &str,
    submit_date: DateTime<Local>,
    done_date: DateTime<Local>,
) -> String {
    format!(
        "id:{} sub:001 dlvrd:000 submit date:{} done date:{} stat:{} err:{} text:",
        message_id,
        format_smpp_date(submit_date),
        format_smpp_date(done_date),
        stat,
        err,
    )
}
