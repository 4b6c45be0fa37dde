//! Payload layouts of the telegrams exchanged by the client.
//!
//! Each payload type declares its schema through [`Layout`] and its MID
//! through [`Message`]. Pushed telegrams can be decoded generically with
//! [`decode_push`].

mod multi_spindle;
mod nak;
mod powermacs;
mod tightening;

pub use multi_spindle::{MultiSpindleResult, SpindleStatus};
pub use nak::{ErrorCode, NegativeAck};
pub use powermacs::{BoltResult, PowerMacsBolt, PowerMacsStation};
pub use tightening::{LastTighteningResult, OldTighteningResult};

use serde::Serialize;

use crate::codec::CodecError;
use crate::header::Telegram;
use crate::mid;
use crate::schema::Layout;

/// A payload bound to a MID and revision.
pub trait Message: Layout {
    /// Message identifier carrying this payload.
    const MID: u16;
    /// Layout revision described by [`Layout::FIELDS`].
    const REVISION: u16;
}

/// A pushed telegram decoded to its catalog type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PushPayload {
    LastTightening(LastTighteningResult),
    OldTightening(OldTighteningResult),
    MultiSpindle(MultiSpindleResult),
    PowerMacsStation(PowerMacsStation),
    PowerMacsBolt(PowerMacsBolt),
    NegativeAck(NegativeAck),
    /// MIDs without a schema (job info, VIN) or revisions above 1.
    Raw { mid: u16, revision: u16, data: String },
}

impl PushPayload {
    /// MID the payload was decoded from.
    #[must_use]
    pub fn mid(&self) -> u16 {
        match self {
            PushPayload::LastTightening(_) => LastTighteningResult::MID,
            PushPayload::OldTightening(_) => OldTighteningResult::MID,
            PushPayload::MultiSpindle(_) => MultiSpindleResult::MID,
            PushPayload::PowerMacsStation(_) => PowerMacsStation::MID,
            PushPayload::PowerMacsBolt(_) => PowerMacsBolt::MID,
            PushPayload::NegativeAck(_) => NegativeAck::MID,
            PushPayload::Raw { mid, .. } => *mid,
        }
    }
}

/// Decode a pushed telegram to the matching catalog type.
///
/// A blank revision is read as revision 1.
///
/// # Errors
///
/// Returns an error if the telegram has a schema and its payload does not
/// match it.
pub fn decode_push(telegram: &Telegram) -> Result<PushPayload, CodecError> {
    let header = telegram.header();
    if header.revision > 1 {
        return Ok(raw(telegram));
    }

    let payload = match header.mid {
        mid::LAST_TIGHTENING => PushPayload::LastTightening(telegram.payload()?),
        mid::OLD_TIGHTENING => PushPayload::OldTightening(telegram.payload()?),
        mid::MULTI_SPINDLE => PushPayload::MultiSpindle(telegram.payload()?),
        mid::POWERMACS_STATION => PushPayload::PowerMacsStation(telegram.payload()?),
        mid::POWERMACS_BOLT => PushPayload::PowerMacsBolt(telegram.payload()?),
        mid::COMMAND_ERROR => PushPayload::NegativeAck(telegram.payload()?),
        _ => raw(telegram),
    };
    Ok(payload)
}

fn raw(telegram: &Telegram) -> PushPayload {
    PushPayload::Raw {
        mid: telegram.mid(),
        revision: telegram.header().revision,
        data: String::from_utf8_lossy(telegram.data()).into_owned(),
    }
}
