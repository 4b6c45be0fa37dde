//! Message identifiers used by the client.
//!
//! Requests are sent by the integrator, pushes come from the controller
//! after a subscription.

/// Application communication start.
pub const COMMUNICATION_START: u16 = 1;
/// Application communication start acknowledge.
pub const COMMUNICATION_START_ACK: u16 = 2;
/// Application communication stop.
pub const COMMUNICATION_STOP: u16 = 3;
/// Application communication negative acknowledge.
pub const COMMAND_ERROR: u16 = 4;
/// Application communication positive acknowledge.
pub const COMMAND_ACCEPTED: u16 = 5;

/// Job info subscribe.
pub const JOB_INFO_SUBSCRIBE: u16 = 34;
/// Job info push.
pub const JOB_INFO: u16 = 35;
/// Job info acknowledge.
pub const JOB_INFO_ACK: u16 = 36;
/// Job info unsubscribe.
pub const JOB_INFO_UNSUBSCRIBE: u16 = 37;

/// Vehicle ID number subscribe.
pub const VIN_SUBSCRIBE: u16 = 51;
/// Vehicle ID number push.
pub const VIN: u16 = 52;
/// Vehicle ID number acknowledge.
pub const VIN_ACK: u16 = 53;
/// Vehicle ID number unsubscribe.
pub const VIN_UNSUBSCRIBE: u16 = 54;

/// Last tightening result subscribe.
pub const LAST_TIGHTENING_SUBSCRIBE: u16 = 60;
/// Last tightening result push.
pub const LAST_TIGHTENING: u16 = 61;
/// Last tightening result acknowledge.
pub const LAST_TIGHTENING_ACK: u16 = 62;
/// Last tightening result unsubscribe.
pub const LAST_TIGHTENING_UNSUBSCRIBE: u16 = 63;
/// Old tightening result upload reply.
pub const OLD_TIGHTENING: u16 = 65;

/// Multi-spindle result subscribe.
pub const MULTI_SPINDLE_SUBSCRIBE: u16 = 100;
/// Multi-spindle result push.
pub const MULTI_SPINDLE: u16 = 101;
/// Multi-spindle result acknowledge.
pub const MULTI_SPINDLE_ACK: u16 = 102;
/// Multi-spindle result unsubscribe.
pub const MULTI_SPINDLE_UNSUBSCRIBE: u16 = 103;

/// Last PowerMACS tightening result subscribe.
pub const POWERMACS_SUBSCRIBE: u16 = 105;
/// Last PowerMACS tightening result station data.
pub const POWERMACS_STATION: u16 = 106;
/// Last PowerMACS tightening result bolt data.
pub const POWERMACS_BOLT: u16 = 107;
/// Last PowerMACS tightening result acknowledge.
pub const POWERMACS_ACK: u16 = 108;
/// Last PowerMACS tightening result unsubscribe.
pub const POWERMACS_UNSUBSCRIBE: u16 = 109;

/// Keep alive.
pub const KEEP_ALIVE: u16 = 9999;

/// Format a MID the way it appears in the header.
///
/// MIDs range from 0 to 9999; larger values do not fit the field.
#[must_use]
pub fn digits(mid: u16) -> [u8; 4] {
    debug_assert!(mid <= 9999, "MID out of range: {mid}");
    let mut out = [b'0'; 4];
    let mut rest = mid;
    for slot in out.iter_mut().rev() {
        *slot = b'0' + (rest % 10) as u8;
        rest /= 10;
    }
    out
}
