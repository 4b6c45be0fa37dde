//! MID 0004, application communication negative acknowledge.
//!
//! Sent by the controller when a request, command or subscription was not
//! performed. The payload names the failing MID and an error code.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::Message;
use crate::codec::CodecError;
use crate::mid;
use crate::schema::{Addr, FieldSpec, Layout, Record};

macro_rules! error_codes {
    ($($code:literal => $variant:ident: $message:literal,)*) => {
        /// Error codes carried by a negative acknowledge.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(into = "u8", from = "u8")]
        pub enum ErrorCode {
            $(
                #[doc = $message]
                $variant,
            )*
            /// A code outside the known table.
            Unknown(u8),
        }

        impl ErrorCode {
            /// Every known code, in ascending order.
            pub const ALL: &'static [ErrorCode] = &[$(ErrorCode::$variant,)*];

            /// Map a wire code to its variant.
            #[must_use]
            pub fn from_code(code: u8) -> Self {
                match code {
                    $($code => ErrorCode::$variant,)*
                    other => ErrorCode::Unknown(other),
                }
            }

            /// The wire code.
            #[must_use]
            pub fn code(&self) -> u8 {
                match self {
                    $(ErrorCode::$variant => $code,)*
                    ErrorCode::Unknown(code) => *code,
                }
            }

            /// Human-readable description.
            #[must_use]
            pub fn description(&self) -> &'static str {
                match self {
                    $(ErrorCode::$variant => $message,)*
                    ErrorCode::Unknown(_) => "Unknown error code",
                }
            }
        }
    };
}

error_codes! {
    0 => NoError: "No Error",
    1 => InvalidData: "Invalid data",
    2 => ParameterSetIdNotPresent: "Parameter set ID not present",
    3 => ParameterSetCanNotBeSet: "Parameter set can not be set",
    4 => ParameterSetNotRunning: "Parameter set not running",
    6 => VinUploadSubscriptionAlreadyExists: "VIN upload subscription already exists",
    7 => VinUploadSubscriptionDoesNotExists: "VIN upload subscription does not exists",
    8 => VinInputSourceNotGranted: "VIN input source not granted",
    9 => LastTighteningResultSubscriptionAlreadyExists: "Last tightening result subscription already exists",
    10 => LastTighteningResultSubscriptionDoesNotExist: "Last tightening result subscription does not exist",
    11 => AlarmSubscriptionAlreadyExists: "Alarm subscription already exists",
    12 => AlarmSubscriptionDoesNotExist: "Alarm subscription does not exist",
    13 => ParameterSetSelectionSubscriptionAlreadyExists: "Parameter set selection subscription already exists",
    14 => ParameterSetSelectionSubscriptionDoesNotExist: "Parameter set selection subscription does not exist",
    15 => TighteningIdRequestedNotFound: "Tightening ID requested not found",
    16 => ConnectionRejectedProtocolBusy: "Connection rejected protocol busy",
    17 => JobIdNotPresent: "Job ID not present",
    18 => JobInfoSubscriptionAlreadyExists: "Job info subscription already exists",
    19 => JobInfoSubscriptionDoesNotExist: "Job info subscription does not exist",
    20 => JobCanNotBeSet: "Job can not be set",
    21 => JobNotRunning: "Job not running",
    22 => NotPossibleToExecuteDynamicJobRequest: "Not possible to execute dynamic Job request",
    23 => JobBatchDecrementFailed: "Job batch decrement failed",
    24 => NotPossibleToCreatePset: "Not possible to create Pset",
    25 => ProgrammingControlNotGranted: "Programming control not granted",
    26 => WrongToolTypeToPsetDownloadConnected: "Wrong tool type to Pset download connected",
    27 => ToolIsInaccessible: "Tool is inaccessible",
    28 => JobAbortionIsInProgress: "Job abortion is in progress",
    29 => ToolDoesNotExist: "Tool does not exist",
    30 => ControllerIsNotASyncMasterStationController: "Controller is not a sync Master/station controller",
    31 => MultiSpindleStatusSubscriptionAlreadyExists: "Multi-spindle status subscription already exists",
    32 => MultiSpindleStatusSubscriptionDoesNotExist: "Multi-spindle status subscription does not exist",
    33 => MultiSpindleResultSubscriptionAlreadyExists: "Multi-spindle result subscription already exists",
    34 => MultiSpindleResultSubscriptionDoesNotExist: "Multi-spindle result subscription does not exist",
    35 => OtherMasterClientAlreadyConnected: "Other master client already connected",
    36 => LockTypeNotSupported: "Lock type not supported",
    40 => JobLineControlInfoSubscriptionAlreadyExists: "Job line control info subscription already exists",
    41 => JobLineControlInfoSubscriptionDoesNotExist: "Job line control info subscription does not exist",
    42 => IdentifierInputSourceNotGranted: "Identifier input source not granted",
    43 => MultipleIdentifiersWorkOrderSubscriptionAlreadyExists: "Multiple identifiers work order subscription already exists",
    44 => MultipleIdentifiersWorkOrderSubscriptionDoesNotExist: "Multiple identifiers work order subscription does not exist",
    50 => StatusExternalMonitoredInputsSubscriptionAlreadyExists: "Status external monitored inputs subscription already exists",
    51 => StatusExternalMonitoredInputsSubscriptionDoesNotExist: "Status external monitored inputs subscription does not exist",
    52 => IoDeviceNotConnected: "IO device not connected",
    53 => FaultyIoDeviceId: "Faulty IO device ID",
    54 => ToolTagIdUnknown: "Tool Tag ID unknown",
    55 => ToolTagIdSubscriptionAlreadyExists: "Tool Tag ID subscription already exists",
    56 => ToolTagIdSubscriptionDoesNotExist: "Tool Tag ID subscription does not exist",
    57 => ToolMotorTuningFailed: "Tool Motor tuning failed",
    58 => NoAlarmPresent: "No alarm present",
    59 => ToolCurrentlyInUse: "Tool currently in use",
    60 => NoHistogramAvailable: "No histogram available",
    61 => PairingFailed: "Pairing failed",
    62 => PairingDenied: "Pairing denied",
    63 => PairingOrPairingAbortionAttemptOnWrongTooltype: "Pairing or Pairing abortion attempt on wrong tooltype",
    64 => PairingAbortionDenied: "Pairing abortion denied",
    65 => PairingAbortionFailed: "Pairing abortion failed",
    66 => PairingDisconnectionFailed: "Pairing disconnection failed",
    67 => PairingInProgressOrAlreadyDone: "Pairing in progress or already done",
    68 => PairingDeniedNoProgramControl: "Pairing denied. No Program Control",
    69 => UnsupportedExtraDataRevision: "Unsupported extra data revision",
    70 => CalibrationFailed: "Calibration failed",
    71 => SubscriptionAlreadyExists: "Subscription already exists",
    72 => SubscriptionDoesNotExists: "Subscription does not exists",
    73 => SubscribedMidUnsupported: "Subscribed MID unsupported",
    74 => SubscribedMidRevisionUnsupported: "Subscribed MID revision unsupported",
    75 => RequestedMidUnsupported: "Requested MID unsupported",
    76 => RequestedMidRevisionUnsupported: "Requested MID revision unsupported",
    77 => RequestedDataNotSupported: "Requested on specific data not supported",
    78 => SubscribedDataNotSupported: "Subscription on specific data not supported",
    79 => CommandFailed: "Command failed",
    80 => AudiEmergencyStatusSubscriptionExists: "Audi emergency status subscription exists",
    81 => AudiEmergencyStatusSubscriptionDoesNotExist: "Audi emergency status subscription does not exist",
    82 => AutomaticManualModeSubscribeAlreadyExist: "Automatic/Manual mode subscribe already exist",
    83 => AutomaticManualModeSubscribeDoesNotExist: "Automatic/Manual mode subscribe does not exist",
    84 => TheRelayFunctionSubscriptionAlreadyExists: "The relay function subscription already exists",
    85 => TheRelayFunctionSubscriptionDoesNotExist: "The relay function subscription does not exist",
    86 => TheSelectorSocketInfoSubscriptionAlreadyExist: "The selector socket info subscription already exist",
    87 => TheSelectorSocketInfoSubscriptionDoesNotExist: "The selector socket info subscription does not exist",
    88 => TheDiginInfoSubscriptionAlreadyExist: "The digin info subscription already exist",
    89 => TheDiginInfoSubscriptionDoesNotExist: "The digin info subscription does not exist",
    90 => LockAtBatchDoneSubscriptionAlreadyExist: "Lock at batch done subscription already exist",
    91 => LockAtBatchDoneSubscriptionDoesNotExist: "Lock at batch done subscription does not exist",
    92 => OpenProtocolCommandsDisabled: "Open protocol commands disabled",
    93 => OpenProtocolCommandsDisabledSubscriptionAlreadyExists: "Open protocol commands disabled subscription already exists",
    94 => OpenProtocolCommandsDisabledSubscriptionDoesNotExist: "Open protocol commands disabled subscription does not exist",
    95 => PowerMacsInManualMode: "Reject request, Power MACS is in manual mode",
    96 => ClientAlreadyConnected: "Reject connection, Client already connected",
    97 => MidRevisionUnsupported: "MID revision unsupported",
    98 => ControllerInternalRequestTimeout: "Controller internal request timeout",
    99 => UnknownMid: "Unknown MID",
}

impl From<u8> for ErrorCode {
    fn from(code: u8) -> Self {
        ErrorCode::from_code(code)
    }
}

impl From<ErrorCode> for u8 {
    fn from(code: ErrorCode) -> u8 {
        code.code()
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCode::Unknown(code) => write!(f, "Unknown error code {code:02}"),
            known => f.write_str(known.description()),
        }
    }
}

/// Negative acknowledge payload, revision 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("get error response on mid {mid_number}: {error_code}")]
pub struct NegativeAck {
    /// MID of the request that failed.
    pub mid_number: u16,
    /// Why it failed.
    pub error_code: ErrorCode,
}

const FIELDS: &[FieldSpec] = &[
    FieldSpec::int("mid_number", Addr::range(21, 24)),
    FieldSpec::int("error_code", Addr::range(25, 26)),
];

impl Layout for NegativeAck {
    const FIELDS: &'static [FieldSpec] = FIELDS;

    fn from_record(record: &Record) -> Result<Self, CodecError> {
        Ok(Self {
            mid_number: record.int("mid_number")?,
            error_code: ErrorCode::from_code(record.int("error_code")?),
        })
    }
}

impl Message for NegativeAck {
    const MID: u16 = mid::COMMAND_ERROR;
    const REVISION: u16 = 1;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::Telegram;

    fn nak(failed: u16, code: u8) -> Telegram {
        Telegram::new(mid::COMMAND_ERROR, 1, format!("{failed:04}{code:02}")).unwrap()
    }

    #[test]
    fn test_every_known_code() {
        assert_eq!(ErrorCode::ALL.len(), 91);
        for code in ErrorCode::ALL {
            let telegram = nak(mid::JOB_INFO_SUBSCRIBE, code.code());
            let payload: NegativeAck = telegram.payload().unwrap();
            assert_eq!(payload.mid_number, mid::JOB_INFO_SUBSCRIBE);
            assert_eq!(payload.error_code, *code);
            assert_eq!(ErrorCode::from_code(code.code()), *code);
            assert!(!matches!(payload.error_code, ErrorCode::Unknown(_)));
        }
    }

    #[test]
    fn test_unknown_code() {
        let payload: NegativeAck = nak(60, 5).payload().unwrap();
        assert_eq!(payload.error_code, ErrorCode::Unknown(5));
        assert_eq!(payload.error_code.code(), 5);
    }

    #[test]
    fn test_error_message() {
        let payload: NegativeAck = nak(mid::JOB_INFO_SUBSCRIBE, 18).payload().unwrap();
        assert_eq!(payload.error_code, ErrorCode::JobInfoSubscriptionAlreadyExists);
        assert_eq!(
            payload.to_string(),
            "get error response on mid 34: Job info subscription already exists"
        );
    }

    #[test]
    fn test_wrong_mid() {
        let telegram = Telegram::new(mid::COMMAND_ACCEPTED, 1, "003400").unwrap();
        assert!(matches!(
            telegram.payload::<NegativeAck>(),
            Err(CodecError::MidMismatch {
                expected: 4,
                actual: 5
            })
        ));
    }

    #[test]
    fn test_error_code_serde() {
        let json = serde_json::to_string(&ErrorCode::UnknownMid).unwrap();
        assert_eq!(json, "99");
        let code: ErrorCode = serde_json::from_str("72").unwrap();
        assert_eq!(code, ErrorCode::SubscriptionDoesNotExists);
    }
}
