//! PowerMACS results: MID 0106 (station data) and MID 0107 (bolt data).
//!
//! The station telegram carries a short result per bolt; the bolt telegrams
//! follow only when the station telegram was acknowledged with bolt data
//! requested.

use serde::{Deserialize, Serialize};

use super::Message;
use crate::codec::CodecError;
use crate::mid;
use crate::schema::{Addr, FieldSpec, Layout, Record};

/// Per-bolt result inside a station telegram. Each record is 67 bytes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoltResult {
    pub ordinal: u8,
    /// 0 NOK, 1 OK.
    pub simple_status: u8,
    /// 0 low, 1 OK, 2 high.
    pub torque_status: u8,
    /// 0 low, 1 OK, 2 high.
    pub angle_status: u8,
    pub torque: f64,
    pub angle: f64,
    pub torque_high_limit: f64,
    pub torque_low_limit: f64,
    pub angle_high_limit: f64,
    pub angle_low_limit: f64,
}

const BOLT_FIELDS: &[FieldSpec] = &[
    FieldSpec::int("ordinal", Addr::next(2)).tagged(13),
    FieldSpec::int("simple_status", Addr::next(1)).tagged(14),
    FieldSpec::int("torque_status", Addr::next(1)).tagged(15),
    FieldSpec::int("angle_status", Addr::next(1)).tagged(16),
    FieldSpec::float("torque", Addr::next(7)).tagged(17),
    FieldSpec::float("angle", Addr::next(7)).tagged(18),
    FieldSpec::float("torque_high_limit", Addr::next(7)).tagged(19),
    FieldSpec::float("torque_low_limit", Addr::next(7)).tagged(20),
    FieldSpec::float("angle_high_limit", Addr::next(7)).tagged(21),
    FieldSpec::float("angle_low_limit", Addr::next(7)).tagged(22),
];

impl Layout for BoltResult {
    const FIELDS: &'static [FieldSpec] = BOLT_FIELDS;

    fn from_record(record: &Record) -> Result<Self, CodecError> {
        Ok(Self {
            ordinal: record.int("ordinal")?,
            simple_status: record.int("simple_status")?,
            torque_status: record.int("torque_status")?,
            angle_status: record.int("angle_status")?,
            torque: record.float("torque")?,
            angle: record.float("angle")?,
            torque_high_limit: record.float("torque_high_limit")?,
            torque_low_limit: record.float("torque_low_limit")?,
            angle_high_limit: record.float("angle_high_limit")?,
            angle_low_limit: record.float("angle_low_limit")?,
        })
    }
}

/// Last PowerMACS tightening result, station data, revision 1.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PowerMacsStation {
    /// Station telegram plus one bolt telegram per bolt.
    pub total_messages: u8,
    pub message_number: u8,
    pub data_no_system: u32,
    pub station_number: u8,
    pub station_name: String,
    pub time: String,
    pub mode_number: u8,
    pub mode_name: String,
    /// 0 NOK, 1 OK.
    pub simple_status: u8,
    /// 0 OK, 1 OKR, 2 NOK, 3 TERMNOK.
    pub pm_status: u8,
    pub wp_id: String,
    pub number_of_bolts: u8,
    pub bolts: Vec<BoltResult>,
}

const STATION_FIELDS: &[FieldSpec] = &[
    FieldSpec::int("total_messages", Addr::range(23, 24)).tagged(1),
    FieldSpec::int("message_number", Addr::range(27, 28)).tagged(2),
    FieldSpec::int("data_no_system", Addr::range(31, 40)).tagged(3),
    FieldSpec::int("station_number", Addr::range(43, 44)).tagged(4),
    FieldSpec::string("station_name", Addr::range(47, 66)).tagged(5),
    FieldSpec::string("time", Addr::range(69, 87)).tagged(6),
    FieldSpec::int("mode_number", Addr::range(90, 91)).tagged(7),
    FieldSpec::string("mode_name", Addr::range(94, 113)).tagged(8),
    FieldSpec::int("simple_status", Addr::at(116)).tagged(9),
    FieldSpec::int("pm_status", Addr::at(119)).tagged(10),
    FieldSpec::string("wp_id", Addr::range(122, 161)).tagged(11),
    FieldSpec::int("number_of_bolts", Addr::range(164, 165)).tagged(12),
    FieldSpec::group("bolts", Addr::range(164, 165), BOLT_FIELDS),
];

impl Layout for PowerMacsStation {
    const FIELDS: &'static [FieldSpec] = STATION_FIELDS;

    fn from_record(record: &Record) -> Result<Self, CodecError> {
        let bolts = record
            .group("bolts")?
            .iter()
            .map(BoltResult::from_record)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            total_messages: record.int("total_messages")?,
            message_number: record.int("message_number")?,
            data_no_system: record.int("data_no_system")?,
            station_number: record.int("station_number")?,
            station_name: record.string("station_name")?,
            time: record.string("time")?,
            mode_number: record.int("mode_number")?,
            mode_name: record.string("mode_name")?,
            simple_status: record.int("simple_status")?,
            pm_status: record.int("pm_status")?,
            wp_id: record.string("wp_id")?,
            number_of_bolts: record.int("number_of_bolts")?,
            bolts,
        })
    }
}

impl Message for PowerMacsStation {
    const MID: u16 = mid::POWERMACS_STATION;
    const REVISION: u16 = 1;
}

/// Last PowerMACS tightening result, bolt data, revision 1.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerMacsBolt {
    pub total_messages: u8,
    /// 2 for the first bolt, the station telegram being 1.
    pub message_number: u8,
    pub data_no_system: u32,
    pub station_number: u8,
    pub time: String,
    pub bolt_number: u16,
    pub bolt_name: String,
    pub program_name: String,
    pub pm_status: u8,
    pub errors: String,
    /// Blank when the function is not activated.
    pub customer_error_code: String,
}

const BOLT_DATA_FIELDS: &[FieldSpec] = &[
    FieldSpec::int("total_messages", Addr::range(23, 24)).tagged(1),
    FieldSpec::int("message_number", Addr::range(27, 28)).tagged(2),
    FieldSpec::int("data_no_system", Addr::range(31, 40)).tagged(3),
    FieldSpec::int("station_number", Addr::range(43, 44)).tagged(4),
    FieldSpec::string("time", Addr::range(47, 65)).tagged(5),
    FieldSpec::int("bolt_number", Addr::range(68, 71)).tagged(6),
    FieldSpec::string("bolt_name", Addr::range(74, 93)).tagged(7),
    FieldSpec::string("program_name", Addr::range(96, 115)).tagged(8),
    FieldSpec::int("pm_status", Addr::at(118)).tagged(9),
    FieldSpec::string("errors", Addr::range(121, 170)).tagged(10),
    FieldSpec::string("customer_error_code", Addr::range(173, 176)).tagged(11),
];

impl Layout for PowerMacsBolt {
    const FIELDS: &'static [FieldSpec] = BOLT_DATA_FIELDS;

    fn from_record(record: &Record) -> Result<Self, CodecError> {
        Ok(Self {
            total_messages: record.int("total_messages")?,
            message_number: record.int("message_number")?,
            data_no_system: record.int("data_no_system")?,
            station_number: record.int("station_number")?,
            time: record.string("time")?,
            bolt_number: record.int("bolt_number")?,
            bolt_name: record.string("bolt_name")?,
            program_name: record.string("program_name")?,
            pm_status: record.int("pm_status")?,
            errors: record.string("errors")?,
            customer_error_code: record.string("customer_error_code")?,
        })
    }
}

impl Message for PowerMacsBolt {
    const MID: u16 = mid::POWERMACS_BOLT;
    const REVISION: u16 = 1;
}
