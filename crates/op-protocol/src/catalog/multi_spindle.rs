//! MID 0101, multi-spindle result.
//!
//! A fixed header section followed by one 18 byte status record per spindle.
//! The spindle records start at byte 175; their count is the value at 23-24.

use serde::{Deserialize, Serialize};

use super::Message;
use crate::codec::CodecError;
use crate::mid;
use crate::schema::{Addr, FieldSpec, Layout, Record};

/// Per-spindle status record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpindleStatus {
    pub spindle_number: u8,
    pub channel_id: u8,
    pub overall_status: bool,
    pub torque_status: u8,
    pub torque: u32,
    pub angle_status: u8,
    pub angle: u32,
}

const SPINDLE_FIELDS: &[FieldSpec] = &[
    FieldSpec::int("spindle_number", Addr::next(2)),
    FieldSpec::int("channel_id", Addr::next(2)),
    FieldSpec::boolean("overall_status", Addr::next(1)),
    FieldSpec::int("torque_status", Addr::next(1)),
    FieldSpec::int("torque", Addr::next(6)),
    FieldSpec::int("angle_status", Addr::next(1)),
    FieldSpec::int("angle", Addr::next(5)),
];

impl Layout for SpindleStatus {
    const FIELDS: &'static [FieldSpec] = SPINDLE_FIELDS;

    fn from_record(record: &Record) -> Result<Self, CodecError> {
        Ok(Self {
            spindle_number: record.int("spindle_number")?,
            channel_id: record.int("channel_id")?,
            overall_status: record.boolean("overall_status")?,
            torque_status: record.int("torque_status")?,
            torque: record.int("torque")?,
            angle_status: record.int("angle_status")?,
            angle: record.int("angle")?,
        })
    }
}

/// Multi-spindle result, revision 1.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiSpindleResult {
    pub number_of_spindles: u8,
    pub vin: String,
    pub job_id: u8,
    pub pset: u16,
    pub batch_size: u16,
    pub batch_counter: u16,
    pub batch_status: u8,
    pub torque_min: u32,
    pub torque_max: u32,
    pub torque_final_target: u32,
    pub angle_min: u32,
    pub angle_max: u32,
    pub final_angle_target: u32,
    pub last_pset_change: String,
    pub timestamp: String,
    pub sync_tightening_id: u32,
    pub sync_overall_status: bool,
    pub spindles: Vec<SpindleStatus>,
}

const MULTI_SPINDLE_FIELDS: &[FieldSpec] = &[
    FieldSpec::int("number_of_spindles", Addr::range(23, 24)).tagged(1),
    FieldSpec::string("vin", Addr::range(27, 51)).tagged(2),
    FieldSpec::int("job_id", Addr::range(54, 55)).tagged(3),
    FieldSpec::int("pset", Addr::range(58, 60)).tagged(4),
    FieldSpec::int("batch_size", Addr::range(63, 66)).tagged(5),
    FieldSpec::int("batch_counter", Addr::range(69, 72)).tagged(6),
    FieldSpec::int("batch_status", Addr::at(75)).tagged(7),
    FieldSpec::int("torque_min", Addr::range(78, 83)).tagged(8),
    FieldSpec::int("torque_max", Addr::range(86, 91)).tagged(9),
    FieldSpec::int("torque_final_target", Addr::range(94, 99)).tagged(10),
    FieldSpec::int("angle_min", Addr::range(102, 106)).tagged(11),
    FieldSpec::int("angle_max", Addr::range(109, 113)).tagged(12),
    FieldSpec::int("final_angle_target", Addr::range(116, 120)).tagged(13),
    FieldSpec::string("last_pset_change", Addr::range(123, 141)).tagged(14),
    FieldSpec::string("timestamp", Addr::range(144, 162)).tagged(15),
    FieldSpec::int("sync_tightening_id", Addr::range(165, 169)).tagged(16),
    FieldSpec::boolean("sync_overall_status", Addr::at(172)).tagged(17),
    FieldSpec::group("spindles", Addr::range(23, 24), SPINDLE_FIELDS).tagged(18),
];

impl Layout for MultiSpindleResult {
    const FIELDS: &'static [FieldSpec] = MULTI_SPINDLE_FIELDS;

    fn from_record(record: &Record) -> Result<Self, CodecError> {
        let spindles = record
            .group("spindles")?
            .iter()
            .map(SpindleStatus::from_record)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            number_of_spindles: record.int("number_of_spindles")?,
            vin: record.string("vin")?,
            job_id: record.int("job_id")?,
            pset: record.int("pset")?,
            batch_size: record.int("batch_size")?,
            batch_counter: record.int("batch_counter")?,
            batch_status: record.int("batch_status")?,
            torque_min: record.int("torque_min")?,
            torque_max: record.int("torque_max")?,
            torque_final_target: record.int("torque_final_target")?,
            angle_min: record.int("angle_min")?,
            angle_max: record.int("angle_max")?,
            final_angle_target: record.int("final_angle_target")?,
            last_pset_change: record.string("last_pset_change")?,
            timestamp: record.string("timestamp")?,
            sync_tightening_id: record.int("sync_tightening_id")?,
            sync_overall_status: record.boolean("sync_overall_status")?,
            spindles,
        })
    }
}

impl Message for MultiSpindleResult {
    const MID: u16 = mid::MULTI_SPINDLE;
    const REVISION: u16 = 1;
}
