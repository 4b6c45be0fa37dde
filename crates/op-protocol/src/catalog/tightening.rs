//! Tightening results: MID 0061 (last result) and MID 0065 (old result upload).
//!
//! Torque values are transmitted multiplied by 100 and angles in degrees;
//! no scaling is applied here.

use serde::{Deserialize, Serialize};

use super::Message;
use crate::codec::CodecError;
use crate::mid;
use crate::schema::{Addr, Encodable, FieldSpec, Layout, Record};

/// Last tightening result data, revision 1.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastTighteningResult {
    pub cell_id: u16,
    pub channel_id: u8,
    pub controller_name: String,
    pub vin: String,
    pub job_id: u8,
    pub pset: u16,
    pub batch_size: u16,
    pub batch_counter: u16,
    /// `true` when the tightening was OK.
    pub tightening_status: bool,
    /// 0 low, 1 OK, 2 high.
    pub torque_status: u8,
    /// 0 low, 1 OK, 2 high.
    pub angle_status: u8,
    pub torque_min: u32,
    pub torque_max: u32,
    pub torque_final_target: u32,
    pub torque: u32,
    pub angle_min: u32,
    pub angle_max: u32,
    pub final_angle_target: u32,
    pub angle: u32,
    /// `YYYY-MM-DD:HH:MM:SS`.
    pub timestamp: String,
    pub last_pset_change: String,
    /// 0 NOK, 1 OK, 2 not used.
    pub batch_status: u8,
    pub tightening_id: u32,
}

const LAST_TIGHTENING_FIELDS: &[FieldSpec] = &[
    FieldSpec::int("cell_id", Addr::range(23, 26)).tagged(1),
    FieldSpec::int("channel_id", Addr::range(29, 30)).tagged(2),
    FieldSpec::string("controller_name", Addr::range(33, 57)).tagged(3),
    FieldSpec::string("vin", Addr::range(60, 84)).tagged(4),
    FieldSpec::int("job_id", Addr::range(87, 88)).tagged(5),
    FieldSpec::int("pset", Addr::range(91, 93)).tagged(6),
    FieldSpec::int("batch_size", Addr::range(96, 99)).tagged(7),
    FieldSpec::int("batch_counter", Addr::range(102, 105)).tagged(8),
    FieldSpec::boolean("tightening_status", Addr::at(108)).tagged(9),
    FieldSpec::int("torque_status", Addr::at(111)).tagged(10),
    FieldSpec::int("angle_status", Addr::at(114)).tagged(11),
    FieldSpec::int("torque_min", Addr::range(117, 122)).tagged(12),
    FieldSpec::int("torque_max", Addr::range(125, 130)).tagged(13),
    FieldSpec::int("torque_final_target", Addr::range(133, 138)).tagged(14),
    FieldSpec::int("torque", Addr::range(141, 146)).tagged(15),
    FieldSpec::int("angle_min", Addr::range(149, 153)).tagged(16),
    FieldSpec::int("angle_max", Addr::range(156, 160)).tagged(17),
    FieldSpec::int("final_angle_target", Addr::range(163, 167)).tagged(18),
    FieldSpec::int("angle", Addr::range(170, 174)).tagged(19),
    FieldSpec::string("timestamp", Addr::range(177, 195)).tagged(20),
    FieldSpec::string("last_pset_change", Addr::range(198, 216)).tagged(21),
    FieldSpec::int("batch_status", Addr::at(219)).tagged(22),
    FieldSpec::int("tightening_id", Addr::range(222, 231)).tagged(23),
];

impl Layout for LastTighteningResult {
    const FIELDS: &'static [FieldSpec] = LAST_TIGHTENING_FIELDS;

    fn from_record(record: &Record) -> Result<Self, CodecError> {
        Ok(Self {
            cell_id: record.int("cell_id")?,
            channel_id: record.int("channel_id")?,
            controller_name: record.string("controller_name")?,
            vin: record.string("vin")?,
            job_id: record.int("job_id")?,
            pset: record.int("pset")?,
            batch_size: record.int("batch_size")?,
            batch_counter: record.int("batch_counter")?,
            tightening_status: record.boolean("tightening_status")?,
            torque_status: record.int("torque_status")?,
            angle_status: record.int("angle_status")?,
            torque_min: record.int("torque_min")?,
            torque_max: record.int("torque_max")?,
            torque_final_target: record.int("torque_final_target")?,
            torque: record.int("torque")?,
            angle_min: record.int("angle_min")?,
            angle_max: record.int("angle_max")?,
            final_angle_target: record.int("final_angle_target")?,
            angle: record.int("angle")?,
            timestamp: record.string("timestamp")?,
            last_pset_change: record.string("last_pset_change")?,
            batch_status: record.int("batch_status")?,
            tightening_id: record.int("tightening_id")?,
        })
    }
}

impl Encodable for LastTighteningResult {
    fn to_record(&self) -> Record {
        Record::with_capacity(LAST_TIGHTENING_FIELDS.len())
            .with("cell_id", i64::from(self.cell_id))
            .with("channel_id", i64::from(self.channel_id))
            .with("controller_name", self.controller_name.as_str())
            .with("vin", self.vin.as_str())
            .with("job_id", i64::from(self.job_id))
            .with("pset", i64::from(self.pset))
            .with("batch_size", i64::from(self.batch_size))
            .with("batch_counter", i64::from(self.batch_counter))
            .with("tightening_status", self.tightening_status)
            .with("torque_status", i64::from(self.torque_status))
            .with("angle_status", i64::from(self.angle_status))
            .with("torque_min", i64::from(self.torque_min))
            .with("torque_max", i64::from(self.torque_max))
            .with("torque_final_target", i64::from(self.torque_final_target))
            .with("torque", i64::from(self.torque))
            .with("angle_min", i64::from(self.angle_min))
            .with("angle_max", i64::from(self.angle_max))
            .with("final_angle_target", i64::from(self.final_angle_target))
            .with("angle", i64::from(self.angle))
            .with("timestamp", self.timestamp.as_str())
            .with("last_pset_change", self.last_pset_change.as_str())
            .with("batch_status", i64::from(self.batch_status))
            .with("tightening_id", i64::from(self.tightening_id))
    }
}

impl Message for LastTighteningResult {
    const MID: u16 = mid::LAST_TIGHTENING;
    const REVISION: u16 = 1;
}

/// Old tightening result upload reply, revision 1.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OldTighteningResult {
    pub tightening_id: u32,
    pub vin: String,
    pub pset: u16,
    pub batch_counter: u16,
    pub tightening_status: bool,
    pub torque_status: u8,
    pub angle_status: u8,
    pub torque: u32,
    pub angle: u32,
    pub timestamp: String,
    pub batch_status: u8,
}

const OLD_TIGHTENING_FIELDS: &[FieldSpec] = &[
    FieldSpec::int("tightening_id", Addr::range(23, 32)).tagged(1),
    FieldSpec::string("vin", Addr::range(35, 59)).tagged(2),
    FieldSpec::int("pset", Addr::range(62, 64)).tagged(3),
    FieldSpec::int("batch_counter", Addr::range(67, 70)).tagged(4),
    FieldSpec::boolean("tightening_status", Addr::at(73)).tagged(5),
    FieldSpec::int("torque_status", Addr::at(76)).tagged(6),
    FieldSpec::int("angle_status", Addr::at(79)).tagged(7),
    FieldSpec::int("torque", Addr::range(82, 87)).tagged(8),
    FieldSpec::int("angle", Addr::range(90, 94)).tagged(9),
    FieldSpec::string("timestamp", Addr::range(97, 115)).tagged(10),
    FieldSpec::int("batch_status", Addr::at(118)).tagged(11),
];

impl Layout for OldTighteningResult {
    const FIELDS: &'static [FieldSpec] = OLD_TIGHTENING_FIELDS;

    fn from_record(record: &Record) -> Result<Self, CodecError> {
        Ok(Self {
            tightening_id: record.int("tightening_id")?,
            vin: record.string("vin")?,
            pset: record.int("pset")?,
            batch_counter: record.int("batch_counter")?,
            tightening_status: record.boolean("tightening_status")?,
            torque_status: record.int("torque_status")?,
            angle_status: record.int("angle_status")?,
            torque: record.int("torque")?,
            angle: record.int("angle")?,
            timestamp: record.string("timestamp")?,
            batch_status: record.int("batch_status")?,
        })
    }
}

impl Message for OldTighteningResult {
    const MID: u16 = mid::OLD_TIGHTENING;
    const REVISION: u16 = 1;
}
