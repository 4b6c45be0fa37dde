//! Subscribable topics.
//!
//! A topic is a result family the controller pushes after a subscription. Each
//! has a subscribe, acknowledge and unsubscribe MID and one or more push MIDs;
//! pushes are routed by the four MID digits of the header.

use std::fmt;
use std::str::FromStr;

use op_protocol::{codec, mid};
use serde::{Deserialize, Serialize};

/// Routing key: the four ASCII MID digits at header bytes 5-8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TopicKey([u8; 4]);

impl TopicKey {
    /// Key for a push MID.
    #[must_use]
    pub fn from_mid(mid: u16) -> Self {
        Self(mid::digits(mid))
    }

    /// Key of a raw telegram, if it holds a full header.
    #[must_use]
    pub fn of_telegram(raw: &[u8]) -> Option<Self> {
        codec::mid_digits(raw).map(Self)
    }

    /// The ASCII digits.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }
}

impl fmt::Display for TopicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

/// Result families the client can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    JobInfo,
    VehicleId,
    LastTighteningResult,
    MultiSpindleResult,
    /// Station data and bolt data share one stream.
    PowerMacsResult,
}

impl Topic {
    /// Every topic.
    pub const ALL: [Topic; 5] = [
        Topic::JobInfo,
        Topic::VehicleId,
        Topic::LastTighteningResult,
        Topic::MultiSpindleResult,
        Topic::PowerMacsResult,
    ];

    /// Configuration name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Topic::JobInfo => "job_info",
            Topic::VehicleId => "vehicle_id",
            Topic::LastTighteningResult => "last_tightening_result",
            Topic::MultiSpindleResult => "multi_spindle_result",
            Topic::PowerMacsResult => "power_macs_result",
        }
    }

    /// MID of the subscribe request.
    #[must_use]
    pub fn subscribe_mid(&self) -> u16 {
        match self {
            Topic::JobInfo => mid::JOB_INFO_SUBSCRIBE,
            Topic::VehicleId => mid::VIN_SUBSCRIBE,
            Topic::LastTighteningResult => mid::LAST_TIGHTENING_SUBSCRIBE,
            Topic::MultiSpindleResult => mid::MULTI_SPINDLE_SUBSCRIBE,
            Topic::PowerMacsResult => mid::POWERMACS_SUBSCRIBE,
        }
    }

    /// MIDs pushed by the controller for this topic.
    #[must_use]
    pub fn push_mids(&self) -> &'static [u16] {
        match self {
            Topic::JobInfo => &[mid::JOB_INFO],
            Topic::VehicleId => &[mid::VIN],
            Topic::LastTighteningResult => &[mid::LAST_TIGHTENING],
            Topic::MultiSpindleResult => &[mid::MULTI_SPINDLE],
            Topic::PowerMacsResult => &[mid::POWERMACS_STATION, mid::POWERMACS_BOLT],
        }
    }

    /// MID acknowledging a push.
    #[must_use]
    pub fn ack_mid(&self) -> u16 {
        match self {
            Topic::JobInfo => mid::JOB_INFO_ACK,
            Topic::VehicleId => mid::VIN_ACK,
            Topic::LastTighteningResult => mid::LAST_TIGHTENING_ACK,
            Topic::MultiSpindleResult => mid::MULTI_SPINDLE_ACK,
            Topic::PowerMacsResult => mid::POWERMACS_ACK,
        }
    }

    /// MID of the unsubscribe request.
    #[must_use]
    pub fn unsubscribe_mid(&self) -> u16 {
        match self {
            Topic::JobInfo => mid::JOB_INFO_UNSUBSCRIBE,
            Topic::VehicleId => mid::VIN_UNSUBSCRIBE,
            Topic::LastTighteningResult => mid::LAST_TIGHTENING_UNSUBSCRIBE,
            Topic::MultiSpindleResult => mid::MULTI_SPINDLE_UNSUBSCRIBE,
            Topic::PowerMacsResult => mid::POWERMACS_UNSUBSCRIBE,
        }
    }

    /// Routing keys of the push MIDs.
    #[must_use]
    pub fn keys(&self) -> Vec<TopicKey> {
        self.push_mids().iter().map(|mid| TopicKey::from_mid(*mid)).collect()
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Topic {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Topic::ALL
            .into_iter()
            .find(|topic| topic.name() == s)
            .ok_or_else(|| format!("Unknown topic: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_key() {
        let key = TopicKey::of_telegram(b"02310061001 0000000001").unwrap();
        assert_eq!(key, TopicKey::from_mid(61));
        assert_eq!(key.to_string(), "0061");
        assert!(TopicKey::of_telegram(b"0023").is_none());
    }

    #[test]
    fn test_powermacs_aliases() {
        let keys = Topic::PowerMacsResult.keys();
        assert_eq!(keys, vec![TopicKey::from_mid(106), TopicKey::from_mid(107)]);
        assert_eq!(Topic::LastTighteningResult.keys().len(), 1);
    }

    #[test]
    fn test_topic_mids() {
        assert_eq!(Topic::JobInfo.subscribe_mid(), 34);
        assert_eq!(Topic::JobInfo.ack_mid(), 36);
        assert_eq!(Topic::VehicleId.unsubscribe_mid(), 54);
        assert_eq!(Topic::MultiSpindleResult.push_mids(), &[101]);
        assert_eq!(Topic::PowerMacsResult.ack_mid(), 108);
    }

    #[test]
    fn test_topic_names() {
        for topic in Topic::ALL {
            assert_eq!(topic.name().parse::<Topic>().unwrap(), topic);
            let json = serde_json::to_string(&topic).unwrap();
            assert_eq!(json, format!("\"{}\"", topic.name()));
        }
        assert!("tightening".parse::<Topic>().is_err());
    }
}
