use time::OffsetDateTime;

use crate::advertising::EncodedPayload;

/// One parsed advertisement event as delivered by the scanner
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdvertisementObservation {
    pub address: String,
    pub name: Option<String>,
    pub rssi: i16,
    pub service_uuids: Vec<String>,
    pub service_data: Vec<(String, Vec<u8>)>,
    pub manufacturer_data: Vec<(u16, Vec<u8>)>,
}

#[derive(Debug, Clone)]
pub struct CapturedPacket {
    pub address: String,
    pub name: String,
    pub rssi: i16,
    pub timestamp: OffsetDateTime,
    pub payload: EncodedPayload,
    pub command: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandEntry {
    pub name: String,
    pub address: String,
    pub command: String,
}
