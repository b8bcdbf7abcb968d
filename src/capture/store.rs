/// Deduplicating store of captured advertising payloads
use std::sync::{Arc, Mutex, MutexGuard};

use log::debug;
use time::OffsetDateTime;

use crate::advertising::{encode, CommandTemplate, EncodeDiagnostic};
use crate::models::{AdvertisementObservation, CapturedPacket, CommandEntry};

/// Name recorded for devices that did not advertise one
const UNKNOWN_NAME: &str = "Unknown";

/// Store handle shared between the scanner task and the session owner
pub type SharedStore = Arc<Mutex<CaptureStore>>;

/// What happened to an observation handed to [`CaptureStore::observe`]
#[derive(Debug)]
pub struct Observed<'a> {
    pub packet: &'a CapturedPacket,
    pub is_new: bool,
    pub diagnostics: Vec<EncodeDiagnostic>,
}

/// Ordered set of distinct (address, payload) captures for one session
///
/// Packets are kept in first-seen order and never removed. A repeated
/// observation only refreshes the RSSI and timestamp of the packet it matches.
#[derive(Debug, Default)]
pub struct CaptureStore {
    packets: Vec<CapturedPacket>,
    template: CommandTemplate,
}

impl CaptureStore {
    pub fn new(template: CommandTemplate) -> Self {
        Self {
            packets: Vec::new(),
            template,
        }
    }

    pub fn into_shared(self) -> SharedStore {
        Arc::new(Mutex::new(self))
    }

    /// Record an observation stamped with the current time
    pub fn observe(&mut self, observation: &AdvertisementObservation) -> Observed<'_> {
        self.observe_at(observation, OffsetDateTime::now_utc())
    }

    /// Record an observation
    ///
    /// The payload is encoded first and used together with the address as the
    /// dedup key (exact byte equality). A match keeps its position and command.
    ///
    /// # Arguments
    /// * `observation` - Parsed advertisement from the scanner
    /// * `now` - Timestamp to store on the new or refreshed packet
    ///
    /// # Returns
    /// The stored packet, whether it was newly created, and encoder diagnostics
    pub fn observe_at(
        &mut self,
        observation: &AdvertisementObservation,
        now: OffsetDateTime,
    ) -> Observed<'_> {
        let encoded = encode(observation);

        let existing = self
            .packets
            .iter()
            .position(|p| p.address == observation.address && p.payload == encoded.payload);

        let (index, is_new) = match existing {
            Some(index) => {
                let packet = &mut self.packets[index];
                packet.rssi = observation.rssi;
                packet.timestamp = now;
                debug!(
                    "Refreshed {} (rssi {} dBm)",
                    packet.address, packet.rssi
                );
                (index, false)
            }
            None => {
                let command = self.template.to_command(&encoded.payload);
                self.packets.push(CapturedPacket {
                    address: observation.address.clone(),
                    name: observation
                        .name
                        .clone()
                        .filter(|name| !name.is_empty())
                        .unwrap_or_else(|| UNKNOWN_NAME.to_string()),
                    rssi: observation.rssi,
                    timestamp: now,
                    payload: encoded.payload,
                    command,
                });
                (self.packets.len() - 1, true)
            }
        };

        Observed {
            packet: &self.packets[index],
            is_new,
            diagnostics: encoded.diagnostics,
        }
    }

    /// Append a packet as-is, bypassing encoding and dedup
    #[cfg(test)]
    pub(crate) fn push_packet(&mut self, packet: CapturedPacket) {
        self.packets.push(packet);
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&CapturedPacket> {
        self.packets.get(index)
    }

    /// Packets in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &CapturedPacket> {
        self.packets.iter()
    }

    /// Every packet that produced a command, in insertion order
    pub fn commands(&self) -> Vec<CommandEntry> {
        self.packets
            .iter()
            .filter_map(|p| {
                p.command.as_ref().map(|command| CommandEntry {
                    name: p.name.clone(),
                    address: p.address.clone(),
                    command: command.clone(),
                })
            })
            .collect()
    }
}

/// Lock a shared store, recovering the data if a holder panicked
pub fn lock_store(store: &SharedStore) -> MutexGuard<'_, CaptureStore> {
    store.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn observation(address: &str, name: &str, rssi: i16) -> AdvertisementObservation {
        AdvertisementObservation {
            address: address.to_string(),
            name: Some(name.to_string()),
            rssi,
            ..Default::default()
        }
    }

    #[test]
    fn first_observation_creates_packet() {
        let mut store = CaptureStore::default();
        let observed = store.observe_at(
            &observation("AA:BB:CC:DD:EE:FF", "Test", -42),
            datetime!(2024-01-01 12:00:00 UTC),
        );

        assert!(observed.is_new);
        assert_eq!(observed.packet.name, "Test");
        assert_eq!(observed.packet.payload.to_hex(), "02 01 06 05 09 54 65 73 74");
        assert!(observed
            .packet
            .command
            .as_deref()
            .unwrap()
            .starts_with("sudo hcitool -i hci0 cmd 0x08 0x0008 09 02 01 06"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn repeat_updates_rssi_and_timestamp_only() {
        let mut store = CaptureStore::default();
        store.observe_at(
            &observation("AA:AA:AA:AA:AA:AA", "first", -70),
            datetime!(2024-01-01 12:00:00 UTC),
        );
        store.observe_at(
            &observation("BB:BB:BB:BB:BB:BB", "second", -60),
            datetime!(2024-01-01 12:00:01 UTC),
        );
        let command_before = store.get(0).unwrap().command.clone();

        let later = datetime!(2024-01-01 12:05:00 UTC);
        let observed = store.observe_at(&observation("AA:AA:AA:AA:AA:AA", "first", -50), later);

        assert!(!observed.is_new);
        assert_eq!(store.len(), 2);
        let packet = store.get(0).unwrap();
        assert_eq!(packet.address, "AA:AA:AA:AA:AA:AA");
        assert_eq!(packet.rssi, -50);
        assert_eq!(packet.timestamp, later);
        assert_eq!(packet.command, command_before);
    }

    #[test]
    fn new_payload_from_same_address_is_distinct() {
        let mut store = CaptureStore::default();
        store.observe(&observation("AA:AA:AA:AA:AA:AA", "one", -70));
        let observed = store.observe(&observation("AA:AA:AA:AA:AA:AA", "two", -70));

        assert!(observed.is_new);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn same_payload_from_other_address_is_distinct() {
        let mut store = CaptureStore::default();
        store.observe(&observation("AA:AA:AA:AA:AA:AA", "beacon", -70));
        store.observe(&observation("BB:BB:BB:BB:BB:BB", "beacon", -70));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn missing_name_is_recorded_as_unknown() {
        let mut store = CaptureStore::default();
        let obs = AdvertisementObservation {
            address: "CC:CC:CC:CC:CC:CC".to_string(),
            rssi: -80,
            ..Default::default()
        };
        assert_eq!(store.observe(&obs).packet.name, UNKNOWN_NAME);
    }

    #[test]
    fn empty_name_is_recorded_as_unknown() {
        let mut store = CaptureStore::default();
        let observed = store.observe(&observation("DD:DD:DD:DD:DD:DD", "", -80));

        assert_eq!(observed.packet.name, UNKNOWN_NAME);
        assert_eq!(observed.packet.payload.to_hex(), "02 01 06");
        assert_eq!(store.commands()[0].name, UNKNOWN_NAME);
    }

    #[test]
    fn command_listing_follows_insertion_order() {
        let mut store = CaptureStore::new(CommandTemplate::new("hci1"));
        store.observe(&observation("AA:AA:AA:AA:AA:AA", "one", -70));
        store.observe(&observation("BB:BB:BB:BB:BB:BB", "two", -70));

        let commands = store.commands();
        assert_eq!(commands.len(), 2);
        assert_eq!(commands[0].name, "one");
        assert_eq!(commands[1].address, "BB:BB:BB:BB:BB:BB");
        assert!(commands[1].command.starts_with("sudo hcitool -i hci1 "));
    }

    #[test]
    fn diagnostics_are_passed_through() {
        let mut store = CaptureStore::default();
        let mut obs = observation("AA:AA:AA:AA:AA:AA", "x", -1);
        obs.service_uuids = vec!["nope".to_string()];

        let observed = store.observe(&obs);
        assert_eq!(observed.diagnostics.len(), 1);
        assert!(observed.diagnostics[0].is_parse_skipped());
    }

    #[test]
    fn shared_store_locks() {
        let shared = CaptureStore::default().into_shared();
        lock_store(&shared).observe(&observation("AA:AA:AA:AA:AA:AA", "x", -1));
        assert_eq!(lock_store(&shared).len(), 1);
    }
}
