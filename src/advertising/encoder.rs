/// Advertising Data (AD) structure encoding
///
/// Rebuilds the raw advertising payload of a BLE peripheral from the parsed
/// fields reported by the scanner. Every AD structure is laid out as
/// `[length][type][payload]` where `length` counts the type byte plus payload.
use std::fmt;

use crate::models::AdvertisementObservation;

// Assigned numbers for the AD types we emit
const AD_TYPE_FLAGS: u8 = 0x01;
const AD_TYPE_COMPLETE_16BIT_UUIDS: u8 = 0x03;
const AD_TYPE_COMPLETE_LOCAL_NAME: u8 = 0x09;
const AD_TYPE_SERVICE_DATA_16BIT: u8 = 0x16;
const AD_TYPE_MANUFACTURER_DATA: u8 = 0xFF;

/// LE General Discoverable Mode | BR/EDR Not Supported
const FLAGS_GENERAL_DISCOVERABLE: u8 = 0x06;

/// Maximum size of a legacy advertising payload
pub const MAX_ADV_PAYLOAD_LEN: usize = 31;

/// Longest local name that still fits with its length and type bytes
const MAX_LOCAL_NAME_LEN: usize = MAX_ADV_PAYLOAD_LEN - 2;

/// Character count of a dashed 128-bit UUID
const CANONICAL_UUID_LEN: usize = 36;

/// A single length-type-value structure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdElement {
    pub ad_type: u8,
    pub payload: Vec<u8>,
}

impl AdElement {
    pub fn new(ad_type: u8, payload: Vec<u8>) -> Self {
        Self { ad_type, payload }
    }

    /// Value of the length byte (type byte + payload)
    pub fn length_field(&self) -> usize {
        self.payload.len() + 1
    }

    pub fn write_to(&self, out: &mut Vec<u8>) {
        // length_field() is checked against MAX_ADV_PAYLOAD_LEN before elements are built
        out.push(self.length_field() as u8);
        out.push(self.ad_type);
        out.extend_from_slice(&self.payload);
    }
}

/// Concatenated AD structures, never longer than 31 bytes
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct EncodedPayload(Vec<u8>);

impl EncodedPayload {
    /// Hard-cuts `bytes` to the advertising limit. Element boundaries are not respected.
    pub fn from_bytes(mut bytes: Vec<u8>) -> Self {
        bytes.truncate(MAX_ADV_PAYLOAD_LEN);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Uppercase, space separated hex dump (e.g. `02 01 06`)
    pub fn to_hex(&self) -> String {
        crate::utils::hex_bytes(&self.0)
    }
}

/// Which AD structure a diagnostic refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    ServiceUuid,
    ServiceData,
    ManufacturerData,
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ElementKind::ServiceUuid => "service UUID",
            ElementKind::ServiceData => "service data",
            ElementKind::ManufacturerData => "manufacturer data",
        };
        f.write_str(label)
    }
}

/// Non-fatal anomalies hit while encoding. The payload is unaffected by these;
/// they only make the dropped or cut data observable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodeDiagnostic {
    /// A UUID string could not be reduced to 16 bits, its element was skipped
    ParseSkipped { kind: ElementKind, uuid: String },
    /// An element would have exceeded 31 bytes and was dropped whole
    ElementOverflow { kind: ElementKind, length: usize },
    /// The concatenation was cut to 31 bytes
    PayloadTruncated { original_len: usize },
}

impl EncodeDiagnostic {
    pub fn is_parse_skipped(&self) -> bool {
        matches!(self, EncodeDiagnostic::ParseSkipped { .. })
    }
}

impl fmt::Display for EncodeDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodeDiagnostic::ParseSkipped { kind, uuid } => {
                write!(f, "skipped {} with unparsable UUID '{}'", kind, uuid)
            }
            EncodeDiagnostic::ElementOverflow { kind, length } => write!(
                f,
                "dropped {} element of length {} (limit {})",
                kind, length, MAX_ADV_PAYLOAD_LEN
            ),
            EncodeDiagnostic::PayloadTruncated { original_len } => write!(
                f,
                "payload of {} bytes truncated to {}",
                original_len, MAX_ADV_PAYLOAD_LEN
            ),
        }
    }
}

/// Result of encoding one observation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoded {
    pub payload: EncodedPayload,
    pub diagnostics: Vec<EncodeDiagnostic>,
}

/// Reduce a UUID string from a service UUID list to its 16-bit form
///
/// Dashed 128-bit UUIDs use their first group, anything else is read as a
/// bare hex number. Either way only the low 16 bits are kept, so
/// `0000180f-0000-1000-8000-00805f9b34fb` and `180f` both give `0x180F`.
pub fn parse_uuid16(uuid: &str) -> Option<u16> {
    if uuid.chars().count() == CANONICAL_UUID_LEN {
        parse_leading_uuid16(uuid)
    } else {
        parse_hex_low16(uuid)
    }
}

/// Reduce the first dash-delimited group of a UUID string to 16 bits
///
/// Used for service data keys, where short and long forms are treated alike.
pub fn parse_leading_uuid16(uuid: &str) -> Option<u16> {
    uuid.split('-').next().and_then(parse_hex_low16)
}

fn parse_hex_low16(text: &str) -> Option<u16> {
    let text = text.trim();
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }

    // Masking to 16 bits only needs the last four hex digits
    let low = &digits[digits.len().saturating_sub(4)..];
    u16::from_str_radix(low, 16).ok()
}

/// Build the AD elements for an observation in their fixed order
///
/// Flags, local name, 16-bit service UUIDs, service data and manufacturer data,
/// each list in the order the scanner reported it.
pub fn build_elements(
    observation: &AdvertisementObservation,
    diagnostics: &mut Vec<EncodeDiagnostic>,
) -> Vec<AdElement> {
    let mut elements = vec![AdElement::new(
        AD_TYPE_FLAGS,
        vec![FLAGS_GENERAL_DISCOVERABLE],
    )];

    if let Some(name) = observation.name.as_deref() {
        let bytes = name.as_bytes();
        let name_bytes = &bytes[..bytes.len().min(MAX_LOCAL_NAME_LEN)];
        if !name_bytes.is_empty() {
            elements.push(AdElement::new(
                AD_TYPE_COMPLETE_LOCAL_NAME,
                name_bytes.to_vec(),
            ));
        }
    }

    for uuid in &observation.service_uuids {
        match parse_uuid16(uuid) {
            Some(value) => elements.push(AdElement::new(
                AD_TYPE_COMPLETE_16BIT_UUIDS,
                value.to_le_bytes().to_vec(),
            )),
            None => diagnostics.push(EncodeDiagnostic::ParseSkipped {
                kind: ElementKind::ServiceUuid,
                uuid: uuid.clone(),
            }),
        }
    }

    for (uuid, data) in &observation.service_data {
        let Some(value) = parse_leading_uuid16(uuid) else {
            diagnostics.push(EncodeDiagnostic::ParseSkipped {
                kind: ElementKind::ServiceData,
                uuid: uuid.clone(),
            });
            continue;
        };
        if let Some(element) = prefixed_element(
            AD_TYPE_SERVICE_DATA_16BIT,
            ElementKind::ServiceData,
            value,
            data,
            diagnostics,
        ) {
            elements.push(element);
        }
    }

    for (company_id, data) in &observation.manufacturer_data {
        if let Some(element) = prefixed_element(
            AD_TYPE_MANUFACTURER_DATA,
            ElementKind::ManufacturerData,
            *company_id,
            data,
            diagnostics,
        ) {
            elements.push(element);
        }
    }

    elements
}

/// Element whose payload is a little-endian 16-bit id followed by raw data.
/// Dropped (not truncated) when its length byte would exceed 31.
fn prefixed_element(
    ad_type: u8,
    kind: ElementKind,
    id: u16,
    data: &[u8],
    diagnostics: &mut Vec<EncodeDiagnostic>,
) -> Option<AdElement> {
    let length = 2 + data.len() + 1;
    if length > MAX_ADV_PAYLOAD_LEN {
        diagnostics.push(EncodeDiagnostic::ElementOverflow { kind, length });
        return None;
    }

    let mut payload = Vec::with_capacity(2 + data.len());
    payload.extend_from_slice(&id.to_le_bytes());
    payload.extend_from_slice(data);
    Some(AdElement::new(ad_type, payload))
}

/// Encode an observation into its advertising payload
///
/// The encoder never fails. Anything it has to drop or cut is reported in
/// `diagnostics`, and the payload is always at most 31 bytes, starting with
/// the flags structure `02 01 06`.
///
/// # Arguments
/// * `observation` - Parsed advertisement fields from the scanner
///
/// # Returns
/// Encoded payload plus the diagnostics collected on the way
pub fn encode(observation: &AdvertisementObservation) -> Encoded {
    let mut diagnostics = Vec::new();
    let elements = build_elements(observation, &mut diagnostics);

    let mut bytes = Vec::with_capacity(MAX_ADV_PAYLOAD_LEN);
    for element in &elements {
        element.write_to(&mut bytes);
    }

    if bytes.len() > MAX_ADV_PAYLOAD_LEN {
        diagnostics.push(EncodeDiagnostic::PayloadTruncated {
            original_len: bytes.len(),
        });
    }

    Encoded {
        payload: EncodedPayload::from_bytes(bytes),
        diagnostics,
    }
}
