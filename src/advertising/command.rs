/// hcitool command generation for replaying a captured payload
use crate::advertising::encoder::{EncodedPayload, MAX_ADV_PAYLOAD_LEN};
use crate::utils::hex_bytes;

// HCI_LE_Set_Advertising_Data: OGF 0x08 (LE controller), OCF 0x0008
const LE_CONTROLLER_OGF: &str = "0x08";
const SET_ADVERTISING_DATA_OCF: &str = "0x0008";

/// Fixed invocation prefix naming the target radio interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    pub interface: String,
}

impl CommandTemplate {
    pub fn new(interface: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
        }
    }

    fn prefix(&self) -> String {
        format!(
            "sudo hcitool -i {} cmd {} {}",
            self.interface, LE_CONTROLLER_OGF, SET_ADVERTISING_DATA_OCF
        )
    }

    /// Turn an encoded payload into a replayable command string
    ///
    /// The controller always receives 32 parameter bytes: the significant data
    /// length followed by the payload zero-padded to 31 bytes. Returns `None`
    /// for an empty payload.
    pub fn to_command(&self, payload: &EncodedPayload) -> Option<String> {
        if payload.is_empty() {
            return None;
        }

        let mut params = Vec::with_capacity(MAX_ADV_PAYLOAD_LEN + 1);
        params.push(payload.len() as u8);
        params.extend_from_slice(payload.as_bytes());
        params.resize(MAX_ADV_PAYLOAD_LEN + 1, 0x00);

        Some(format!("{} {}", self.prefix(), hex_bytes(&params)))
    }
}

impl Default for CommandTemplate {
    fn default() -> Self {
        Self::new("hci0")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens_after_opcode(command: &str) -> Vec<&str> {
        let mut parts = command.split(' ');
        parts
            .by_ref()
            .find(|part| *part == SET_ADVERTISING_DATA_OCF)
            .expect("opcode present");
        parts.collect()
    }

    #[test]
    fn empty_payload_has_no_command() {
        assert_eq!(CommandTemplate::default().to_command(&EncodedPayload::default()), None);
    }

    #[test]
    fn pads_to_fixed_width() {
        let payload =
            EncodedPayload::from_bytes(vec![0x02, 0x01, 0x06, 0x05, 0x09, 0x54, 0x65, 0x73, 0x74]);
        let command = CommandTemplate::default().to_command(&payload).unwrap();

        let expected_tail = format!("09 02 01 06 05 09 54 65 73 74{}", " 00".repeat(22));
        assert_eq!(
            command,
            format!("sudo hcitool -i hci0 cmd 0x08 0x0008 {}", expected_tail)
        );
    }

    #[test]
    fn always_emits_32_parameter_bytes() {
        for len in 1..=MAX_ADV_PAYLOAD_LEN {
            let payload = EncodedPayload::from_bytes(vec![0xAB; len]);
            let command = CommandTemplate::new("hci1").to_command(&payload).unwrap();
            let tokens = tokens_after_opcode(&command);

            assert_eq!(tokens.len(), 32);
            assert_eq!(tokens[0], format!("{:02X}", len));
            assert!(tokens
                .iter()
                .all(|t| t.len() == 2 && t.chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase())));
        }
    }

    #[test]
    fn interface_is_part_of_prefix() {
        let payload = EncodedPayload::from_bytes(vec![0x02, 0x01, 0x06]);
        let command = CommandTemplate::new("hci3").to_command(&payload).unwrap();
        assert!(command.starts_with("sudo hcitool -i hci3 cmd 0x08 0x0008 03 02 01 06 00"));
    }
}
