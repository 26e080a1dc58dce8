//! Nordic UART Service constants and helpers

use uartlink_core::PeerId;
use uuid::Uuid;

// ----------------------------------------------------------------------------
// BLE Service and Characteristic UUIDs
// ----------------------------------------------------------------------------

/// Nordic UART Service
pub const NUS_SERVICE_UUID: Uuid = Uuid::from_u128(0x6E400001_B5A3_F393_E0A9_E50E24DCCA9E);

/// Characteristic the central writes to (peer's RX)
pub const NUS_RX_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0x6E400002_B5A3_F393_E0A9_E50E24DCCA9E);

/// Characteristic the peer notifies on (peer's TX)
pub const NUS_TX_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0x6E400003_B5A3_F393_E0A9_E50E24DCCA9E);

// ----------------------------------------------------------------------------
// Helpers
// ----------------------------------------------------------------------------

/// Whether a discovered characteristic set exposes a usable UART
pub fn supports_uart<'a>(characteristics: impl IntoIterator<Item = &'a Uuid>) -> bool {
    let mut rx = false;
    let mut tx = false;
    for uuid in characteristics {
        rx |= *uuid == NUS_RX_CHARACTERISTIC_UUID;
        tx |= *uuid == NUS_TX_CHARACTERISTIC_UUID;
    }
    rx && tx
}

/// Whether an advertised device is the requested peer
///
/// Peers are matched by hardware address or advertised name, both
/// case-insensitively. Some platforms hide the address, so the name is the
/// only handle there.
pub fn matches_peer(peer: &PeerId, address: &str, local_name: Option<&str>) -> bool {
    peer.matches(address) || local_name.is_some_and(|name| peer.matches(name))
}

/// Split a payload into GATT-sized writes
pub fn chunk_payload(data: &[u8], chunk_size: usize) -> impl Iterator<Item = &[u8]> {
    data.chunks(chunk_size.max(1))
}
