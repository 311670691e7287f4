#![no_main]

use libfuzzer_sys::fuzz_target;
use party_game_client::protocol::{decode, EnginePacket, SocketPacket};
use party_game_client::GameEvent;

fuzz_target!(|data: &[u8]| {
    let Ok(frame) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(packet) = decode(frame) else {
        return;
    };

    // Whatever decodes must map to an event without panicking, and
    // re-encode to something that decodes again.
    if let EnginePacket::Message(SocketPacket::Event { name, data, .. }) = &packet {
        let _ = GameEvent::from_wire(name, data.clone());
    }
    if let Ok(encoded) = packet.encode() {
        let _ = decode(&encoded);
    }
});
