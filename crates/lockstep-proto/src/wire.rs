// SPDX-License-Identifier: Apache-2.0
//! Hand-rolled fixed-offset codec for the performance-sensitive game-sync
//! payloads (FRAME_DATA, SYNC_CHECK), reusing [`lockstep_event::Event`]'s
//! own encode/decode for the embedded command list.

use lockstep_event::Event;

use crate::error::ProtocolError;

/// FRAME_DATA body: one peer's submitted commands for one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameDataPayload {
    /// The frame these commands are admitted for.
    pub frame: u32,
    /// Commands this peer submitted, in submission order.
    pub events: Vec<Event>,
}

impl FrameDataPayload {
    pub(crate) fn encode(&self, out: &mut Vec<u8>) -> Result<(), ProtocolError> {
        let command_count = u16::try_from(self.events.len())
            .map_err(|_| ProtocolError::MalformedGameSync("more than u16::MAX commands in one frame"))?;
        out.extend_from_slice(&self.frame.to_le_bytes());
        out.extend_from_slice(&command_count.to_le_bytes());
        for event in &self.events {
            out.extend_from_slice(&event.encode());
        }
        Ok(())
    }

    pub(crate) fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        if bytes.len() < 6 {
            return Err(ProtocolError::MalformedGameSync("frame_data body shorter than its fixed prefix"));
        }
        let frame = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let command_count = u16::from_le_bytes([bytes[4], bytes[5]]);
        let mut cursor = 6usize;
        let mut events = Vec::with_capacity(command_count as usize);
        for _ in 0..command_count {
            let (event, consumed) = Event::decode(&bytes[cursor..])?;
            events.push(event);
            cursor += consumed;
        }
        Ok(Self { frame, events })
    }
}

/// SYNC_CHECK body: one peer's folded state hash for one sync frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncCheckPayload {
    /// The sync frame this hash was computed at.
    pub frame: u32,
    /// The folded CRC-32.
    pub crc: u32,
}

impl SyncCheckPayload {
    pub(crate) fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.frame.to_le_bytes());
        out.extend_from_slice(&self.crc.to_le_bytes());
    }

    pub(crate) fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        if bytes.len() < 8 {
            return Err(ProtocolError::MalformedGameSync("sync_check body is not 8 bytes"));
        }
        let frame = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let crc = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        Ok(Self { frame, crc })
    }
}
