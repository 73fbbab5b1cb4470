//! Fake `MavConnection` used across this crate's unit tests. Mirrors the
//! teacher's mock: a fixed queue of inbound frames and a capture buffer for
//! outbound ones, so a handshake can be scripted and replayed deterministically.
use mavlink::common;
use mavlink::error::{MessageReadError, MessageWriteError};
use mavlink::{MAVLinkMessageRaw, MavConnection, MavFrame, MavHeader, MavlinkVersion};
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::link::Link;

pub struct MockConnection {
    protocol_version: Mutex<MavlinkVersion>,
    allow_any: Mutex<bool>,
    incoming: Mutex<VecDeque<(MavHeader, common::MavMessage)>>,
    sent: Mutex<Vec<common::MavMessage>>,
}

impl MockConnection {
    pub fn new(messages: Vec<common::MavMessage>) -> Self {
        Self::with_header(
            messages,
            MavHeader {
                sequence: 1,
                system_id: 1,
                component_id: 1,
            },
        )
    }

    pub fn with_header(messages: Vec<common::MavMessage>, header: MavHeader) -> Self {
        Self {
            protocol_version: Mutex::new(MavlinkVersion::V2),
            allow_any: Mutex::new(true),
            incoming: Mutex::new(messages.into_iter().map(|m| (header, m)).collect()),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, header: MavHeader, message: common::MavMessage) {
        self.incoming.lock().expect("incoming lock").push_back((header, message));
    }

    pub fn sent_messages(&self) -> Vec<common::MavMessage> {
        self.sent.lock().expect("sent lock").clone()
    }
}

impl MavConnection<common::MavMessage> for MockConnection {
    fn recv(&self) -> Result<(MavHeader, common::MavMessage), MessageReadError> {
        self.try_recv()
    }

    fn recv_raw(&self) -> Result<MAVLinkMessageRaw, MessageReadError> {
        Err(MessageReadError::Io(std::io::ErrorKind::WouldBlock.into()))
    }

    fn try_recv(&self) -> Result<(MavHeader, common::MavMessage), MessageReadError> {
        if let Some(message) = self.incoming.lock().expect("incoming lock").pop_front() {
            Ok(message)
        } else {
            Err(MessageReadError::Io(std::io::ErrorKind::WouldBlock.into()))
        }
    }

    fn send(&self, _header: &MavHeader, data: &common::MavMessage) -> Result<usize, MessageWriteError> {
        self.sent.lock().expect("sent lock").push(data.clone());
        Ok(1)
    }

    fn set_protocol_version(&mut self, version: MavlinkVersion) {
        *self.protocol_version.lock().expect("protocol lock") = version;
    }

    fn protocol_version(&self) -> MavlinkVersion {
        *self.protocol_version.lock().expect("protocol lock")
    }

    fn set_allow_recv_any_version(&mut self, allow: bool) {
        *self.allow_any.lock().expect("allow lock") = allow;
    }

    fn allow_recv_any_version(&self) -> bool {
        *self.allow_any.lock().expect("allow lock")
    }

    fn send_frame(&self, frame: &MavFrame<common::MavMessage>) -> Result<usize, MessageWriteError> {
        self.send(&frame.header, &frame.msg)
    }
}

pub fn mock_link(messages: Vec<common::MavMessage>) -> Link {
    Link::from_connection(Box::new(MockConnection::new(messages)), 250, 1)
}

/// Wraps a `MockConnection` behind `Arc` so the handle stays reachable after
/// `Link` boxes it, letting a test inspect `sent_messages()` afterwards.
struct SharedMock(std::sync::Arc<MockConnection>);

impl MavConnection<common::MavMessage> for SharedMock {
    fn recv(&self) -> Result<(MavHeader, common::MavMessage), MessageReadError> {
        self.0.try_recv()
    }

    fn recv_raw(&self) -> Result<MAVLinkMessageRaw, MessageReadError> {
        self.0.recv_raw()
    }

    fn try_recv(&self) -> Result<(MavHeader, common::MavMessage), MessageReadError> {
        self.0.try_recv()
    }

    fn send(&self, header: &MavHeader, data: &common::MavMessage) -> Result<usize, MessageWriteError> {
        self.0.send(header, data)
    }

    fn set_protocol_version(&mut self, version: MavlinkVersion) {
        *self.0.protocol_version.lock().expect("protocol lock") = version;
    }

    fn protocol_version(&self) -> MavlinkVersion {
        self.0.protocol_version()
    }

    fn set_allow_recv_any_version(&mut self, allow: bool) {
        *self.0.allow_any.lock().expect("allow lock") = allow;
    }

    fn allow_recv_any_version(&self) -> bool {
        self.0.allow_recv_any_version()
    }

    fn send_frame(&self, frame: &MavFrame<common::MavMessage>) -> Result<usize, MessageWriteError> {
        self.0.send_frame(frame)
    }
}

/// Like `mock_link`, but also returns the concrete `MockConnection` handle
/// so a test can assert on `sent_messages()` after the `Link` is used.
pub fn mock_link_with_handle(messages: Vec<common::MavMessage>) -> (Link, std::sync::Arc<MockConnection>) {
    let mock = std::sync::Arc::new(MockConnection::new(messages));
    let link = Link::from_connection(Box::new(SharedMock(mock.clone())), 250, 1);
    (link, mock)
}

pub fn heartbeat(system_id: u8, custom_mode: u32, base_mode: common::MavModeFlag) -> (MavHeader, common::MavMessage) {
    (
        MavHeader {
            sequence: 0,
            system_id,
            component_id: 1,
        },
        common::MavMessage::HEARTBEAT(common::HEARTBEAT_DATA {
            custom_mode,
            mavtype: common::MavType::MAV_TYPE_QUADROTOR,
            autopilot: common::MavAutopilot::MAV_AUTOPILOT_ARDUPILOTMEGA,
            base_mode,
            system_status: common::MavState::MAV_STATE_ACTIVE,
            mavlink_version: 3,
        }),
    )
}
