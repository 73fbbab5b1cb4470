use crate::error::CoreError;
use mavlink::common;
use mavlink::{MavConnection, MavHeader};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

/// One UDP endpoint to a single UAV. `recv`/`recv_match` poll the underlying
/// non-blocking connection with a short backoff, matching the
/// `try_recv` + sleep pattern the rest of the corpus uses for sync MAVLink
/// connections (there is no blocking-with-timeout primitive on
/// `MavConnection` itself).
pub struct Link {
    connection: Box<dyn MavConnection<common::MavMessage> + Send + Sync>,
    gcs_system_id: u8,
    gcs_component_id: u8,
    target: Mutex<Option<(u8, u8)>>,
}

const POLL_BACKOFF: Duration = Duration::from_millis(8);

impl Link {
    pub fn connect(peer_host: &str, port: u16, gcs_system_id: u8, gcs_component_id: u8) -> Result<Self, CoreError> {
        let address = format!("udpin:{peer_host}:{port}");
        let mut connection = mavlink::connect::<common::MavMessage>(&address)
            .map_err(|err| CoreError::TransportError(format!("connect to {address}: {err}")))?;
        connection.set_allow_recv_any_version(true);
        Ok(Self {
            connection: Box::new(connection),
            gcs_system_id,
            gcs_component_id,
            target: Mutex::new(None),
        })
    }

    #[cfg(test)]
    pub(crate) fn from_connection(
        connection: Box<dyn MavConnection<common::MavMessage> + Send + Sync>,
        gcs_system_id: u8,
        gcs_component_id: u8,
    ) -> Self {
        Self {
            connection,
            gcs_system_id,
            gcs_component_id,
            target: Mutex::new(None),
        }
    }

    fn header(&self) -> MavHeader {
        MavHeader {
            system_id: self.gcs_system_id,
            component_id: self.gcs_component_id,
            sequence: 0,
        }
    }

    pub fn send_mavlink(&self, message: common::MavMessage) -> Result<(), CoreError> {
        self.connection.send(&self.header(), &message)?;
        Ok(())
    }

    pub fn send_heartbeat(
        &self,
        mavtype: common::MavType,
        autopilot: common::MavAutopilot,
        base_mode: common::MavModeFlag,
        custom_mode: u32,
        system_status: common::MavState,
    ) -> Result<(), CoreError> {
        self.send_mavlink(common::MavMessage::HEARTBEAT(common::HEARTBEAT_DATA {
            custom_mode,
            mavtype,
            autopilot,
            base_mode,
            system_status,
            mavlink_version: 3,
        }))
    }

    /// Blocks up to `timeout`, returning `None` on timeout rather than an error.
    pub fn recv(&self, timeout: Duration) -> Result<Option<(MavHeader, common::MavMessage)>, CoreError> {
        let started = Instant::now();
        loop {
            match self.connection.try_recv() {
                Ok((header, message)) => {
                    self.remember_target(&header, &message);
                    return Ok(Some((header, message)));
                }
                Err(err) => {
                    if !is_non_fatal(&err) {
                        return Err(err.into());
                    }
                    if started.elapsed() >= timeout {
                        return Ok(None);
                    }
                    thread::sleep(POLL_BACKOFF);
                }
            }
        }
    }

    /// Blocks up to `timeout` for a message matching `predicate`.
    pub fn recv_match<F>(&self, timeout: Duration, mut predicate: F) -> Result<Option<common::MavMessage>, CoreError>
    where
        F: FnMut(&common::MavMessage) -> bool,
    {
        let started = Instant::now();
        loop {
            let remaining = timeout.saturating_sub(started.elapsed());
            if remaining.is_zero() {
                return Ok(None);
            }
            match self.recv(remaining)? {
                Some((_, message)) => {
                    if predicate(&message) {
                        return Ok(Some(message));
                    }
                }
                None => return Ok(None),
            }
        }
    }

    fn remember_target(&self, header: &MavHeader, message: &common::MavMessage) {
        if header.system_id == 0 {
            return;
        }
        let mut target = self.target.lock().expect("link target lock poisoned");
        if target.is_none() || matches!(message, common::MavMessage::HEARTBEAT(_)) {
            *target = Some((header.system_id, header.component_id));
        }
    }

    pub fn target(&self) -> Option<(u8, u8)> {
        *self.target.lock().expect("link target lock poisoned")
    }

    pub fn close(&self) {
        // The underlying UDP socket is released when the connection is dropped;
        // there is no explicit shutdown on `MavConnection`.
    }
}

fn is_non_fatal(error: &mavlink::error::MessageReadError) -> bool {
    match error {
        mavlink::error::MessageReadError::Io(io_error) => {
            io_error.kind() == std::io::ErrorKind::WouldBlock
                || io_error.kind() == std::io::ErrorKind::TimedOut
        }
        _ => false,
    }
}
