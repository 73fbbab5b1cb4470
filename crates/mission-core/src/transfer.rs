use serde::{Deserialize, Serialize};

/// Per MISSION_REQUEST wait during the item loop (spec: TIMEOUT_REQUEST).
pub const TIMEOUT_REQUEST_MS: u64 = 10_000;
/// Final MISSION_ACK wait (spec: TIMEOUT_ACK).
pub const TIMEOUT_ACK_MS: u64 = 5_000;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransferPhase {
    Clearing,
    Announcing,
    TransferItems,
    AwaitAck,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransferProgress {
    pub phase: TransferPhase,
    pub completed_items: u16,
    pub total_items: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransferError {
    pub code: String,
    pub message: String,
}

/// Tracks upload progress through the clear/count/item/ack handshake
/// (spec 4.7). Unlike the teacher's retrying state machine, the handshake
/// here has no built-in retry budget: a single timeout on any step fails
/// the transfer outright, matching the upload_error semantics in spec 4.7.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissionTransferMachine {
    phase: TransferPhase,
    total_items: u16,
    completed_items: u16,
}

impl MissionTransferMachine {
    pub fn new(total_items: u16) -> Self {
        Self {
            phase: TransferPhase::Clearing,
            total_items,
            completed_items: 0,
        }
    }

    pub fn announced(&mut self) {
        self.phase = if self.total_items == 0 {
            TransferPhase::AwaitAck
        } else {
            TransferPhase::TransferItems
        };
    }

    pub fn on_item_transferred(&mut self) {
        if self.phase != TransferPhase::TransferItems {
            return;
        }
        self.completed_items = self.completed_items.saturating_add(1);
        if self.completed_items >= self.total_items {
            self.phase = TransferPhase::AwaitAck;
        }
    }

    pub fn on_ack_success(&mut self) {
        if self.phase == TransferPhase::AwaitAck {
            self.phase = TransferPhase::Completed;
        }
    }

    pub fn fail(&mut self, code: &str, message: &str) -> TransferError {
        self.phase = TransferPhase::Failed;
        TransferError {
            code: code.to_string(),
            message: message.to_string(),
        }
    }

    pub fn progress(&self) -> TransferProgress {
        TransferProgress {
            phase: self.phase,
            completed_items: self.completed_items,
            total_items: self.total_items,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.phase, TransferPhase::Completed | TransferPhase::Failed)
    }

    pub fn timeout_ms(&self) -> u64 {
        match self.phase {
            TransferPhase::AwaitAck => TIMEOUT_ACK_MS,
            _ => TIMEOUT_REQUEST_MS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_flow_reaches_completed() {
        let mut machine = MissionTransferMachine::new(2);
        assert_eq!(machine.progress().phase, TransferPhase::Clearing);
        machine.announced();
        assert_eq!(machine.progress().phase, TransferPhase::TransferItems);
        machine.on_item_transferred();
        assert_eq!(machine.progress().phase, TransferPhase::TransferItems);
        machine.on_item_transferred();
        assert_eq!(machine.progress().phase, TransferPhase::AwaitAck);
        machine.on_ack_success();
        assert_eq!(machine.progress().phase, TransferPhase::Completed);
        assert!(machine.is_terminal());
    }

    #[test]
    fn empty_plan_skips_straight_to_await_ack() {
        let mut machine = MissionTransferMachine::new(0);
        machine.announced();
        assert_eq!(machine.progress().phase, TransferPhase::AwaitAck);
    }

    #[test]
    fn timeout_during_items_fails_immediately() {
        let mut machine = MissionTransferMachine::new(3);
        machine.announced();
        let err = machine.fail("upload_error", "MISSION_REQUEST timed out");
        assert_eq!(err.code, "upload_error");
        assert!(machine.is_terminal());
    }

    #[test]
    fn timeout_ms_switches_with_phase() {
        let mut machine = MissionTransferMachine::new(1);
        assert_eq!(machine.timeout_ms(), TIMEOUT_REQUEST_MS);
        machine.announced();
        machine.on_item_transferred();
        assert_eq!(machine.timeout_ms(), TIMEOUT_ACK_MS);
    }
}
