use tracing::info;

use crate::model::{leave_request::LeaveRequest, task::Task};

/// Outbound notifications. Delivery is not wired up yet, so every event is
/// only written to the log.
#[derive(Debug, Clone, Default)]
pub struct Notifier;

impl Notifier {
    pub fn leave_pending_approval(&self, leave: &LeaveRequest) {
        if let Some(supervisor_id) = leave.supervisor_id {
            info!(
                target: "notification",
                leave_id = leave.id,
                recipient = supervisor_id,
                requester = leave.user_id,
                days = leave.total_days,
                "Leave request awaiting approval"
            );
        }
    }

    pub fn leave_approved(&self, leave: &LeaveRequest, level: u8) {
        info!(
            target: "notification",
            leave_id = leave.id,
            recipient = leave.user_id,
            level,
            status = %leave.status,
            "Leave request approved"
        );
    }

    pub fn leave_rejected(&self, leave: &LeaveRequest) {
        info!(
            target: "notification",
            leave_id = leave.id,
            recipient = leave.user_id,
            reason = leave.rejection_reason.as_deref().unwrap_or(""),
            "Leave request rejected"
        );
    }

    pub fn task_assigned(&self, task: &Task) {
        info!(
            target: "notification",
            task_id = task.id,
            recipient = task.assigned_to_id,
            priority = %task.priority,
            "Task assigned"
        );
    }

    pub fn task_completed(&self, task: &Task) {
        info!(
            target: "notification",
            task_id = task.id,
            recipient = task.assigned_by_id,
            "Task completed"
        );
    }
}
