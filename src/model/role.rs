#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Role {
    Admin = 1,
    Hr = 2,
    Lecturer = 3,
    Employee = 4,
    Staff = 5,
}

impl Role {
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(Role::Admin),
            2 => Some(Role::Hr),
            3 => Some(Role::Lecturer),
            4 => Some(Role::Employee),
            5 => Some(Role::Staff),
            _ => None,
        }
    }

    /// HR and admins act as the final (level-2) leave approvers.
    pub fn is_hr_or_admin(self) -> bool {
        matches!(self, Role::Admin | Role::Hr)
    }
}
