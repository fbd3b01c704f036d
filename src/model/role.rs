#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Role {
    Admin,
    Staff,
}

impl Role {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "admin" => Some(Role::Admin),
            "staff" => Some(Role::Staff),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Staff => "staff",
        }
    }
}
