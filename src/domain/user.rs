//! Participant record and program-join state.

use serde::{Deserialize, Serialize};

use super::{Program, Role, TimeMs, UserId, Wallet};

/// A participant. Join flags mutate exactly once per program; repeated join
/// attempts surface as "already joined" rather than re-running side effects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub sponsor_id: Option<UserId>,
    pub wallet: Wallet,
    pub role: Role,
    pub binary_joined: bool,
    pub matrix_joined: bool,
    pub global_joined: bool,
    pub binary_joined_at: Option<TimeMs>,
    pub matrix_joined_at: Option<TimeMs>,
    pub global_joined_at: Option<TimeMs>,
    pub created_at: TimeMs,
}

impl User {
    pub fn has_joined(&self, program: Program) -> bool {
        match program {
            Program::Binary => self.binary_joined,
            Program::Matrix => self.matrix_joined,
            Program::Global => self.global_joined,
        }
    }

    pub fn joined_at(&self, program: Program) -> Option<TimeMs> {
        match program {
            Program::Binary => self.binary_joined_at,
            Program::Matrix => self.matrix_joined_at,
            Program::Global => self.global_joined_at,
        }
    }

    /// True once the user holds all three programs (Spark "triple entry").
    pub fn is_triple_entry(&self) -> bool {
        self.binary_joined && self.matrix_joined && self.global_joined
    }

    /// Whether the strict Binary -> Matrix -> Global order permits joining
    /// `program` now.
    pub fn may_join(&self, program: Program) -> bool {
        match program.prerequisite() {
            None => true,
            Some(required) => self.has_joined(required),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User {
            id: UserId::new("u1".to_string()),
            sponsor_id: None,
            wallet: Wallet::new("0xabc".to_string()),
            role: Role::Normal,
            binary_joined: false,
            matrix_joined: false,
            global_joined: false,
            binary_joined_at: None,
            matrix_joined_at: None,
            global_joined_at: None,
            created_at: TimeMs::new(0),
        }
    }

    #[test]
    fn test_join_sequence_gate() {
        let mut u = user();
        assert!(u.may_join(Program::Binary));
        assert!(!u.may_join(Program::Matrix));
        assert!(!u.may_join(Program::Global));

        u.binary_joined = true;
        assert!(u.may_join(Program::Matrix));
        assert!(!u.may_join(Program::Global));

        u.matrix_joined = true;
        assert!(u.may_join(Program::Global));
    }

    #[test]
    fn test_triple_entry() {
        let mut u = user();
        assert!(!u.is_triple_entry());
        u.binary_joined = true;
        u.matrix_joined = true;
        u.global_joined = true;
        assert!(u.is_triple_entry());
    }
}
