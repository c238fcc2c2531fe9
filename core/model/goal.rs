use std::str::FromStr;
use thiserror::*;

/// The role a package is being built for. The same package may need different
/// artifacts depending on why it is being built, so the target cache is keyed
/// by `(import path, Goal)`.
///
#[derive(Default, Debug, Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub enum Goal {
    /// Build the package as a library dependency. The consumable artifact is
    /// its archive.
    #[default]
    Library,

    /// Build the package as a command. The artifact is a linked executable.
    Command,

    /// Build the package together with its test sources into a test archive.
    Test,
}

#[derive(Error, Debug)]
pub enum GoalError {
    #[error("Invalid goal {0}. Valid goals are: library, command, and test.")]
    InvalidGoal(String),
}

impl Goal {
    pub fn is_library(&self) -> bool {
        matches!(self, Goal::Library)
    }

    pub fn is_command(&self) -> bool {
        matches!(self, Goal::Command)
    }

    pub fn is_test(&self) -> bool {
        matches!(self, Goal::Test)
    }
}

impl FromStr for Goal {
    type Err = GoalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "library" => Ok(Self::Library),
            "command" => Ok(Self::Command),
            "test" => Ok(Self::Test),
            _ => Err(GoalError::InvalidGoal(s.into())),
        }
    }
}

impl std::fmt::Display for Goal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Library => "library",
            Self::Command => "command",
            Self::Test => "test",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    impl quickcheck::Arbitrary for Goal {
        fn arbitrary(g: &mut quickcheck::Gen) -> Self {
            *g.choose(&[Self::Library, Self::Command, Self::Test]).unwrap()
        }
    }

    #[test]
    fn goals_round_trip_through_strings() {
        for goal in [Goal::Library, Goal::Command, Goal::Test] {
            assert_eq!(goal, goal.to_string().parse().unwrap());
        }
    }

    #[test]
    fn unknown_goals_are_rejected() {
        assert_matches!("install".parse::<Goal>(), Err(GoalError::InvalidGoal(_)));
    }
}
