use crate::model::Goal;

/// The unit of deduplication in the target cache: one package, built for one
/// role. Two branches of the dependency graph asking for the same `Task`
/// always receive the same future.
///
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct Task {
    goal: Goal,
    import_path: String,
}

impl Task {
    pub fn new(goal: Goal, import_path: impl Into<String>) -> Self {
        Self {
            goal,
            import_path: import_path.into(),
        }
    }

    pub fn library(import_path: impl Into<String>) -> Self {
        Self::new(Goal::Library, import_path)
    }

    pub fn command(import_path: impl Into<String>) -> Self {
        Self::new(Goal::Command, import_path)
    }

    pub fn test(import_path: impl Into<String>) -> Self {
        Self::new(Goal::Test, import_path)
    }

    pub fn goal(&self) -> Goal {
        self.goal
    }

    pub fn import_path(&self) -> &str {
        &self.import_path
    }
}

impl std::fmt::Display for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({:?})", self.goal, self.import_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    impl quickcheck::Arbitrary for Task {
        fn arbitrary(g: &mut quickcheck::Gen) -> Self {
            Self {
                goal: Goal::arbitrary(g),
                import_path: String::arbitrary(g),
            }
        }
    }

    #[quickcheck]
    fn tasks_with_different_goals_are_different_keys(import_path: String) {
        let lib = Task::library(import_path.clone());
        let cmd = Task::command(import_path);
        assert_ne!(lib, cmd);
    }
}
