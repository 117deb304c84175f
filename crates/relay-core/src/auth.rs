use std::collections::HashSet;

/// Identities permitted to run privileged commands. Fixed at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowList {
    identities: HashSet<String>,
}

impl AllowList {
    pub fn new<I, S>(identities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            identities: identities.into_iter().map(Into::into).collect(),
        }
    }

    /// Exact, case-sensitive membership.
    pub fn contains(&self, identity: &str) -> bool {
        self.identities.contains(identity)
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }
}

pub fn is_authorized(identity: &str, allow_list: &AllowList) -> bool {
    allow_list.contains(identity)
}
