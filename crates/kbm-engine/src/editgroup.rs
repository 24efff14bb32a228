use std::fmt;

use rand::Rng;

const ID_MASK: u64 = (1 << 48) - 1;

/// Tags every edit of one run so the run can be reviewed (and undone) as a
/// group.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EditGroup {
    id: u64,
}

impl EditGroup {
    /// A group with a random 48-bit id.
    pub fn random() -> Self {
        Self::from_id(rand::thread_rng().gen())
    }

    pub fn from_id(id: u64) -> Self {
        Self { id: id & ID_MASK }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Wiki link appended to edit summaries.
    pub fn link(&self) -> String {
        format!("[[:toollabs:editgroups/b/CB/{:x}|details]]", self.id)
    }
}

impl fmt::Display for EditGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}", self.id)
    }
}
