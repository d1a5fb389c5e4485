use serde::{Deserialize, Serialize};

use crate::mailbox::ForwarderKind;

/// Roots of the control and data topic trees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicRoots {
    pub ctrl_root: String,
    pub data_root: String,
}

impl Default for TopicRoots {
    fn default() -> Self {
        Self {
            ctrl_root: "blescan/ctrl".to_string(),
            data_root: "blescan/data".to_string(),
        }
    }
}

/// Topic names for one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    control: String,
    control_group: String,
    data_root: String,
    name: String,
}

impl Topics {
    pub fn new(roots: &TopicRoots, name: &str) -> Self {
        Self {
            control: format!("{}/{}", roots.ctrl_root, name),
            control_group: roots.ctrl_root.clone(),
            data_root: roots.data_root.clone(),
            name: name.to_string(),
        }
    }

    /// `<ctrl-root>/<name>`
    pub fn control(&self) -> &str {
        &self.control
    }

    /// `<ctrl-root>`, shared by every node
    pub fn control_group(&self) -> &str {
        &self.control_group
    }

    /// `<data-root>/<subtopic>/<name>`, or `<data-root>/<name>` for kinds
    /// without a subtopic
    pub fn data(&self, kind: ForwarderKind) -> String {
        match kind.subtopic() {
            Some(sub) => format!("{}/{}/{}", self.data_root, sub, self.name),
            None => format!("{}/{}", self.data_root, self.name),
        }
    }
}
