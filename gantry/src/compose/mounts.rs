//! Mount bindings.

use serde::{Deserialize, Serialize};

/// Connects a storage declaration to a path inside a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountBinding {
    pub volume: String,
    pub path: String,
    pub read_only: bool,
    /// Mount a single entry of the volume instead of the whole volume.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_path: Option<String>,
}

impl MountBinding {
    pub fn new(volume: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            volume: volume.into(),
            path: path.into(),
            read_only: false,
            sub_path: None,
        }
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn sub_path(mut self, sub_path: impl Into<String>) -> Self {
        self.sub_path = Some(sub_path.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults_to_writable_directory_mount() {
        let mount = MountBinding::new("logs", "/usr/local/apisix/logs");
        assert!(!mount.read_only);
        assert!(mount.sub_path.is_none());

        let mount = MountBinding::new("config-source", "/usr/local/apisix/conf/config.yaml")
            .read_only()
            .sub_path("config.yaml");
        assert!(mount.read_only);
        assert_eq!(mount.sub_path.as_deref(), Some("config.yaml"));
    }
}
