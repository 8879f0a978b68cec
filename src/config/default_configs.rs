use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::info;

/// Commented sample written by `pst-collector init-config`.
pub const SAMPLE_CONFIG_YAML: &str = r#"# pst-collector configuration
#
# Every host is scanned share by share and user by user. For each user the
# search roots below are resolved ({user} is replaced by the username) and
# walked for archive files.

# Name presented to the hosts (defaults to the local hostname)
# client_name: forensics01

# Where shares are reached locally. Placeholders: {address} {server} {share}
# Windows default: \\{address}\{share}
# Elsewhere:       /mnt/smb/{address}/{share}
# share_root: /mnt/smb/{address}/{share}

default_search_roots:
  - "Users/{user}/AppData/Local/Microsoft/Outlook"
  - "Users/{user}/Documents/Outlook Files"

extensions: [pst, ost]

# Stop descending after this many directory levels below a search root
# max_depth: 8

# Descend into symlinks and junctions (cycles are detected)
follow_links: false

max_concurrent_hosts: 1

timeouts:
  connect_secs: 30
  list_secs: 30
  fetch_secs: 60

hosts:
  - address: 192.168.1.20
    server_name: WS-ACCOUNTING
    username: administrator
    # A ${VAR} or %VAR% reference is read from the environment (a bare $VAR
    # is used only when the variable is set, otherwise taken literally)
    password: "${PST_COLLECTOR_PASSWORD}"
    domain: CORP
    port: 445
    shares: ["C$"]
    users:
      - username: alice
      - username: bob
        search_roots:
          - "Users/{user}/Mail Archives"
"#;

/// Write the sample configuration to `path`.
pub fn create_sample_config_file(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .context(format!("Failed to create directory: {}", parent.display()))?;
    }

    fs::write(path, SAMPLE_CONFIG_YAML)
        .context(format!("Failed to write sample config to {}", path.display()))?;

    info!("Wrote sample configuration to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CollectorConfig;
    use tempfile::TempDir;

    #[test]
    fn test_sample_config_is_valid() {
        let mut config = CollectorConfig::from_yaml_str(SAMPLE_CONFIG_YAML).unwrap();
        config.normalize();
        config.validate().unwrap();

        assert_eq!(config.hosts.len(), 1);
        assert_eq!(config.hosts[0].users.len(), 2);
        assert_eq!(config.default_search_roots, crate::config::default_search_roots());
    }

    #[test]
    fn test_create_sample_config_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested/config.yaml");

        create_sample_config_file(&path).unwrap();
        let written = fs::read_to_string(&path).unwrap();
        assert_eq!(written, SAMPLE_CONFIG_YAML);
    }
}
