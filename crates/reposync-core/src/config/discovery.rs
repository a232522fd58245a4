//! Configuration file discovery from multiple locations

use std::path::{Path, PathBuf};

/// File names searched for in the working directory and its parents
pub const PROJECT_CONFIG_NAMES: [&str; 2] = ["reposync.toml", "reposync.json"];

/// Configuration file locations in order of precedence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFiles {
    /// Config from CLI flag (highest precedence)
    pub cli: Option<PathBuf>,
    /// Project config (reposync.toml / reposync.json)
    pub project: Option<PathBuf>,
    /// Global XDG config
    pub global: Option<PathBuf>,
}

impl ConfigFiles {
    /// The file that wins by precedence, if any
    #[must_use]
    pub fn preferred(&self) -> Option<&Path> {
        self.cli
            .as_deref()
            .or(self.project.as_deref())
            .or(self.global.as_deref())
    }
}

/// Config file discovery
pub struct ConfigDiscovery;

impl ConfigDiscovery {
    /// Discover all available configuration files
    ///
    /// `start` is the directory the project search begins in; the search
    /// walks up through its parents.
    pub fn discover(cli_path: Option<&Path>, start: &Path) -> ConfigFiles {
        let cli = cli_path.filter(|p| p.is_file()).map(Path::to_path_buf);
        let project = Self::find_project_file(start);
        let global = Self::find_global_config();

        ConfigFiles {
            cli,
            project,
            global,
        }
    }

    /// Find a project config in `start` or one of its parents
    fn find_project_file(start: &Path) -> Option<PathBuf> {
        let mut current = start.to_path_buf();

        loop {
            for name in PROJECT_CONFIG_NAMES {
                let candidate = current.join(name);
                if candidate.is_file() {
                    return Some(candidate);
                }
            }

            if !current.pop() {
                break;
            }
        }

        None
    }

    /// Find global config in XDG config directory
    fn find_global_config() -> Option<PathBuf> {
        let global_config = dirs::config_dir()?.join("reposync").join("config.toml");
        global_config.is_file().then_some(global_config)
    }
}
