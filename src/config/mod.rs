use crate::models::{AppSettings, ProjectConfig, Site, Symbol};
use crate::registry::{RegistryError, Workspace};
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::fs;

/// Prefix of environment variables overriding settings
/// (e.g. `DOASDRIVE__LOGGING__DEBUG=true`).
pub const ENV_PREFIX: &str = "DOASDRIVE";

/// On-disk form of a [`Workspace`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceFile {
    pub projects: Vec<ProjectConfig>,
    pub sites: Vec<Site>,
    pub symbols: Vec<Symbol>,
}

impl WorkspaceFile {
    pub fn from_workspace(workspace: &Workspace) -> Self {
        Self {
            projects: workspace.projects.snapshot(),
            sites: workspace.sites.snapshot(),
            symbols: workspace.symbols.snapshot(),
        }
    }

    pub fn into_workspace(self) -> Result<Workspace, RegistryError> {
        let workspace = Workspace::new();
        for project in self.projects {
            workspace.projects.insert(project)?;
        }
        for site in self.sites {
            workspace.sites.insert(site)?;
        }
        for symbol in self.symbols {
            workspace.symbols.insert(symbol)?;
        }
        Ok(workspace)
    }
}

/// Configuration manager for loading and saving YAML configuration files.
///
/// Manages two files in the configuration directory:
/// - `doasdrive.yaml`: application settings, layered with environment overrides
/// - `workspace.yaml`: projects, sites and symbols
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: Utf8PathBuf,
    settings_path: Utf8PathBuf,
    workspace_path: Utf8PathBuf,
    env_prefix: String,
}

impl ConfigManager {
    /// Create a new ConfigManager, creating `config_dir` if it doesn't exist.
    pub fn new<P: AsRef<Utf8Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref().to_path_buf();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {}", config_dir))?;
        }

        Ok(Self {
            settings_path: config_dir.join("doasdrive.yaml"),
            workspace_path: config_dir.join("workspace.yaml"),
            config_dir,
            env_prefix: ENV_PREFIX.to_string(),
        })
    }

    /// Use a different environment variable prefix.
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Load application settings.
    ///
    /// Layers, lowest first: built-in defaults, `doasdrive.yaml` if present,
    /// then `<PREFIX>__SECTION__KEY` environment variables.
    pub fn load_settings(&self) -> Result<AppSettings> {
        if !self.settings_path.exists() {
            tracing::debug!(
                "Settings file not found at {}, using defaults",
                self.settings_path
            );
        }

        let settings: AppSettings = Config::builder()
            .add_source(File::new(self.settings_path.as_str(), FileFormat::Yaml).required(false))
            .add_source(
                Environment::with_prefix(&self.env_prefix)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read settings: {}", self.settings_path))?
            .try_deserialize()
            .with_context(|| format!("Failed to parse settings: {}", self.settings_path))?;

        tracing::info!("Loaded settings from {}", self.config_dir);
        Ok(settings)
    }

    /// Save application settings to `doasdrive.yaml`.
    pub fn save_settings(&self, settings: &AppSettings) -> Result<()> {
        let yaml_string =
            serde_yaml_ng::to_string(settings).context("Failed to serialize settings to YAML")?;

        fs::write(&self.settings_path, yaml_string)
            .with_context(|| format!("Failed to write settings: {}", self.settings_path))?;

        tracing::info!("Saved settings to {}", self.settings_path);
        Ok(())
    }

    /// Load the workspace file, or an empty workspace if it doesn't exist.
    pub fn load_workspace(&self) -> Result<Workspace> {
        if !self.workspace_path.exists() {
            tracing::warn!(
                "Workspace file not found at {}, starting empty",
                self.workspace_path
            );
            return Ok(Workspace::new());
        }

        let file_contents = fs::read_to_string(&self.workspace_path)
            .with_context(|| format!("Failed to read workspace: {}", self.workspace_path))?;

        let file: WorkspaceFile = serde_yaml_ng::from_str(&file_contents)
            .with_context(|| format!("Failed to parse workspace: {}", self.workspace_path))?;

        let workspace = file
            .into_workspace()
            .with_context(|| format!("Invalid workspace: {}", self.workspace_path))?;

        tracing::info!(
            "Loaded workspace from {} ({} projects, {} sites, {} symbols)",
            self.workspace_path,
            workspace.projects.len(),
            workspace.sites.len(),
            workspace.symbols.len()
        );
        Ok(workspace)
    }

    pub fn save_workspace(&self, workspace: &Workspace) -> Result<()> {
        let yaml_string = serde_yaml_ng::to_string(&WorkspaceFile::from_workspace(workspace))
            .context("Failed to serialize workspace to YAML")?;

        fs::write(&self.workspace_path, yaml_string)
            .with_context(|| format!("Failed to write workspace: {}", self.workspace_path))?;

        tracing::info!("Saved workspace to {}", self.workspace_path);
        Ok(())
    }

    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }
}
