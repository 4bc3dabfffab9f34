use crate::checkpoint::CheckpointStore;
use crate::error::{HetnetError, Result};
use serde_derive::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::{fs, io, path};

/// Resolved configuration of one pipeline stage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StageConfig {
    pub force_rebuild: bool,
    pub save_checkpoint: bool,
    pub include_inverse: bool,
    pub checkpoint_path: path::PathBuf,
}

impl StageConfig {
    pub fn new(checkpoint_path: impl Into<path::PathBuf>) -> Self {
        StageConfig {
            force_rebuild: false,
            save_checkpoint: true,
            include_inverse: false,
            checkpoint_path: checkpoint_path.into(),
        }
    }

    pub fn forced(mut self, force_rebuild: bool) -> Self {
        self.force_rebuild = self.force_rebuild || force_rebuild;
        self
    }
}

/// Per-stage overrides as written in the YAML file.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageSettings {
    pub force_rebuild: Option<bool>,
    pub save_checkpoint: Option<bool>,
    pub include_inverse: Option<bool>,
    pub checkpoint_path: Option<path::PathBuf>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HetioConfig {
    pub path: path::PathBuf,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoDbConfig {
    pub path: path::PathBuf,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CtdConfig {
    pub chemicals: path::PathBuf,
    pub diseases: path::PathBuf,
    pub genes: path::PathBuf,
    pub pathways: path::PathBuf,
    pub chem_gene: path::PathBuf,
    pub chem_disease: path::PathBuf,
    pub gene_disease: path::PathBuf,
    pub gene_pathway: path::PathBuf,
}

fn default_checkpoint_dir() -> path::PathBuf {
    path::PathBuf::from("outputs")
}

fn default_umls_sources() -> Vec<String> {
    vec!["MSH".to_string(), "DRUGBANK".to_string()]
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_checkpoint_dir")]
    pub checkpoint_dir: path::PathBuf,
    #[serde(default)]
    pub umls: Option<path::PathBuf>,
    #[serde(default = "default_umls_sources")]
    pub umls_sources: Vec<String>,
    /// Local path or http(s) URL of the disease ontology OBO file.
    #[serde(default)]
    pub disease_ontology: Option<String>,
    #[serde(default)]
    pub hetio: Option<HetioConfig>,
    #[serde(default)]
    pub ctd: Option<CtdConfig>,
    #[serde(default)]
    pub repodb: Option<RepoDbConfig>,
    #[serde(default)]
    pub stages: BTreeMap<String, BTreeMap<String, StageSettings>>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            checkpoint_dir: default_checkpoint_dir(),
            umls: None,
            umls_sources: default_umls_sources(),
            disease_ontology: None,
            hetio: None,
            ctd: None,
            repodb: None,
            stages: BTreeMap::new(),
        }
    }
}

impl PipelineConfig {
    pub fn from_path(config_path: &path::Path) -> Result<Self> {
        if !config_path.exists() {
            return Err(HetnetError::NotFound {
                what: "pipeline configuration",
                path: config_path.to_path_buf(),
            });
        }
        let reader = io::BufReader::new(fs::File::open(config_path)?);
        Ok(serde_yml::from_reader(reader)?)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yml::from_str(yaml)?)
    }

    pub fn checkpoints(&self) -> CheckpointStore {
        CheckpointStore::new(self.checkpoint_dir.clone())
    }

    pub fn stage(&self, dataset: &str, stage: &str) -> StageConfig {
        let settings = self.stages.get(dataset).and_then(|s| s.get(stage)).cloned().unwrap_or_default();
        StageConfig {
            force_rebuild: settings.force_rebuild.unwrap_or(false),
            save_checkpoint: settings.save_checkpoint.unwrap_or(true),
            include_inverse: settings.include_inverse.unwrap_or(false),
            checkpoint_path: settings.checkpoint_path.unwrap_or_else(|| self.checkpoints().path_for(dataset, stage)),
        }
    }

    pub fn hetio(&self) -> Result<&HetioConfig> {
        self.hetio.as_ref().ok_or_else(|| missing_section("hetio"))
    }

    pub fn ctd(&self) -> Result<&CtdConfig> {
        self.ctd.as_ref().ok_or_else(|| missing_section("ctd"))
    }

    pub fn repodb(&self) -> Result<&RepoDbConfig> {
        self.repodb.as_ref().ok_or_else(|| missing_section("repodb"))
    }
}

fn missing_section(section: &'static str) -> HetnetError {
    HetnetError::NotFound {
        what: "configuration section",
        path: path::PathBuf::from(section),
    }
}
