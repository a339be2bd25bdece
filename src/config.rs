//! Configuration file handling.
//!
//! Settings live in an optional `prod_dashboard.toml`. Every field has a
//! default, so a missing file behaves like an empty one. Relative paths are
//! resolved against the directory holding the file.

use crate::aggregate::{AggregateOptions, TOP_N, WASTE_ALERT_PCT};
use crate::columns::{ColumnAliases, Field};
use crate::loader::ReadOptions;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "prod_dashboard.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub source: SourceConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub dashboard: DashboardConfig,

    /// Alias overrides, e.g. `year = ["Year", "Ano"]`.
    #[serde(default)]
    pub columns: HashMap<Field, Vec<String>>,

    /// Directory relative paths are resolved against.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Spreadsheet export to partition.
    #[serde(default = "default_source_path")]
    pub path: PathBuf,

    /// Field delimiter of a CSV export.
    #[serde(default = "default_delimiter")]
    pub delimiter: char,

    /// Read `100,5` as `100.5` in CSV exports. Unset means on for `;`
    /// exports, off otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decimal_comma: Option<bool>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            path: default_source_path(),
            delimiter: default_delimiter(),
            decimal_comma: None,
        }
    }
}

fn default_source_path() -> PathBuf {
    PathBuf::from("VR.xlsx")
}

fn default_delimiter() -> char {
    ','
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Where partition files and `metadata.json` are written.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("public/data")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Front-end assets served for any path outside `/data` and `/api`.
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: default_static_dir(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5173
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("public")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Server the `dashboard`/`view` commands fetch from.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_top_n")]
    pub top_n: usize,

    /// Waste percentage above which the KPI is flagged.
    #[serde(default = "default_waste_alert")]
    pub waste_alert_pct: f64,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            top_n: default_top_n(),
            waste_alert_pct: default_waste_alert(),
        }
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:5173".to_string()
}

fn default_top_n() -> usize {
    TOP_N
}

fn default_waste_alert() -> f64 {
    WASTE_ALERT_PCT
}

impl Config {
    /// Load `path`, or `prod_dashboard.toml` in the working directory when it
    /// exists, or the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => Some(p.to_path_buf()),
            None => {
                let default = PathBuf::from(CONFIG_FILE);
                default.is_file().then_some(default)
            }
        };
        let Some(path) = path else {
            return Ok(Self {
                base_dir: PathBuf::from("."),
                ..Self::default()
            });
        };

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let mut config = Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.base_dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !self.source.delimiter.is_ascii() {
            bail!("source.delimiter must be a single ASCII character");
        }
        if self.dashboard.top_n == 0 {
            bail!("dashboard.top_n must be at least 1");
        }
        if !self.dashboard.waste_alert_pct.is_finite() || self.dashboard.waste_alert_pct < 0.0 {
            bail!("dashboard.waste_alert_pct must be a non-negative number");
        }
        Ok(())
    }

    fn resolve(&self, p: &Path) -> PathBuf {
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.base_dir.join(p)
        }
    }

    pub fn source_path(&self) -> PathBuf {
        self.resolve(&self.source.path)
    }

    pub fn data_dir(&self) -> PathBuf {
        self.resolve(&self.output.data_dir)
    }

    pub fn static_dir(&self) -> PathBuf {
        self.resolve(&self.server.static_dir)
    }

    pub fn read_options(&self) -> ReadOptions {
        // validated ASCII
        let mut opts = ReadOptions::with_delimiter(self.source.delimiter as u8);
        if let Some(decimal_comma) = self.source.decimal_comma {
            opts.decimal_comma = decimal_comma;
        }
        opts
    }

    pub fn aliases(&self) -> ColumnAliases {
        ColumnAliases::with_overrides(&self.columns)
    }

    pub fn aggregate_options(&self) -> AggregateOptions {
        AggregateOptions {
            aliases: self.aliases(),
            top_n: self.dashboard.top_n,
            waste_alert_pct: self.dashboard.waste_alert_pct,
        }
    }

    /// Default configuration as TOML, for `init-config`.
    pub fn default_toml() -> String {
        r#"# prod_dashboard configuration
# Relative paths are resolved against this file's directory.

[source]
# Workbook (.xlsx/.xls/.ods, first sheet) or CSV export with a header row
path = "VR.xlsx"
# CSV only
delimiter = ","
# decimal_comma = true

[output]
# Partition files and metadata.json are written here
data_dir = "public/data"

[server]
host = "127.0.0.1"
port = 5173
static_dir = "public"

[dashboard]
base_url = "http://127.0.0.1:5173"
top_n = 5
waste_alert_pct = 5.0

# Column alias overrides (first matching header wins)
[columns]
# year = ["Ano", "CDU_Ano"]
# month = ["Mes", "CDU_Mes"]
# net_weight = ["CDU_PesoLiquido", "Peso"]
"#
        .to_string()
    }
}
