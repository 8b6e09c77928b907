//! Run configuration
//!
//! Every tunable of the page-images pipeline lives in [`PageImagesConfig`].
//! Values come from built-in defaults, then an optional TOML file, then CLI
//! flags. Validation runs once, before any image is read.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crop::CropOptions;
use crate::outer_margin::{OuterMarginMode, OuterMarginOptions};
use crate::page_number::{PageNumberError, PageNumberOptions};
use crate::symmetry::SymmetryStrategy;

/// Name of the optional table wrapping the settings in a config file
pub const CONFIG_SECTION: &str = "page_images";

/// Config file name under the user config directory
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to render config as TOML: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("{0}")]
    Invalid(String),

    #[error(transparent)]
    PageNumbers(#[from] PageNumberError),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Split decision policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Split only images whose aspect ratio marks them as spreads
    #[default]
    Auto,
    /// Always split
    Split,
    /// Never split, only crop
    Crop,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Auto => "auto",
            RunMode::Split => "split",
            RunMode::Crop => "crop",
        }
    }
}

/// Page-images pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PageImagesConfig {
    /// File name pattern inside the input directory
    pub glob: String,
    pub mode: RunMode,
    /// Minimum width/height ratio of a spread
    pub split_ratio: f64,
    /// Gutter search window (fraction of width, centred)
    pub gutter_search_frac: f64,
    /// Columns dropped on each side of the gutter
    pub gutter_trim_px: u32,
    pub outer_margin_mode: OuterMarginMode,
    pub outer_margin_frac: f64,
    pub outer_margin_auto_max_frac: f64,
    pub outer_margin_auto_search_frac: f64,
    pub outer_margin_dark_threshold: u8,
    pub outer_margin_dark_frac_cutoff: f64,
    pub outer_margin_release_frac: f64,
    pub outer_margin_min_run_px: u32,
    pub outer_margin_pad_px: u32,
    /// Also clamp the outer margins of unsplit pages (both edges)
    pub outer_margin_single_pages: bool,
    pub x_step: u32,
    pub y_step: u32,
    pub crop_threshold: u8,
    pub pad_px: u32,
    pub edge_inset_px: u32,
    pub symmetry_strategy: SymmetryStrategy,
    pub min_area_frac: f64,
    pub page_numbers: PageNumberOptions,
}

impl Default for PageImagesConfig {
    fn default() -> Self {
        let outer = OuterMarginOptions::default();
        let crop = CropOptions::default();
        Self {
            glob: "*.png".to_string(),
            mode: RunMode::Auto,
            split_ratio: 1.25,
            gutter_search_frac: 0.35,
            gutter_trim_px: 0,
            outer_margin_mode: outer.mode,
            outer_margin_frac: outer.frac,
            outer_margin_auto_max_frac: outer.auto_max_frac,
            outer_margin_auto_search_frac: outer.auto_search_frac,
            outer_margin_dark_threshold: outer.dark_threshold,
            outer_margin_dark_frac_cutoff: outer.dark_frac_cutoff,
            outer_margin_release_frac: outer.release_frac,
            outer_margin_min_run_px: outer.min_run_px,
            outer_margin_pad_px: outer.pad_px,
            outer_margin_single_pages: false,
            x_step: 2,
            y_step: 4,
            crop_threshold: crop.crop_threshold,
            pad_px: crop.pad_px,
            edge_inset_px: crop.edge_inset_px,
            symmetry_strategy: SymmetryStrategy::Independent,
            min_area_frac: crop.min_area_frac,
            page_numbers: PageNumberOptions::default(),
        }
    }
}

impl PageImagesConfig {
    /// Parse a TOML document, bare or wrapped in a `[page_images]` table.
    pub fn from_toml_str(contents: &str) -> std::result::Result<Self, toml::de::Error> {
        let mut table: toml::Table = contents.parse()?;
        let wrapped = table.len() == 1
            && table
                .get(CONFIG_SECTION)
                .is_some_and(|value| value.is_table());
        if wrapped {
            if let Some(inner) = table.remove(CONFIG_SECTION) {
                return inner.try_into();
            }
        }
        toml::Value::Table(table).try_into()
    }

    /// Load a config file; the file must exist.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// `<config_dir>/spreadcrop/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(env!("CARGO_PKG_NAME")).join(CONFIG_FILE_NAME))
    }

    /// Load `explicit` if given, else the default config file if it exists,
    /// else built-in defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.is_file() => {
                tracing::debug!(path = %path.display(), "loading default config file");
                Self::load(&path)
            }
            _ => Ok(Self::default()),
        }
    }

    /// Render the effective configuration as TOML
    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject out-of-range values with a message naming the option.
    pub fn validate(&self) -> Result<()> {
        fn invalid(message: &str) -> ConfigError {
            ConfigError::Invalid(message.to_string())
        }

        if glob::Pattern::new(&self.glob).is_err() {
            return Err(ConfigError::Invalid(format!(
                "glob is not a valid pattern: {}",
                self.glob
            )));
        }
        if self.split_ratio.is_nan() || self.split_ratio <= 0.0 {
            return Err(invalid("split_ratio must be > 0."));
        }
        if !(self.gutter_search_frac > 0.0 && self.gutter_search_frac <= 1.0) {
            return Err(invalid("gutter_search_frac must be in the range (0, 1]."));
        }
        if self.outer_margin_mode == OuterMarginMode::Fixed
            && !(0.0..=0.25).contains(&self.outer_margin_frac)
        {
            return Err(invalid(
                "outer_margin_frac must be in the range [0, 0.25] for fixed mode.",
            ));
        }
        if self.outer_margin_mode == OuterMarginMode::Auto
            && !(0.0..=0.25).contains(&self.outer_margin_auto_max_frac)
        {
            return Err(invalid(
                "outer_margin_auto_max_frac must be in the range [0, 0.25] for auto mode.",
            ));
        }
        if !(self.outer_margin_auto_search_frac > 0.0 && self.outer_margin_auto_search_frac <= 0.5) {
            return Err(invalid(
                "outer_margin_auto_search_frac must be in the range (0, 0.5].",
            ));
        }
        if !(0.0..=1.0).contains(&self.outer_margin_dark_frac_cutoff) {
            return Err(invalid(
                "outer_margin_dark_frac_cutoff must be in the range [0, 1].",
            ));
        }
        if !(0.0..=1.0).contains(&self.outer_margin_release_frac) {
            return Err(invalid("outer_margin_release_frac must be in the range [0, 1]."));
        }
        if self.outer_margin_release_frac >= self.outer_margin_dark_frac_cutoff {
            return Err(invalid(
                "outer_margin_release_frac must be < outer_margin_dark_frac_cutoff.",
            ));
        }
        if self.outer_margin_min_run_px < 1 {
            return Err(invalid("outer_margin_min_run_px must be >= 1."));
        }
        if self.x_step == 0 {
            return Err(invalid("x_step must be a positive integer."));
        }
        if self.y_step == 0 {
            return Err(invalid("y_step must be a positive integer."));
        }
        if !(self.min_area_frac > 0.0 && self.min_area_frac <= 1.0) {
            return Err(invalid("min_area_frac must be in the range (0, 1]."));
        }
        self.page_numbers.validate()?;
        Ok(())
    }

    /// Outer-margin clamp parameters
    pub fn outer_margin_options(&self) -> OuterMarginOptions {
        OuterMarginOptions {
            mode: self.outer_margin_mode,
            frac: self.outer_margin_frac,
            auto_max_frac: self.outer_margin_auto_max_frac,
            auto_search_frac: self.outer_margin_auto_search_frac,
            dark_threshold: self.outer_margin_dark_threshold,
            dark_frac_cutoff: self.outer_margin_dark_frac_cutoff,
            release_frac: self.outer_margin_release_frac,
            min_run_px: self.outer_margin_min_run_px,
            pad_px: self.outer_margin_pad_px,
        }
    }

    /// Crop parameters for split halves (`split = true`) or unsplit pages.
    ///
    /// Unsplit pages are only clamped when `outer_margin_single_pages` is set.
    pub fn crop_options(&self, split: bool) -> CropOptions {
        let outer = self.outer_margin_options();
        CropOptions {
            crop_threshold: self.crop_threshold,
            pad_px: self.pad_px,
            min_area_frac: self.min_area_frac,
            edge_inset_px: self.edge_inset_px,
            outer: if split || self.outer_margin_single_pages {
                outer
            } else {
                outer.disabled()
            },
        }
    }
}
