use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::topology::SubArraySide;
use crate::Result;

/// Top-level configuration for a generate/clean run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub titles: Titles,
    pub layout: LayoutConfig,
    pub templates: TemplateNames,
    pub topology: TopologyConfig,
    pub subarray: SubArrayConfig,
    pub views: ViewOptions,
    /// Vendor group that the generated namespace is created under.
    pub root_parent_id: i64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            titles: Titles::default(),
            layout: LayoutConfig::default(),
            templates: TemplateNames::default(),
            topology: TopologyConfig::default(),
            subarray: SubArrayConfig::default(),
            views: ViewOptions::default(),
            root_parent_id: 1,
        }
    }
}

impl GeneratorConfig {
    /// Reads a JSON configuration. Missing keys fall back to defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Names of the generated groups and views. Clean looks content up by these,
/// so they must match between the generate and clean runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Titles {
    pub root_group: String,
    pub ap_group: String,
    pub meter_view: String,
    pub master_view: String,
    pub eq_view: String,
    pub mute_group: String,
    pub fallback_group: String,
    pub ds_group: String,
}

impl Default for Titles {
    fn default() -> Self {
        Self {
            root_group: "AUTO".to_string(),
            ap_group: "AP".to_string(),
            meter_view: "AUTO - Meters".to_string(),
            master_view: "AUTO - Master".to_string(),
            eq_view: "AUTO - EQ".to_string(),
            mute_group: "MUTE".to_string(),
            fallback_group: "FALLBACK".to_string(),
            ds_group: "DS DATA".to_string(),
        }
    }
}

/// Canvas placement constants, in view pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub nav_button_x: i64,
    pub nav_button_y: i64,
    pub nav_button_spacing: i64,
    pub foreign_nav_x: i64,
    pub foreign_nav_y: i64,
    pub meter_start_x: i64,
    pub meter_start_y: i64,
    pub meter_spacing_x: i64,
    pub meter_spacing_y: i64,
    pub meter_header_gap: i64,
    pub meter_canvas_margin: i64,
    pub master_start_x: i64,
    pub master_start_y: i64,
    pub master_canvas_margin: i64,
    pub master_trailing_buffer: i64,
    pub master_panel_gap: i64,
    /// Gap between the master panel and the fallback/DS10 panels below it.
    pub master_block_gap: i64,
    /// Space between an ArraySight frame and the panel under it.
    pub array_sight_gap: i64,
    pub array_sight_inset_x: i64,
    pub array_sight_inset_y: i64,
    /// Horizontal step between the left and right ArraySight buttons.
    pub array_sight_pitch: i64,
    pub eq_start_x: i64,
    pub eq_start_y: i64,
    pub eq_spacing: i64,
    pub eq_per_row: i64,
    pub eq_section_gap: i64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            nav_button_x: 270,
            nav_button_y: 15,
            nav_button_spacing: 20,
            foreign_nav_x: 15,
            foreign_nav_y: 15,
            meter_start_x: 15,
            meter_start_y: 15,
            meter_spacing_x: 15,
            meter_spacing_y: 15,
            meter_header_gap: 10,
            meter_canvas_margin: 100,
            master_start_x: 10,
            master_start_y: 10,
            master_canvas_margin: 60,
            master_trailing_buffer: 200,
            master_panel_gap: 60,
            master_block_gap: 10,
            array_sight_gap: 5,
            array_sight_inset_x: 4,
            array_sight_inset_y: 3,
            array_sight_pitch: 67,
            eq_start_x: 20,
            eq_start_y: 20,
            eq_spacing: 10,
            eq_per_row: 5,
            eq_section_gap: 100,
        }
    }
}

impl LayoutConfig {
    /// Vertical distance existing controls move down to make room for an
    /// injected nav button.
    pub fn nav_shift(&self) -> i64 {
        self.nav_button_y + self.nav_button_spacing
    }
}

/// Catalog entry names used by the layout generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateNames {
    pub nav_button: String,
    pub meters_title: String,
    pub meters_group: String,
    pub meter: String,
    pub master_title: String,
    pub master_main: String,
    pub master_array_sight: String,
    pub master_fallback: String,
    pub master_ds: String,
    pub thc: String,
    pub group_panel: String,
    /// Widest panel variant, used to size the master canvas.
    pub group_panel_reference: String,
    pub array_sight_frame: String,
    pub array_sight: String,
    pub array_sight_lr: String,
    pub eq1_title: String,
    pub eq1: String,
    pub eq2_title: String,
    pub eq2: String,
}

impl Default for TemplateNames {
    fn default() -> Self {
        Self {
            nav_button: "Nav Button".to_string(),
            meters_title: "Meters Title".to_string(),
            meters_group: "Meters Group".to_string(),
            meter: "Meter".to_string(),
            master_title: "Master Title".to_string(),
            master_main: "Master Main".to_string(),
            master_array_sight: "Master ArraySight".to_string(),
            master_fallback: "Master Fallback".to_string(),
            master_ds: "Master DS10".to_string(),
            thc: "THC".to_string(),
            group_panel: "Group".to_string(),
            group_panel_reference: "Group LR AP CPL2".to_string(),
            array_sight_frame: "ArraySight Frame".to_string(),
            array_sight: "ArraySight".to_string(),
            array_sight_lr: "ArraySight LR".to_string(),
            eq1_title: "EQ1 Title".to_string(),
            eq1: "EQ1".to_string(),
            eq2_title: "EQ2 Title".to_string(),
            eq2: "EQ2".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopologyConfig {
    /// Fail discovery instead of falling back to POINT when an array source
    /// has no TOPs/SUBs containers.
    pub strict_names: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubArrayConfig {
    pub required_sides: Vec<SubArraySide>,
}

/// Optional parts of the generated output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewOptions {
    pub eq_view: bool,
    /// ArraySight frames above the master panels of sources that have one.
    pub array_sight: bool,
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self {
            eq_view: true,
            array_sight: true,
        }
    }
}
