//! Persisted UI widgets and the immutable prototype values they are stamped
//! from.

use serde::{Deserialize, Serialize};

/// `Controls.Type` code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ControlType(pub i64);

impl ControlType {
    pub const DIGITAL: Self = Self(3);
    pub const SWITCH: Self = Self(4);
    pub const METER: Self = Self(7);
    pub const LED: Self = Self(8);
    pub const DISPLAY: Self = Self(9);
    pub const FRAME: Self = Self(12);
}

/// `Controls.TargetType` code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetType(pub i64);

impl TargetType {
    pub const GROUP: Self = Self(0);
    pub const VIEW: Self = Self(5);
}

/// Channel value meaning "no channel".
pub const NO_CHANNEL: i64 = -1;
/// `Controls.Flags` value for digital inputs showing a relative value.
pub const RELATIVE_FLAGS: i64 = 14;
pub const RELATIVE_LIMIT_MIN: f64 = -9999.5;
pub const RELATIVE_LIMIT_MAX: f64 = 9999.0;

/// Prototype texts that must survive a display-name override.
const PROTECTED_TEXT: [&str; 2] = ["Fallback", "Regular"];

/// Properties addressed on the device as a whole rather than per amplifier
/// channel. Controls bound to them always use channel 0.
pub const DEVICE_PROPERTIES: [&str; 24] = [
    "Status_SmpsFrequency",
    "Status_MainsPowerPeak",
    "Status_SmpsVoltage",
    "Status_SmpsTemperature",
    "Status_LockMode",
    "Status_StatusText",
    "Status_PwrOk",
    "Settings_Buzzer",
    "Settings_DeviceName",
    "Settings_InputGainEnable",
    "Settings_LockCmd",
    "Settings_MCLEnable",
    "Settings_PwrOn",
    "Input_Analog_Gain",
    "Input_Digital_Gain",
    "Input_Digital_Mode",
    "Input_Digital_Sync",
    "Input_Digital_SampleStatus",
    "Input_Digital_DsDataPri",
    "Input_Digital_DsDataSec",
    "Input_Digital_TxStream",
    "Error_GnrlErr",
    "Error_SmpsTempOff",
    "Error_SmpsTempWarn",
];

pub mod property {
    pub const MUTE: &str = "Config_Mute";
    pub const DELAY: &str = "ChStatus_MsDelay";
    pub const LEVEL: &str = "Config_PotiLevel";
    pub const CPL: &str = "Config_Filter3";
    pub const LOAD_MATCH_ENABLE: &str = "Config_LoadMatchEnable";
    pub const FALLBACK_ACTIVE: &str = "Status_InputFallbackActive";
    pub const FALLBACK_ENABLE: &str = "Settings_InputFallbackMode";
    pub const DS_DATA_PRIMARY: &str = "Input_Digital_DsDataPri";
    pub const EQ1_ENABLE: &str = "Config_Eq1Enable";
    pub const EQ2_ENABLE: &str = "Config_Eq2Enable";
}

/// One `Controls` row. Prototypes loaded from the template catalog are never
/// mutated; every placement goes through [`Control::with_overrides`] or the
/// `with_*` builders, which return new values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Control {
    pub control_id: Option<i64>,
    pub kind: ControlType,
    pub pos_x: i64,
    pub pos_y: i64,
    pub width: i64,
    pub height: i64,
    pub view_id: i64,
    pub display_name: Option<String>,
    pub unique_name: Option<String>,
    pub joined_id: i64,
    pub limit_min: f64,
    pub limit_max: f64,
    pub main_color: i64,
    pub sub_color: i64,
    pub label_color: i64,
    pub label_font: i64,
    pub label_alignment: i64,
    pub line_thickness: i64,
    pub threshold_value: f64,
    pub flags: i64,
    pub action_type: i64,
    pub target_type: TargetType,
    pub target_id: i64,
    pub target_channel: i64,
    pub target_property: Option<String>,
    pub target_record: i64,
    pub confirm_on_msg: Option<String>,
    pub confirm_off_msg: Option<String>,
    pub picture_id_day: i64,
    pub picture_id_night: i64,
    pub font: Option<String>,
    pub alignment: i64,
    pub dimension: Option<Vec<u8>>,
}

impl Control {
    /// A blank control of the given type at the origin. Mostly useful for
    /// building catalogs in code.
    pub fn new(kind: ControlType, width: i64, height: i64) -> Self {
        Self {
            control_id: None,
            kind,
            pos_x: 0,
            pos_y: 0,
            width,
            height,
            view_id: 0,
            display_name: None,
            unique_name: None,
            joined_id: 0,
            limit_min: 0.0,
            limit_max: 0.0,
            main_color: 0,
            sub_color: 0,
            label_color: 0,
            label_font: 0,
            label_alignment: 0,
            line_thickness: 0,
            threshold_value: 0.0,
            flags: 0,
            action_type: 0,
            target_type: TargetType::GROUP,
            target_id: 0,
            target_channel: NO_CHANNEL,
            target_property: None,
            target_record: 0,
            confirm_on_msg: None,
            confirm_off_msg: None,
            picture_id_day: 0,
            picture_id_night: 0,
            font: None,
            alignment: 0,
            dimension: None,
        }
    }

    pub fn at(mut self, x: i64, y: i64) -> Self {
        self.pos_x = x;
        self.pos_y = y;
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn targeting(mut self, target_type: TargetType, id: i64, channel: i64) -> Self {
        self.target_type = target_type;
        self.target_id = id;
        self.target_channel = channel;
        self
    }

    pub fn with_property(mut self, property: impl Into<String>) -> Self {
        self.target_property = Some(property.into());
        self
    }

    pub fn is_frame(&self) -> bool {
        self.kind == ControlType::FRAME
    }

    pub fn is_meter(&self) -> bool {
        self.kind == ControlType::METER
    }

    pub fn is_switch(&self) -> bool {
        self.kind == ControlType::SWITCH
    }

    pub fn is_led(&self) -> bool {
        self.kind == ControlType::LED
    }

    pub fn is_digital(&self) -> bool {
        self.kind == ControlType::DIGITAL
    }

    pub fn text(&self) -> &str {
        self.display_name.as_deref().unwrap_or("")
    }

    pub fn targets_property(&self, property: &str) -> bool {
        self.target_property.as_deref() == Some(property)
    }

    /// Whether a display-name override may replace this control's text:
    /// frames and page-switch buttons only, never the protected literals.
    pub fn accepts_display_name(&self) -> bool {
        let role_permits =
            self.is_frame() || (self.is_switch() && self.target_type == TargetType::VIEW);
        role_permits && !PROTECTED_TEXT.contains(&self.text())
    }

    pub fn targets_device_property(&self) -> bool {
        self.target_property
            .as_deref()
            .is_some_and(|property| DEVICE_PROPERTIES.contains(&property))
    }

    /// Right edge relative to the template origin.
    pub fn right(&self) -> i64 {
        self.pos_x + self.width
    }

    pub fn bottom(&self) -> i64 {
        self.pos_y + self.height
    }

    /// Produces the persisted copy of this prototype: translated by `(x, y)`,
    /// placed on `view_id` under `joined_id`, with `overrides` applied.
    pub fn with_overrides(
        &self,
        view_id: i64,
        joined_id: i64,
        x: i64,
        y: i64,
        overrides: &Overrides,
    ) -> Self {
        let mut placed = self.clone();
        placed.control_id = None;
        placed.view_id = view_id;
        placed.joined_id = joined_id;
        placed.pos_x += x;
        placed.pos_y += y;

        if let Some(width) = overrides.width {
            placed.width = width;
        }
        if let Some(height) = overrides.height {
            placed.height = height;
        }
        if let Some(name) = &overrides.display_name {
            if self.accepts_display_name() {
                placed.display_name = Some(name.clone());
            }
        }
        if let Some(target_id) = overrides.target_id {
            placed.target_id = target_id;
        }
        if let Some(channel) = overrides.target_channel {
            placed.target_channel = channel;
        }
        if let Some(property) = &overrides.target_property {
            placed.target_property = Some(property.clone());
        }
        if let Some(record) = overrides.target_record {
            placed.target_record = record;
        }
        if placed.targets_device_property() && placed.target_channel > NO_CHANNEL {
            placed.target_channel = 0;
        }
        if placed.display_name.is_none() {
            placed.display_name = Some(String::new());
        }
        placed
    }
}

/// Optional replacements applied while instantiating a template. `None`
/// leaves the prototype value in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overrides {
    pub display_name: Option<String>,
    pub target_id: Option<i64>,
    pub target_channel: Option<i64>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub target_property: Option<String>,
    pub target_record: Option<i64>,
}

impl Overrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn target(mut self, id: i64, channel: i64) -> Self {
        self.target_id = Some(id);
        self.target_channel = Some(channel);
        self
    }

    pub fn target_id(mut self, id: i64) -> Self {
        self.target_id = Some(id);
        self
    }

    pub fn width(mut self, width: i64) -> Self {
        self.width = Some(width);
        self
    }

    pub fn size(mut self, width: i64, height: i64) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }
}
