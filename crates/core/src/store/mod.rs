//! Access to an R1 project file.
//!
//! The file is copied into an in-memory SQLite connection on open, so every
//! generate/clean pass works on a private copy. Nothing touches the source
//! file until the caller persists the result with [`ProjectStore::save_as`]
//! or the bytes from [`ProjectStore::export`].

use std::path::Path;

use rusqlite::backup::Progress;
use rusqlite::{params, Connection, DatabaseName, OptionalExtension, Row};
use serde::Serialize;

use crate::control::{Control, ControlType, TargetType};
use crate::error::{AutoR1Error, Missing, Result};

/// Tables the engine reads or writes.
pub const REQUIRED_TABLES: [&str; 7] = [
    "Groups",
    "Views",
    "Controls",
    "SourceGroups",
    "SourceGroupsAdditionalData",
    "Cabinets",
    "CabinetsAdditionalData",
];

/// `Views.Type` of a user-visible remote view.
pub const REMOTE_VIEW_TYPE: i64 = 1000;
const VIEW_FLAGS: i64 = 4;
const VIEW_NAVI_BAR_INDEX: i64 = -1;
const VIEW_ZOOM_LEVEL: i64 = 100;

const MASTER_GROUP_NAME: &str = "Master";
const NOT_INITIALISED: &str = "Views have not been generated. Please run initial setup in R1 first.";

pub(crate) const CONTROL_COLUMNS: &str = "ControlId, Type, PosX, PosY, Width, Height, ViewId, \
     DisplayName, UniqueName, JoinedId, LimitMin, LimitMax, MainColor, SubColor, LabelColor, \
     LabelFont, LabelAlignment, LineThickness, ThresholdValue, Flags, ActionType, TargetType, \
     TargetId, TargetChannel, TargetProperty, TargetRecord, ConfirmOnMsg, ConfirmOffMsg, \
     PictureIdDay, PictureIdNight, Font, Alignment, Dimension";

/// `Groups.Type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GroupKind {
    Container,
    Device,
}

impl GroupKind {
    pub fn code(self) -> i64 {
        match self {
            Self::Container => 0,
            Self::Device => 1,
        }
    }

    fn from_code(code: i64) -> Self {
        if code == 1 {
            Self::Device
        } else {
            Self::Container
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupRow {
    pub group_id: i64,
    pub name: String,
    pub parent_id: i64,
    pub target_id: i64,
    pub target_channel: i64,
    pub kind: GroupKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewRow {
    pub view_id: i64,
    pub kind: i64,
    pub name: String,
    pub h_res: i64,
    pub v_res: i64,
}

/// Row totals of the tables the engine mutates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RowCounts {
    pub groups: i64,
    pub views: i64,
    pub controls: i64,
}

/// Handle on one project's working copy.
#[derive(Debug)]
pub struct ProjectStore {
    conn: Connection,
}

impl ProjectStore {
    /// Loads the project at `path` into memory and checks its tables.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(Missing::ProjectFile(path.to_path_buf()).into());
        }
        let mut conn = Connection::open_in_memory()?;
        conn.restore(DatabaseName::Main, path, None::<fn(Progress)>)?;
        tracing::debug!(path = %path.display(), "loaded project into memory");
        Self::from_connection(conn)
    }

    /// Wraps an already open connection, e.g. an in-memory fixture.
    pub fn from_connection(conn: Connection) -> Result<Self> {
        let store = Self { conn };
        let missing: Vec<&str> = REQUIRED_TABLES
            .iter()
            .copied()
            .map(|table| store.has_table(table).map(|present| (table, present)))
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .filter_map(|(table, present)| (!present).then_some(table))
            .collect();
        if !missing.is_empty() {
            return Err(AutoR1Error::schema(format!(
                "missing tables: {}",
                missing.join(", ")
            )));
        }
        Ok(store)
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Serialises the working copy to the bytes of a standalone project file.
    pub fn export(&self) -> Result<Vec<u8>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("export.dbpr");
        self.save_as(&path)?;
        Ok(std::fs::read(&path)?)
    }

    pub fn save_as(&self, path: impl AsRef<Path>) -> Result<()> {
        self.conn.backup(DatabaseName::Main, path.as_ref(), None)?;
        Ok(())
    }

    pub fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, err)| AutoR1Error::Storage(err))
    }

    pub fn has_table(&self, table: &str) -> Result<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![table],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Whether the vendor application has run its initial setup: the root
    /// group exists together with at least two direct children.
    pub fn is_initialised(&self) -> Result<bool> {
        if !self.has_table("Groups")? || !self.has_table("Views")? {
            return Ok(false);
        }
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM Groups WHERE GroupId = 1 OR ParentId = 1",
            [],
            |row| row.get(0),
        )?;
        Ok(count >= 3)
    }

    pub fn ensure_initialised(&self) -> Result<()> {
        if self.is_initialised()? && self.master_group_id()?.is_some() {
            Ok(())
        } else {
            Err(AutoR1Error::NotInitialised(NOT_INITIALISED.to_string()))
        }
    }

    /// The vendor "Master" group holding one group per source.
    pub fn master_group_id(&self) -> Result<Option<i64>> {
        Ok(self
            .conn
            .query_row(
                "SELECT GroupId FROM Groups WHERE ParentId = 1 AND Name = ?1 ORDER BY GroupId LIMIT 1",
                params![MASTER_GROUP_NAME],
                |row| row.get(0),
            )
            .optional()?)
    }

    pub fn highest_joined_id(&self) -> Result<i64> {
        let max: Option<i64> =
            self.conn
                .query_row("SELECT MAX(JoinedId) FROM Controls", [], |row| row.get(0))?;
        max.ok_or_else(|| AutoR1Error::NotInitialised(NOT_INITIALISED.to_string()))
    }

    pub fn row_counts(&self) -> Result<RowCounts> {
        let count = |table: &str| -> Result<i64> {
            Ok(self
                .conn
                .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                    row.get(0)
                })?)
        };
        Ok(RowCounts {
            groups: count("Groups")?,
            views: count("Views")?,
            controls: count("Controls")?,
        })
    }

    // ---- groups ----

    pub fn group(&self, group_id: i64) -> Result<Option<GroupRow>> {
        Ok(self
            .conn
            .query_row(
                "SELECT GroupId, Name, ParentId, TargetId, TargetChannel, Type FROM Groups WHERE GroupId = ?1",
                params![group_id],
                group_from_row,
            )
            .optional()?)
    }

    /// First group (lowest id) called `name`.
    pub fn group_id_by_name(&self, name: &str) -> Result<Option<i64>> {
        Ok(self
            .conn
            .query_row(
                "SELECT GroupId FROM Groups WHERE Name = ?1 ORDER BY GroupId LIMIT 1",
                params![name],
                |row| row.get(0),
            )
            .optional()?)
    }

    pub fn child_group_id_by_name(&self, parent_id: i64, name: &str) -> Result<Option<i64>> {
        Ok(self
            .conn
            .query_row(
                "SELECT GroupId FROM Groups WHERE ParentId = ?1 AND Name = ?2 ORDER BY GroupId LIMIT 1",
                params![parent_id, name],
                |row| row.get(0),
            )
            .optional()?)
    }

    pub fn groups_named(&self, name: &str) -> Result<Vec<GroupRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT GroupId, Name, ParentId, TargetId, TargetChannel, Type FROM Groups WHERE Name = ?1 ORDER BY GroupId",
        )?;
        let rows = stmt.query_map(params![name], group_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn child_groups(&self, parent_id: i64) -> Result<Vec<GroupRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT GroupId, Name, ParentId, TargetId, TargetChannel, Type FROM Groups WHERE ParentId = ?1 ORDER BY GroupId",
        )?;
        let rows = stmt.query_map(params![parent_id], group_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn insert_group(
        &self,
        name: &str,
        parent_id: i64,
        target_id: i64,
        target_channel: i64,
        kind: GroupKind,
    ) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO Groups (Name, ParentId, TargetId, TargetChannel, Type, Flags) VALUES (?1, ?2, ?3, ?4, ?5, 0)",
            params![name, parent_id, target_id, target_channel, kind.code()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn delete_group(&self, group_id: i64) -> Result<usize> {
        Ok(self
            .conn
            .execute("DELETE FROM Groups WHERE GroupId = ?1", params![group_id])?)
    }

    /// CAN address of a device as shown on its front panel, e.g. `1.04`.
    /// `None` when the project has no such device.
    pub fn device_can_id(&self, device_id: i64) -> Result<Option<String>> {
        let ids: Option<(i64, i64)> = self
            .conn
            .query_row(
                "SELECT RemoteIdSubnet, RemoteIdDevice FROM Devices WHERE DeviceId = ?1",
                params![device_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        Ok(ids.map(|(subnet, device)| format!("{subnet}.{device:02}")))
    }

    // ---- views ----

    pub fn view_id_by_name(&self, name: &str) -> Result<Option<i64>> {
        Ok(self
            .conn
            .query_row(
                "SELECT ViewId FROM Views WHERE Name = ?1 ORDER BY ViewId LIMIT 1",
                params![name],
                |row| row.get(0),
            )
            .optional()?)
    }

    pub fn view(&self, view_id: i64) -> Result<Option<ViewRow>> {
        Ok(self
            .conn
            .query_row(
                "SELECT ViewId, Type, Name, HRes, VRes FROM Views WHERE ViewId = ?1",
                params![view_id],
                |row| {
                    Ok(ViewRow {
                        view_id: row.get(0)?,
                        kind: row.get(1)?,
                        name: row.get(2)?,
                        h_res: row.get::<_, Option<i64>>(3)?.unwrap_or_default(),
                        v_res: row.get::<_, Option<i64>>(4)?.unwrap_or_default(),
                    })
                },
            )
            .optional()?)
    }

    /// Ids of all remote views, in id order.
    pub fn remote_view_ids(&self) -> Result<Vec<i64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT ViewId FROM Views WHERE Type = ?1 ORDER BY ViewId")?;
        let rows = stmt.query_map(params![REMOTE_VIEW_TYPE], |row| row.get(0))?;
        Ok(rows.collect::<rusqlite::Result<Vec<i64>>>()?)
    }

    /// Inserts a remote view with the vendor's default flags and zoom.
    pub fn insert_remote_view(&self, name: &str, h_res: i64, v_res: i64) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO Views (Type, Name, Icon, Flags, HomeViewIndex, NaviBarIndex, HRes, VRes, ZoomLevel, \
             ScalingFactor, ScalingPosX, ScalingPosY, ReferenceVenueObjectId) \
             VALUES (?1, ?2, NULL, ?3, NULL, ?4, ?5, ?6, ?7, NULL, NULL, NULL, NULL)",
            params![
                REMOTE_VIEW_TYPE,
                name,
                VIEW_FLAGS,
                VIEW_NAVI_BAR_INDEX,
                h_res,
                v_res,
                VIEW_ZOOM_LEVEL
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn delete_view(&self, view_id: i64) -> Result<usize> {
        Ok(self
            .conn
            .execute("DELETE FROM Views WHERE ViewId = ?1", params![view_id])?)
    }

    // ---- controls ----

    pub fn insert_control(&self, control: &Control) -> Result<i64> {
        Ok(insert_control_row(&self.conn, control)?)
    }

    pub fn controls_on_view(&self, view_id: i64) -> Result<Vec<Control>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {CONTROL_COLUMNS} FROM Controls WHERE ViewId = ?1 ORDER BY ControlId"
        ))?;
        let rows = stmt.query_map(params![view_id], control_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Display text of the first control on `view_id` whose text is one of
    /// `names`.
    pub fn control_text_on_view(&self, view_id: i64, names: &[&str]) -> Result<Option<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT DisplayName FROM Controls WHERE ViewId = ?1 AND DisplayName IS NOT NULL ORDER BY ControlId",
        )?;
        let mut rows = stmt.query(params![view_id])?;
        while let Some(row) = rows.next()? {
            let text: String = row.get(0)?;
            if names.contains(&text.as_str()) {
                return Ok(Some(text));
            }
        }
        Ok(None)
    }

    pub fn delete_controls_on_view(&self, view_id: i64) -> Result<usize> {
        Ok(self
            .conn
            .execute("DELETE FROM Controls WHERE ViewId = ?1", params![view_id])?)
    }

    /// Moves every control on `view_id` down by `dy` (up for negative values).
    pub fn shift_view_controls(&self, view_id: i64, dy: i64) -> Result<usize> {
        Ok(self.conn.execute(
            "UPDATE Controls SET PosY = PosY + ?1 WHERE ViewId = ?2",
            params![dy, view_id],
        )?)
    }

    /// Views carrying a page-switch button with no channel that opens
    /// `target_view_id`.
    pub fn views_with_nav_to(&self, target_view_id: i64) -> Result<Vec<i64>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT ViewId FROM Controls \
             WHERE TargetType = ?1 AND TargetId = ?2 AND TargetChannel = -1 ORDER BY ViewId",
        )?;
        let rows = stmt.query_map(params![TargetType::VIEW.0, target_view_id], |row| row.get(0))?;
        Ok(rows.collect::<rusqlite::Result<Vec<i64>>>()?)
    }

    /// Removes every control set on `view_id` that contains a nav button
    /// to `target_view_id`, including its non-button members.
    pub fn delete_nav_buttons(&self, view_id: i64, target_view_id: i64) -> Result<usize> {
        Ok(self.conn.execute(
            "DELETE FROM Controls WHERE ViewId = ?1 AND JoinedId IN ( \
                 SELECT JoinedId FROM Controls \
                 WHERE ViewId = ?1 AND TargetType = ?2 AND TargetId = ?3 AND TargetChannel = -1)",
            params![view_id, TargetType::VIEW.0, target_view_id],
        )?)
    }
}

/// Inserts `control` as a new row; `ControlId` comes from the table.
pub(crate) fn insert_control_row(conn: &Connection, control: &Control) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO Controls (Type, PosX, PosY, Width, Height, ViewId, DisplayName, UniqueName, \
         JoinedId, LimitMin, LimitMax, MainColor, SubColor, LabelColor, LabelFont, LabelAlignment, \
         LineThickness, ThresholdValue, Flags, ActionType, TargetType, TargetId, TargetChannel, \
         TargetProperty, TargetRecord, ConfirmOnMsg, ConfirmOffMsg, PictureIdDay, PictureIdNight, \
         Font, Alignment, Dimension) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, \
         ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28, ?29, ?30, ?31, ?32)",
        params![
            control.kind.0,
            control.pos_x,
            control.pos_y,
            control.width,
            control.height,
            control.view_id,
            control.display_name,
            control.unique_name,
            control.joined_id,
            control.limit_min,
            control.limit_max,
            control.main_color,
            control.sub_color,
            control.label_color,
            control.label_font,
            control.label_alignment,
            control.line_thickness,
            control.threshold_value,
            control.flags,
            control.action_type,
            control.target_type.0,
            control.target_id,
            control.target_channel,
            control.target_property,
            control.target_record,
            control.confirm_on_msg,
            control.confirm_off_msg,
            control.picture_id_day,
            control.picture_id_night,
            control.font,
            control.alignment,
            control.dimension,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn group_from_row(row: &Row<'_>) -> rusqlite::Result<GroupRow> {
    Ok(GroupRow {
        group_id: row.get(0)?,
        name: row.get(1)?,
        parent_id: row.get::<_, Option<i64>>(2)?.unwrap_or_default(),
        target_id: row.get::<_, Option<i64>>(3)?.unwrap_or_default(),
        target_channel: row.get::<_, Option<i64>>(4)?.unwrap_or(-1),
        kind: GroupKind::from_code(row.get::<_, Option<i64>>(5)?.unwrap_or_default()),
    })
}

/// Maps a row selected with [`CONTROL_COLUMNS`].
pub(crate) fn control_from_row(row: &Row<'_>) -> rusqlite::Result<Control> {
    let int = |idx: usize| -> rusqlite::Result<i64> {
        Ok(row.get::<_, Option<i64>>(idx)?.unwrap_or_default())
    };
    let real = |idx: usize| -> rusqlite::Result<f64> {
        Ok(row.get::<_, Option<f64>>(idx)?.unwrap_or_default())
    };
    Ok(Control {
        control_id: row.get(0)?,
        kind: ControlType(int(1)?),
        pos_x: int(2)?,
        pos_y: int(3)?,
        width: int(4)?,
        height: int(5)?,
        view_id: int(6)?,
        display_name: row.get(7)?,
        unique_name: row.get(8)?,
        joined_id: int(9)?,
        limit_min: real(10)?,
        limit_max: real(11)?,
        main_color: int(12)?,
        sub_color: int(13)?,
        label_color: int(14)?,
        label_font: int(15)?,
        label_alignment: int(16)?,
        line_thickness: int(17)?,
        threshold_value: real(18)?,
        flags: int(19)?,
        action_type: int(20)?,
        target_type: TargetType(int(21)?),
        target_id: int(22)?,
        target_channel: row.get::<_, Option<i64>>(23)?.unwrap_or(-1),
        target_property: row.get(24)?,
        target_record: int(25)?,
        confirm_on_msg: row.get(26)?,
        confirm_off_msg: row.get(27)?,
        picture_id_day: int(28)?,
        picture_id_night: int(29)?,
        font: row.get(30)?,
        alignment: int(31)?,
        dimension: row.get(32)?,
    })
}
