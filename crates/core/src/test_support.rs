//! In-memory project fixtures and a template catalog for unit tests.

use rusqlite::{params, Connection};

use crate::control::{property, Control, ControlType, TargetType};
use crate::store::{insert_control_row, ProjectStore};
use crate::template::{Template, TemplateCatalog};

const SCHEMA: &str = "
CREATE TABLE Groups (
    GroupId INTEGER PRIMARY KEY, Name TEXT, ParentId INTEGER, TargetId INTEGER,
    TargetChannel INTEGER, Type INTEGER, Flags INTEGER
);
CREATE TABLE Views (
    ViewId INTEGER PRIMARY KEY, Type INTEGER, Name TEXT, Icon INTEGER, Flags INTEGER,
    HomeViewIndex INTEGER, NaviBarIndex INTEGER, HRes INTEGER, VRes INTEGER, ZoomLevel INTEGER,
    ScalingFactor REAL, ScalingPosX INTEGER, ScalingPosY INTEGER, ReferenceVenueObjectId INTEGER
);
CREATE TABLE SourceGroups (
    SourceGroupId INTEGER PRIMARY KEY, Type INTEGER, Name TEXT, OrderIndex INTEGER,
    NextSourceGroupId INTEGER, ArrayProcessingEnable INTEGER, ArraySightId INTEGER,
    Symmetric INTEGER, Mounting INTEGER
);
CREATE TABLE SourceGroupsAdditionalData (SourceGroupId INTEGER, System TEXT);
CREATE TABLE Cabinets (CabinetId INTEGER PRIMARY KEY, DeviceId INTEGER, AmplifierChannel INTEGER);
CREATE TABLE CabinetsAdditionalData (CabinetId INTEGER, Linked INTEGER);
CREATE TABLE Devices (DeviceId INTEGER PRIMARY KEY, RemoteIdSubnet INTEGER, RemoteIdDevice INTEGER);
";

/// Creates a `Controls` table with every column the engine reads.
pub(crate) fn create_control_table(conn: &Connection) {
    conn.execute_batch(
        "CREATE TABLE Controls (
            ControlId INTEGER PRIMARY KEY, Type INTEGER, PosX INTEGER, PosY INTEGER,
            Width INTEGER, Height INTEGER, ViewId INTEGER, DisplayName TEXT, UniqueName TEXT,
            JoinedId INTEGER, LimitMin REAL, LimitMax REAL, MainColor INTEGER, SubColor INTEGER,
            LabelColor INTEGER, LabelFont INTEGER, LabelAlignment INTEGER, LineThickness INTEGER,
            ThresholdValue REAL, Flags INTEGER, ActionType INTEGER, TargetType INTEGER,
            TargetId INTEGER, TargetChannel INTEGER, TargetProperty TEXT, TargetRecord INTEGER,
            ConfirmOnMsg TEXT, ConfirmOffMsg TEXT, PictureIdDay INTEGER, PictureIdNight INTEGER,
            Font TEXT, Alignment INTEGER, Dimension BLOB
        );",
    )
    .unwrap();
}

pub(crate) fn insert_prototype(conn: &Connection, control: &Control, joined_id: i64) {
    insert_control_row(
        conn,
        &Control {
            joined_id,
            ..control.clone()
        },
    )
    .unwrap();
}

/// A vendor project built row by row.
///
/// `stereo_array` models an initialised project with a stereo GSL array
/// `Main` (TOPs and SUBs, each split L/R) and a point source `Front` whose
/// third cabinet is linked. The right half of `Main` is a hidden source row
/// (`OrderIndex = -1`) carrying the second ArraySight id. `subarray` adds a
/// SUBarray with cabinets `L01-01 L01-02 R01-01 R01-02 C01-01`.
pub(crate) struct ProjectFixture {
    conn: Connection,
    next_order: i64,
}

impl ProjectFixture {
    /// All tables, no rows.
    pub(crate) fn empty_schema() -> Self {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();
        create_control_table(&conn);
        Self {
            conn,
            next_order: 0,
        }
    }

    pub(crate) fn stereo_array() -> Self {
        let mut fixture = Self::empty_schema();
        fixture
            .conn
            .execute(
                "INSERT INTO Groups (GroupId, Name, ParentId, TargetId, TargetChannel, Type, Flags) \
                 VALUES (1, 'Root', 0, 0, -1, 0, 0)",
                [],
            )
            .unwrap();
        let master = fixture.group("Master", 1);

        // vendor view of the array
        let main = fixture.source("Main", 1, true, Some("GSL"));
        fixture.control(main, ControlType::FRAME, "Main", 10, 10);
        fixture.control(main, ControlType::SWITCH, "Infra", 10, 50);
        let master_main = fixture.group("Main", master);
        fixture.group("Main TOPs", master_main);
        fixture.group("Main SUBs", master_main);

        let root_main = fixture.group("Main", 1);
        let tops = fixture.group("Main TOPs", root_main);
        let tops_l = fixture.group("Main TOPs L", tops);
        fixture.device("Main L1", tops_l, false);
        fixture.device("Main L2", tops_l, false);
        let tops_r = fixture.group("Main TOPs R", tops);
        fixture.device("Main R1", tops_r, false);
        fixture.device("Main R2", tops_r, false);
        let subs = fixture.group("Main SUBs", root_main);
        let subs_l = fixture.group("Main SUBs L", subs);
        fixture.device("Main SUB L1", subs_l, false);
        let subs_r = fixture.group("Main SUBs R", subs);
        fixture.device("Main SUB R1", subs_r, false);
        let main_right = fixture.hidden_source("Main R", 2);
        fixture
            .conn
            .execute(
                "UPDATE SourceGroups SET ArraySightId = 1, NextSourceGroupId = ?1 WHERE Name = 'Main'",
                params![main_right],
            )
            .unwrap();

        let front = fixture.source("Front", 2, false, Some("Y"));
        fixture.control(front, ControlType::FRAME, "Front", 10, 10);
        let master_front = fixture.group("Front", master);
        fixture.device("Front 1", master_front, false);
        fixture.device("Front 2", master_front, false);
        fixture.device("Front 3", master_front, true);

        fixture
            .conn
            .execute(
                "INSERT INTO SourceGroups (Type, Name, OrderIndex, NextSourceGroupId, \
                 ArrayProcessingEnable, Symmetric, Mounting) VALUES (5, 'Unused channels', 99, 0, 0, 0, 0)",
                [],
            )
            .unwrap();
        fixture
    }

    pub(crate) fn subarray() -> Self {
        let mut fixture = Self::stereo_array();
        let master = fixture.master();
        fixture.source("SUBarray", 3, false, None);
        let group = fixture.group("SUBarray", master);
        for cabinet in ["L01-01", "L01-02", "R01-01", "R01-02", "C01-01"] {
            fixture.device(&format!("SUBarray {cabinet}"), group, false);
        }
        fixture
    }

    /// Adds an array whose groups carry no TOPs/SUBs containers.
    pub(crate) fn with_bare_array(mut self, name: &str) -> Self {
        let master = self.master();
        self.source(name, 1, false, None);
        let group = self.group(name, master);
        self.device(&format!("{name} 1"), group, false);
        self.device(&format!("{name} 2"), group, false);
        self
    }

    /// A group named after the SUBarray directly under the project root with
    /// its own `SUBs` container, as left behind by hand-made groupings.
    pub(crate) fn with_top_level_subarray(self) -> Self {
        let stray = self.group("SUBarray", 1);
        self.group("SUBarray SUBs", stray);
        self
    }

    /// Links the centre cabinet of the SUBarray so the C bucket ends up empty.
    pub(crate) fn with_linked_centre(self) -> Self {
        self.conn
            .execute(
                "UPDATE CabinetsAdditionalData SET Linked = 1 WHERE CabinetId IN ( \
                     SELECT c.CabinetId FROM Cabinets c JOIN Groups g \
                     ON g.TargetId = c.DeviceId AND g.TargetChannel = c.AmplifierChannel \
                     WHERE g.Name LIKE '% C01-%')",
                [],
            )
            .unwrap();
        self
    }

    pub(crate) fn without_array_processing(self) -> Self {
        self.conn
            .execute("UPDATE SourceGroups SET ArrayProcessingEnable = 0", [])
            .unwrap();
        self
    }

    pub(crate) fn into_store(self) -> ProjectStore {
        ProjectStore::from_connection(self.conn).unwrap()
    }

    fn master(&self) -> i64 {
        self.conn
            .query_row(
                "SELECT GroupId FROM Groups WHERE ParentId = 1 AND Name = 'Master'",
                [],
                |row| row.get(0),
            )
            .unwrap()
    }

    fn group(&self, name: &str, parent_id: i64) -> i64 {
        self.conn
            .execute(
                "INSERT INTO Groups (Name, ParentId, TargetId, TargetChannel, Type, Flags) \
                 VALUES (?1, ?2, 0, -1, 0, 0)",
                params![name, parent_id],
            )
            .unwrap();
        self.conn.last_insert_rowid()
    }

    /// Device leaf plus the cabinet on its amplifier channel. Devices carry
    /// four channels each, numbered from 1; device 10 answers on CAN id 1.01.
    fn device(&self, name: &str, parent_id: i64, linked: bool) -> i64 {
        let cabinets: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM Cabinets", [], |row| row.get(0))
            .unwrap();
        let (device_id, channel) = (10 + cabinets / 4, cabinets % 4 + 1);
        self.conn
            .execute(
                "INSERT OR IGNORE INTO Devices (DeviceId, RemoteIdSubnet, RemoteIdDevice) \
                 VALUES (?1, 1, ?2)",
                params![device_id, device_id - 9],
            )
            .unwrap();
        self.conn
            .execute(
                "INSERT INTO Cabinets (DeviceId, AmplifierChannel) VALUES (?1, ?2)",
                params![device_id, channel],
            )
            .unwrap();
        self.conn
            .execute(
                "INSERT INTO CabinetsAdditionalData (CabinetId, Linked) VALUES (?1, ?2)",
                params![self.conn.last_insert_rowid(), linked as i64],
            )
            .unwrap();
        self.conn
            .execute(
                "INSERT INTO Groups (Name, ParentId, TargetId, TargetChannel, Type, Flags) \
                 VALUES (?1, ?2, ?3, ?4, 1, 0)",
                params![name, parent_id, device_id, channel],
            )
            .unwrap();
        self.conn.last_insert_rowid()
    }

    /// Source group row plus its remote view. Returns the view id.
    fn source(&mut self, name: &str, kind: i64, array_processing: bool, system: Option<&str>) -> i64 {
        self.conn
            .execute(
                "INSERT INTO SourceGroups (Type, Name, OrderIndex, NextSourceGroupId, \
                 ArrayProcessingEnable, Symmetric, Mounting) VALUES (?1, ?2, ?3, 0, ?4, 1, 0)",
                params![kind, name, self.next_order, array_processing as i64],
            )
            .unwrap();
        self.next_order += 1;
        if let Some(system) = system {
            self.conn
                .execute(
                    "INSERT INTO SourceGroupsAdditionalData (SourceGroupId, System) VALUES (?1, ?2)",
                    params![self.conn.last_insert_rowid(), system],
                )
                .unwrap();
        }
        self.conn
            .execute(
                "INSERT INTO Views (Type, Name, Flags, NaviBarIndex, HRes, VRes, ZoomLevel) \
                 VALUES (1000, ?1, 4, -1, 800, 600, 100)",
                params![name],
            )
            .unwrap();
        self.conn.last_insert_rowid()
    }

    /// Source row that the vendor application keeps out of the source list.
    fn hidden_source(&self, name: &str, array_sight_id: i64) -> i64 {
        self.conn
            .execute(
                "INSERT INTO SourceGroups (Type, Name, OrderIndex, NextSourceGroupId, \
                 ArrayProcessingEnable, ArraySightId, Symmetric, Mounting) \
                 VALUES (1, ?1, -1, 0, 0, ?2, 1, 0)",
                params![name, array_sight_id],
            )
            .unwrap();
        self.conn.last_insert_rowid()
    }

    fn control(&self, view_id: i64, kind: ControlType, text: &str, x: i64, y: i64) {
        let joined_id: i64 = self
            .conn
            .query_row("SELECT COALESCE(MAX(JoinedId), 0) + 1 FROM Controls", [], |row| row.get(0))
            .unwrap();
        insert_control_row(
            &self.conn,
            &Control {
                view_id,
                joined_id,
                ..Control::new(kind, 80, 30).at(x, y).named(text)
            },
        )
        .unwrap();
    }
}

fn panel(name: &str, stereo: bool) -> Template {
    let mut controls = vec![
        Control::new(ControlType::FRAME, 160, 320).named("Group"),
        Control::new(ControlType::METER, 20, 200).at(10, 30),
    ];
    if stereo {
        controls.push(Control::new(ControlType::METER, 20, 200).at(35, 30));
    }
    controls.push(
        Control::new(ControlType::SWITCH, 40, 20)
            .at(10, 240)
            .with_property(property::MUTE),
    );
    if stereo {
        controls.push(
            Control::new(ControlType::SWITCH, 40, 20)
                .at(55, 240)
                .with_property(property::MUTE),
        );
    }
    controls.extend([
        Control::new(ControlType::SWITCH, 40, 20).at(100, 240).named("CUT"),
        Control::new(ControlType::SWITCH, 40, 20)
            .at(100, 270)
            .named("View EQ")
            .targeting(TargetType::VIEW, 0, -1),
        Control::new(ControlType::DIGITAL, 40, 20)
            .at(60, 30)
            .with_property(property::DELAY),
        Control::new(ControlType::DIGITAL, 40, 20)
            .at(60, 60)
            .with_property(property::LEVEL),
        Control::new(ControlType::DIGITAL, 40, 20)
            .at(60, 90)
            .with_property(property::CPL),
        Control::new(ControlType::SWITCH, 40, 20)
            .at(60, 120)
            .with_property(property::LOAD_MATCH_ENABLE),
    ]);
    Template::new(name, controls)
}

/// Every template the generator asks for, with small fixed geometry.
pub(crate) fn catalog() -> TemplateCatalog {
    let mut templates = vec![
        Template::new(
            "Nav Button",
            vec![Control::new(ControlType::SWITCH, 125, 28)
                .named("Nav")
                .targeting(TargetType::VIEW, 0, -1)],
        ),
        Template::new("Meters Title", vec![Control::new(ControlType::FRAME, 400, 40).named("Title")]),
        Template::new("Meters Group", vec![Control::new(ControlType::FRAME, 60, 30).named("Group")]),
        Template::new(
            "Meter",
            vec![
                Control::new(ControlType::METER, 50, 40),
                Control::new(ControlType::DISPLAY, 50, 12).at(0, 40),
                Control::new(ControlType::FRAME, 50, 12).at(0, 40).named("Channel"),
            ],
        ),
        Template::new("Master Title", vec![Control::new(ControlType::FRAME, 300, 40).named("Title")]),
        Template::new(
            "Master Main",
            vec![
                Control::new(ControlType::FRAME, 200, 300).named("Master"),
                Control::new(ControlType::SWITCH, 40, 20)
                    .at(10, 260)
                    .with_property(property::MUTE),
                Control::new(ControlType::LED, 12, 12)
                    .at(60, 264)
                    .with_property(property::FALLBACK_ACTIVE),
            ],
        ),
        Template::new(
            "Master Fallback",
            vec![
                Control::new(ControlType::FRAME, 120, 60).named("Fallback"),
                Control::new(ControlType::SWITCH, 40, 20)
                    .at(10, 30)
                    .with_property(property::FALLBACK_ENABLE),
            ],
        ),
        Template::new(
            "Master DS10",
            vec![
                Control::new(ControlType::FRAME, 70, 60).named("DS10"),
                Control::new(ControlType::LED, 12, 12)
                    .at(10, 30)
                    .with_property(property::DS_DATA_PRIMARY),
            ],
        ),
        Template::new(
            "ArraySight Frame",
            vec![Control::new(ControlType::FRAME, 140, 40).named("Sight frame")],
        ),
        Template::new(
            "ArraySight",
            vec![Control::new(ControlType::SWITCH, 60, 30).named("Sight")],
        ),
        Template::new(
            "ArraySight LR",
            vec![Control::new(ControlType::SWITCH, 60, 30).named("Sight")],
        ),
        Template::new("EQ1 Title", vec![Control::new(ControlType::FRAME, 500, 40).named("EQ1")]),
        Template::new("EQ2 Title", vec![Control::new(ControlType::FRAME, 500, 40).named("EQ2")]),
        Template::new(
            "EQ1",
            vec![
                Control::new(ControlType::FRAME, 200, 150).named("EQ"),
                Control::new(ControlType::SWITCH, 40, 20)
                    .at(10, 120)
                    .with_property(property::EQ1_ENABLE),
            ],
        ),
        Template::new(
            "EQ2",
            vec![
                Control::new(ControlType::FRAME, 200, 150).named("EQ"),
                Control::new(ControlType::SWITCH, 40, 20)
                    .at(10, 120)
                    .with_property(property::EQ2_ENABLE),
            ],
        ),
        Template::new(
            "Master ArraySight",
            vec![
                Control::new(ControlType::FRAME, 150, 200).named("ArraySight"),
                Control::new(ControlType::DISPLAY, 130, 20).at(10, 30),
            ],
        ),
        Template::new("THC", vec![Control::new(ControlType::FRAME, 150, 90).named("THC")]),
    ];
    for base in ["Group", "Group LR"] {
        for ap in ["", " AP"] {
            for cpl in ["", " CPL2"] {
                templates.push(panel(&format!("{base}{ap}{cpl}"), base.ends_with("LR")));
            }
        }
    }
    TemplateCatalog::from_templates(templates)
}
