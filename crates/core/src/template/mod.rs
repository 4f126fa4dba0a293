use std::collections::HashMap;
use std::path::Path;

use rusqlite::{params, Connection, OpenFlags};
use serde::Serialize;

use crate::control::Control;
use crate::error::{AutoR1Error, Missing, Result};
use crate::store::{control_from_row, CONTROL_COLUMNS};

/// Extent of a template measured from its origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Size {
    pub width: i64,
    pub height: i64,
}

/// A named bundle of prototype controls from the template file.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub id: i64,
    pub name: String,
    pub parent_id: i64,
    pub joined_id: i64,
    pub description: Option<String>,
    controls: Vec<Control>,
}

impl Template {
    pub fn new(name: impl Into<String>, controls: Vec<Control>) -> Self {
        Self {
            id: 0,
            name: name.into(),
            parent_id: 0,
            joined_id: 0,
            description: None,
            controls,
        }
    }

    /// Prototypes in authoring order.
    pub fn controls(&self) -> &[Control] {
        &self.controls
    }

    pub fn is_empty(&self) -> bool {
        self.controls.is_empty()
    }

    /// Right-most and bottom-most edge over all prototypes.
    pub fn size(&self) -> Size {
        self.controls.iter().fold(Size::default(), |size, control| Size {
            width: size.width.max(control.right()),
            height: size.height.max(control.bottom()),
        })
    }
}

/// All templates of one template file, by name.
#[derive(Debug, Clone, Default)]
pub struct TemplateCatalog {
    templates: HashMap<String, Template>,
}

impl TemplateCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_templates(templates: impl IntoIterator<Item = Template>) -> Self {
        let mut catalog = Self::new();
        for template in templates {
            catalog.insert(template);
        }
        catalog
    }

    /// Reads every section with a positive joined id from a template file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(Missing::TemplateFile(path.to_path_buf()).into());
        }
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        let catalog = Self::from_connection(&conn)?;
        tracing::debug!(path = %path.display(), templates = catalog.len(), "loaded template catalog");
        Ok(catalog)
    }

    pub fn from_connection(conn: &Connection) -> Result<Self> {
        let mut sections = conn.prepare(
            "SELECT Id, Name, ParentId, JoinedId, Description FROM Sections \
             WHERE JoinedId > 0 ORDER BY JoinedId ASC",
        )?;
        let mut controls = conn.prepare(&format!(
            "SELECT {CONTROL_COLUMNS} FROM Controls WHERE JoinedId = ?1 ORDER BY PosX ASC, ControlId ASC"
        ))?;

        let mut catalog = Self::new();
        let mut rows = sections.query([])?;
        while let Some(row) = rows.next()? {
            let joined_id: i64 = row.get(3)?;
            let prototypes = controls
                .query_map(params![joined_id], control_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            catalog.insert(Template {
                id: row.get(0)?,
                name: row.get(1)?,
                parent_id: row.get::<_, Option<i64>>(2)?.unwrap_or_default(),
                joined_id,
                description: row.get(4)?,
                controls: prototypes,
            });
        }
        Ok(catalog)
    }

    /// Later templates with the same name replace earlier ones.
    pub fn insert(&mut self, template: Template) {
        self.templates.insert(template.name.clone(), template);
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn get(&self, name: &str) -> Result<&Template> {
        self.templates
            .get(name)
            .ok_or_else(|| AutoR1Error::NotFound(Missing::Template(name.to_string())))
    }

    /// Size of the named template; fails when it has nothing to measure.
    pub fn size_of(&self, name: &str) -> Result<Size> {
        let size = self.get(name)?.size();
        if size.width <= 0 || size.height <= 0 {
            return Err(Missing::TemplateGeometry(name.to_string()).into());
        }
        Ok(size)
    }
}
