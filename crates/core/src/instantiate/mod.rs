//! Stamps catalog templates into project views.
//!
//! Every control set written to a view carries one `JoinedId`; the vendor
//! application moves and deletes such sets as a unit. [`TemplateEngine`] owns
//! the running counter and is the only writer of joined control sets.

use serde::Serialize;

use crate::control::{Control, Overrides};
use crate::error::{DomainError, Result};
use crate::store::ProjectStore;
use crate::template::{Size, Template};

/// Result of placing one template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Stamp {
    pub template: String,
    pub view_id: i64,
    pub joined_id: i64,
    pub control_ids: Vec<i64>,
    /// Extent of the template, for callers that flow content after it.
    pub size: Size,
}

#[derive(Debug, Clone)]
pub struct TemplateEngine {
    next_joined_id: i64,
}

impl TemplateEngine {
    /// Starts allocating above `highest_joined_id`.
    pub fn new(highest_joined_id: i64) -> Self {
        Self {
            next_joined_id: highest_joined_id + 1,
        }
    }

    /// Seeds the counter from the project's existing controls.
    pub fn for_project(store: &ProjectStore) -> Result<Self> {
        Ok(Self::new(store.highest_joined_id()?))
    }

    pub fn next_joined_id(&self) -> i64 {
        self.next_joined_id
    }

    pub fn allocate(&mut self) -> i64 {
        let id = self.next_joined_id;
        self.next_joined_id += 1;
        id
    }

    /// Places every prototype of `template` on `view_id`, offset by `(x, y)`,
    /// under a freshly allocated joined id.
    pub fn instantiate(
        &mut self,
        store: &ProjectStore,
        template: &Template,
        view_id: i64,
        x: i64,
        y: i64,
        overrides: &Overrides,
    ) -> Result<Stamp> {
        ensure_controls(template)?;
        let joined_id = self.allocate();
        self.extend(store, joined_id, template, view_id, x, y, overrides)
    }

    /// Like [`instantiate`](Self::instantiate) but joins an existing control
    /// set, so a meter column moves with its header.
    #[allow(clippy::too_many_arguments)]
    pub fn extend(
        &self,
        store: &ProjectStore,
        joined_id: i64,
        template: &Template,
        view_id: i64,
        x: i64,
        y: i64,
        overrides: &Overrides,
    ) -> Result<Stamp> {
        ensure_controls(template)?;
        let control_ids = template
            .controls()
            .iter()
            .map(|proto| proto.with_overrides(view_id, joined_id, x, y, overrides))
            .map(|placed| store.insert_control(&placed))
            .collect::<Result<Vec<_>>>()?;
        tracing::debug!(
            template = %template.name,
            view_id,
            joined_id,
            controls = control_ids.len(),
            "instantiated template"
        );
        Ok(Stamp {
            template: template.name.clone(),
            view_id,
            joined_id,
            control_ids,
            size: template.size(),
        })
    }

    /// Persists controls that were already positioned and bound by the
    /// caller, all under a new joined id. Used for panels whose bindings
    /// differ per control.
    pub(crate) fn place(
        &mut self,
        store: &ProjectStore,
        template: &Template,
        view_id: i64,
        controls: Vec<Control>,
    ) -> Result<Stamp> {
        ensure_controls(template)?;
        let joined_id = self.allocate();
        let control_ids = controls
            .into_iter()
            .map(|control| {
                store.insert_control(&Control {
                    view_id,
                    joined_id,
                    control_id: None,
                    ..control
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Stamp {
            template: template.name.clone(),
            view_id,
            joined_id,
            control_ids,
            size: template.size(),
        })
    }
}

fn ensure_controls(template: &Template) -> Result<()> {
    if template.is_empty() {
        return Err(DomainError::EmptyTemplate(template.name.clone()).into());
    }
    Ok(())
}
