//! Canvas sizing and control placement for the generated views.

mod eq;
mod master;
mod meter;
mod nav;

use serde::Serialize;

use crate::config::GeneratorConfig;
use crate::control::Overrides;
use crate::events::{EventSink, GenerationEvent};
use crate::instantiate::{Stamp, TemplateEngine};
use crate::store::ProjectStore;
use crate::template::TemplateCatalog;
use crate::topology::{ChannelGroup, SourceGroup, SourceGroupType};
use crate::Result;

pub use eq::eq_groups;
pub use master::{master_controls, panel_controls, panel_template_name, MasterTargets};
pub use meter::{meter_columns, meter_label, MeterColumn};

/// A view created by the layout generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedView {
    pub view_id: i64,
    pub name: String,
    pub h_res: i64,
    pub v_res: i64,
    /// Meter columns, master panels or EQ panels placed on the view.
    pub panels: usize,
}

/// Lays out the meter, master and EQ views and the nav buttons.
pub struct LayoutGenerator<'a> {
    store: &'a ProjectStore,
    catalog: &'a TemplateCatalog,
    config: &'a GeneratorConfig,
}

impl<'a> LayoutGenerator<'a> {
    pub fn new(
        store: &'a ProjectStore,
        catalog: &'a TemplateCatalog,
        config: &'a GeneratorConfig,
    ) -> Self {
        Self {
            store,
            catalog,
            config,
        }
    }

    fn create_view(
        &self,
        name: &str,
        h_res: i64,
        v_res: i64,
        sink: &mut dyn EventSink,
    ) -> Result<i64> {
        let view_id = self.store.insert_remote_view(name, h_res, v_res)?;
        sink.emit(GenerationEvent::ViewSized {
            name: name.to_string(),
            view_id,
            h_res,
            v_res,
        });
        Ok(view_id)
    }

    /// Instantiates a catalog template by name and reports it.
    #[allow(clippy::too_many_arguments)]
    fn stamp(
        &self,
        engine: &mut TemplateEngine,
        template: &str,
        view_id: i64,
        x: i64,
        y: i64,
        overrides: &Overrides,
        sink: &mut dyn EventSink,
    ) -> Result<Stamp> {
        let template = self.catalog.get(template)?;
        let stamp = engine.instantiate(self.store, template, view_id, x, y, overrides)?;
        report(&stamp, sink);
        Ok(stamp)
    }

    /// Places a nav button on `view_id` that opens `target_view_id`.
    #[allow(clippy::too_many_arguments)]
    fn nav_button(
        &self,
        engine: &mut TemplateEngine,
        view_id: i64,
        x: i64,
        y: i64,
        label: &str,
        target_view_id: i64,
        sink: &mut dyn EventSink,
    ) -> Result<Stamp> {
        let overrides = Overrides::new()
            .display_name(label)
            .target(target_view_id, crate::control::NO_CHANNEL);
        self.stamp(engine, &self.config.templates.nav_button, view_id, x, y, &overrides, sink)
    }
}

/// Vendor group that the per-group delay input and EQ panel of `group`
/// drive: the SUBs or TOPs sub-group of a source that has both, the first
/// sub-group of any other array, and the source's `Master` group otherwise.
fn source_target_group(source: &SourceGroup, group: &ChannelGroup) -> Option<i64> {
    let child = |idx: usize| source.child_group_ids.get(idx).copied();
    if group.is_subs() && source.has_tops() {
        child(0)
    } else if group.is_tops() && source.has_subs() {
        child(1)
    } else if source.kind == SourceGroupType::Array {
        child(0)
    } else {
        source.master_group_id
    }
}

fn report(stamp: &Stamp, sink: &mut dyn EventSink) {
    sink.emit(GenerationEvent::TemplateInstantiated {
        template: stamp.template.clone(),
        view_id: stamp.view_id,
        joined_id: stamp.joined_id,
        controls: stamp.control_ids.len(),
    });
}
