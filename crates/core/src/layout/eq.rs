use super::{source_target_group, GeneratedView, LayoutGenerator};
use crate::control::Overrides;
use crate::events::EventSink;
use crate::instantiate::TemplateEngine;
use crate::template::Size;
use crate::topology::{ChannelGroup, SourceGroup, SourceGroupType, Topology};
use crate::Result;

/// Groups that get an EQ panel, in render order. L/R/C halves are covered
/// by their parent, and a point source with both TOPs and SUBs shares one
/// EQ, so its SUBs are left out.
pub fn eq_groups(topology: &Topology) -> Vec<(&SourceGroup, &ChannelGroup)> {
    let mut groups = Vec::new();
    for source in topology.sources().iter().filter(|s| s.has_eq_view()) {
        let combined =
            source.kind == SourceGroupType::PointSource && source.has_tops() && source.has_subs();
        for group in &source.channel_groups {
            if group.is_left_or_right() || (combined && group.is_subs()) {
                continue;
            }
            groups.push((source, group));
        }
    }
    groups
}

impl LayoutGenerator<'_> {
    /// Creates the EQ view: an EQ1 section and an EQ2 section, each a title
    /// followed by one panel per EQ group, wrapped into rows.
    pub fn eq_view(
        &self,
        engine: &mut TemplateEngine,
        topology: &Topology,
        master_view: &GeneratedView,
        sink: &mut dyn EventSink,
    ) -> Result<GeneratedView> {
        let layout = &self.config.layout;
        let names = &self.config.templates;
        let titles = &self.config.titles;
        let sections = [
            (&names.eq1_title, &names.eq1),
            (&names.eq2_title, &names.eq2),
        ];
        let mut sizes: Vec<(Size, Size)> = Vec::with_capacity(sections.len());
        for (title, panel) in sections {
            sizes.push((self.catalog.size_of(title)?, self.catalog.size_of(panel)?));
        }
        let nav = self.catalog.size_of(&names.nav_button)?;

        let groups = eq_groups(topology);
        let per_row = layout.eq_per_row.max(1);
        let rows = (groups.len() as i64 + per_row - 1) / per_row;
        let rows = rows.max(1);

        let mut h_res = 0;
        let mut v_res = layout.eq_start_y;
        for (title, panel) in &sizes {
            let grid = per_row * (panel.width + layout.eq_spacing) - layout.eq_spacing;
            h_res = h_res.max(grid.max(title.width) + 2 * layout.eq_start_x);
            v_res += title.height
                + layout.eq_spacing
                + rows * (panel.height + layout.eq_spacing)
                + layout.eq_section_gap;
        }
        v_res += layout.eq_spacing;
        let view_id = self.create_view(&titles.eq_view, h_res, v_res, sink)?;

        let mut y = layout.eq_start_y;
        for ((title_name, panel_name), (title, panel)) in sections.into_iter().zip(&sizes) {
            self.stamp(engine, title_name, view_id, layout.eq_start_x, y, &Overrides::new(), sink)?;
            y += title.height + layout.eq_spacing;

            for (index, (source, group)) in (0..).zip(&groups) {
                let x = layout.eq_start_x + (index % per_row) * (panel.width + layout.eq_spacing);
                let row_y = y + (index / per_row) * (panel.height + layout.eq_spacing);
                let target = source_target_group(source, group).unwrap_or(group.group_id);
                self.stamp(
                    engine,
                    panel_name,
                    view_id,
                    x,
                    row_y,
                    &Overrides::new()
                        .display_name(group.name.as_str())
                        .target_id(target),
                    sink,
                )?;
            }
            y += rows * (panel.height + layout.eq_spacing) + layout.eq_section_gap;
        }

        self.nav_button(
            engine,
            view_id,
            layout.nav_button_x + nav.width + layout.nav_button_spacing,
            layout.eq_start_y + layout.nav_button_y,
            &titles.master_view,
            master_view.view_id,
            sink,
        )?;
        self.nav_button(
            engine,
            master_view.view_id,
            layout.nav_button_x + nav.width + layout.nav_button_spacing,
            layout.master_start_y + layout.nav_button_y,
            &titles.eq_view,
            view_id,
            sink,
        )?;
        tracing::debug!(panels = groups.len(), "placed EQ panels");

        Ok(GeneratedView {
            view_id,
            name: titles.eq_view.clone(),
            h_res,
            v_res,
            panels: groups.len(),
        })
    }
}
