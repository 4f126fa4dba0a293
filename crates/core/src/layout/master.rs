use super::{report, source_target_group, GeneratedView, LayoutGenerator};
use crate::control::{
    property, Control, Overrides, NO_CHANNEL, RELATIVE_FLAGS, RELATIVE_LIMIT_MAX,
    RELATIVE_LIMIT_MIN,
};
use crate::error::AutoR1Error;
use crate::events::EventSink;
use crate::instantiate::TemplateEngine;
use crate::template::Template;
use crate::topology::{ChannelGroup, SourceGroup, Topology};
use crate::Result;

const CUT_LABEL: &str = "CUT";
const VIEW_EQ_LABEL: &str = "View EQ";

/// Generated groups the master view binds to. `None` falls back to the
/// vendor master group, except for the THC panel, which is left out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MasterTargets {
    pub ap_group_id: Option<i64>,
    pub mute_group_id: Option<i64>,
    pub fallback_group_id: Option<i64>,
    pub ds_group_id: Option<i64>,
}

/// Catalog name of the panel variant for a source, e.g. `Group LR AP CPL2`.
/// Every panel of a stereo source uses the LR variant, including its mono
/// groups.
pub fn panel_template_name(base: &str, topology: &Topology, source: &SourceGroup) -> String {
    let mut name = base.to_string();
    if topology.is_stereo(source) {
        name.push_str(" LR");
    }
    if source.has_array_processing() {
        name.push_str(" AP");
    }
    if source.has_cpl_v2() {
        name.push_str(" CPL2");
    }
    name
}

/// Binds the master panel to the vendor master group, with its mute switch
/// on the MUTE group and its fallback LED on the FALLBACK group.
pub fn master_controls(
    template: &Template,
    master_group_id: i64,
    targets: &MasterTargets,
    x: i64,
    y: i64,
) -> Vec<Control> {
    template
        .controls()
        .iter()
        .map(|proto| {
            let target = if proto.is_switch() && proto.targets_property(property::MUTE) {
                targets.mute_group_id
            } else if proto.is_led() && proto.targets_property(property::FALLBACK_ACTIVE) {
                targets.fallback_group_id
            } else {
                None
            };
            let overrides = Overrides::new().target_id(target.unwrap_or(master_group_id));
            // view and joined id are assigned when the controls are placed
            proto.with_overrides(0, 0, x, y, &overrides)
        })
        .collect()
}

/// Binds a panel template's prototypes to `group`, translated to `(x, y)`.
///
/// Stereo meters and mutes walk `pair` with separate cursors in template
/// order, so the first meter shows the left group and the second the right.
/// Controls that do not apply to the source are dropped.
pub fn panel_controls(
    template: &Template,
    source: &SourceGroup,
    group: &ChannelGroup,
    pair: Option<[&ChannelGroup; 2]>,
    x: i64,
    y: i64,
) -> Vec<Control> {
    let mut meter_cursor = 0;
    let mut mute_cursor = 0;
    let mut placed = Vec::with_capacity(template.controls().len());

    for proto in template.controls() {
        if !is_visible(proto, source, group) {
            tracing::debug!(group = %group.name, property = ?proto.target_property, "skipping control");
            continue;
        }

        let mut control = proto.clone();
        control.target_id = group.group_id;

        if control.text() == CUT_LABEL && !group.is_tops() {
            if let Some(xover) = &source.xover {
                tracing::info!(group = %group.name, %xover, "enabling crossover switch");
                control.display_name = Some(xover.clone());
            }
        }

        if control.is_meter() {
            let bound = match pair {
                Some(pair) => {
                    let side = pair.get(meter_cursor).copied();
                    meter_cursor += 1;
                    side.and_then(ChannelGroup::first_channel)
                }
                None => group.first_channel(),
            };
            let Some(channel) = bound else {
                tracing::warn!(group = %group.name, "no channel to meter, leaving meter out");
                continue;
            };
            control.target_id = channel.target_id;
            control.target_channel = channel.target_channel;
        } else if control.is_switch() {
            if control.targets_property(property::MUTE) {
                if let Some(pair) = pair {
                    if let Some(side) = pair.get(mute_cursor) {
                        control.target_id = side.group_id;
                    }
                    mute_cursor += 1;
                }
            }
            if control.text() == VIEW_EQ_LABEL {
                control.target_id = source.view_id + 1;
            }
        } else if control.is_frame() {
            if !control.text().is_empty() {
                control.display_name = Some(group.name.clone());
            }
        } else if control.is_digital() {
            let delay = control.targets_property(property::DELAY);
            if delay {
                if let Some(target) = source_target_group(source, group) {
                    control.target_id = target;
                }
            }
            let relative = group.name.to_lowercase().contains("fill")
                || group.has_relative_delay(source);
            if (delay || control.targets_property(property::LEVEL)) && relative {
                control.flags = RELATIVE_FLAGS;
                control.limit_min = RELATIVE_LIMIT_MIN;
                control.limit_max = RELATIVE_LIMIT_MAX;
            }
        }

        if control.targets_device_property() && control.target_channel > NO_CHANNEL {
            control.target_channel = 0;
        }
        control.pos_x += x;
        control.pos_y += y;
        control.confirm_on_msg = None;
        control.confirm_off_msg = None;
        if control.display_name.is_none() {
            control.display_name = Some(String::new());
        }
        placed.push(control);
    }
    placed
}

fn is_visible(control: &Control, source: &SourceGroup, group: &ChannelGroup) -> bool {
    if control.is_digital() && control.targets_property(property::CPL) {
        let replaced_by_xover = !group.is_tops() && source.xover.is_some();
        return group.has_crossover_panel() && !replaced_by_xover;
    }
    if control.targets_property(property::LOAD_MATCH_ENABLE) {
        return source.has_load_match();
    }
    if control.text() == VIEW_EQ_LABEL {
        return source.has_eq_view();
    }
    true
}

impl LayoutGenerator<'_> {
    /// Creates the master view and links it with the meter view.
    ///
    /// Every template the view needs is measured before the view is
    /// created, so a missing or empty panel variant leaves the project
    /// untouched.
    pub fn master_view(
        &self,
        engine: &mut TemplateEngine,
        topology: &Topology,
        meter_view: &GeneratedView,
        targets: &MasterTargets,
        sink: &mut dyn EventSink,
    ) -> Result<GeneratedView> {
        let layout = &self.config.layout;
        let names = &self.config.templates;
        let titles = &self.config.titles;

        let main = self.catalog.size_of(&names.master_main)?;
        let fallback = self.catalog.size_of(&names.master_fallback)?;
        let ds = self.catalog.size_of(&names.master_ds)?;
        let sight = self.catalog.size_of(&names.master_array_sight)?;
        let title = self.catalog.size_of(&names.master_title)?;
        let panel = self.catalog.size_of(&names.group_panel_reference)?;
        let master_group_id = self
            .store
            .master_group_id()?
            .ok_or_else(|| AutoR1Error::NotInitialised("no Master group".to_string()))?;

        let mut panels = Vec::new();
        for source in topology.sources() {
            let name = panel_template_name(&names.group_panel, topology, source);
            self.catalog.size_of(&name)?;
            for group in source.channel_groups.iter().filter(|g| !g.is_left_or_right()) {
                panels.push((source, group, name.clone()));
            }
        }

        let framed = self.config.views.array_sight
            && topology.sources().iter().any(|s| !s.array_sight_ids().is_empty());
        let frame_offset = if framed {
            self.catalog.size_of(&names.array_sight)?;
            if topology.sources().iter().any(|s| s.array_sight_ids().len() > 1) {
                self.catalog.size_of(&names.array_sight_lr)?;
            }
            self.catalog.size_of(&names.array_sight_frame)?.height + layout.array_sight_gap
        } else {
            0
        };

        let block_width = main.width.max(fallback.width + layout.master_block_gap + ds.width);
        let block_height = main.height + layout.master_block_gap + fallback.height.max(ds.height);
        let h_res = block_width
            + sight.width
            + (layout.meter_spacing_x + panel.width) * panels.len() as i64
            + layout.master_trailing_buffer;
        let v_res = title.height
            + block_height.max(frame_offset + panel.height)
            + layout.master_canvas_margin;
        let view_id = self.create_view(&titles.master_view, h_res, v_res, sink)?;

        let mut x = layout.master_start_x;
        let mut y = layout.master_start_y;
        self.nav_button(
            engine,
            view_id,
            layout.nav_button_x,
            y + layout.nav_button_y,
            &titles.meter_view,
            meter_view.view_id,
            sink,
        )?;
        self.nav_button(
            engine,
            meter_view.view_id,
            layout.nav_button_x,
            layout.meter_start_y + layout.nav_button_y,
            &titles.master_view,
            view_id,
            sink,
        )?;

        self.stamp(
            engine,
            &names.master_title,
            view_id,
            x,
            y,
            &Overrides::new().display_name(titles.master_view.as_str()),
            sink,
        )?;
        y += title.height + layout.meter_spacing_y;

        let template = self.catalog.get(&names.master_main)?;
        let controls = master_controls(template, master_group_id, targets, x, y);
        let stamp = engine.place(self.store, template, view_id, controls)?;
        report(&stamp, sink);

        let below = y + main.height + layout.master_block_gap;
        self.stamp(
            engine,
            &names.master_fallback,
            view_id,
            x,
            below,
            &Overrides::new().target_id(targets.fallback_group_id.unwrap_or(master_group_id)),
            sink,
        )?;
        self.stamp(
            engine,
            &names.master_ds,
            view_id,
            x + fallback.width + layout.master_block_gap,
            below,
            &Overrides::new().target_id(targets.ds_group_id.unwrap_or(master_group_id)),
            sink,
        )?;
        x += block_width + layout.meter_spacing_x / 2;

        let sight_stamp = self.stamp(
            engine,
            &names.master_array_sight,
            view_id,
            x,
            y,
            &Overrides::new().target_id(0),
            sink,
        )?;
        match targets.ap_group_id {
            Some(ap_group_id) => {
                let thc = self.stamp(
                    engine,
                    &names.thc,
                    view_id,
                    x,
                    y + sight_stamp.size.height + layout.meter_spacing_y / 2,
                    &Overrides::new().target_id(ap_group_id),
                    sink,
                )?;
                x += thc.size.width + layout.master_panel_gap;
            }
            None => x += sight_stamp.size.width + layout.master_panel_gap,
        }

        let panel_y = y + frame_offset;
        for (source, group, name) in &panels {
            if framed && !source.array_sight_ids().is_empty() {
                self.array_sight_frame(engine, view_id, source, x, y, sink)?;
            }
            let pair = topology.lr_pair(source.id, group.tag());
            let template = self.catalog.get(name)?;
            let controls = panel_controls(template, source, group, pair, x, panel_y);
            let stamp = engine.place(self.store, template, view_id, controls)?;
            report(&stamp, sink);

            self.nav_button(engine, view_id, x, panel_y, &group.name, source.view_id, sink)?;
            x += panel.width + layout.meter_spacing_x;
        }

        Ok(GeneratedView {
            view_id,
            name: titles.master_view.clone(),
            h_res,
            v_res,
            panels: panels.len(),
        })
    }

    /// A frame with one ArraySight button per side of `source`, all moving
    /// as one control set.
    fn array_sight_frame(
        &self,
        engine: &mut TemplateEngine,
        view_id: i64,
        source: &SourceGroup,
        x: i64,
        y: i64,
        sink: &mut dyn EventSink,
    ) -> Result<()> {
        let layout = &self.config.layout;
        let names = &self.config.templates;
        let frame = self.stamp(engine, &names.array_sight_frame, view_id, x, y, &Overrides::new(), sink)?;

        let ids = source.array_sight_ids();
        let button = if ids.len() > 1 {
            &names.array_sight_lr
        } else {
            &names.array_sight
        };
        let template = self.catalog.get(button)?;
        for (side, array_sight_id) in (0..).zip(ids) {
            let stamp = engine.extend(
                self.store,
                frame.joined_id,
                template,
                view_id,
                x + layout.array_sight_inset_x + side * layout.array_sight_pitch,
                y + layout.array_sight_inset_y,
                &Overrides::new().target_id(array_sight_id),
            )?;
            report(&stamp, sink);
        }
        Ok(())
    }
}
