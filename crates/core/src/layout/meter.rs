use super::{report, GeneratedView, LayoutGenerator};
use crate::control::{Overrides, NO_CHANNEL};
use crate::events::EventSink;
use crate::instantiate::TemplateEngine;
use crate::topology::{Channel, ChannelGroup, SourceGroup, SourceGroupType, Topology, TopologyTag};
use crate::Result;

/// One column of the meter view: a header bound to `group` followed by one
/// meter per channel.
#[derive(Debug, Clone)]
pub struct MeterColumn<'t> {
    pub source: &'t SourceGroup,
    pub group: &'t ChannelGroup,
    pub channels: Vec<&'t Channel>,
}

/// Columns in render order. The SUBs container of a SUBarray is skipped
/// since its L/R/C children cover it, and a stereo pair is rendered once at
/// the left group's slot with the right group's channels appended.
pub fn meter_columns(topology: &Topology) -> Vec<MeterColumn<'_>> {
    let mut columns = Vec::new();
    for source in topology.sources() {
        for group in &source.channel_groups {
            if group.tag() == TopologyTag::Subs && source.kind == SourceGroupType::SubArray {
                continue;
            }
            if group.is_right() {
                continue;
            }
            let mut channels: Vec<&Channel> = group.channels.iter().collect();
            if group.is_left() {
                if let Some([_, right]) = topology.lr_pair(source.id, group.tag()) {
                    channels.extend(right.channels.iter());
                }
            }
            columns.push(MeterColumn {
                source,
                group,
                channels,
            });
        }
    }
    columns
}

/// Meter caption `<name> - <CAN id> - <output letter>`. Amplifier outputs
/// 1 to 4 read A to D; an unknown CAN id drops its segment.
pub fn meter_label(name: &str, can_id: Option<&str>, channel: i64) -> String {
    let output = match channel {
        1..=4 => char::from(b'A' + (channel - 1) as u8).to_string(),
        other => other.to_string(),
    };
    match can_id {
        Some(can_id) => format!("{name} - {can_id} - {output}"),
        None => format!("{name} - {output}"),
    }
}

impl LayoutGenerator<'_> {
    /// Creates the meter view with one column of meters per channel group.
    pub fn meter_view(
        &self,
        engine: &mut TemplateEngine,
        topology: &Topology,
        sink: &mut dyn EventSink,
    ) -> Result<GeneratedView> {
        let layout = &self.config.layout;
        let names = &self.config.templates;
        let title = self.catalog.size_of(&names.meters_title)?;
        let header = self.catalog.size_of(&names.meters_group)?;
        let meter = self.catalog.size_of(&names.meter)?;
        let nav_template = self.catalog.get(&names.nav_button)?;

        let pitch_x = meter.width.max(header.width) + layout.meter_spacing_x;
        let pitch_y = meter.height + layout.meter_spacing_y;

        let columns = meter_columns(topology);
        let tallest = columns.iter().map(|c| c.channels.len()).max().unwrap_or(0) as i64;
        let h_res = pitch_x * columns.len() as i64 + layout.meter_spacing_x;
        let v_res = title.height + header.height + pitch_y * tallest + layout.meter_canvas_margin;

        let view_name = &self.config.titles.meter_view;
        let view_id = self.create_view(view_name, h_res, v_res, sink)?;

        let mut x = layout.meter_start_x;
        let mut y = layout.meter_start_y;
        self.stamp(
            engine,
            &names.meters_title,
            view_id,
            x,
            y,
            &Overrides::new().display_name(view_name.as_str()),
            sink,
        )?;
        y += title.height + layout.meter_spacing_y;

        let meter_template = self.catalog.get(&names.meter)?;
        for column in &columns {
            let mut column_y = y;
            let head = self.stamp(
                engine,
                &names.meters_group,
                view_id,
                x,
                column_y,
                &Overrides::new()
                    .display_name(column.group.name.as_str())
                    .target_id(column.group.group_id),
                sink,
            )?;
            let nav = engine.extend(
                self.store,
                head.joined_id,
                nav_template,
                view_id,
                x - 1,
                column_y - 1,
                &Overrides::new()
                    .display_name(column.group.name.as_str())
                    .target(column.source.view_id, NO_CHANNEL)
                    .width(header.width + 2),
            )?;
            report(&nav, sink);
            column_y += header.height + layout.meter_header_gap;

            for channel in &column.channels {
                let can_id = self.store.device_can_id(channel.target_id)?;
                let label = meter_label(&channel.name, can_id.as_deref(), channel.target_channel);
                let stamp = engine.extend(
                    self.store,
                    head.joined_id,
                    meter_template,
                    view_id,
                    x,
                    column_y,
                    &Overrides::new()
                        .display_name(label)
                        .target(channel.target_id, channel.target_channel),
                )?;
                report(&stamp, sink);
                column_y += pitch_y;
            }
            tracing::debug!(group = %column.group.name, meters = column.channels.len(), "placed meter column");
            x += pitch_x;
        }

        Ok(GeneratedView {
            view_id,
            name: view_name.clone(),
            h_res,
            v_res,
            panels: columns.len(),
        })
    }
}
