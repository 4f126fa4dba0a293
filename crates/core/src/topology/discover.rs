use std::collections::HashSet;

use rusqlite::params;

use super::{Channel, ChannelGroup, SourceGroup, SourceGroupType, Topology, TopologyTag};
use crate::config::TopologyConfig;
use crate::error::{AutoR1Error, Result};
use crate::store::{GroupRow, ProjectStore};

const UNUSED_CHANNELS: &str = "Unused channels";
const CROSSOVER_LABELS: [&str; 2] = ["100Hz", "Infra"];

/// Fixed discovery order of the role containers below a source's main group.
const CONTAINER_ORDER: [(TopologyTag, Option<TopologyTag>); 7] = [
    (TopologyTag::Tops, None),
    (TopologyTag::TopsL, Some(TopologyTag::Tops)),
    (TopologyTag::TopsR, Some(TopologyTag::Tops)),
    (TopologyTag::Subs, None),
    (TopologyTag::SubsL, Some(TopologyTag::Subs)),
    (TopologyTag::SubsR, Some(TopologyTag::Subs)),
    (TopologyTag::SubsC, Some(TopologyTag::Subs)),
];

struct SourceRow {
    id: i64,
    kind: SourceGroupType,
    name: String,
    order_index: i64,
    next_source_group_id: Option<i64>,
    array_processing: bool,
    array_sight_id: Option<i64>,
    array_sight_id_r: Option<i64>,
    symmetric: bool,
    mounting: Option<i64>,
    system: Option<String>,
}

/// Builds the typed topology of every qualifying source in the project.
pub fn discover(store: &ProjectStore, config: &TopologyConfig) -> Result<Topology> {
    discover_preferring(store, config, &[])
}

/// Like [`discover`], but a group listed in `preferred` wins the main-group
/// choice for the source it is named after. `generate` passes the SUBarray
/// containers it has just built, so that any other group sharing the
/// source's name is ignored.
pub fn discover_preferring(
    store: &ProjectStore,
    config: &TopologyConfig,
    preferred: &[i64],
) -> Result<Topology> {
    let master_id = store
        .master_group_id()?
        .ok_or_else(|| AutoR1Error::NotInitialised("no Master group".to_string()))?;

    let mut sources = Vec::new();
    let mut fallbacks = Vec::new();
    for row in source_rows(store)? {
        let view_id = store.view_id_by_name(&row.name)?.ok_or_else(|| {
            AutoR1Error::schema(format!("source group `{}` has no view", row.name))
        })?;
        let main = main_group(store, &row, master_id, preferred)?;

        let mut channel_groups = role_containers(store, &main)?;
        if channel_groups.is_empty() {
            let tag = if row.kind == SourceGroupType::AdditionalAmplifier {
                TopologyTag::AdditionalAmplifier
            } else {
                TopologyTag::Point
            };
            if matches!(row.kind, SourceGroupType::Array | SourceGroupType::SubArray) {
                if config.strict_names {
                    return Err(AutoR1Error::schema(format!(
                        "source group `{}` has no TOPs or SUBs containers",
                        row.name
                    )));
                }
                tracing::warn!(source = %row.name, "no TOPs/SUBs containers, treating as point source");
                fallbacks.push(row.name.clone());
            }
            channel_groups.push(ChannelGroup::new(
                main.group_id,
                main.name.clone(),
                tag,
                channels_under(store, main.group_id)?,
            ));
        }

        let master_group_id = store.child_group_id_by_name(master_id, &row.name)?;
        let child_group_ids = match master_group_id {
            Some(id) => store.child_groups(id)?.into_iter().map(|g| g.group_id).collect(),
            None => Vec::new(),
        };
        let xover = store.control_text_on_view(view_id, &CROSSOVER_LABELS)?;

        tracing::debug!(
            source = %row.name,
            groups = channel_groups.len(),
            xover = ?xover,
            "discovered source group"
        );
        sources.push(SourceGroup {
            id: row.id,
            kind: row.kind,
            name: row.name,
            order_index: row.order_index,
            next_source_group_id: row.next_source_group_id,
            array_processing: row.array_processing,
            array_sight_id: row.array_sight_id,
            array_sight_id_r: row.array_sight_id_r,
            symmetric: row.symmetric,
            mounting: row.mounting,
            system: row.system,
            xover,
            view_id,
            main_group_id: main.group_id,
            master_group_id,
            child_group_ids,
            channel_groups,
        });
    }

    let mut topology = Topology::new(sources);
    topology.fallbacks = fallbacks;
    Ok(topology)
}

fn source_rows(store: &ProjectStore) -> Result<Vec<SourceRow>> {
    let mut stmt = store.conn().prepare(
        "SELECT sg.SourceGroupId, sg.Type, sg.Name, sg.OrderIndex, sg.NextSourceGroupId, \
                sg.ArrayProcessingEnable, sg.Symmetric, sg.Mounting, ad.System, \
                sg.ArraySightId, nx.ArraySightId \
         FROM SourceGroups sg \
         LEFT JOIN SourceGroupsAdditionalData ad ON ad.SourceGroupId = sg.SourceGroupId \
         LEFT JOIN SourceGroups nx ON nx.SourceGroupId = sg.NextSourceGroupId \
         WHERE sg.Name != ?1 AND sg.OrderIndex != -1 \
         ORDER BY sg.OrderIndex, sg.SourceGroupId",
    )?;
    let mut rows = stmt.query(params![UNUSED_CHANNELS])?;
    let mut sources = Vec::new();
    while let Some(row) = rows.next()? {
        let code: i64 = row.get(1)?;
        let name: String = row.get(2)?;
        let Some(kind) = SourceGroupType::from_code(code) else {
            tracing::debug!(%name, code, "skipping source group with unknown type");
            continue;
        };
        if kind == SourceGroupType::UnusedChannels {
            continue;
        }
        sources.push(SourceRow {
            id: row.get(0)?,
            kind,
            name,
            order_index: row.get(3)?,
            next_source_group_id: row.get::<_, Option<i64>>(4)?.filter(|id| *id > 0),
            array_processing: row.get::<_, Option<i64>>(5)?.unwrap_or_default() != 0,
            symmetric: row.get::<_, Option<i64>>(6)?.unwrap_or_default() != 0,
            mounting: row.get(7)?,
            system: row.get(8)?,
            array_sight_id: row.get::<_, Option<i64>>(9)?.filter(|id| *id > 0),
            array_sight_id_r: row.get::<_, Option<i64>>(10)?.filter(|id| *id > 0),
        });
    }
    Ok(sources)
}

/// Picks the group that carries a source's role containers.
///
/// A point source lives directly under `Master`. An array or SUBarray is
/// looked up outside `Master`, ranked: a `preferred` id, then a group whose
/// TOPs/SUBs container is split into sides, then any group with a TOPs/SUBs
/// container, then any group outside `Master`, then its `Master` child.
fn main_group(
    store: &ProjectStore,
    source: &SourceRow,
    master_id: i64,
    preferred: &[i64],
) -> Result<GroupRow> {
    let candidates = store.groups_named(&source.name)?;
    let chosen = match source.kind {
        SourceGroupType::PointSource => candidates.into_iter().find(|g| g.parent_id == master_id),
        SourceGroupType::Array | SourceGroupType::SubArray => {
            let (under_master, outside): (Vec<GroupRow>, Vec<GroupRow>) = candidates
                .into_iter()
                .partition(|g| g.parent_id == master_id);
            let mut best: Option<(u8, &GroupRow)> = None;
            for group in &outside {
                let rank = if preferred.contains(&group.group_id) {
                    3
                } else {
                    role_rank(store, group.group_id)?
                };
                if best.map_or(true, |(top, _)| rank > top) {
                    best = Some((rank, group));
                }
            }
            best.map(|(_, group)| group.clone())
                .or_else(|| under_master.into_iter().next())
        }
        _ => candidates.into_iter().next(),
    };
    chosen.ok_or_else(|| {
        AutoR1Error::schema(format!("source group `{}` has no main group", source.name))
    })
}

/// 2 when a TOPs/SUBs child is split into L/R/C containers, 1 for a plain
/// TOPs/SUBs child, 0 otherwise.
fn role_rank(store: &ProjectStore, group_id: i64) -> Result<u8> {
    let mut rank = 0;
    for child in store.child_groups(group_id)? {
        if !(child.name.ends_with(" TOPs") || child.name.ends_with(" SUBs")) {
            continue;
        }
        rank = 1;
        let sided = store.child_groups(child.group_id)?.iter().any(|side| {
            [" L", " R", " C"]
                .iter()
                .any(|suffix| side.name == format!("{}{suffix}", child.name))
        });
        if sided {
            return Ok(2);
        }
    }
    Ok(rank)
}

fn role_containers(store: &ProjectStore, main: &GroupRow) -> Result<Vec<ChannelGroup>> {
    let top_level = store.child_groups(main.group_id)?;
    let mut found: Vec<(TopologyTag, GroupRow)> = Vec::new();

    for (tag, parent_tag) in CONTAINER_ORDER {
        let Some(suffix) = tag.suffix() else { continue };
        let container = match parent_tag {
            None => top_level.iter().find(|g| g.name.ends_with(suffix)).cloned(),
            Some(parent_tag) => {
                let Some((_, parent)) = found.iter().find(|(t, _)| *t == parent_tag) else {
                    continue;
                };
                store
                    .child_groups(parent.group_id)?
                    .into_iter()
                    .find(|g| g.name.ends_with(suffix))
            }
        };
        if let Some(container) = container {
            found.push((tag, container));
        }
    }

    found
        .into_iter()
        .map(|(tag, group)| -> Result<ChannelGroup> {
            let channels = channels_under(store, group.group_id)?;
            Ok(ChannelGroup::new(group.group_id, group.name, tag, channels))
        })
        .collect()
}

/// Device leaves anywhere below `group_id` that drive an unlinked cabinet.
/// `UNION` drops revisited rows, so a cyclic parent chain terminates.
pub(crate) fn channels_under(store: &ProjectStore, group_id: i64) -> Result<Vec<Channel>> {
    let mut stmt = store.conn().prepare(
        "WITH RECURSIVE descendants(GroupId, Name, TargetId, TargetChannel, Type) AS ( \
             SELECT GroupId, Name, TargetId, TargetChannel, Type FROM Groups WHERE ParentId = ?1 \
             UNION \
             SELECT g.GroupId, g.Name, g.TargetId, g.TargetChannel, g.Type \
             FROM Groups g JOIN descendants d ON g.ParentId = d.GroupId \
         ) \
         SELECT d.GroupId, d.Name, d.TargetId, d.TargetChannel, c.CabinetId \
         FROM descendants d \
         JOIN Cabinets c ON c.DeviceId = d.TargetId AND c.AmplifierChannel = d.TargetChannel \
         JOIN CabinetsAdditionalData ad ON ad.CabinetId = c.CabinetId \
         WHERE d.Type = 1 AND ad.Linked = 0 \
         ORDER BY d.Name, d.GroupId",
    )?;
    let rows = stmt.query_map(params![group_id], |row| {
        Ok(Channel {
            group_id: row.get(0)?,
            name: row.get(1)?,
            target_id: row.get(2)?,
            target_channel: row.get(3)?,
            cabinet_id: row.get(4)?,
        })
    })?;

    let mut seen = HashSet::new();
    let mut channels = Vec::new();
    for channel in rows {
        let channel = channel?;
        if seen.insert((channel.target_id, channel.target_channel)) {
            channels.push(channel);
        }
    }
    Ok(channels)
}
