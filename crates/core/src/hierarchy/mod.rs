//! Creation and removal of generated group trees.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use rusqlite::{params, OptionalExtension};
use serde::Serialize;

use crate::error::{DomainError, Missing, Result};
use crate::store::{GroupKind, ProjectStore};
use crate::topology::{self, Channel, SourceGroupType, SubArraySide, Topology, TopologyTag};

/// Containers and leaves created for the SUBarray source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubArrayGroups {
    pub name: String,
    pub root_id: i64,
    pub subs_id: i64,
    pub sides: Vec<SideGroup>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SideGroup {
    pub side: SubArraySide,
    pub group_id: i64,
    pub leaf_ids: Vec<i64>,
}

/// A container holding one device leaf per channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeafGroup {
    pub group_id: i64,
    pub leaf_ids: Vec<i64>,
}

/// Reads the L/R/C bucket out of a cabinet name such as `SL-SUB L01-02`.
pub fn cabinet_side(name: &str) -> Option<SubArraySide> {
    static GRAMMAR: OnceLock<Option<Regex>> = OnceLock::new();
    let grammar = GRAMMAR
        .get_or_init(|| Regex::new(r"(?:^|\s)([LRC])\d{2}-\d{2}(?:\s|$)").ok())
        .as_ref()?;
    let captures = grammar.captures_iter(name).last()?;
    let letter = captures.get(1)?.as_str().chars().next()?;
    SubArraySide::from_letter(letter)
}

/// Group tree operations over one project.
pub struct Hierarchy<'a> {
    store: &'a ProjectStore,
}

impl<'a> Hierarchy<'a> {
    pub fn new(store: &'a ProjectStore) -> Self {
        Self { store }
    }

    /// Inserts an untargeted group. Ids come from the table's rowid, so
    /// callers must not create groups concurrently.
    pub fn create_container(&self, name: &str, parent_id: i64) -> Result<i64> {
        self.require_parent(parent_id)?;
        let id = self
            .store
            .insert_group(name, parent_id, 0, -1, GroupKind::Container)?;
        tracing::debug!(name, parent_id, group_id = id, "created container group");
        Ok(id)
    }

    pub fn create_device_leaf(
        &self,
        name: &str,
        parent_id: i64,
        target_id: i64,
        target_channel: i64,
    ) -> Result<i64> {
        self.require_parent(parent_id)?;
        Ok(self
            .store
            .insert_group(name, parent_id, target_id, target_channel, GroupKind::Device)?)
    }

    fn require_parent(&self, parent_id: i64) -> Result<()> {
        match self.store.group(parent_id)? {
            Some(_) => Ok(()),
            None => Err(Missing::Group(format!("#{parent_id}")).into()),
        }
    }

    /// Deletes `root_id` and everything below it, leaves first. Returns the
    /// number of rows removed; an absent root removes nothing.
    pub fn delete_subtree(&self, root_id: i64) -> Result<usize> {
        if self.store.group(root_id)?.is_none() {
            return Ok(0);
        }

        let mut visited = HashSet::from([root_id]);
        let mut order = Vec::new();
        let mut stack = vec![(root_id, false)];
        while let Some((group_id, expanded)) = stack.pop() {
            if expanded {
                order.push(group_id);
                continue;
            }
            stack.push((group_id, true));
            for child in self.store.child_groups(group_id)? {
                if visited.insert(child.group_id) {
                    stack.push((child.group_id, false));
                }
            }
        }

        let mut removed = 0;
        for group_id in order {
            removed += self.store.delete_group(group_id)?;
        }
        tracing::debug!(root_id, removed, "deleted group subtree");
        Ok(removed)
    }

    /// Splits the SUBarray source's cabinets into L/R/C containers below
    /// `parent_id`.
    ///
    /// Fails with [`Missing::SubArraySource`] when the project has no SUBarray
    /// and with [`DomainError::EmptySubArrayBucket`] when one of `required`
    /// matched no cabinet. Both checks run before anything is written.
    pub fn build_subarray_lrc(
        &self,
        parent_id: i64,
        required: &[SubArraySide],
    ) -> Result<SubArrayGroups> {
        let name = self.subarray_source_name()?.ok_or(Missing::SubArraySource)?;

        let mut seen = HashSet::new();
        let mut buckets: Vec<(SubArraySide, Vec<Channel>)> =
            SubArraySide::ALL.iter().map(|side| (*side, Vec::new())).collect();
        for group in self.store.groups_named(&name)? {
            for channel in topology::channels_under(self.store, group.group_id)? {
                let Some(side) = cabinet_side(&channel.name) else {
                    continue;
                };
                if !seen.insert((channel.target_id, channel.target_channel)) {
                    continue;
                }
                if let Some((_, bucket)) = buckets.iter_mut().find(|(s, _)| *s == side) {
                    bucket.push(channel);
                }
            }
        }

        for side in required {
            if buckets.iter().any(|(s, b)| s == side && b.is_empty()) {
                return Err(DomainError::EmptySubArrayBucket(*side).into());
            }
        }

        let root_id = self.create_container(&name, parent_id)?;
        let subs_id = self.create_container(&format!("{name} SUBs"), root_id)?;
        let mut sides = Vec::new();
        for (side, channels) in buckets {
            if channels.is_empty() {
                continue;
            }
            let group_id = self.create_container(&format!("{name} SUBs {side}"), subs_id)?;
            let leaf_ids = channels
                .iter()
                .map(|ch| self.create_device_leaf(&ch.name, group_id, ch.target_id, ch.target_channel))
                .collect::<Result<Vec<_>>>()?;
            tracing::info!(source = %name, %side, channels = leaf_ids.len(), "assigned SUBarray channels");
            sides.push(SideGroup {
                side,
                group_id,
                leaf_ids,
            });
        }

        Ok(SubArrayGroups {
            name,
            root_id,
            subs_id,
            sides,
        })
    }

    fn subarray_source_name(&self) -> Result<Option<String>> {
        Ok(self
            .store
            .conn()
            .query_row(
                "SELECT Name FROM SourceGroups WHERE Type = ?1 AND OrderIndex != -1 \
                 ORDER BY OrderIndex, SourceGroupId LIMIT 1",
                params![SourceGroupType::SubArray.code()],
                |row| row.get(0),
            )
            .optional()?)
    }

    /// Creates the AP container with one leaf per TOPs channel of every
    /// array-processing source.
    pub fn build_ap_group(&self, parent_id: i64, name: &str, topology: &Topology) -> Result<LeafGroup> {
        let channels: Vec<&Channel> = topology
            .sources()
            .iter()
            .filter(|source| source.has_array_processing())
            .flat_map(|source| &source.channel_groups)
            .filter(|group| group.tag() == TopologyTag::Tops)
            .flat_map(|group| &group.channels)
            .collect();
        if channels.is_empty() {
            return Err(DomainError::NoArrayProcessingChannels.into());
        }

        let group_id = self.create_container(name, parent_id)?;
        let leaf_ids = channels
            .iter()
            .map(|ch| self.create_device_leaf(&ch.name, group_id, ch.target_id, ch.target_channel))
            .collect::<Result<Vec<_>>>()?;
        tracing::info!(channels = leaf_ids.len(), "assigned AP channels");
        Ok(LeafGroup { group_id, leaf_ids })
    }

    /// Creates a container with one leaf per distinct channel of every source,
    /// used for the project-wide MUTE, FALLBACK and DS DATA groups.
    pub fn build_all_channels_group(
        &self,
        parent_id: i64,
        name: &str,
        topology: &Topology,
    ) -> Result<LeafGroup> {
        let mut seen = HashSet::new();
        let channels: Vec<&Channel> = topology
            .sources()
            .iter()
            .flat_map(|source| &source.channel_groups)
            .flat_map(|group| &group.channels)
            .filter(|ch| seen.insert((ch.target_id, ch.target_channel)))
            .collect();

        let group_id = self.create_container(name, parent_id)?;
        let leaf_ids = channels
            .iter()
            .map(|ch| self.create_device_leaf(&ch.name, group_id, ch.target_id, ch.target_channel))
            .collect::<Result<Vec<_>>>()?;
        tracing::info!(group = name, channels = leaf_ids.len(), "assigned channels");
        Ok(LeafGroup { group_id, leaf_ids })
    }

    /// Copies the SUBarray's centre channels into its left container so the
    /// left group drives both. Returns the number of leaves added.
    pub fn merge_subs_c_into_subs_l(&self, topology: &Topology) -> Result<usize> {
        let Some(source) = topology.source_of_kind(SourceGroupType::SubArray) else {
            return Ok(0);
        };
        let (Some(left), Some(centre)) = (
            source.channel_group(TopologyTag::SubsL),
            source.channel_group(TopologyTag::SubsC),
        ) else {
            return Ok(0);
        };
        for channel in &centre.channels {
            self.create_device_leaf(
                &channel.name,
                left.group_id,
                channel.target_id,
                channel.target_channel,
            )?;
        }
        Ok(centre.channels.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TopologyConfig;
    use crate::error::AutoR1Error;
    use crate::test_support::ProjectFixture;

    #[test]
    fn parses_cabinet_suffixes() {
        assert_eq!(cabinet_side("SUBarray L01-02"), Some(SubArraySide::Left));
        assert_eq!(cabinet_side("SL-SUB R12-01"), Some(SubArraySide::Right));
        assert_eq!(cabinet_side("SUB C03-04 spare"), Some(SubArraySide::Centre));
        assert_eq!(cabinet_side("SUB L1-02"), None);
        assert_eq!(cabinet_side("SUBL01-02"), None);
        assert_eq!(cabinet_side("Main TOPs"), None);
    }

    #[test]
    fn creates_containers_and_leaves() {
        let store = ProjectFixture::stereo_array().into_store();
        let hierarchy = Hierarchy::new(&store);
        let root = hierarchy.create_container("AUTO", 1).unwrap();
        let leaf = hierarchy.create_device_leaf("Amp 1", root, 7, 2).unwrap();

        let row = store.group(leaf).unwrap().unwrap();
        assert_eq!(row.parent_id, root);
        assert_eq!((row.target_id, row.target_channel, row.kind), (7, 2, GroupKind::Device));

        let err = hierarchy.create_container("orphan", 9_999).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn delete_subtree_removes_root_and_descendants() {
        let store = ProjectFixture::stereo_array().into_store();
        let before = store.row_counts().unwrap().groups;
        let hierarchy = Hierarchy::new(&store);
        let root = hierarchy.create_container("AUTO", 1).unwrap();
        let mid = hierarchy.create_container("mid", root).unwrap();
        hierarchy.create_device_leaf("a", mid, 1, 0).unwrap();
        hierarchy.create_device_leaf("b", root, 1, 1).unwrap();

        assert_eq!(hierarchy.delete_subtree(root).unwrap(), 4);
        assert_eq!(store.row_counts().unwrap().groups, before);
        assert_eq!(hierarchy.delete_subtree(root).unwrap(), 0);
    }

    #[test]
    fn delete_subtree_terminates_on_cycles() {
        let store = ProjectFixture::stereo_array().into_store();
        let hierarchy = Hierarchy::new(&store);
        let a = hierarchy.create_container("a", 1).unwrap();
        let b = hierarchy.create_container("b", a).unwrap();
        store
            .conn()
            .execute("UPDATE Groups SET ParentId = ?1 WHERE GroupId = ?2", params![b, a])
            .unwrap();

        assert_eq!(hierarchy.delete_subtree(a).unwrap(), 2);
    }

    #[test]
    fn subarray_requires_a_source() {
        let store = ProjectFixture::stereo_array().into_store();
        let err = Hierarchy::new(&store).build_subarray_lrc(1, &[]).unwrap_err();
        assert!(matches!(err, AutoR1Error::NotFound(Missing::SubArraySource)));
    }

    #[test]
    fn subarray_buckets_linked_cabinets() {
        let store = ProjectFixture::subarray().into_store();
        let before = store.row_counts().unwrap().groups;
        let groups = Hierarchy::new(&store)
            .build_subarray_lrc(1, &[SubArraySide::Left])
            .unwrap();

        let sides: Vec<(SubArraySide, usize)> = groups
            .sides
            .iter()
            .map(|s| (s.side, s.leaf_ids.len()))
            .collect();
        assert_eq!(
            sides,
            vec![
                (SubArraySide::Left, 2),
                (SubArraySide::Right, 2),
                (SubArraySide::Centre, 1)
            ]
        );
        assert_eq!(store.row_counts().unwrap().groups, before + 2 + 3 + 5);
        assert_eq!(
            store.group(groups.sides[2].group_id).unwrap().unwrap().name,
            "SUBarray SUBs C"
        );
    }

    #[test]
    fn required_empty_bucket_fails_before_writing() {
        let store = ProjectFixture::subarray().with_linked_centre().into_store();
        let before = store.row_counts().unwrap();
        let err = Hierarchy::new(&store)
            .build_subarray_lrc(1, &[SubArraySide::Centre])
            .unwrap_err();

        assert!(matches!(
            err,
            AutoR1Error::Domain(DomainError::EmptySubArrayBucket(SubArraySide::Centre))
        ));
        assert_eq!(store.row_counts().unwrap(), before);
    }

    #[test]
    fn ap_group_collects_tops_of_enabled_sources() {
        let store = ProjectFixture::stereo_array().into_store();
        let topology = topology::discover(&store, &TopologyConfig::default()).unwrap();
        let ap = Hierarchy::new(&store).build_ap_group(1, "AP", &topology).unwrap();

        assert_eq!(ap.leaf_ids.len(), 4);
        assert_eq!(store.child_groups(ap.group_id).unwrap().len(), 4);
    }

    #[test]
    fn ap_group_without_enabled_sources_is_a_domain_error() {
        let store = ProjectFixture::stereo_array().without_array_processing().into_store();
        let topology = topology::discover(&store, &TopologyConfig::default()).unwrap();
        let before = store.row_counts().unwrap();

        let err = Hierarchy::new(&store).build_ap_group(1, "AP", &topology).unwrap_err();
        assert!(matches!(err, AutoR1Error::Domain(DomainError::NoArrayProcessingChannels)));
        assert_eq!(store.row_counts().unwrap(), before);
    }

    #[test]
    fn all_channels_group_takes_each_channel_once() {
        let store = ProjectFixture::stereo_array().into_store();
        let topology = topology::discover(&store, &TopologyConfig::default()).unwrap();
        let mute = Hierarchy::new(&store)
            .build_all_channels_group(1, "MUTE", &topology)
            .unwrap();

        // Main TOPs 4 (shared with TOPs L/R), Main SUBs 2, Front 2
        assert_eq!(mute.leaf_ids.len(), 8);
        let mut targets: Vec<(i64, i64)> = store
            .child_groups(mute.group_id)
            .unwrap()
            .iter()
            .map(|g| (g.target_id, g.target_channel))
            .collect();
        targets.sort();
        targets.dedup();
        assert_eq!(targets.len(), 8);
    }

    #[test]
    fn merges_centre_channels_into_left() {
        let store = ProjectFixture::subarray().into_store();
        let hierarchy = Hierarchy::new(&store);
        let root = hierarchy.create_container("AUTO", 1).unwrap();
        let groups = hierarchy.build_subarray_lrc(root, &[]).unwrap();
        let topology = topology::discover(&store, &TopologyConfig::default()).unwrap();

        assert_eq!(hierarchy.merge_subs_c_into_subs_l(&topology).unwrap(), 1);
        let left = groups.sides[0].group_id;
        assert_eq!(store.child_groups(left).unwrap().len(), 3);
    }
}
