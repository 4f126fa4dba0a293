//! Typed model of the sources in a project and the role-specific channel
//! groups the vendor application creates for them.
//!
//! Everything here is a read-only snapshot built by [`discover`]; nothing in
//! this module is written back to the project.

mod discover;

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

pub use discover::{discover, discover_preferring};
pub(crate) use discover::channels_under;

/// `SourceGroups.Type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceGroupType {
    Array,
    PointSource,
    SubArray,
    AdditionalAmplifier,
    UnusedChannels,
}

impl SourceGroupType {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Self::Array),
            2 => Some(Self::PointSource),
            3 => Some(Self::SubArray),
            4 => Some(Self::AdditionalAmplifier),
            5 => Some(Self::UnusedChannels),
            _ => None,
        }
    }

    pub fn code(self) -> i64 {
        match self {
            Self::Array => 1,
            Self::PointSource => 2,
            Self::SubArray => 3,
            Self::AdditionalAmplifier => 4,
            Self::UnusedChannels => 5,
        }
    }
}

/// Role of a channel group within its source. Fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TopologyTag {
    Tops,
    TopsL,
    TopsR,
    Subs,
    SubsL,
    SubsR,
    SubsC,
    Point,
    AdditionalAmplifier,
}

impl TopologyTag {
    /// Container-name suffix the vendor application uses for this role.
    pub fn suffix(self) -> Option<&'static str> {
        match self {
            Self::Tops => Some(" TOPs"),
            Self::TopsL => Some(" TOPs L"),
            Self::TopsR => Some(" TOPs R"),
            Self::Subs => Some(" SUBs"),
            Self::SubsL => Some(" SUBs L"),
            Self::SubsR => Some(" SUBs R"),
            Self::SubsC => Some(" SUBs C"),
            Self::Point | Self::AdditionalAmplifier => None,
        }
    }

    pub fn is_left_or_right(self) -> bool {
        matches!(
            self,
            Self::SubsL | Self::SubsR | Self::SubsC | Self::TopsL | Self::TopsR
        )
    }

    pub fn is_left(self) -> bool {
        matches!(self, Self::SubsL | Self::TopsL)
    }

    pub fn is_right(self) -> bool {
        matches!(self, Self::SubsR | Self::TopsR)
    }

    pub fn is_subs(self) -> bool {
        matches!(self, Self::Subs | Self::SubsL | Self::SubsR | Self::SubsC)
    }

    pub fn is_tops(self) -> bool {
        matches!(self, Self::Tops | Self::TopsL | Self::TopsR)
    }

    /// The `[left, right]` tags hanging below a parent tag.
    fn pair_of(self) -> Option<(Self, Self)> {
        match self {
            Self::Tops | Self::TopsL | Self::TopsR => Some((Self::TopsL, Self::TopsR)),
            Self::Subs | Self::SubsL | Self::SubsR => Some((Self::SubsL, Self::SubsR)),
            _ => None,
        }
    }
}

/// Bucket of a SUBarray cabinet, read from its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubArraySide {
    #[serde(rename = "L")]
    Left,
    #[serde(rename = "R")]
    Right,
    #[serde(rename = "C")]
    Centre,
}

impl SubArraySide {
    pub const ALL: [Self; 3] = [Self::Left, Self::Right, Self::Centre];

    pub fn letter(self) -> char {
        match self {
            Self::Left => 'L',
            Self::Right => 'R',
            Self::Centre => 'C',
        }
    }

    pub fn from_letter(letter: char) -> Option<Self> {
        match letter {
            'L' => Some(Self::Left),
            'R' => Some(Self::Right),
            'C' => Some(Self::Centre),
            _ => None,
        }
    }

    pub fn tag(self) -> TopologyTag {
        match self {
            Self::Left => TopologyTag::SubsL,
            Self::Right => TopologyTag::SubsR,
            Self::Centre => TopologyTag::SubsC,
        }
    }
}

impl fmt::Display for SubArraySide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// One amplifier channel driving a cabinet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Channel {
    pub group_id: i64,
    pub name: String,
    pub target_id: i64,
    pub target_channel: i64,
    pub cabinet_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelGroup {
    pub group_id: i64,
    pub name: String,
    tag: TopologyTag,
    pub channels: Vec<Channel>,
}

impl ChannelGroup {
    pub fn new(group_id: i64, name: impl Into<String>, tag: TopologyTag, channels: Vec<Channel>) -> Self {
        Self {
            group_id,
            name: name.into(),
            tag,
            channels,
        }
    }

    pub fn tag(&self) -> TopologyTag {
        self.tag
    }

    pub fn is_left_or_right(&self) -> bool {
        self.tag.is_left_or_right()
    }

    pub fn is_left(&self) -> bool {
        self.tag.is_left()
    }

    pub fn is_right(&self) -> bool {
        self.tag.is_right()
    }

    pub fn is_subs(&self) -> bool {
        self.tag.is_subs()
    }

    pub fn is_tops(&self) -> bool {
        self.tag.is_tops()
    }

    pub fn is_point_source(&self) -> bool {
        self.tag == TopologyTag::Point
    }

    pub fn is_additional_amplifier(&self) -> bool {
        self.tag == TopologyTag::AdditionalAmplifier
    }

    /// Whether the CPL filter panel applies to this group.
    pub fn has_crossover_panel(&self) -> bool {
        self.is_tops() || self.is_point_source() || self.is_additional_amplifier()
    }

    /// Delay and level inputs show values relative to the source.
    pub fn has_relative_delay(&self, source: &SourceGroup) -> bool {
        source.kind == SourceGroupType::PointSource
            || (self.tag == TopologyTag::Subs
                && source.kind == SourceGroupType::Array
                && !source.symmetric)
    }

    pub fn first_channel(&self) -> Option<&Channel> {
        self.channels.first()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceGroup {
    pub id: i64,
    pub kind: SourceGroupType,
    pub name: String,
    pub order_index: i64,
    /// Source this one is stereo-linked to, if any.
    pub next_source_group_id: Option<i64>,
    pub array_processing: bool,
    /// ArraySight device of this source and, for a stereo pair, of its
    /// right-hand half.
    pub array_sight_id: Option<i64>,
    pub array_sight_id_r: Option<i64>,
    pub symmetric: bool,
    pub mounting: Option<i64>,
    /// Cabinet family, e.g. `GSL`.
    pub system: Option<String>,
    /// Text of the crossover switch on the source's view.
    pub xover: Option<String>,
    pub view_id: i64,
    pub main_group_id: i64,
    /// Source group directly under the vendor master group.
    pub master_group_id: Option<i64>,
    pub child_group_ids: Vec<i64>,
    pub channel_groups: Vec<ChannelGroup>,
}

impl SourceGroup {
    pub fn has_array_processing(&self) -> bool {
        self.array_processing
    }

    pub fn has_cpl_v2(&self) -> bool {
        match self.system.as_deref() {
            Some("GSL") | Some("KSL") => true,
            Some("XSL") => self.kind == SourceGroupType::Array,
            _ => false,
        }
    }

    pub fn has_load_match(&self) -> bool {
        !matches!(
            self.kind,
            SourceGroupType::AdditionalAmplifier | SourceGroupType::UnusedChannels
        )
    }

    pub fn has_eq_view(&self) -> bool {
        self.has_load_match()
    }

    /// ArraySight ids to bind, left first.
    pub fn array_sight_ids(&self) -> Vec<i64> {
        self.array_sight_id
            .into_iter()
            .chain(self.array_sight_id.and(self.array_sight_id_r))
            .collect()
    }

    pub fn has_tops(&self) -> bool {
        self.channel_groups.iter().any(ChannelGroup::is_tops)
    }

    pub fn has_subs(&self) -> bool {
        self.channel_groups.iter().any(ChannelGroup::is_subs)
    }

    pub fn channel_group(&self, tag: TopologyTag) -> Option<&ChannelGroup> {
        self.channel_groups.iter().find(|group| group.tag == tag)
    }
}

/// Discovered sources plus a non-owning sibling lookup keyed by
/// `(source id, tag)`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Topology {
    sources: Vec<SourceGroup>,
    #[serde(skip)]
    siblings: HashMap<(i64, TopologyTag), (usize, usize)>,
    /// Sources whose names did not match the container grammar and were
    /// treated as a single POINT group.
    pub fallbacks: Vec<String>,
}

impl Topology {
    pub fn new(sources: Vec<SourceGroup>) -> Self {
        let mut siblings = HashMap::new();
        for (source_idx, source) in sources.iter().enumerate() {
            for (group_idx, group) in source.channel_groups.iter().enumerate() {
                siblings.insert((source.id, group.tag), (source_idx, group_idx));
            }
        }
        Self {
            sources,
            siblings,
            fallbacks: Vec::new(),
        }
    }

    pub fn sources(&self) -> &[SourceGroup] {
        &self.sources
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn channel_group_count(&self) -> usize {
        self.sources.iter().map(|s| s.channel_groups.len()).sum()
    }

    pub fn sibling(&self, source_id: i64, tag: TopologyTag) -> Option<&ChannelGroup> {
        let &(source_idx, group_idx) = self.siblings.get(&(source_id, tag))?;
        self.sources.get(source_idx)?.channel_groups.get(group_idx)
    }

    /// `[left, right]` for a parent or left group, when both halves exist.
    pub fn lr_pair(&self, source_id: i64, tag: TopologyTag) -> Option<[&ChannelGroup; 2]> {
        let (left, right) = tag.pair_of()?;
        Some([self.sibling(source_id, left)?, self.sibling(source_id, right)?])
    }

    pub fn is_stereo(&self, source: &SourceGroup) -> bool {
        self.lr_pair(source.id, TopologyTag::Tops).is_some()
            || self.lr_pair(source.id, TopologyTag::Subs).is_some()
    }

    pub fn any_array_processing(&self) -> bool {
        self.sources.iter().any(SourceGroup::has_array_processing)
    }

    pub fn source_of_kind(&self, kind: SourceGroupType) -> Option<&SourceGroup> {
        self.sources.iter().find(|source| source.kind == kind)
    }
}

#[cfg(test)]
pub(crate) fn source(id: i64, kind: SourceGroupType, name: &str, groups: Vec<ChannelGroup>) -> SourceGroup {
    SourceGroup {
        id,
        kind,
        name: name.to_string(),
        order_index: id,
        next_source_group_id: None,
        array_processing: false,
        array_sight_id: None,
        array_sight_id_r: None,
        symmetric: true,
        mounting: None,
        system: None,
        xover: None,
        view_id: 100 + id,
        main_group_id: 200 + id,
        master_group_id: Some(300 + id),
        child_group_ids: Vec::new(),
        channel_groups: groups,
    }
}
