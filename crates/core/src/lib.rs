//! Core library for the AutoR1 generator.
//!
//! Reads the speaker topology of an R1 project file, builds derived group
//! trees from it (including the project-wide MUTE, FALLBACK and DS DATA
//! groups) and lays out generated meter, master and EQ views from a
//! template catalog. Everything it adds can be removed again with
//! [`Generator::clean`], leaving the project's row counts as they were.

pub mod config;
pub mod control;
pub mod error;
pub mod events;
pub mod hierarchy;
pub mod instantiate;
pub mod layout;
pub mod orchestrator;
pub mod store;
pub mod template;
pub mod topology;

#[cfg(test)]
mod test_support;

pub use config::{GeneratorConfig, LayoutConfig, TemplateNames, Titles, TopologyConfig, ViewOptions};
pub use control::{Control, ControlType, Overrides, TargetType};
pub use error::{AutoR1Error, DomainError, Missing, Result};
pub use events::{EventSink, GenerationEvent, TracingSink};
pub use hierarchy::{Hierarchy, LeafGroup, SideGroup, SubArrayGroups};
pub use instantiate::{Stamp, TemplateEngine};
pub use layout::{GeneratedView, LayoutGenerator, MasterTargets};
pub use orchestrator::{CleanReport, GenerationReport, Generator, ProjectState};
pub use store::{ProjectStore, RowCounts};
pub use template::{Size, Template, TemplateCatalog};
pub use topology::{
    discover, discover_preferring, Channel, ChannelGroup, SourceGroup, SourceGroupType, SubArraySide, Topology,
    TopologyTag,
};
