//! Sequences discovery, hierarchy building and layout into `generate` and
//! `clean` passes over one project.
//!
//! Neither pass rolls back on failure. A failed `generate` leaves the working
//! copy half written; callers discard the [`ProjectStore`] instead of saving
//! it. `clean` tolerates every piece being absent, so it also serves as the
//! recovery path for a project saved after a partial run.

use serde::Serialize;

use crate::config::GeneratorConfig;
use crate::error::{AutoR1Error, DomainError, Missing, Result};
use crate::events::{EventSink, GenerationEvent};
use crate::hierarchy::Hierarchy;
use crate::instantiate::TemplateEngine;
use crate::layout::{LayoutGenerator, MasterTargets};
use crate::store::ProjectStore;
use crate::template::TemplateCatalog;
use crate::topology::{self, Topology};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProjectState {
    Unprocessed,
    Generated,
}

/// What a successful `generate` created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationReport {
    pub root_group_id: i64,
    pub subarray_group_id: Option<i64>,
    pub ap_group_id: Option<i64>,
    pub mute_group_id: i64,
    pub fallback_group_id: i64,
    pub ds_group_id: i64,
    pub meter_view_id: i64,
    pub master_view_id: i64,
    pub eq_view_id: Option<i64>,
    pub sources: usize,
    pub meter_columns: usize,
    pub master_panels: usize,
    pub eq_panels: usize,
    pub nav_views: usize,
    pub merged_channels: usize,
}

/// Rows removed by `clean`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CleanReport {
    pub groups: usize,
    pub views: usize,
    pub controls: usize,
    pub nav_views: usize,
}

impl CleanReport {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Runs generate/clean passes with one template catalog and configuration.
pub struct Generator<'a> {
    catalog: &'a TemplateCatalog,
    config: &'a GeneratorConfig,
}

impl<'a> Generator<'a> {
    pub fn new(catalog: &'a TemplateCatalog, config: &'a GeneratorConfig) -> Self {
        Self { catalog, config }
    }

    /// `Generated` as soon as the root namespace or any generated view
    /// exists, including after a partial run.
    pub fn state(&self, store: &ProjectStore) -> Result<ProjectState> {
        let titles = &self.config.titles;
        let mut generated = self.root_group_id(store)?.is_some();
        for view in [&titles.meter_view, &titles.master_view, &titles.eq_view] {
            generated = generated || store.view_id_by_name(view)?.is_some();
        }
        Ok(if generated {
            ProjectState::Generated
        } else {
            ProjectState::Unprocessed
        })
    }

    pub fn generate(
        &self,
        store: &ProjectStore,
        sink: &mut dyn EventSink,
    ) -> Result<GenerationReport> {
        store.ensure_initialised()?;
        if self.state(store)? == ProjectState::Generated {
            return Err(DomainError::AlreadyGenerated.into());
        }

        let titles = &self.config.titles;
        let mut engine = TemplateEngine::for_project(store)?;
        let hierarchy = Hierarchy::new(store);

        let root_group_id = hierarchy.create_container(&titles.root_group, self.config.root_parent_id)?;
        sink.emit(GenerationEvent::GroupCreated {
            name: titles.root_group.clone(),
            group_id: root_group_id,
            parent_id: self.config.root_parent_id,
            leaves: 0,
        });

        let subarray_group_id =
            match hierarchy.build_subarray_lrc(root_group_id, &self.config.subarray.required_sides) {
                Ok(groups) => {
                    for side in &groups.sides {
                        sink.emit(GenerationEvent::GroupCreated {
                            name: format!("{} SUBs {}", groups.name, side.side),
                            group_id: side.group_id,
                            parent_id: groups.subs_id,
                            leaves: side.leaf_ids.len(),
                        });
                    }
                    Some(groups.root_id)
                }
                Err(AutoR1Error::NotFound(Missing::SubArraySource)) => {
                    sink.emit(GenerationEvent::StepSkipped {
                        step: "subarray",
                        reason: "no SUBarray source group".to_string(),
                    });
                    None
                }
                Err(err) => return Err(err),
            };

        let topology = topology::discover_preferring(
            store,
            &self.config.topology,
            subarray_group_id.as_slice(),
        )?;
        sink.emit(GenerationEvent::TopologyDiscovered {
            sources: topology.sources().len(),
            channel_groups: topology.channel_group_count(),
        });
        for source in &topology.fallbacks {
            sink.emit(GenerationEvent::TopologyFallback {
                source: source.clone(),
            });
        }

        let ap_group_id = self.ap_group(&hierarchy, root_group_id, &topology, sink)?;
        let mute_group_id =
            self.function_group(&hierarchy, root_group_id, &titles.mute_group, &topology, sink)?;
        let fallback_group_id =
            self.function_group(&hierarchy, root_group_id, &titles.fallback_group, &topology, sink)?;
        let ds_group_id =
            self.function_group(&hierarchy, root_group_id, &titles.ds_group, &topology, sink)?;
        let targets = MasterTargets {
            ap_group_id,
            mute_group_id: Some(mute_group_id),
            fallback_group_id: Some(fallback_group_id),
            ds_group_id: Some(ds_group_id),
        };

        let layout = LayoutGenerator::new(store, self.catalog, self.config);
        let meter = layout.meter_view(&mut engine, &topology, sink)?;
        let master = layout.master_view(&mut engine, &topology, &meter, &targets, sink)?;
        let eq = if self.config.views.eq_view {
            Some(layout.eq_view(&mut engine, &topology, &master, sink)?)
        } else {
            sink.emit(GenerationEvent::StepSkipped {
                step: "eq_view",
                reason: "disabled in configuration".to_string(),
            });
            None
        };
        let mut generated = vec![meter.view_id];
        generated.extend(eq.as_ref().map(|view| view.view_id));
        let nav_views = layout.insert_nav_buttons(&mut engine, master.view_id, &generated, sink)?;

        let merged_channels = hierarchy.merge_subs_c_into_subs_l(&topology)?;
        if merged_channels > 0 {
            sink.emit(GenerationEvent::ChannelsMerged {
                channels: merged_channels,
            });
        }

        tracing::info!(
            root_group_id,
            meter_view = meter.view_id,
            master_view = master.view_id,
            "generation complete"
        );
        Ok(GenerationReport {
            root_group_id,
            subarray_group_id,
            ap_group_id,
            mute_group_id,
            fallback_group_id,
            ds_group_id,
            meter_view_id: meter.view_id,
            master_view_id: master.view_id,
            eq_view_id: eq.as_ref().map(|view| view.view_id),
            sources: topology.sources().len(),
            meter_columns: meter.panels,
            master_panels: master.panels,
            eq_panels: eq.map_or(0, |view| view.panels),
            nav_views,
            merged_channels,
        })
    }

    /// A project-wide group holding every channel once, driven from one
    /// master control.
    fn function_group(
        &self,
        hierarchy: &Hierarchy<'_>,
        root_group_id: i64,
        name: &str,
        topology: &Topology,
        sink: &mut dyn EventSink,
    ) -> Result<i64> {
        let group = hierarchy.build_all_channels_group(root_group_id, name, topology)?;
        sink.emit(GenerationEvent::GroupCreated {
            name: name.to_string(),
            group_id: group.group_id,
            parent_id: root_group_id,
            leaves: group.leaf_ids.len(),
        });
        Ok(group.group_id)
    }

    fn ap_group(
        &self,
        hierarchy: &Hierarchy<'_>,
        root_group_id: i64,
        topology: &Topology,
        sink: &mut dyn EventSink,
    ) -> Result<Option<i64>> {
        if !topology.any_array_processing() {
            sink.emit(GenerationEvent::StepSkipped {
                step: "array_processing",
                reason: "no source has array processing enabled".to_string(),
            });
            return Ok(None);
        }
        let name = &self.config.titles.ap_group;
        match hierarchy.build_ap_group(root_group_id, name, topology) {
            Ok(group) => {
                sink.emit(GenerationEvent::GroupCreated {
                    name: name.clone(),
                    group_id: group.group_id,
                    parent_id: root_group_id,
                    leaves: group.leaf_ids.len(),
                });
                Ok(Some(group.group_id))
            }
            Err(AutoR1Error::Domain(DomainError::NoArrayProcessingChannels)) => {
                tracing::warn!("array processing is enabled but no TOPs channels were found");
                sink.emit(GenerationEvent::StepSkipped {
                    step: "array_processing",
                    reason: DomainError::NoArrayProcessingChannels.to_string(),
                });
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Removes everything `generate` created. `root_group_id` defaults to
    /// the root namespace group found by name.
    pub fn clean(
        &self,
        store: &ProjectStore,
        root_group_id: Option<i64>,
        sink: &mut dyn EventSink,
    ) -> Result<CleanReport> {
        let titles = &self.config.titles;
        let hierarchy = Hierarchy::new(store);
        let layout = LayoutGenerator::new(store, self.catalog, self.config);
        let mut report = CleanReport::default();

        let master_view_id = store.view_id_by_name(&titles.master_view)?;
        let mut others = Vec::new();
        for name in [&titles.meter_view, &titles.eq_view] {
            if let Some(view_id) = store.view_id_by_name(name)? {
                others.push((name, view_id));
            }
        }
        let generated: Vec<i64> = others.iter().map(|&(_, view_id)| view_id).collect();

        if let Some(view_id) = master_view_id {
            self.remove_view(store, &titles.master_view, view_id, &mut report, sink)?;
            let (views, controls) = layout.remove_nav_buttons(view_id, &generated, sink)?;
            report.nav_views += views;
            report.controls += controls;
        }
        for (name, view_id) in others {
            self.remove_view(store, name, view_id, &mut report, sink)?;
        }

        let root_group_id = match root_group_id {
            Some(id) => Some(id),
            None => self.root_group_id(store)?,
        };
        if let Some(root_group_id) = root_group_id {
            for name in [&titles.mute_group, &titles.fallback_group, &titles.ds_group] {
                let Some(group_id) = store.child_group_id_by_name(root_group_id, name)? else {
                    continue;
                };
                let rows = hierarchy.delete_subtree(group_id)?;
                report.groups += rows;
                sink.emit(GenerationEvent::GroupRemoved {
                    name: name.clone(),
                    rows,
                });
            }
            for child in store.child_groups(root_group_id)? {
                let subs_name = format!("{} SUBs", child.name);
                if store.child_group_id_by_name(child.group_id, &subs_name)?.is_none() {
                    continue;
                }
                let rows = hierarchy.delete_subtree(child.group_id)?;
                report.groups += rows;
                sink.emit(GenerationEvent::GroupRemoved {
                    name: child.name,
                    rows,
                });
            }

            let rows = hierarchy.delete_subtree(root_group_id)?;
            if rows > 0 {
                report.groups += rows;
                sink.emit(GenerationEvent::GroupRemoved {
                    name: titles.root_group.clone(),
                    rows,
                });
            }
        }

        tracing::info!(?report, "clean complete");
        Ok(report)
    }

    /// Clean followed by generate on the same working copy.
    pub fn regenerate(
        &self,
        store: &ProjectStore,
        sink: &mut dyn EventSink,
    ) -> Result<GenerationReport> {
        store.ensure_initialised()?;
        self.clean(store, None, sink)?;
        self.generate(store, sink)
    }

    fn root_group_id(&self, store: &ProjectStore) -> Result<Option<i64>> {
        store.child_group_id_by_name(self.config.root_parent_id, &self.config.titles.root_group)
    }

    fn remove_view(
        &self,
        store: &ProjectStore,
        name: &str,
        view_id: i64,
        report: &mut CleanReport,
        sink: &mut dyn EventSink,
    ) -> Result<()> {
        let controls = store.delete_controls_on_view(view_id)?;
        report.views += store.delete_view(view_id)?;
        report.controls += controls;
        sink.emit(GenerationEvent::ViewRemoved {
            name: name.to_string(),
            view_id,
            controls,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::RowCounts;
    use crate::test_support::{catalog, ProjectFixture};
    use pretty_assertions::assert_eq;

    fn run_generate(store: &ProjectStore) -> (GenerationReport, Vec<GenerationEvent>) {
        let config = GeneratorConfig::default();
        let catalog = catalog();
        let mut events: Vec<GenerationEvent> = Vec::new();
        let report = Generator::new(&catalog, &config)
            .generate(store, &mut events)
            .unwrap();
        (report, events)
    }

    fn run_clean(store: &ProjectStore) -> CleanReport {
        let config = GeneratorConfig::default();
        let catalog = catalog();
        Generator::new(&catalog, &config)
            .clean(store, None, &mut Vec::<GenerationEvent>::new())
            .unwrap()
    }

    #[test]
    fn generate_then_clean_restores_row_counts() {
        for fixture in [ProjectFixture::stereo_array(), ProjectFixture::subarray()] {
            let store = fixture.into_store();
            let before: RowCounts = store.row_counts().unwrap();

            run_generate(&store);
            assert_ne!(store.row_counts().unwrap(), before);

            let report = run_clean(&store);
            assert_eq!(report.views, 3);
            assert_eq!(store.row_counts().unwrap(), before);
        }
    }

    #[test]
    fn clean_on_a_fresh_project_is_a_noop() {
        let store = ProjectFixture::stereo_array().into_store();
        let before = store.row_counts().unwrap();

        let report = run_clean(&store);
        assert!(report.is_empty());
        assert_eq!(store.row_counts().unwrap(), before);
    }

    #[test]
    fn clean_restores_positions_on_foreign_views() {
        let store = ProjectFixture::stereo_array().into_store();
        let main = store.view_id_by_name("Main").unwrap().unwrap();
        let before = store.controls_on_view(main).unwrap();

        let (report, _) = run_generate(&store);
        assert_eq!(report.nav_views, 2);
        assert_eq!(store.controls_on_view(main).unwrap().len(), before.len() + 1);

        let cleaned = run_clean(&store);
        assert_eq!(cleaned.nav_views, 2);
        assert_eq!(store.controls_on_view(main).unwrap(), before);
    }

    #[test]
    fn generate_reports_steps_as_events() {
        let store = ProjectFixture::stereo_array().into_store();
        let (report, events) = run_generate(&store);

        assert_eq!(report.sources, 2);
        assert_eq!(report.meter_columns, 5);
        assert_eq!(report.master_panels, 3);
        assert!(report.ap_group_id.is_some());
        assert_eq!(report.subarray_group_id, None);
        assert!(events.contains(&GenerationEvent::StepSkipped {
            step: "subarray",
            reason: "no SUBarray source group".to_string(),
        }));
        assert!(events
            .iter()
            .any(|e| matches!(e, GenerationEvent::ViewSized { name, .. } if name == "AUTO - Master")));
    }

    #[test]
    fn subarray_projects_merge_centre_into_left() {
        let store = ProjectFixture::subarray().into_store();
        let (report, events) = run_generate(&store);

        assert!(report.subarray_group_id.is_some());
        assert_eq!(report.merged_channels, 1);
        assert!(events.contains(&GenerationEvent::ChannelsMerged { channels: 1 }));
    }

    #[test]
    fn stray_subarray_groups_do_not_hide_the_built_containers() {
        let store = ProjectFixture::subarray()
            .with_top_level_subarray()
            .into_store();
        let before = store.row_counts().unwrap();
        let (report, events) = run_generate(&store);

        assert_eq!(report.merged_channels, 1);
        assert!(events.contains(&GenerationEvent::ChannelsMerged { channels: 1 }));

        let config = GeneratorConfig::default();
        let topology = topology::discover(&store, &config.topology).unwrap();
        let subarray = topology
            .source_of_kind(topology::SourceGroupType::SubArray)
            .unwrap();
        assert_eq!(Some(subarray.main_group_id), report.subarray_group_id);

        run_clean(&store);
        assert_eq!(store.row_counts().unwrap(), before);
    }

    #[test]
    fn function_groups_cover_every_channel_and_clean_away() {
        let store = ProjectFixture::stereo_array().into_store();
        let (report, _) = run_generate(&store);

        // Main: 4 TOPs + 2 SUBs; Front: 3 cabinets, the linked one excluded
        for group_id in [report.mute_group_id, report.fallback_group_id, report.ds_group_id] {
            assert_eq!(store.child_groups(group_id).unwrap().len(), 8);
        }
        let master = store.controls_on_view(report.master_view_id).unwrap();
        let mute = master
            .iter()
            .find(|c| c.is_switch() && c.targets_property(crate::control::property::MUTE))
            .unwrap();
        assert_eq!(mute.target_id, report.mute_group_id);

        let config = GeneratorConfig::default();
        let catalog = catalog();
        let mut events: Vec<GenerationEvent> = Vec::new();
        Generator::new(&catalog, &config)
            .clean(&store, None, &mut events)
            .unwrap();
        for name in ["MUTE", "FALLBACK", "DS DATA"] {
            assert!(events.iter().any(
                |e| matches!(e, GenerationEvent::GroupRemoved { name: removed, .. } if removed == name)
            ));
        }
        assert!(store.group(report.mute_group_id).unwrap().is_none());
    }

    #[test]
    fn eq_view_is_optional() {
        let store = ProjectFixture::stereo_array().into_store();
        let (report, _) = run_generate(&store);
        assert!(report.eq_view_id.is_some());
        assert_eq!(report.eq_panels, 3);

        let store = ProjectFixture::stereo_array().into_store();
        let mut config = GeneratorConfig::default();
        config.views.eq_view = false;
        let catalog = catalog();
        let report = Generator::new(&catalog, &config)
            .generate(&store, &mut Vec::<GenerationEvent>::new())
            .unwrap();
        assert_eq!(report.eq_view_id, None);
        assert_eq!(store.view_id_by_name("AUTO - EQ").unwrap(), None);
    }

    #[test]
    fn projects_without_array_processing_skip_the_ap_group() {
        let store = ProjectFixture::stereo_array()
            .without_array_processing()
            .into_store();
        let (report, events) = run_generate(&store);

        assert_eq!(report.ap_group_id, None);
        assert!(events.iter().any(
            |e| matches!(e, GenerationEvent::StepSkipped { step, .. } if *step == "array_processing")
        ));
    }

    #[test]
    fn generating_twice_is_refused_until_cleaned() {
        let store = ProjectFixture::stereo_array().into_store();
        let config = GeneratorConfig::default();
        let catalog = catalog();
        let generator = Generator::new(&catalog, &config);
        let mut events: Vec<GenerationEvent> = Vec::new();

        assert_eq!(generator.state(&store).unwrap(), ProjectState::Unprocessed);
        generator.generate(&store, &mut events).unwrap();
        assert_eq!(generator.state(&store).unwrap(), ProjectState::Generated);

        let err = generator.generate(&store, &mut events).unwrap_err();
        assert!(matches!(err, AutoR1Error::Domain(DomainError::AlreadyGenerated)));

        let counts = store.row_counts().unwrap();
        generator.regenerate(&store, &mut events).unwrap();
        assert_eq!(store.row_counts().unwrap(), counts);
    }

    #[test]
    fn uninitialised_projects_are_reported_as_such() {
        let store = ProjectFixture::empty_schema().into_store();
        let config = GeneratorConfig::default();
        let catalog = catalog();

        let err = Generator::new(&catalog, &config)
            .generate(&store, &mut Vec::<GenerationEvent>::new())
            .unwrap_err();
        assert!(err.is_not_initialised());
    }
}
