use super::LayoutGenerator;
use crate::events::{EventSink, GenerationEvent};
use crate::instantiate::TemplateEngine;
use crate::Result;

impl LayoutGenerator<'_> {
    /// Pushes the content of every remote view outside `generated` down and
    /// places a button back to the master view in the freed strip. Returns
    /// the number of views touched.
    pub fn insert_nav_buttons(
        &self,
        engine: &mut TemplateEngine,
        master_view_id: i64,
        generated: &[i64],
        sink: &mut dyn EventSink,
    ) -> Result<usize> {
        let layout = &self.config.layout;
        let shift = layout.nav_shift();
        let mut views = 0;
        for view_id in self.store.remote_view_ids()? {
            if view_id == master_view_id || generated.contains(&view_id) {
                continue;
            }
            self.store.shift_view_controls(view_id, shift)?;
            self.nav_button(
                engine,
                view_id,
                layout.foreign_nav_x,
                layout.foreign_nav_y,
                &self.config.titles.master_view,
                master_view_id,
                sink,
            )?;
            views += 1;
        }
        sink.emit(GenerationEvent::NavButtonsInserted { views });
        Ok(views)
    }

    /// Reverses [`insert_nav_buttons`](Self::insert_nav_buttons) on every
    /// view that links to `master_view_id`. Returns `(views, controls)`.
    pub fn remove_nav_buttons(
        &self,
        master_view_id: i64,
        generated: &[i64],
        sink: &mut dyn EventSink,
    ) -> Result<(usize, usize)> {
        let shift = self.config.layout.nav_shift();
        let mut views = 0;
        let mut controls = 0;
        for view_id in self.store.views_with_nav_to(master_view_id)? {
            if view_id == master_view_id || generated.contains(&view_id) {
                continue;
            }
            controls += self.store.delete_nav_buttons(view_id, master_view_id)?;
            self.store.shift_view_controls(view_id, -shift)?;
            views += 1;
        }
        sink.emit(GenerationEvent::NavButtonsRemoved { views, controls });
        Ok((views, controls))
    }
}
