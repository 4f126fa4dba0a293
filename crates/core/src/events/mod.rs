use serde::Serialize;

/// One step of a generate or clean pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GenerationEvent {
    GroupCreated {
        name: String,
        group_id: i64,
        parent_id: i64,
        leaves: usize,
    },
    StepSkipped {
        step: &'static str,
        reason: String,
    },
    TopologyDiscovered {
        sources: usize,
        channel_groups: usize,
    },
    TopologyFallback {
        source: String,
    },
    ViewSized {
        name: String,
        view_id: i64,
        h_res: i64,
        v_res: i64,
    },
    TemplateInstantiated {
        template: String,
        view_id: i64,
        joined_id: i64,
        controls: usize,
    },
    NavButtonsInserted {
        views: usize,
    },
    NavButtonsRemoved {
        views: usize,
        controls: usize,
    },
    ViewRemoved {
        name: String,
        view_id: i64,
        controls: usize,
    },
    GroupRemoved {
        name: String,
        rows: usize,
    },
    ChannelsMerged {
        channels: usize,
    },
}

/// Receives orchestration events. The core never assumes a particular sink.
pub trait EventSink {
    fn emit(&mut self, event: GenerationEvent);
}

/// Forwards events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&mut self, event: GenerationEvent) {
        match &event {
            GenerationEvent::TopologyFallback { source } => {
                tracing::warn!(%source, "source names do not follow the TOPs/SUBs grammar");
            }
            GenerationEvent::StepSkipped { step, reason } => {
                tracing::info!(step, %reason, "skipped step");
            }
            GenerationEvent::TemplateInstantiated { .. } => {
                tracing::debug!(?event, "generation event");
            }
            _ => tracing::info!(?event, "generation event"),
        }
    }
}

impl EventSink for Vec<GenerationEvent> {
    fn emit(&mut self, event: GenerationEvent) {
        self.push(event);
    }
}
