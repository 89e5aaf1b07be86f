use std::collections::BTreeMap;

use crate::error::HaulResult;
use crate::journal::{JournalSnapshot, RunEvent};
use crate::types::EntityIdentity;
use crate::watermark::WatermarkState;

/// In-memory copy of both journal tables, shared by every journal backend.
#[derive(Debug, Clone, Default)]
pub(crate) struct JournalTables {
    events: Vec<RunEvent>,
    watermarks: BTreeMap<EntityIdentity, WatermarkState>,
}

impl JournalTables {
    pub(crate) fn from_parts(events: Vec<RunEvent>, watermarks: Vec<WatermarkState>) -> HaulResult<Self> {
        let mut by_identity = BTreeMap::new();
        for state in watermarks {
            state.validate()?;
            by_identity.insert(state.identity(), state);
        }

        Ok(Self {
            events,
            watermarks: by_identity,
        })
    }

    pub(crate) fn record_event(&mut self, event: RunEvent) {
        self.events.push(event);
    }

    /// Latest terminal event of `identity`. Ties on timestamp go to the later recorded event.
    pub(crate) fn last_run(&self, identity: &EntityIdentity) -> Option<RunEvent> {
        self.events
            .iter()
            .filter(|event| event.kind.is_terminal() && event.belongs_to(identity))
            .max_by_key(|event| event.timestamp)
            .cloned()
    }

    pub(crate) fn events(&self, identity: &EntityIdentity) -> Vec<RunEvent> {
        self.events
            .iter()
            .filter(|event| event.belongs_to(identity))
            .cloned()
            .collect()
    }

    pub(crate) fn get_watermark(&self, identity: &EntityIdentity) -> Option<WatermarkState> {
        self.watermarks.get(identity).cloned()
    }

    pub(crate) fn set_watermark(&mut self, state: WatermarkState) -> HaulResult<()> {
        state.validate()?;
        self.watermarks.insert(state.identity(), state);

        Ok(())
    }

    pub(crate) fn all_events(&self) -> &[RunEvent] {
        &self.events
    }

    pub(crate) fn all_watermarks(&self) -> Vec<WatermarkState> {
        self.watermarks.values().cloned().collect()
    }

    pub(crate) fn snapshot(&self) -> JournalSnapshot {
        let mut events = self.events.clone();
        events.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.event_id.cmp(&b.event_id))
        });

        JournalSnapshot {
            events,
            watermarks: self.all_watermarks(),
        }
    }
}
