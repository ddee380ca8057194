use std::sync::{Mutex, MutexGuard};

use crate::models::{CoreError, CoreErrorKind, StepResult, TrackedItemSelection};
use crate::persistence::{PersistenceResult, TrackedStateStore};

#[derive(Default)]
pub struct InMemoryTrackedStateStore {
    state: Mutex<StoreState>,
}

#[derive(Default)]
struct StoreState {
    selection: Option<Vec<TrackedItemSelection>>,
    context_results: Vec<StepResult>,
}

impl InMemoryTrackedStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_state(&self) -> PersistenceResult<MutexGuard<'_, StoreState>> {
        self.state.lock().map_err(|_| CoreError {
            task: None,
            schema: None,
            kind: CoreErrorKind::Internal,
            message: "tracked state mutex poisoned".to_string(),
        })
    }
}

impl TrackedStateStore for InMemoryTrackedStateStore {
    fn load_selection(&self) -> PersistenceResult<Option<Vec<TrackedItemSelection>>> {
        Ok(self.lock_state()?.selection.clone())
    }

    fn save_selection(&self, selection: &[TrackedItemSelection]) -> PersistenceResult<()> {
        self.lock_state()?.selection = Some(selection.to_vec());
        Ok(())
    }

    fn load_context_results(&self) -> PersistenceResult<Vec<StepResult>> {
        Ok(self.lock_state()?.context_results.clone())
    }

    fn save_context_result(&self, result: &StepResult) -> PersistenceResult<()> {
        let mut state = self.lock_state()?;
        match state
            .context_results
            .iter_mut()
            .find(|existing| existing.identifier == result.identifier)
        {
            Some(existing) => *existing = result.clone(),
            None => state.context_results.push(result.clone()),
        }
        Ok(())
    }

    fn clear_context_results(&self) -> PersistenceResult<()> {
        self.lock_state()?.context_results.clear();
        Ok(())
    }

    fn reset(&self) -> PersistenceResult<()> {
        let mut state = self.lock_state()?;
        *state = StoreState::default();
        Ok(())
    }
}
