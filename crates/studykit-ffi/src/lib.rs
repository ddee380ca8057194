use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use serde::Deserialize;
use uuid::Uuid;

use studykit_core::models::{
    ActivityResultBundle, FlatTaskResult, ScheduledActivity, SchemaReference, TaskReference,
};
use studykit_core::orchestration::{
    ActivityManager, OrchestrationResult, ResultUploader, ScheduleSink,
};
use studykit_core::registry::TaskRegistry;
use studykit_core::sqlite::SqliteStore;
use studykit_core::tracking::{TrackedDataStore, medication_tracking_plan};

/// Bundles queued for the host app's transport; drained with
/// `studykit_pending_uploads`.
#[derive(Default)]
struct QueueUploader {
    pending: Mutex<Vec<ActivityResultBundle>>,
}

impl ResultUploader for QueueUploader {
    fn upload(&self, bundle: &ActivityResultBundle) -> OrchestrationResult<()> {
        self.pending.lock().unwrap().push(bundle.clone());
        Ok(())
    }
}

#[derive(Default)]
struct QueueSink {
    pending: Mutex<Vec<ScheduledActivity>>,
}

impl ScheduleSink for QueueSink {
    fn schedule_updated(&self, schedule: &ScheduledActivity) -> OrchestrationResult<()> {
        self.pending.lock().unwrap().push(schedule.clone());
        Ok(())
    }
}

struct StudykitState {
    manager: ActivityManager<SqliteStore>,
    uploads: Arc<QueueUploader>,
    schedule_updates: Arc<QueueSink>,
    tokio_rt: tokio::runtime::Runtime,
}

lazy_static! {
    static ref STATE: Mutex<Option<StudykitState>> = Mutex::new(None);
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegistryConfig {
    #[serde(default)]
    tasks: Vec<TaskReference>,
    #[serde(default)]
    schemas: Vec<SchemaReference>,
}

/// Initialize the studykit core with a SQLite database path and the study's
/// task/schema registry as JSON.
///
/// # Safety
///
/// `db_path` and `registry_json` must be valid, non-null pointers to
/// NUL-terminated UTF-8 C strings.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn studykit_init(
    db_path: *const c_char,
    registry_json: *const c_char,
) -> bool {
    if db_path.is_null() || registry_json.is_null() {
        return false;
    }

    // If already initialized, return true
    if STATE.lock().unwrap().is_some() {
        return true;
    }

    let path_str = match unsafe { CStr::from_ptr(db_path) }.to_str() {
        Ok(s) => s,
        Err(_) => return false,
    };
    let registry_str = match unsafe { CStr::from_ptr(registry_json) }.to_str() {
        Ok(s) => s,
        Err(_) => return false,
    };

    // Initialize logging
    let _ = tracing_subscriber::fmt::try_init();

    let config: RegistryConfig = match serde_json::from_str(registry_str) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid registry configuration: {e}");
            return false;
        }
    };
    let registry = match TaskRegistry::new(config.tasks, config.schemas) {
        Ok(registry) => registry,
        Err(e) => {
            eprintln!("Failed to build task registry: {e}");
            return false;
        }
    };

    // Create Tokio Runtime
    let tokio_rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create Tokio runtime: {e}");
            return false;
        }
    };

    // Initialize Store
    let store = SqliteStore::new(path_str);
    if let Err(e) = store.migrate_to_latest() {
        eprintln!("Failed to migrate DB: {e}");
        return false;
    }
    let tracked = TrackedDataStore::new(medication_tracking_plan(), store);

    let uploads = Arc::new(QueueUploader::default());
    let schedule_updates = Arc::new(QueueSink::default());
    let manager = ActivityManager::new(
        registry,
        tracked,
        Arc::clone(&uploads) as Arc<dyn ResultUploader>,
        Arc::clone(&schedule_updates) as Arc<dyn ScheduleSink>,
    );

    *STATE.lock().unwrap() = Some(StudykitState {
        manager,
        uploads,
        schedule_updates,
        tokio_rt,
    });

    true
}

/// Replace the schedule snapshot with a JSON array of scheduled activities.
///
/// # Safety
///
/// `activities_json` must be a valid, non-null pointer to a NUL-terminated
/// UTF-8 C string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn studykit_set_activities(activities_json: *const c_char) -> bool {
    let Some(json) = (unsafe { read_str(activities_json) }) else {
        return false;
    };
    let activities: Vec<ScheduledActivity> = match serde_json::from_str(json) {
        Ok(activities) => activities,
        Err(e) => {
            eprintln!("Invalid activities payload: {e}");
            return false;
        }
    };

    let guard = STATE.lock().unwrap();
    let Some(state) = guard.as_ref() else {
        return false;
    };
    match state.manager.set_activities(activities) {
        Ok(()) => true,
        Err(e) => {
            eprintln!("Failed to set activities: {e}");
            false
        }
    }
}

/// Build the runnable task for a scheduled activity; returns the task as
/// JSON, or null when the schedule's task identifier is unknown.
///
/// # Safety
///
/// `schedule_json` must be a valid, non-null pointer to a NUL-terminated
/// UTF-8 C string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn studykit_create_task(schedule_json: *const c_char) -> *mut c_char {
    let Some(json) = (unsafe { read_str(schedule_json) }) else {
        return std::ptr::null_mut();
    };
    let schedule: ScheduledActivity = match serde_json::from_str(json) {
        Ok(schedule) => schedule,
        Err(e) => {
            eprintln!("Invalid schedule payload: {e}");
            return std::ptr::null_mut();
        }
    };

    let guard = STATE.lock().unwrap();
    let Some(state) = guard.as_ref() else {
        return std::ptr::null_mut();
    };
    match state.manager.create_task(&schedule) {
        Ok((task, _)) => to_json_string(&task),
        Err(e) => {
            eprintln!("Failed to create task: {e}");
            std::ptr::null_mut()
        }
    }
}

/// Activities in the display section at `section_index`, classified at the
/// RFC 3339 moment `now`; returns a JSON array or null.
///
/// # Safety
///
/// `now_rfc3339` must be a valid, non-null pointer to a NUL-terminated UTF-8
/// C string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn studykit_scheduled_activities_for_section(
    section_index: u32,
    now_rfc3339: *const c_char,
) -> *mut c_char {
    let Some(now) = (unsafe { read_str(now_rfc3339) }).and_then(parse_rfc3339) else {
        return std::ptr::null_mut();
    };

    let guard = STATE.lock().unwrap();
    let Some(state) = guard.as_ref() else {
        return std::ptr::null_mut();
    };
    match state
        .manager
        .scheduled_activities_for_section(section_index as usize, &now)
    {
        Ok(activities) => to_json_string(&activities),
        Err(e) => {
            eprintln!("Failed to classify activities: {e}");
            std::ptr::null_mut()
        }
    }
}

/// Split a completed run into schema bundles without recording it; returns
/// a JSON array of bundles or null.
///
/// # Safety
///
/// `schedule_json` and `result_json` must be valid, non-null pointers to
/// NUL-terminated UTF-8 C strings.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn studykit_split_results(
    schedule_json: *const c_char,
    result_json: *const c_char,
) -> *mut c_char {
    let Some(schedule_str) = (unsafe { read_str(schedule_json) }) else {
        return std::ptr::null_mut();
    };
    let Some(result_str) = (unsafe { read_str(result_json) }) else {
        return std::ptr::null_mut();
    };
    let schedule: ScheduledActivity = match serde_json::from_str(schedule_str) {
        Ok(schedule) => schedule,
        Err(e) => {
            eprintln!("Invalid schedule payload: {e}");
            return std::ptr::null_mut();
        }
    };
    let result: FlatTaskResult = match serde_json::from_str(result_str) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("Invalid task result payload: {e}");
            return std::ptr::null_mut();
        }
    };

    let guard = STATE.lock().unwrap();
    let Some(state) = guard.as_ref() else {
        return std::ptr::null_mut();
    };
    match state.manager.activity_results_for_schedule(&schedule, &result) {
        Ok(bundles) => to_json_string(&bundles),
        Err(e) => {
            eprintln!("Failed to split results: {e}");
            std::ptr::null_mut()
        }
    }
}

/// Record a completed run: marks the schedule finished, persists tracked
/// answers, and queues the split bundles and the schedule update for the
/// host transport.
///
/// # Safety
///
/// All pointer arguments must be valid, non-null pointers to NUL-terminated
/// UTF-8 C strings.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn studykit_record_run(
    schedule_guid: *const c_char,
    result_json: *const c_char,
    finished_on_rfc3339: *const c_char,
) -> bool {
    let Some(guid) = (unsafe { read_str(schedule_guid) })
        .and_then(|value| Uuid::parse_str(value).ok())
    else {
        return false;
    };
    let Some(finished_on) = (unsafe { read_str(finished_on_rfc3339) }).and_then(parse_rfc3339)
    else {
        return false;
    };
    let Some(result_str) = (unsafe { read_str(result_json) }) else {
        return false;
    };
    let result: FlatTaskResult = match serde_json::from_str(result_str) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("Invalid task result payload: {e}");
            return false;
        }
    };

    let guard = STATE.lock().unwrap();
    let Some(state) = guard.as_ref() else {
        return false;
    };
    let outcome = state.tokio_rt.block_on(state.manager.update_scheduled_activity(
        guid,
        result,
        finished_on,
    ));
    match outcome {
        Ok(_) => true,
        Err(e) => {
            eprintln!("Failed to record run: {e}");
            false
        }
    }
}

/// Drain the bundles queued for upload; returns a JSON array.
#[unsafe(no_mangle)]
pub extern "C" fn studykit_pending_uploads() -> *mut c_char {
    let guard = STATE.lock().unwrap();
    let Some(state) = guard.as_ref() else {
        return std::ptr::null_mut();
    };
    let drained: Vec<ActivityResultBundle> =
        std::mem::take(&mut *state.uploads.pending.lock().unwrap());
    to_json_string(&drained)
}

/// Drain the schedule updates queued for the remote schedule source; returns
/// a JSON array.
#[unsafe(no_mangle)]
pub extern "C" fn studykit_updated_schedules() -> *mut c_char {
    let guard = STATE.lock().unwrap();
    let Some(state) = guard.as_ref() else {
        return std::ptr::null_mut();
    };
    let drained: Vec<ScheduledActivity> =
        std::mem::take(&mut *state.schedule_updates.pending.lock().unwrap());
    to_json_string(&drained)
}

/// Clear all persisted tracked-data state.
#[unsafe(no_mangle)]
pub extern "C" fn studykit_reset_tracked_data() -> bool {
    let guard = STATE.lock().unwrap();
    let Some(state) = guard.as_ref() else {
        return false;
    };
    match state.manager.tracked().reset() {
        Ok(()) => true,
        Err(e) => {
            eprintln!("Failed to reset tracked data: {e}");
            false
        }
    }
}

/// Free a string previously returned by a `studykit_*` function.
///
/// # Safety
///
/// `s` must be a pointer previously returned by a `studykit_*` function, or
/// null.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn studykit_free_string(s: *mut c_char) {
    if s.is_null() {
        return;
    }
    unsafe {
        let _ = CString::from_raw(s);
    }
}

unsafe fn read_str<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    unsafe { CStr::from_ptr(ptr) }.to_str().ok()
}

fn parse_rfc3339(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|instant| instant.with_timezone(&Utc))
}

fn to_json_string<T: serde::Serialize>(value: &T) -> *mut c_char {
    let json = match serde_json::to_string(value) {
        Ok(json) => json,
        Err(_) => return std::ptr::null_mut(),
    };
    match CString::new(json) {
        Ok(c) => c.into_raw(),
        Err(_) => std::ptr::null_mut(),
    }
}
