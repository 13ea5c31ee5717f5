//! Local draft snapshot for crash recovery.
//!
//! While a brand-new route is being put together, every edit writes a small
//! snapshot to local storage so a crashed or closed session can pick up
//! where it left off. The snapshot is advisory: last writer wins, only the
//! operator's edits are kept (optimization results can be re-run), and a
//! row referencing a customer no longer in the workspace is dropped on
//! restore rather than failing it.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::directory::CustomerDirectory;
use crate::draft::RouteDraft;
use crate::model::{
    CustomerId, DepotId, DriverId, PositionConstraint, RouteMetadata, StopDefaults, StopEntry,
    VehicleId,
};
use crate::time_window::{self, TimeWindow, DISPLAY_FORMAT};
use crate::traits::{DraftStore, StoreError};

/// Fixed storage key for the one in-progress draft.
pub const SNAPSHOT_KEY: &str = "route-draft-snapshot";

/// Serialized form of an in-progress draft. Clock fields use the `HH:MM`
/// display format the operator typed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftSnapshot {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depot_id: Option<DepotId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver_id: Option<DriverId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vehicle_id: Option<VehicleId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_odometer: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    pub stops: Vec<SnapshotStop>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotStop {
    pub customer_id: CustomerId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window_start: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window_end: Option<String>,
    #[serde(default)]
    pub position: PositionConstraint,
    pub service_minutes: u32,
    #[serde(default)]
    pub signature_required: bool,
    #[serde(default)]
    pub photo_required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl DraftSnapshot {
    pub fn capture(draft: &RouteDraft) -> Self {
        let metadata = &draft.metadata;
        Self {
            name: metadata.name.clone(),
            date: metadata.date,
            depot_id: metadata.depot,
            driver_id: metadata.driver,
            vehicle_id: metadata.vehicle,
            start_odometer: metadata.start_odometer,
            notes: metadata.notes.clone(),
            start_time: metadata
                .start_time
                .map(|t| t.format(DISPLAY_FORMAT).to_string()),
            stops: draft.stops().iter().map(SnapshotStop::from_entry).collect(),
        }
    }

    /// Rebuilds a draft from the snapshot. Stops whose customer is gone
    /// from the workspace are dropped; the restored draft always starts
    /// unoptimized.
    pub fn restore(&self, directory: &CustomerDirectory, defaults: StopDefaults) -> RouteDraft {
        let mut draft = RouteDraft::new(defaults);
        draft.metadata = RouteMetadata {
            name: self.name.clone(),
            date: self.date,
            depot: self.depot_id,
            driver: self.driver_id,
            vehicle: self.vehicle_id,
            start_odometer: self.start_odometer,
            notes: self.notes.clone(),
            start_time: self
                .start_time
                .as_deref()
                .and_then(time_window::parse_clock),
        };

        for snap in &self.stops {
            let Some(customer) = directory.get(snap.customer_id) else {
                warn!(customer = %snap.customer_id, "snapshot references unknown customer, dropping stop");
                continue;
            };
            let mut entry = StopEntry::new(customer, defaults);
            entry.override_window = snap.window();
            entry.position = snap.position;
            entry.service_minutes = snap.service_minutes.max(1);
            entry.signature_required = snap.signature_required;
            entry.photo_required = snap.photo_required;
            entry.notes = snap.notes.clone();
            draft.stops.push(entry);
        }
        draft
    }
}

impl SnapshotStop {
    fn from_entry(entry: &StopEntry) -> Self {
        Self {
            customer_id: entry.customer_id(),
            window_start: entry.override_window.as_ref().map(TimeWindow::start_display),
            window_end: entry.override_window.as_ref().map(TimeWindow::end_display),
            position: entry.position,
            service_minutes: entry.service_minutes,
            signature_required: entry.signature_required,
            photo_required: entry.photo_required,
            notes: entry.notes.clone(),
        }
    }

    fn window(&self) -> Option<TimeWindow> {
        let (Some(start), Some(end)) = (&self.window_start, &self.window_end) else {
            return None;
        };
        match (time_window::parse_clock(start), time_window::parse_clock(end)) {
            (Some(start), Some(end)) => Some(TimeWindow::new(start, end)),
            _ => {
                debug!(customer = %self.customer_id, "snapshot window not parseable, dropping override");
                None
            }
        }
    }
}

/// In-memory store, used by tests and as the no-persistence fallback.
#[derive(Debug, Default)]
pub struct MemoryDraftStore {
    slot: Mutex<Option<String>>,
}

impl MemoryDraftStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DraftStore for MemoryDraftStore {
    fn save(&self, snapshot: &DraftSnapshot) -> Result<(), StoreError> {
        let json = serde_json::to_string(snapshot)?;
        let mut slot = self.slot.lock().unwrap_or_else(|poison| poison.into_inner());
        *slot = Some(json);
        Ok(())
    }

    fn load(&self) -> Result<Option<DraftSnapshot>, StoreError> {
        let slot = self.slot.lock().unwrap_or_else(|poison| poison.into_inner());
        match slot.as_deref() {
            Some(json) => Ok(Some(serde_json::from_str(json)?)),
            None => Ok(None),
        }
    }

    fn clear(&self) -> Result<(), StoreError> {
        let mut slot = self.slot.lock().unwrap_or_else(|poison| poison.into_inner());
        *slot = None;
        Ok(())
    }
}

/// Snapshot persisted as a JSON file, one per workspace directory.
#[derive(Debug, Clone)]
pub struct JsonFileDraftStore {
    path: PathBuf,
}

impl JsonFileDraftStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the conventional file name under the given directory.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(format!("{SNAPSHOT_KEY}.json")),
        }
    }
}

impl DraftStore for JsonFileDraftStore {
    fn save(&self, snapshot: &DraftSnapshot) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(snapshot)?;
        fs::write(&self.path, json)?;
        Ok(())
    }

    fn load(&self) -> Result<Option<DraftSnapshot>, StoreError> {
        match fs::read_to_string(&self.path) {
            Ok(text) => Ok(Some(serde_json::from_str(&text)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn clear(&self) -> Result<(), StoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
