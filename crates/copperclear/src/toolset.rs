use crate::error::{ClearError, ClearResult};
use crate::types::{Tool, ToolOperation, ToolOrder};
use geo::LineString;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Diameter decimals used for the duplicate check.
const DEFAULT_DIAMETER_DECIMALS: u32 = 4;

/// One tool plus the geometry it produced during the current run.
#[derive(Debug, Clone)]
pub struct ToolEntry {
    pub tool: Tool,
    /// Closed rings and open passes, written by the orchestrators.
    pub solid_geometry: Vec<LineString<f64>>,
}

/// The tool pool for one job: a uid-keyed map plus a stable insertion order.
///
/// The only mutable shared state of a run; owned by the job worker and never
/// shared across threads. No two tools may carry the same diameter once
/// rounded to the configured decimals.
#[derive(Debug, Clone)]
pub struct ToolSet {
    entries: BTreeMap<u32, ToolEntry>,
    order: Vec<u32>,
    decimals: u32,
}

impl Default for ToolSet {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolSet {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            order: Vec::new(),
            decimals: DEFAULT_DIAMETER_DECIMALS,
        }
    }

    pub fn with_decimals(decimals: u32) -> Self {
        Self {
            decimals,
            ..Self::new()
        }
    }

    fn diameter_key(&self, diameter: f64) -> i64 {
        (diameter * 10f64.powi(self.decimals as i32)).round() as i64
    }

    /// Add a tool. Rejects non-positive diameters, overlaps outside `[0, 1)`,
    /// duplicate uids, and duplicate diameters (after rounding).
    pub fn insert(&mut self, tool: Tool) -> ClearResult<()> {
        if tool.diameter <= 0.0 {
            return Err(ClearError::InvalidTool(format!(
                "diameter must be positive, got {}",
                tool.diameter
            )));
        }
        if !(0.0..1.0).contains(&tool.overlap) {
            return Err(ClearError::InvalidTool(format!(
                "overlap must be in [0, 1), got {}",
                tool.overlap
            )));
        }
        if self.entries.contains_key(&tool.uid) {
            return Err(ClearError::DuplicateToolUid(tool.uid));
        }
        let key = self.diameter_key(tool.diameter);
        if self
            .entries
            .values()
            .any(|entry| self.diameter_key(entry.tool.diameter) == key)
        {
            return Err(ClearError::DuplicateToolDiameter(tool.diameter));
        }

        self.order.push(tool.uid);
        self.entries.insert(
            tool.uid,
            ToolEntry {
                tool,
                solid_geometry: Vec::new(),
            },
        );
        Ok(())
    }

    pub fn get(&self, uid: u32) -> Option<&ToolEntry> {
        self.entries.get(&uid)
    }

    pub fn tool(&self, uid: u32) -> Option<&Tool> {
        self.entries.get(&uid).map(|entry| &entry.tool)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &ToolEntry> {
        self.order.iter().filter_map(|uid| self.entries.get(uid))
    }

    /// Accumulate geometry for one tool across orchestrator steps.
    pub fn append_geometry(&mut self, uid: u32, paths: Vec<LineString<f64>>) {
        if let Some(entry) = self.entries.get_mut(&uid) {
            entry.solid_geometry.extend(paths);
        }
    }

    /// Uids of every tool, in the requested processing order.
    pub fn uids(&self, order: ToolOrder) -> Vec<u32> {
        let mut uids: Vec<u32> = self.order.clone();
        match order {
            ToolOrder::Default => {}
            ToolOrder::Forward => uids.sort_by(|a, b| {
                let da = self.entries[a].tool.diameter;
                let db = self.entries[b].tool.diameter;
                da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
            }),
            ToolOrder::Reverse => uids.sort_by(|a, b| {
                let da = self.entries[a].tool.diameter;
                let db = self.entries[b].tool.diameter;
                db.partial_cmp(&da).unwrap_or(std::cmp::Ordering::Equal)
            }),
        }
        uids
    }

    /// Uids of tools with the given operation, in the requested order.
    pub fn uids_for(&self, operation: ToolOperation, order: ToolOrder) -> Vec<u32> {
        self.uids(order)
            .into_iter()
            .filter(|uid| self.entries[uid].tool.operation == operation)
            .collect()
    }

    pub fn has_isolation_tools(&self) -> bool {
        self.entries
            .values()
            .any(|entry| entry.tool.operation == ToolOperation::Isolation)
    }

    /// Largest enabled standoff among clearing tools; the empty area is
    /// computed once per job, so the most conservative standoff wins.
    pub fn max_clear_standoff(&self) -> f64 {
        self.entries
            .values()
            .filter(|entry| {
                entry.tool.operation == ToolOperation::Clear && entry.tool.offset_enabled
            })
            .map(|entry| entry.tool.offset_value)
            .fold(0.0, f64::max)
    }

    /// Remove every tool whose geometry stayed empty, returning the removed
    /// tools so the caller can report them.
    pub fn drop_empty(&mut self) -> Vec<Tool> {
        let empty: Vec<u32> = self
            .order
            .iter()
            .copied()
            .filter(|uid| {
                self.entries
                    .get(uid)
                    .map(|entry| entry.solid_geometry.is_empty())
                    .unwrap_or(false)
            })
            .collect();

        let mut removed = Vec::new();
        for uid in empty {
            if let Some(entry) = self.entries.remove(&uid) {
                removed.push(entry.tool);
            }
            self.order.retain(|kept| *kept != uid);
        }
        removed
    }

    /// Load a tool pool from the provided path. Missing files yield an empty
    /// set.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> ClearResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::new());
        }

        let data = fs::read(path)?;
        let tools: Vec<Tool> = serde_json::from_slice(&data)?;
        let mut set = Self::new();
        for tool in tools {
            set.insert(tool)?;
        }
        Ok(set)
    }

    /// Persist the tool pool (tools only, not run geometry), creating parent
    /// directories as needed.
    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> ClearResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tools: Vec<&Tool> = self.iter().map(|entry| &entry.tool).collect();
        let data = serde_json::to_vec_pretty(&tools)?;
        fs::write(path, data)?;
        Ok(())
    }

    /// Default pool location (`~/.copperclear/tools.json`).
    pub fn default_path() -> ClearResult<PathBuf> {
        let home = dirs::home_dir().ok_or_else(|| {
            ClearError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "could not determine home directory",
            ))
        })?;
        Ok(home.join(".copperclear").join("tools.json"))
    }
}
