// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Allocation state: processes, resources, holdings and pending requests
//!
//! The manager is the source of the graphs handed to the detector. It keeps
//! unit counts on both sides of every relation and records each change in a
//! history log.

use crate::error::{Error, Result};
use crate::types::{Edge, EdgeKind, GraphData, GraphStats, Node, NodeKind};
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// File name of the persisted state inside the data directory
pub const STATE_FILE: &str = "state.json";

/// A resource with a fixed number of units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// Unique identifier: res-<hash>
    pub id: String,
    /// Display name
    pub name: String,
    /// Units in existence
    pub total_units: u32,
    /// Units not held by any process
    pub available_units: u32,
    /// process_id -> units held
    #[serde(default)]
    pub allocated_to: BTreeMap<String, u32>,
    /// process_id -> units waited for
    #[serde(default)]
    pub requested_by: BTreeMap<String, u32>,
}

impl Resource {
    /// Units currently held by processes
    #[must_use]
    pub fn allocated_units(&self) -> u32 {
        self.total_units.saturating_sub(self.available_units)
    }

    /// Check if any unit is held
    #[must_use]
    pub fn is_allocated(&self) -> bool {
        self.total_units != self.available_units
    }
}

/// A process holding and requesting resources
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Process {
    /// Unique identifier: proc-<hash>
    pub id: String,
    /// Display name
    pub name: String,
    /// resource_id -> units held
    #[serde(default)]
    pub allocated_resources: BTreeMap<String, u32>,
    /// resource_id -> units waited for
    #[serde(default)]
    pub requested_resources: BTreeMap<String, u32>,
    /// When the process was added
    pub created_at: DateTime<Utc>,
}

/// What a history entry records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryKind {
    /// Units handed to a process
    Allocation,
    /// Process started waiting
    Request,
    /// Units handed back
    Release,
    /// Process stopped waiting
    CancelRequest,
}

/// One change to the allocation state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// When it happened
    pub timestamp: DateTime<Utc>,
    /// What happened
    #[serde(rename = "type")]
    pub kind: HistoryKind,
    /// Process involved
    pub process_id: String,
    /// Resource involved
    pub resource_id: String,
    /// Units moved
    pub units: u32,
}

trait Named {
    fn id(&self) -> &str;
    fn name(&self) -> &str;
}

impl Named for Process {
    fn id(&self) -> &str {
        &self.id
    }
    fn name(&self) -> &str {
        &self.name
    }
}

impl Named for Resource {
    fn id(&self) -> &str {
        &self.id
    }
    fn name(&self) -> &str {
        &self.name
    }
}

enum Lookup<'a, T> {
    Found(&'a T),
    Missing,
    Ambiguous,
}

/// Exact ID first, then exact name
fn lookup<'a, T: Named>(items: &'a [T], key: &str) -> Lookup<'a, T> {
    if let Some(item) = items.iter().find(|i| i.id() == key) {
        return Lookup::Found(item);
    }
    let mut matches = items.iter().filter(|i| i.name() == key);
    match (matches.next(), matches.next()) {
        (Some(item), None) => Lookup::Found(item),
        (None, _) => Lookup::Missing,
        _ => Lookup::Ambiguous,
    }
}

/// Holds the allocation state and enforces its rules
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AllocationManager {
    #[serde(default)]
    processes: Vec<Process>,
    #[serde(default)]
    resources: Vec<Resource>,
    #[serde(default)]
    history: Vec<HistoryEntry>,
    #[serde(default)]
    next_seq: u64,
}

impl AllocationManager {
    /// Create an empty state
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load state from `<dir>/state.json`; a missing file gives an empty state
    pub fn load(dir: &Path) -> anyhow::Result<Self> {
        let path = dir.join(STATE_FILE);
        if !path.exists() {
            debug!("no state at {}, starting empty", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let state: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        state
            .validate()
            .with_context(|| format!("Invalid state in {}", path.display()))?;
        Ok(state)
    }

    /// Check the unit bookkeeping of every resource
    ///
    /// # Errors
    ///
    /// [`Error::CorruptState`] if free units exceed the total, or the units
    /// held by processes do not add up to the units taken.
    pub fn validate(&self) -> Result<()> {
        for r in &self.resources {
            if r.available_units > r.total_units {
                return Err(Error::CorruptState(format!(
                    "resource {} has {} of {} units available",
                    r.id, r.available_units, r.total_units
                )));
            }
            let held: u64 = r.allocated_to.values().map(|&u| u64::from(u)).sum();
            if held != u64::from(r.allocated_units()) {
                return Err(Error::CorruptState(format!(
                    "resource {} has {} units held but {} taken",
                    r.id,
                    held,
                    r.allocated_units()
                )));
            }
        }
        Ok(())
    }

    /// Save state to `<dir>/state.json`
    pub fn save(&self, dir: &Path) -> anyhow::Result<()> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory {}", dir.display()))?;
        let path = dir.join(STATE_FILE);
        let json = serde_json::to_string_pretty(self).context("Failed to serialize state")?;
        fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;
        debug!("saved state to {}", path.display());
        Ok(())
    }

    /// Deterministic ID from kind, name and a running sequence number
    fn next_id(&mut self, prefix: &str, name: &str) -> String {
        loop {
            let mut hasher = Sha256::new();
            hasher.update(prefix.as_bytes());
            hasher.update(name.as_bytes());
            hasher.update(self.next_seq.to_le_bytes());
            self.next_seq += 1;
            let hash = hex::encode(hasher.finalize());
            let id = format!("{prefix}-{}", &hash[..8]);
            let taken = self.processes.iter().any(|p| p.id == id)
                || self.resources.iter().any(|r| r.id == id);
            if !taken {
                return id;
            }
        }
    }

    fn record(&mut self, kind: HistoryKind, process_id: &str, resource_id: &str, units: u32) {
        self.history.push(HistoryEntry {
            timestamp: Utc::now(),
            kind,
            process_id: process_id.to_string(),
            resource_id: resource_id.to_string(),
            units,
        });
    }

    /// Indices of an existing process and resource
    fn locate(&self, process_id: &str, resource_id: &str) -> Result<(usize, usize)> {
        let p = self
            .processes
            .iter()
            .position(|p| p.id == process_id)
            .ok_or_else(|| Error::ProcessNotFound(process_id.to_string()))?;
        let r = self
            .resources
            .iter()
            .position(|r| r.id == resource_id)
            .ok_or_else(|| Error::ResourceNotFound(resource_id.to_string()))?;
        Ok((p, r))
    }

    /// Add a resource with `units` units, returning its ID
    ///
    /// # Errors
    ///
    /// [`Error::EmptyName`] for a blank name, [`Error::InvalidUnits`] for zero units.
    pub fn add_resource(&mut self, name: &str, units: u32) -> Result<String> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::EmptyName("resource"));
        }
        if units == 0 {
            return Err(Error::InvalidUnits);
        }
        let id = self.next_id("res", name);
        self.resources.push(Resource {
            id: id.clone(),
            name: name.to_string(),
            total_units: units,
            available_units: units,
            allocated_to: BTreeMap::new(),
            requested_by: BTreeMap::new(),
        });
        info!("added resource {} ({}) with {} unit(s)", name, id, units);
        Ok(id)
    }

    /// Add a process, returning its ID
    ///
    /// # Errors
    ///
    /// [`Error::EmptyName`] for a blank name.
    pub fn add_process(&mut self, name: &str) -> Result<String> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::EmptyName("process"));
        }
        let id = self.next_id("proc", name);
        self.processes.push(Process {
            id: id.clone(),
            name: name.to_string(),
            allocated_resources: BTreeMap::new(),
            requested_resources: BTreeMap::new(),
            created_at: Utc::now(),
        });
        info!("added process {} ({})", name, id);
        Ok(id)
    }

    /// Remove a process after releasing its holdings and cancelling its requests
    ///
    /// # Errors
    ///
    /// [`Error::ProcessNotFound`] for an unknown ID.
    pub fn remove_process(&mut self, process_id: &str) -> Result<()> {
        let process = self
            .process(process_id)
            .ok_or_else(|| Error::ProcessNotFound(process_id.to_string()))?;
        let held: Vec<String> = process.allocated_resources.keys().cloned().collect();
        let waiting: Vec<String> = process.requested_resources.keys().cloned().collect();

        for resource_id in &held {
            self.release(process_id, resource_id)?;
        }
        for resource_id in &waiting {
            self.cancel_request(process_id, resource_id)?;
        }

        self.processes.retain(|p| p.id != process_id);
        info!("removed process {}", process_id);
        Ok(())
    }

    /// Hand `units` units of a resource to a process
    ///
    /// # Errors
    ///
    /// Unknown IDs, zero units, or more units than are free.
    pub fn allocate(&mut self, process_id: &str, resource_id: &str, units: u32) -> Result<()> {
        let (p, r) = self.locate(process_id, resource_id)?;
        if units == 0 {
            return Err(Error::InvalidUnits);
        }

        let available = self.resources[r].available_units;
        if units > available {
            return Err(Error::InsufficientUnits {
                requested: units,
                available,
            });
        }
        let held = grown(&self.resources[r].allocated_to, process_id, units, resource_id)?;
        let owned = grown(&self.processes[p].allocated_resources, resource_id, units, resource_id)?;

        let resource = &mut self.resources[r];
        resource.available_units -= units;
        resource.allocated_to.insert(process_id.to_string(), held);
        self.processes[p]
            .allocated_resources
            .insert(resource_id.to_string(), owned);

        self.record(HistoryKind::Allocation, process_id, resource_id, units);
        info!("allocated {} unit(s) of {} to {}", units, resource_id, process_id);
        Ok(())
    }

    /// Record that a process waits for `units` units of a resource
    ///
    /// # Errors
    ///
    /// Unknown IDs or zero units.
    pub fn request(&mut self, process_id: &str, resource_id: &str, units: u32) -> Result<()> {
        let (p, r) = self.locate(process_id, resource_id)?;
        if units == 0 {
            return Err(Error::InvalidUnits);
        }

        let waiting = grown(&self.resources[r].requested_by, process_id, units, resource_id)?;
        let wanted = grown(&self.processes[p].requested_resources, resource_id, units, resource_id)?;

        self.resources[r]
            .requested_by
            .insert(process_id.to_string(), waiting);
        self.processes[p]
            .requested_resources
            .insert(resource_id.to_string(), wanted);

        self.record(HistoryKind::Request, process_id, resource_id, units);
        info!("{} requested {} unit(s) of {}", process_id, units, resource_id);
        Ok(())
    }

    /// Return every unit of a resource held by a process
    ///
    /// # Errors
    ///
    /// Unknown IDs, or [`Error::NotAllocated`] if nothing is held.
    pub fn release(&mut self, process_id: &str, resource_id: &str) -> Result<u32> {
        let (p, r) = self.locate(process_id, resource_id)?;
        let units = self.processes[p]
            .allocated_resources
            .remove(resource_id)
            .ok_or_else(|| Error::NotAllocated {
                process: process_id.to_string(),
                resource: resource_id.to_string(),
            })?;

        let resource = &mut self.resources[r];
        resource.available_units = resource
            .available_units
            .checked_add(units)
            .ok_or_else(|| Error::UnitOverflow(resource_id.to_string()))?;
        resource.allocated_to.remove(process_id);

        self.record(HistoryKind::Release, process_id, resource_id, units);
        info!("{} released {} unit(s) of {}", process_id, units, resource_id);
        Ok(units)
    }

    /// Withdraw a pending request
    ///
    /// # Errors
    ///
    /// Unknown IDs, or [`Error::NoPendingRequest`] if none is pending.
    pub fn cancel_request(&mut self, process_id: &str, resource_id: &str) -> Result<u32> {
        let (p, r) = self.locate(process_id, resource_id)?;
        let units = self.processes[p]
            .requested_resources
            .remove(resource_id)
            .ok_or_else(|| Error::NoPendingRequest {
                process: process_id.to_string(),
                resource: resource_id.to_string(),
            })?;
        self.resources[r].requested_by.remove(process_id);

        self.record(HistoryKind::CancelRequest, process_id, resource_id, units);
        info!("{} cancelled request for {}", process_id, resource_id);
        Ok(units)
    }

    /// Delete a resource that no process holds; pending requests for it are dropped
    ///
    /// # Errors
    ///
    /// [`Error::ResourceNotFound`] or [`Error::ResourceInUse`].
    pub fn delete_resource(&mut self, resource_id: &str) -> Result<()> {
        let resource = self
            .resource(resource_id)
            .ok_or_else(|| Error::ResourceNotFound(resource_id.to_string()))?;
        if resource.is_allocated() {
            return Err(Error::ResourceInUse(resource_id.to_string()));
        }

        for process in &mut self.processes {
            process.requested_resources.remove(resource_id);
        }
        self.resources.retain(|r| r.id != resource_id);
        info!("deleted resource {}", resource_id);
        Ok(())
    }

    /// Drop all processes, resources and history
    pub fn reset(&mut self) {
        *self = Self::default();
        info!("allocation state reset");
    }

    /// All processes in creation order
    #[must_use]
    pub fn processes(&self) -> &[Process] {
        &self.processes
    }

    /// All resources in creation order
    #[must_use]
    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    /// Every recorded change, oldest first
    #[must_use]
    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    /// Get a process by ID
    #[must_use]
    pub fn process(&self, id: &str) -> Option<&Process> {
        self.processes.iter().find(|p| p.id == id)
    }

    /// Get a resource by ID
    #[must_use]
    pub fn resource(&self, id: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.id == id)
    }

    /// Find a process by ID or exact name
    ///
    /// # Errors
    ///
    /// [`Error::ProcessNotFound`] or [`Error::AmbiguousName`].
    pub fn resolve_process(&self, key: &str) -> Result<&Process> {
        match lookup(&self.processes, key) {
            Lookup::Found(p) => Ok(p),
            Lookup::Missing => Err(Error::ProcessNotFound(key.to_string())),
            Lookup::Ambiguous => Err(Error::AmbiguousName(key.to_string())),
        }
    }

    /// Find a resource by ID or exact name
    ///
    /// # Errors
    ///
    /// [`Error::ResourceNotFound`] or [`Error::AmbiguousName`].
    pub fn resolve_resource(&self, key: &str) -> Result<&Resource> {
        match lookup(&self.resources, key) {
            Lookup::Found(r) => Ok(r),
            Lookup::Missing => Err(Error::ResourceNotFound(key.to_string())),
            Lookup::Ambiguous => Err(Error::AmbiguousName(key.to_string())),
        }
    }

    /// Export the current state as a graph document
    #[must_use]
    pub fn graph_data(&self) -> GraphData {
        let mut nodes = Vec::with_capacity(self.processes.len() + self.resources.len());
        let mut edges = Vec::new();

        for process in &self.processes {
            nodes.push(Node {
                id: process.id.clone(),
                kind: NodeKind::Process,
                label: Some(process.name.clone()),
                title: Some(format!(
                    "Process: {}\nAllocated Resources: {}\nRequested Resources: {}",
                    process.name,
                    process.allocated_resources.len(),
                    process.requested_resources.len()
                )),
            });
        }

        for resource in &self.resources {
            nodes.push(Node {
                id: resource.id.clone(),
                kind: NodeKind::Resource,
                label: Some(format!(
                    "{}\n({}/{})",
                    resource.name, resource.available_units, resource.total_units
                )),
                title: Some(format!(
                    "Resource: {}\nAvailable: {}/{} units\nAllocated: {} units",
                    resource.name,
                    resource.available_units,
                    resource.total_units,
                    resource.allocated_units()
                )),
            });
        }

        for resource in &self.resources {
            for (process_id, &units) in &resource.allocated_to {
                if self.process(process_id).is_some() {
                    edges.push(relation(&resource.id, process_id, EdgeKind::Allocation, units));
                }
            }
        }

        for resource in &self.resources {
            for (process_id, &units) in &resource.requested_by {
                if self.process(process_id).is_some() {
                    edges.push(relation(process_id, &resource.id, EdgeKind::Request, units));
                }
            }
        }

        let stats = GraphStats {
            processes: self.processes.len(),
            resources: self.resources.len(),
            allocations: self.processes.iter().map(|p| p.allocated_resources.len()).sum(),
            requests: self.processes.iter().map(|p| p.requested_resources.len()).sum(),
        };

        GraphData {
            nodes,
            edges,
            stats: Some(stats),
        }
    }
}

/// Current count under `key` plus `units`
fn grown(counts: &BTreeMap<String, u32>, key: &str, units: u32, resource_id: &str) -> Result<u32> {
    counts
        .get(key)
        .copied()
        .unwrap_or(0)
        .checked_add(units)
        .ok_or_else(|| Error::UnitOverflow(resource_id.to_string()))
}

fn relation(from: &str, to: &str, kind: EdgeKind, units: u32) -> Edge {
    let verb = match kind {
        EdgeKind::Allocation => "allocated",
        EdgeKind::Request => "requested",
    };
    let plural = if units > 1 { "s" } else { "" };
    Edge {
        from: from.to_string(),
        to: to.to_string(),
        kind,
        units,
        title: Some(format!("{units} unit{plural} {verb}")),
    }
}
