// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Resource usage summary built from the allocation state and its history

use crate::allocation::{AllocationManager, HistoryEntry, HistoryKind, Resource};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// Number of most recent history entries in the allocation trend
pub const TREND_WINDOW: usize = 10;

/// Usage figures for one resource
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceUsage {
    /// Resource ID
    pub id: String,
    /// Display name
    pub name: String,
    /// Units in existence
    pub total_units: u32,
    /// Units currently held
    pub current_usage: u32,
    /// Held share of all units, in percent with one decimal
    pub usage_percentage: f64,
    /// Processes holding units
    pub allocation_count: usize,
    /// Processes waiting for units
    pub request_count: usize,
    /// Mean time from an allocation to the matching release, in seconds.
    /// `None` until some holder has released.
    pub average_hold_seconds: Option<f64>,
}

/// One step of the allocation trend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TrendPoint {
    /// When the change happened
    pub timestamp: DateTime<Utc>,
    /// Running count: +1 per allocation, -1 per release, over the window
    pub allocations: i64,
}

/// Usage summary across all resources
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageReport {
    /// Per-resource figures in creation order
    pub resources: Vec<ResourceUsage>,
    /// Process/resource pairs with held units
    pub total_allocations: usize,
    /// Process/resource pairs with pending requests
    pub total_requests: usize,
    /// Running allocation count over the last [`TREND_WINDOW`] changes
    pub trend: Vec<TrendPoint>,
    /// When the report was built
    pub generated_at: DateTime<Utc>,
}

impl AllocationManager {
    /// Summarize resource usage from the current state and history
    #[must_use]
    pub fn usage_report(&self) -> UsageReport {
        let resources: Vec<ResourceUsage> = self
            .resources()
            .iter()
            .map(|r| resource_usage(r, self.history()))
            .collect();

        UsageReport {
            total_allocations: resources.iter().map(|r| r.allocation_count).sum(),
            total_requests: resources.iter().map(|r| r.request_count).sum(),
            resources,
            trend: trend(self.history()),
            generated_at: Utc::now(),
        }
    }
}

fn resource_usage(resource: &Resource, history: &[HistoryEntry]) -> ResourceUsage {
    let used = resource.allocated_units();
    let percentage = if resource.total_units == 0 {
        0.0
    } else {
        f64::from(used) * 100.0 / f64::from(resource.total_units)
    };

    ResourceUsage {
        id: resource.id.clone(),
        name: resource.name.clone(),
        total_units: resource.total_units,
        current_usage: used,
        usage_percentage: round_tenth(percentage),
        allocation_count: resource.allocated_to.len(),
        request_count: resource.requested_by.len(),
        average_hold_seconds: average_hold(history, &resource.id).map(seconds),
    }
}

/// Mean of the spans from each allocation of `resource_id` to the next
/// release of it by the same process
#[must_use]
pub fn average_hold(history: &[HistoryEntry], resource_id: &str) -> Option<Duration> {
    let entries: Vec<&HistoryEntry> = history
        .iter()
        .filter(|e| e.resource_id == resource_id)
        .collect();

    let mut total = Duration::zero();
    let mut count = 0i32;
    for (i, entry) in entries.iter().enumerate() {
        if entry.kind != HistoryKind::Allocation {
            continue;
        }
        let release = entries[i + 1..]
            .iter()
            .find(|e| e.kind == HistoryKind::Release && e.process_id == entry.process_id);
        if let Some(release) = release {
            total = total + (release.timestamp - entry.timestamp);
            count += 1;
        }
    }

    (count > 0).then(|| total / count)
}

/// Running allocation count over the newest [`TREND_WINDOW`] entries
#[must_use]
pub fn trend(history: &[HistoryEntry]) -> Vec<TrendPoint> {
    let recent = &history[history.len().saturating_sub(TREND_WINDOW)..];
    let mut running = 0i64;
    recent
        .iter()
        .map(|entry| {
            match entry.kind {
                HistoryKind::Allocation => running += 1,
                HistoryKind::Release => running -= 1,
                HistoryKind::Request | HistoryKind::CancelRequest => {}
            }
            TrendPoint {
                timestamp: entry.timestamp,
                allocations: running,
            }
        })
        .collect()
}

#[allow(clippy::cast_precision_loss)]
fn seconds(duration: Duration) -> f64 {
    round_tenth(duration.num_milliseconds() as f64 / 1000.0)
}

fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
