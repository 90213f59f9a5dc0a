// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
#![no_main]

use libfuzzer_sys::fuzz_target;
use ragraph::deadlock::{detect_deadlock, DetectOptions};
use ragraph::detect::CycleDetector;
use ragraph::graph::GraphInput;

// Arbitrary text must either be rejected or yield a consistent verdict.
fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(input) = GraphInput::from_json_str(text) else {
        return;
    };

    let graph = input.to_adjacency();
    let cyclic = CycleDetector::has_cycle(&graph);
    let cycle = CycleDetector::find_cycle(&graph);
    assert_eq!(cyclic, cycle.is_some());

    if let Some(cycle) = cycle {
        assert_eq!(cycle.nodes().first(), cycle.nodes().last());
    }

    let report = detect_deadlock(&graph, &DetectOptions::default());
    assert_eq!(report.has_deadlock, cyclic);
});
