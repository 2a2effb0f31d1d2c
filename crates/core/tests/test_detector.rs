//! End-to-end tests for the orchestrated detection pass

use racewatch_core::{
    Atom, BusinessFlow, Confidence, FlowStep, Project, ProjectModule, RaceDetector,
    RacewatchConfig, Severity, SourceFile,
};

fn atom(id: &str, name: &str, code: &str) -> Atom {
    Atom {
        id: id.to_string(),
        name: name.to_string(),
        code: code.to_string(),
        ..Default::default()
    }
}

fn caller(id: &str, name: &str, code: &str, calls: &[&str]) -> Atom {
    Atom {
        id: id.to_string(),
        name: name.to_string(),
        code: code.to_string(),
        calls: calls.iter().map(|c| c.to_string()).collect(),
        is_exported: true,
        ..Default::default()
    }
}

fn project(files: Vec<(&str, Vec<Atom>)>) -> Project {
    Project {
        modules: vec![ProjectModule {
            name: "app".to_string(),
            files: files
                .into_iter()
                .map(|(path, atoms)| SourceFile {
                    file_path: path.to_string(),
                    atoms,
                })
                .collect(),
        }],
        business_flows: vec![],
    }
}

/// Two unguarded counter mutations reachable from independent entry points
fn counter_project(body_a: &str, body_b: &str) -> Project {
    project(vec![
        (
            "src/orders.js",
            vec![
                caller("src/orders.js:handleOrder", "handleOrder", "trackOrder();\n", &["trackOrder"]),
                atom("src/orders.js:trackOrder", "trackOrder", body_a),
            ],
        ),
        (
            "src/refunds.js",
            vec![
                caller("src/refunds.js:handleRefund", "handleRefund", "trackRefund();\n", &["trackRefund"]),
                atom("src/refunds.js:trackRefund", "trackRefund", body_b),
            ],
        ),
    ])
}

// ── Detection scenarios ─────────────────────────────────────────

#[test]
fn test_unguarded_counters_from_independent_entries() {
    let p = counter_project("counter++;\n", "counter++;\n");
    let analysis = RaceDetector::new().analyze(&p);

    assert_eq!(analysis.len(), 1, "got: {:?}", analysis.races());
    let race = &analysis.races()[0];
    assert_eq!(race.race_type, "counter-increment");
    assert_eq!(race.state_key, "module:app#counter");
    assert!(race.timing.can_run_concurrently);
    assert!(
        race.severity >= Severity::High,
        "got {:?} at {:.1}",
        race.severity,
        race.risk_score.value
    );
}

#[test]
fn test_lock_wrapped_counters_cap_at_medium() {
    let body = "await counterLock.acquire();\ncounter++;\ncounterLock.release();\n";
    let p = counter_project(body, body);
    let analysis = RaceDetector::new().analyze(&p);

    assert_eq!(analysis.len(), 1);
    let race = &analysis.races()[0];
    assert!(race.mitigation.has_mitigation);
    assert_eq!(race.mitigation.kind.to_string(), "lock");
    assert!(
        race.severity <= Severity::Medium,
        "fully mitigated race must cap at medium, got {:?}",
        race.severity
    );
}

#[test]
fn test_duplicated_lazy_singleton_is_init_race() {
    let code = "if (!instance) instance = createInstance();\nreturn instance;\n";
    let p = project(vec![
        ("src/a.js", vec![atom("src/a.js:getA", "getA", code)]),
        ("src/b.js", vec![atom("src/b.js:getB", "getB", code)]),
    ]);
    let analysis = RaceDetector::new().analyze(&p);

    assert_eq!(analysis.len(), 1, "got: {:?}", analysis.races());
    assert_eq!(analysis.races()[0].race_type, "init-race");
}

#[test]
fn test_sequential_same_atom_pair_is_suppressed() {
    let p = project(vec![(
        "src/state.js",
        vec![atom(
            "src/state.js:update",
            "update",
            "const current = counter;\ncounter = current + 1;\n",
        )],
    )]);
    let analysis = RaceDetector::new().analyze(&p);

    assert!(analysis.is_empty(), "got: {:?}", analysis.races());
}

#[test]
fn test_atom_without_shared_state_yields_empty_result() {
    let p = project(vec![(
        "src/pure.js",
        vec![atom(
            "src/pure.js:double",
            "double",
            "const result = input * 2;\nreturn result;\n",
        )],
    )]);
    let analysis = RaceDetector::new().analyze(&p);

    assert!(analysis.is_empty());
    assert_eq!(analysis.summary().total_races, 0);
}

// ── Engine guarantees ───────────────────────────────────────────

#[test]
fn test_reruns_are_byte_identical() {
    let mut p = counter_project("counter++;\n", "counter++;\n");
    p.modules[0].files.push(SourceFile {
        file_path: "src/singleton.js".to_string(),
        atoms: vec![
            atom("src/singleton.js:getA", "getA", "if (!instance) instance = make();\n"),
            atom("src/singleton.js:getB", "getB", "if (!instance) instance = make();\n"),
        ],
    });

    let detector = RaceDetector::new();
    let first = serde_json::to_string(detector.analyze(&p).races()).unwrap();
    let second = serde_json::to_string(detector.analyze(&p).races()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_no_duplicate_race_per_unordered_pair() {
    let p = project(vec![
        ("src/a.js", vec![atom("src/a.js:f", "f", "total++;\n")]),
        ("src/b.js", vec![atom("src/b.js:g", "g", "total++;\n")]),
        ("src/c.js", vec![atom("src/c.js:h", "h", "total++;\n")]),
    ]);
    let analysis = RaceDetector::new().analyze(&p);

    assert_eq!(analysis.len(), 3);
    let mut ids: Vec<&str> = analysis.races().iter().map(|r| r.id.as_str()).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 3);
}

#[test]
fn test_business_flow_pair_is_kept_but_downgraded() {
    let mut p = project(vec![
        (
            "src/stock.js",
            vec![atom("src/stock.js:reserveStock", "reserveStock", "orderState = 'reserved';\n")],
        ),
        (
            "src/pay.js",
            vec![atom("src/pay.js:chargeCard", "chargeCard", "orderState = 'charged';\n")],
        ),
    ]);
    p.business_flows = vec![BusinessFlow {
        name: "checkout".to_string(),
        steps: vec![
            FlowStep {
                function: "reserveStock".to_string(),
                order: 1,
            },
            FlowStep {
                function: "chargeCard".to_string(),
                order: 2,
            },
        ],
    }];

    let analysis = RaceDetector::new().analyze(&p);
    assert_eq!(analysis.len(), 1, "low-confidence sequential races stay reported");
    let race = &analysis.races()[0];
    assert!(race.timing.same_business_flow);
    assert!(!race.timing.can_run_concurrently);
    assert_eq!(race.timing.confidence, Confidence::Low);
}

#[test]
fn test_severity_override_lowers_score() {
    let p = counter_project("counter++;\n", "counter++;\n");

    let baseline = RaceDetector::new().analyze(&p).races()[0].risk_score.value;

    let mut config = RacewatchConfig::default();
    config
        .severity_overrides
        .insert("counter-increment".to_string(), "low".to_string());
    let overridden = RaceDetector::with_config(config).analyze(&p).races()[0]
        .risk_score
        .value;

    assert!(overridden < baseline);
}

// ── Aggregation ─────────────────────────────────────────────────

#[test]
fn test_races_grouped_by_module_and_file() {
    let p = counter_project("counter++;\n", "counter++;\n");
    let analysis = RaceDetector::new().analyze(&p);

    assert_eq!(analysis.races_by_module("app").len(), 1);
    assert!(analysis.races_by_module("unknown").is_empty());

    assert_eq!(analysis.races_by_file("src/orders.js").len(), 1);
    assert_eq!(analysis.races_by_file("src/refunds.js").len(), 1);
    assert!(analysis.races_by_file("src/other.js").is_empty());
}

#[test]
fn test_summary_counts_by_severity_and_type() {
    let p = counter_project("counter++;\n", "counter++;\n");
    let analysis = RaceDetector::new().analyze(&p);
    let summary = analysis.summary();

    assert_eq!(summary.total_races, 1);
    let severity_total: usize = summary.by_severity.values().sum();
    assert_eq!(severity_total, 1);
    assert_eq!(summary.by_type.get("counter-increment"), Some(&1));
}
