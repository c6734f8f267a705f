//! End-to-end settings derivation over a small dependency graph.

use std::collections::BTreeMap;
use std::path::PathBuf;

use podgen::platform::{Platform, PlatformName};
use podgen::sandbox::{FileAccessor, Sandbox};
use podgen::spec::{Consumer, Specification};
use podgen::target::build_settings::{AggregateTargetSettings, PodTargetSettings, SettingsStore};
use podgen::target::{AggregateTarget, BuildType, PodTarget, TargetDefinition, TargetGraph};
use podgen::version::Version;

fn spec_named(name: &str, consumer: Consumer) -> Specification {
    let mut spec = Specification::new(name, Version::new("1.0.0").unwrap());
    spec.checksum = format!("checksum-{name}");
    spec.consumers.insert(PlatformName::Ios, consumer);
    spec
}

fn pod(name: &str, build_type: BuildType, consumer: Consumer) -> PodTarget {
    let requires_arc = consumer.requires_arc;
    let mut target = PodTarget::new(
        vec![spec_named(name, consumer)],
        vec![TargetDefinition::new("App", Platform::ios())],
        Platform::ios(),
        build_type,
        vec![],
        None,
    )
    .unwrap();
    let mut accessor = FileAccessor::empty(name);
    accessor.requires_arc = requires_arc;
    accessor.source_files = vec![format!("{name}/Sources/{name}.m").into()];
    target.file_accessors.push(accessor);
    target
}

fn graph_with_chain() -> TargetGraph {
    let mut graph = TargetGraph::new();

    let mut networking = pod(
        "Networking",
        BuildType::dynamic_framework(),
        Consumer {
            frameworks: vec!["Foundation".to_string()],
            ..Consumer::default()
        },
    );
    networking.dependent_targets = vec!["Sockets".to_string()];
    graph.add_pod_target(networking).unwrap();

    let mut sockets = pod(
        "Sockets",
        BuildType::static_library(),
        Consumer {
            libraries: vec!["z".to_string()],
            ..Consumer::default()
        },
    );
    sockets
        .file_accessors
        .push(vendored_static_library("Sockets", "Sockets/lib/libresolv.a"));
    graph.add_pod_target(sockets).unwrap();
    graph
}

fn vendored_static_library(spec_name: &str, path: &str) -> FileAccessor {
    let mut accessor = FileAccessor::empty(spec_name);
    accessor.vendored_static_libraries = vec![PathBuf::from(path)];
    accessor
}

#[test]
fn generated_xcconfigs_are_byte_identical_across_runs() {
    let sandbox = Sandbox::new("/repo/Pods");

    let first_graph = graph_with_chain();
    let second_graph = graph_with_chain();
    for label in ["Networking", "Sockets"] {
        let first = PodTargetSettings::new(
            &first_graph,
            &sandbox,
            first_graph.pod_target(label).unwrap(),
        )
        .xcconfig();
        let second = PodTargetSettings::new(
            &second_graph,
            &sandbox,
            second_graph.pod_target(label).unwrap(),
        )
        .xcconfig();
        assert_eq!(first.config.render(), second.config.render());
        assert_eq!(first.config.checksum(), second.config.checksum());
    }
}

#[test]
fn objc_linker_flag_follows_linkage() {
    let graph = graph_with_chain();
    let sandbox = Sandbox::new("/repo/Pods");

    // A dynamic framework with a static vendored artifact in its closure
    // must force -ObjC onto whoever finally links it.
    let networking = PodTargetSettings::new(&graph, &sandbox, graph.pod_target("Networking").unwrap());
    let ldflags = networking
        .xcconfig()
        .config
        .get("OTHER_LDFLAGS")
        .unwrap()
        .to_string();
    assert!(ldflags.contains("-ObjC"));

    // Plain static libraries always carry it.
    let sockets = PodTargetSettings::new(&graph, &sandbox, graph.pod_target("Sockets").unwrap());
    let ldflags = sockets
        .xcconfig()
        .config
        .get("OTHER_LDFLAGS")
        .unwrap()
        .to_string();
    assert!(ldflags.contains("-ObjC"));
    assert!(ldflags.contains("-l\"z\""));
}

#[test]
fn rendered_lines_follow_the_xcconfig_wire_format() {
    let graph = graph_with_chain();
    let sandbox = Sandbox::new("/repo/Pods");
    let rendered = PodTargetSettings::new(&graph, &sandbox, graph.pod_target("Sockets").unwrap())
        .xcconfig()
        .config
        .render();

    assert!(rendered.contains("GCC_PREPROCESSOR_DEFINITIONS = $(inherited) COCOAPODS=1\n"));
    assert!(rendered.contains("PODS_ROOT = ${SRCROOT}\n"));
    assert!(rendered.contains(
        "PODS_CONFIGURATION_BUILD_DIR = ${PODS_BUILD_DIR}/$(CONFIGURATION)$(EFFECTIVE_PLATFORM_NAME)\n"
    ));
    // Search paths containing variable references are shell-quoted.
    assert!(rendered.contains("\"${PODS_ROOT}/Headers/Public\""));
}

fn aggregate_over(graph: &mut TargetGraph, labels: Vec<String>) -> String {
    let mut aggregate = AggregateTarget::new(
        TargetDefinition::new("App", Platform::ios()),
        PathBuf::from("/repo/App"),
    );
    aggregate.add_pod_targets_for_all_configurations(labels);
    let label = aggregate.label();
    graph.add_aggregate_target(aggregate).unwrap();
    label
}

fn pod_with_user_flag(name: &str, value: &str) -> PodTarget {
    let mut xcconfig = BTreeMap::new();
    xcconfig.insert("MY_FLAG".to_string(), value.to_string());
    pod(
        name,
        BuildType::static_library(),
        Consumer {
            user_target_xcconfig: xcconfig,
            ..Consumer::default()
        },
    )
}

#[test]
fn agreeing_user_xcconfig_values_merge_without_warning() {
    let mut graph = TargetGraph::new();
    graph.add_pod_target(pod_with_user_flag("Alpha", "YES")).unwrap();
    graph.add_pod_target(pod_with_user_flag("Beta", "YES")).unwrap();
    let label = aggregate_over(&mut graph, vec!["Alpha".to_string(), "Beta".to_string()]);

    let sandbox = Sandbox::new("/repo/Pods");
    let generated = AggregateTargetSettings::new(
        &graph,
        &sandbox,
        graph.aggregate_target(&label).unwrap(),
        "Debug",
    )
    .xcconfig();
    assert_eq!(generated.config.get("MY_FLAG"), Some("YES"));
    assert!(generated.warnings.is_empty());
}

#[test]
fn conflicting_user_xcconfig_values_warn_and_drop() {
    let mut graph = TargetGraph::new();
    graph.add_pod_target(pod_with_user_flag("Alpha", "YES")).unwrap();
    graph.add_pod_target(pod_with_user_flag("Beta", "NO")).unwrap();
    let label = aggregate_over(&mut graph, vec!["Alpha".to_string(), "Beta".to_string()]);

    let sandbox = Sandbox::new("/repo/Pods");
    let generated = AggregateTargetSettings::new(
        &graph,
        &sandbox,
        graph.aggregate_target(&label).unwrap(),
        "Debug",
    )
    .xcconfig();
    assert_eq!(generated.config.get("MY_FLAG"), None);
    assert_eq!(generated.warnings.len(), 1);
    assert!(generated.warnings[0].contains("MY_FLAG"));
}

#[test]
fn swift_embedding_flags_are_mutually_exclusive() {
    let mut graph = TargetGraph::new();
    let mut swift_pod = pod(
        "SwiftKit",
        BuildType::dynamic_framework(),
        Consumer::default(),
    );
    swift_pod.file_accessors[0].source_files = vec![PathBuf::from("SwiftKit/Sources/K.swift")];
    graph.add_pod_target(swift_pod).unwrap();

    let mut definition = TargetDefinition::new("App", Platform::ios());
    definition.uses_frameworks = true;
    definition.swift_version = Some(Version::new("5.0").unwrap());
    let mut aggregate = AggregateTarget::new(definition, PathBuf::from("/repo/App"));
    aggregate.add_pod_targets_for_all_configurations(vec!["SwiftKit".to_string()]);
    let label = aggregate.label();
    graph.add_aggregate_target(aggregate).unwrap();

    let sandbox = Sandbox::new("/repo/Pods");
    let config = AggregateTargetSettings::new(
        &graph,
        &sandbox,
        graph.aggregate_target(&label).unwrap(),
        "Release",
    )
    .xcconfig()
    .config;
    assert_eq!(
        config.get("ALWAYS_EMBED_SWIFT_STANDARD_LIBRARIES"),
        Some("YES")
    );
    assert_eq!(
        config.get("EMBEDDED_CONTENT_CONTAINS_SWIFT"),
        Some("$(inherited)")
    );
}

#[test]
fn settings_store_serves_cached_configs_until_cleared() {
    let graph = graph_with_chain();
    let sandbox = Sandbox::new("/repo/Pods");
    let store = SettingsStore::new(&graph, &sandbox);

    let first = store.pod_xcconfig("Networking", None).unwrap();
    let cached = store.pod_xcconfig("Networking", None).unwrap();
    assert!(std::rc::Rc::ptr_eq(&first, &cached));

    // Invalidating the dependency cascades to the dependent.
    store.clear("Sockets");
    let recomputed = store.pod_xcconfig("Networking", None).unwrap();
    assert!(!std::rc::Rc::ptr_eq(&first, &recomputed));
    assert_eq!(first.config.render(), recomputed.config.render());
}
