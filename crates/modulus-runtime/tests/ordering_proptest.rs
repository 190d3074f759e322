//! Property tests for load, unload and handle ordering

use modulus_api::testing::{Call, Journal, Probe, ProbeEvent, RecordingBuilder};
use modulus_api::{EventKind, ModuleName};
use modulus_runtime::{Host, HostConfig};
use proptest::prelude::*;
use std::time::Duration;

#[derive(Debug, Clone)]
struct Spec {
    load_first: bool,
    load_priority: i16,
    handle_priority: i16,
    passes: bool,
}

fn spec() -> impl Strategy<Value = Spec> {
    (any::<bool>(), -3i16..3, -3i16..3, any::<bool>()).prop_map(
        |(load_first, load_priority, handle_priority, passes)| Spec {
            load_first,
            load_priority,
            handle_priority,
            passes,
        },
    )
}

fn host(specs: &[Spec], journal: &Journal) -> Host {
    let mut builder = Host::builder()
        .application_name("ordering")
        .working_directory(std::env::temp_dir())
        .config(HostConfig {
            unload_grace: Duration::ZERO,
            ..HostConfig::default()
        });

    for (index, spec) in specs.iter().enumerate() {
        let mut module = RecordingBuilder::new(format!("m{index}"), journal)
            .handles(Probe::NAME)
            .load_priority(spec.load_priority)
            .handle_priority(spec.handle_priority);
        if spec.load_first {
            module = module.load_first();
        }
        if spec.passes {
            module = module.passes();
        }
        builder = builder.provider(module.build());
    }

    builder.build().unwrap()
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn expected_load_order(specs: &[Spec]) -> Vec<ModuleName> {
    let mut indices: Vec<usize> = (0..specs.len()).collect();
    indices.sort_by_key(|&i| (!specs[i].load_first, specs[i].load_priority, i));
    indices
        .into_iter()
        .map(|i| ModuleName::from(format!("m{i}")))
        .collect()
}

fn expected_handlers(specs: &[Spec]) -> Vec<ModuleName> {
    let mut indices: Vec<usize> = (0..specs.len()).collect();
    indices.sort_by_key(|&i| (specs[i].handle_priority, i));

    let mut invoked = Vec::new();
    for i in indices {
        invoked.push(ModuleName::from(format!("m{i}")));
        if !specs[i].passes {
            break;
        }
    }
    invoked
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_load_and_unload_order(specs in prop::collection::vec(spec(), 1..8)) {
        let journal = Journal::new();
        let host = host(&specs, &journal);
        let rt = runtime();

        let loaded = rt.block_on(host.modules().load(None)).unwrap();
        let expected = expected_load_order(&specs);
        prop_assert_eq!(&loaded, &expected);
        prop_assert_eq!(journal.modules_with(&Call::Loading), expected.clone());

        // Every load-first module finishes loading before any ordinary one starts
        let last_early_loaded = specs
            .iter()
            .enumerate()
            .filter(|(_, spec)| spec.load_first)
            .filter_map(|(i, _)| journal.position(&format!("m{i}"), &Call::Loaded))
            .max();
        let first_ordinary_loading = specs
            .iter()
            .enumerate()
            .filter(|(_, spec)| !spec.load_first)
            .filter_map(|(i, _)| journal.position(&format!("m{i}"), &Call::Loading))
            .min();
        if let (Some(early), Some(ordinary)) = (last_early_loaded, first_ordinary_loading) {
            prop_assert!(early < ordinary);
        }

        let unloaded = rt.block_on(host.modules().unload(None)).unwrap();
        let reversed: Vec<ModuleName> = expected.into_iter().rev().collect();
        prop_assert_eq!(unloaded, reversed);
    }

    #[test]
    fn prop_dispatch_stops_at_first_responder(specs in prop::collection::vec(spec(), 1..8)) {
        let journal = Journal::new();
        let host = host(&specs, &journal);
        let rt = runtime();

        rt.block_on(host.modules().load(None)).unwrap();
        journal.clear();

        let mut event = ProbeEvent::default();
        rt.block_on(host.handle(&mut event));

        let expected = expected_handlers(&specs);
        prop_assert_eq!(journal.modules_with(&Call::Handle(Probe::NAME)), expected.clone());

        let responder = expected
            .last()
            .filter(|name| {
                let index: usize = name.as_str()[1..].parse().unwrap();
                !specs[index].passes
            })
            .map(|name| name.to_string());
        prop_assert_eq!(event.output.clone(), responder);
        prop_assert!(host.in_flight().is_empty());

        rt.block_on(host.shutdown()).unwrap();
    }
}
