mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::{Duration, Instant};

use common::*;
use crossbeam_channel::unbounded;
use dmccontrol::{Device, DeviceObserver, DiscoveryConfig, DiscoveryEvent};

fn is_list(event: &DiscoveryEvent) -> bool {
    matches!(event, DiscoveryEvent::DeviceListChanged(_))
}

fn is_list_or_lost(event: &DiscoveryEvent) -> bool {
    is_list(event) || matches!(event, DiscoveryEvent::SelectedDeviceLost(_))
}

fn names(devices: &[Device]) -> Vec<String> {
    devices
        .iter()
        .map(|d| d.friendly_name().to_string())
        .collect()
}

#[test]
fn cycle_reports_started_devices_and_finished() {
    let h = harness();
    let events = discovery_events(&h.cp);
    assert_eq!(events.recv_timeout(WAIT).unwrap(), DiscoveryEvent::Started);

    h.transport.announce(renderer("uuid:r1", "Living Room"));
    let seen = recv_until(&events, is_list);
    assert_eq!(
        seen.last(),
        Some(&DiscoveryEvent::DeviceListChanged(vec![renderer(
            "uuid:r1",
            "Living Room"
        )]))
    );

    recv_until(&events, |e| *e == DiscoveryEvent::Finished);
    assert_eq!(h.transport.starts.load(Ordering::SeqCst), 1);
    assert!(h.transport.searches.load(Ordering::SeqCst) >= 2);
    assert!(!h.cp.discovery().is_discovering());
    assert_eq!(names(&h.cp.devices()), vec!["Living Room"]);
}

#[test]
fn first_seen_device_wins() {
    let h = harness();
    let events = discovery_events(&h.cp);

    h.transport.announce(renderer("uuid:ABC", "first"));
    h.transport.announce(renderer("uuid:abc", "second"));
    h.transport.announce(renderer("uuid:def", "third"));

    let lists: Vec<_> = recv_until(&events, |e| *e == DiscoveryEvent::Finished)
        .into_iter()
        .filter(is_list)
        .collect();
    assert_eq!(lists.len(), 2);
    assert_eq!(names(&h.cp.devices()), vec!["first", "third"]);
    assert_eq!(
        h.cp.discovery()
            .find_device("UUID:ABC")
            .map(|d| d.friendly_name().to_string()),
        Some("first".to_string())
    );
}

#[test]
fn devices_of_other_types_are_ignored() {
    let h = harness();
    let events = discovery_events(&h.cp);

    h.transport.announce(Device::new(
        "uuid:server",
        "NAS",
        "urn:schemas-upnp-org:device:MediaServer:1",
    ));
    h.transport.announce(Device::new(
        "uuid:lower",
        "Lower",
        "URN:SCHEMAS-UPNP-ORG:DEVICE:MEDIARENDERER:1",
    ));

    let seen = recv_until(&events, |e| *e == DiscoveryEvent::Finished);
    assert_eq!(seen.iter().filter(|e| is_list(e)).count(), 1);
    assert_eq!(names(&h.cp.devices()), vec!["Lower"]);
}

#[test]
fn concurrent_adds_and_removes_are_not_lost() {
    let h = harness_with(
        DiscoveryConfig {
            search_budget: Duration::from_secs(2),
            ..fast_discovery()
        },
        fast_controller(),
    );
    let events = discovery_events(&h.cp);
    let observer = h.transport.wait_started();

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let observer = Arc::clone(&observer);
            thread::spawn(move || {
                for i in 0..25 {
                    let udn = format!("uuid:t{}-d{}", t, i);
                    observer.device_added(renderer(&udn, &udn));
                    if i % 2 == 1 {
                        observer.device_removed(&udn);
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let devices = h.cp.devices();
    assert_eq!(devices.len(), 8 * 13);
    assert!(devices.iter().all(|d| {
        let index: usize = d.udn().rsplit('d').next().unwrap().parse().unwrap();
        index % 2 == 0
    }));

    // The last snapshot delivered matches the committed set.
    let lists: Vec<_> = drain_for(&events, Duration::from_millis(200))
        .into_iter()
        .filter_map(|e| match e {
            DiscoveryEvent::DeviceListChanged(list) => Some(list),
            _ => None,
        })
        .collect();
    assert_eq!(lists.len(), 8 * 25 + 8 * 12);
    assert_eq!(lists.last().unwrap().len(), devices.len());
}

#[test]
fn removing_the_selected_device_clears_the_selection() {
    let h = harness();
    let events = discovery_events(&h.cp);
    let device = renderer("uuid:r1", "Living Room");
    h.transport.announce(device.clone());
    h.transport.announce(renderer("uuid:r2", "Kitchen"));

    assert_eq!(h.cp.select_device_by_udn("UUID:R1"), Some(device.clone()));
    wait_for(|| h.cp.selected_device().is_some());

    h.transport.bye("uuid:r1");

    let seen: Vec<_> = recv_until(&events, |e| {
        matches!(e, DiscoveryEvent::SelectedDeviceLost(_))
    })
    .into_iter()
    .filter(is_list_or_lost)
    .collect();
    let n = seen.len();
    assert_eq!(
        seen[n - 2],
        DiscoveryEvent::DeviceListChanged(vec![renderer("uuid:r2", "Kitchen")])
    );
    assert_eq!(seen[n - 1], DiscoveryEvent::SelectedDeviceLost(device));
    assert_eq!(h.cp.selected_device(), None);
}

#[test]
fn removing_another_device_keeps_the_selection() {
    let h = harness();
    let events = discovery_events(&h.cp);
    h.transport.announce(renderer("uuid:r1", "Living Room"));
    h.transport.announce(renderer("uuid:r2", "Kitchen"));
    h.cp.select_device_by_udn("uuid:r1").unwrap();

    h.transport.bye("uuid:r2");
    h.transport.bye("uuid:unknown");

    let seen = recv_until(&events, |e| *e == DiscoveryEvent::Finished);
    assert!(!seen
        .iter()
        .any(|e| matches!(e, DiscoveryEvent::SelectedDeviceLost(_))));
    assert_eq!(
        h.cp.selected_device().map(|d| d.udn().to_string()),
        Some("uuid:r1".to_string())
    );
}

#[test]
fn stop_discovery_cancels_the_cycle() {
    let h = harness_with(
        DiscoveryConfig {
            search_budget: Duration::from_secs(30),
            ..fast_discovery()
        },
        fast_controller(),
    );
    let events = discovery_events(&h.cp);
    h.transport.wait_started();
    assert!(h.cp.discovery().is_discovering());

    let begin = Instant::now();
    h.cp.stop_discovery();
    recv_until(&events, |e| *e == DiscoveryEvent::Finished);
    assert!(begin.elapsed() < Duration::from_secs(2));
    assert!(h.transport.stops.load(Ordering::SeqCst) >= 1);
    assert!(!h.cp.discovery().is_discovering());

    // A new cycle starts the transport again.
    let events = discovery_events(&h.cp);
    recv_until(&events, |e| *e == DiscoveryEvent::Started);
    wait_for(|| h.transport.starts.load(Ordering::SeqCst) == 2);
    h.cp.stop_discovery();
}

#[test]
fn restart_after_stop_reports_only_the_new_cycle() {
    let h = harness_with(
        DiscoveryConfig {
            search_budget: Duration::from_secs(30),
            ..fast_discovery()
        },
        fast_controller(),
    );
    let _first = discovery_events(&h.cp);
    h.transport.wait_started();

    h.cp.stop_discovery();
    let second = discovery_events(&h.cp);

    // The cancelled cycle winds down while the new one probes.
    assert_eq!(
        drain_for(&second, Duration::from_millis(300)),
        vec![DiscoveryEvent::Started]
    );
    assert!(h.cp.discovery().is_discovering());

    h.cp.stop_discovery();
    recv_until(&second, |e| *e == DiscoveryEvent::Finished);
    assert!(drain_for(&second, Duration::from_millis(200)).is_empty());
    assert!(!h.cp.discovery().is_discovering());
}

#[test]
fn stop_discovery_when_idle_is_harmless() {
    let h = harness();
    h.cp.stop_discovery();
    h.cp.stop_discovery();
    assert!(!h.cp.discovery().is_discovering());
}

#[test]
fn transport_start_failures_are_retried() {
    let h = harness();
    h.transport.fail_starts(2);
    let events = discovery_events(&h.cp);

    h.transport.wait_started();
    assert_eq!(h.transport.starts.load(Ordering::SeqCst), 3);
    recv_until(&events, |e| *e == DiscoveryEvent::Finished);
}

#[test]
fn closed_transport_ends_the_cycle_early() {
    let h = harness_with(
        DiscoveryConfig {
            search_budget: Duration::from_secs(30),
            ..fast_discovery()
        },
        fast_controller(),
    );
    h.transport.close();
    let begin = Instant::now();
    let events = discovery_events(&h.cp);

    recv_until(&events, |e| *e == DiscoveryEvent::Finished);
    assert!(begin.elapsed() < Duration::from_secs(2));
    assert_eq!(h.transport.searches.load(Ordering::SeqCst), 1);
}

#[test]
fn restarting_while_running_replaces_the_listener() {
    let h = harness_with(
        DiscoveryConfig {
            search_budget: Duration::from_millis(600),
            ..fast_discovery()
        },
        fast_controller(),
    );
    let first = discovery_events(&h.cp);
    assert_eq!(first.recv_timeout(WAIT).unwrap(), DiscoveryEvent::Started);
    h.transport.wait_started();

    let (tx, second) = unbounded();
    h.cp.start_discovery(move |event| {
        let _ = tx.send(event);
    });

    assert_eq!(second.recv_timeout(WAIT).unwrap(), DiscoveryEvent::Started);
    h.transport.announce(renderer("uuid:r1", "Living Room"));
    recv_until(&second, is_list);
    recv_until(&second, |e| *e == DiscoveryEvent::Finished);

    assert!(first.try_recv().is_err());
    assert_eq!(h.transport.starts.load(Ordering::SeqCst), 1);
}
