//! Channel recreation under concurrent callers.

mod common;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use signing_proxy::{ChannelHealthMonitor, ChannelState, SubmitPayload};
use tokio::sync::Barrier;

use common::{Script, ScriptedFactory, contract_request, harness_with};

const CALLERS: usize = 32;

fn payload() -> SubmitPayload {
    SubmitPayload::from_request(&contract_request())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_one_recreation_per_fault_episode() {
    let factory = Arc::new(
        ScriptedFactory::new(Script::new()).with_build_delay(Duration::from_millis(20)),
    );
    let monitor = Arc::new(ChannelHealthMonitor::new(factory.clone()).unwrap());
    monitor.current().mark_faulted();

    let barrier = Arc::new(Barrier::new(CALLERS));
    let mut tasks = Vec::with_capacity(CALLERS);
    for _ in 0..CALLERS {
        let monitor = Arc::clone(&monitor);
        let barrier = Arc::clone(&barrier);
        tasks.push(tokio::spawn(async move {
            barrier.wait().await;
            let channel = monitor.healthy_channel().unwrap();
            channel.submit(&payload()).await.unwrap();
            channel.id()
        }));
    }

    let mut ids = HashSet::new();
    for task in tasks {
        ids.insert(task.await.unwrap());
    }

    assert_eq!(factory.created(), 2);
    assert_eq!(ids, HashSet::from([2]));
    assert_eq!(monitor.current().state(), ChannelState::Open);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_facade_calls_share_the_replacement() {
    let h = Arc::new(harness_with(
        ScriptedFactory::new(Script::new())
            .with_faulted_first_channel()
            .with_build_delay(Duration::from_millis(20)),
    ));

    let barrier = Arc::new(Barrier::new(CALLERS));
    let mut tasks = Vec::with_capacity(CALLERS);
    for i in 0..CALLERS {
        let h = Arc::clone(&h);
        let barrier = Arc::clone(&barrier);
        tasks.push(tokio::spawn(async move {
            barrier.wait().await;
            if i % 2 == 0 {
                h.client
                    .start_signing_process(&contract_request())
                    .await
                    .map(|r| r.identifier)
            } else {
                h.client.get_sign_response("abc123", "en").await.map(|r| r.message)
            }
        }));
    }

    for task in tasks {
        assert!(task.await.unwrap().is_ok());
    }

    assert_eq!(h.factory.created(), 2);
    assert!(h.sleeper.delays().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_separate_fault_episodes_recreate_separately() {
    let factory = Arc::new(ScriptedFactory::new(Script::new()));
    let monitor = ChannelHealthMonitor::new(factory.clone()).unwrap();

    for episode in 1..=3 {
        monitor.current().mark_faulted();
        let channel = monitor.healthy_channel().unwrap();
        assert_eq!(channel.id(), episode + 1);
    }

    assert_eq!(factory.created(), 4);
}
