//! Concurrency bounds of the generation pipeline under bursts larger than the limit

mod support;

use common::thumbnail::OutputEncoding;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use std::time::Duration;
use support::{Harness, ScriptedRenderer, FAKE_JPEG};
use thumbnail_service::{
    engine::RenderedImage,
    scheduler::{GenerationResult, GenerationScheduler, GenerationTask},
};

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_scheduler_caps_in_flight_tasks() {
    const LIMIT: usize = 5;
    const BURST: usize = 40;

    let scheduler = GenerationScheduler::new(LIMIT);
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..BURST)
        .map(|i| {
            let scheduler = scheduler.clone();
            let running = running.clone();
            let peak = peak.clone();
            tokio::spawn(async move {
                scheduler
                    .submit(GenerationTask::new(format!("burst-{}", i), async move {
                        let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(15)).await;
                        running.fetch_sub(1, Ordering::SeqCst);
                        Ok(RenderedImage::new(FAKE_JPEG, OutputEncoding::Jpeg))
                    }))
                    .await
            })
        })
        .collect();

    for handle in handles {
        assert!(matches!(handle.await.unwrap(), GenerationResult::Success(_)));
    }

    assert!(peak.load(Ordering::SeqCst) <= LIMIT);
    assert_eq!(peak.load(Ordering::SeqCst), LIMIT);
    assert_eq!(running.load(Ordering::SeqCst), 0);
    assert_eq!(scheduler.available(), LIMIT);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_failures_do_not_block_other_tasks() {
    let scheduler = GenerationScheduler::new(2);

    let tasks = (0..10).map(|i| {
        let scheduler = scheduler.clone();
        async move {
            scheduler
                .submit(GenerationTask::new(format!("mixed-{}", i), async move {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    if i % 3 == 0 {
                        panic!("task {} blew up", i);
                    }
                    Ok(RenderedImage::new(FAKE_JPEG, OutputEncoding::Jpeg))
                }))
                .await
        }
    });

    let results = futures::future::join_all(tasks).await;
    let successes = results.iter().filter(|r| r.is_success()).count();
    assert_eq!(successes, 6);
    assert_eq!(scheduler.available(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_http_burst_respects_limit() {
    let mut harness = Harness::new(
        ScriptedRenderer::image(FAKE_JPEG).with_delay(Duration::from_millis(20)),
    );
    harness.max_concurrent = 3;
    let server = harness.server();

    let requests = (0..12).map(|i| {
        let uri = format!("/generate-thumbnail?key=videos/{}.mp4", i);
        let server = &server;
        async move { server.get(&uri).await.status_code() }
    });

    let statuses = futures::future::join_all(requests).await;
    assert!(statuses.iter().all(|s| *s == 200));
    assert_eq!(harness.renderer.calls(), 12);
    assert!(harness.renderer.peak_concurrency() <= 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_coalesced_burst_renders_once() {
    let mut harness = Harness::new(
        ScriptedRenderer::image(FAKE_JPEG).with_delay(Duration::from_millis(50)),
    );
    harness.coalesce = true;
    let server = harness.server();

    let requests = (0..8).map(|_| {
        let server = &server;
        async move {
            server
                .get("/generate-thumbnail?key=videos/same.mp4&width=320&height=180")
                .await
                .status_code()
        }
    });

    let statuses = futures::future::join_all(requests).await;
    assert!(statuses.iter().all(|s| *s == 200));
    assert_eq!(harness.renderer.calls(), 1);
}
