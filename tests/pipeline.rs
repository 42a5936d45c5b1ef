//! # Pipeline Tests
//!
//! Queue, link executor, adaptive writer and in-memory link wired together
//! the way the CLI wires them, running on paused tokio time.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bleprint::error::LinkError;
use bleprint::protocol::barcode::QrOptions;
use bleprint::protocol::text::{self, TextEncoding};
use bleprint::protocol::PrintBuilder;
use bleprint::queue::{JobOptions, JobStatus, LinkExecutor, PrintQueue, QueueConfig, QueueEvent};
use bleprint::transport::{AdaptiveWriter, MemoryLink, TransportConfig, WriteOutcome};
use bleprint::Settings;
use pretty_assertions::assert_eq;

struct Rig {
    link: Arc<MemoryLink>,
    queue: PrintQueue,
    events: Arc<Mutex<Vec<&'static str>>>,
}

fn rig(queue: QueueConfig, transport: TransportConfig) -> Rig {
    let link = Arc::new(MemoryLink::new());
    let executor = LinkExecutor::new(Arc::clone(&link), "printer", AdaptiveWriter::new(transport));
    let queue = PrintQueue::new(queue, executor);
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    queue.subscribe(move |event: &QueueEvent| sink.lock().unwrap().push(event.name()));
    Rig { link, queue, events }
}

fn manual() -> QueueConfig {
    QueueConfig {
        auto_process: false,
        ..QueueConfig::default()
    }
}

#[tokio::test(start_paused = true)]
async fn text_job_completes_in_one_chunk() {
    let rig = rig(QueueConfig::default(), TransportConfig::default());
    let payload = text::encode("Hi", TextEncoding::Ascii).unwrap();

    let id = rig.queue.add(payload, JobOptions::default()).unwrap();
    rig.queue.wait_idle().await;

    assert_eq!(rig.link.writes(), vec![b"Hi".to_vec()]);
    assert_eq!(rig.link.write_calls(), 1);
    let job = rig.queue.get(id).unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.attempts, 1);
    assert!(job.finished_at.is_some());
    assert_eq!(
        *rig.events.lock().unwrap(),
        vec!["job-added", "job-started", "job-completed", "queue-empty"]
    );
}

#[tokio::test(start_paused = true)]
async fn dispatch_follows_priority_bands() {
    let rig = rig(manual(), TransportConfig::default());
    for (payload, priority) in [(b"one".to_vec(), 1), (b"ten".to_vec(), 10), (b"five".to_vec(), 5)] {
        rig.queue.add(payload, JobOptions::priority(priority)).unwrap();
    }
    rig.queue.process();
    rig.queue.wait_idle().await;

    assert_eq!(
        rig.link.writes(),
        vec![b"ten".to_vec(), b"five".to_vec(), b"one".to_vec()]
    );
}

#[tokio::test(start_paused = true)]
async fn equal_priority_is_fifo() {
    let rig = rig(manual(), TransportConfig::default());
    let a = rig.queue.add(b"A".to_vec(), JobOptions::priority(3)).unwrap();
    let b = rig.queue.add(b"B".to_vec(), JobOptions::priority(3)).unwrap();
    assert_eq!(rig.queue.pending_order(), vec![a, b]);

    rig.queue.process();
    rig.queue.wait_idle().await;
    assert_eq!(rig.link.written(), b"AB".to_vec());
}

#[tokio::test(start_paused = true)]
async fn retry_bound_is_exact() {
    let transport = TransportConfig {
        retries: 1,
        ..TransportConfig::default()
    };
    let rig = rig(QueueConfig::default(), transport);
    rig.link.script([WriteOutcome::Fail; 10]);

    let failed = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&failed);
    rig.queue.subscribe(move |event| {
        if matches!(event, QueueEvent::JobFailed(_)) {
            seen.fetch_add(1, Ordering::SeqCst);
        }
    });

    let id = rig
        .queue
        .add(b"Hi".to_vec(), JobOptions::default().with_max_retries(3))
        .unwrap();
    rig.queue.wait_idle().await;

    let job = rig.queue.get(id).unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.attempts, 3);
    assert_eq!(rig.link.write_calls(), 3);
    assert_eq!(failed.load(Ordering::SeqCst), 1);
    let started = rig
        .events
        .lock()
        .unwrap()
        .iter()
        .filter(|name| **name == "job-started")
        .count();
    assert_eq!(started, 3);
    let error = job.last_error.unwrap();
    assert!(error.contains("chunk 0"), "{error}");
}

#[tokio::test(start_paused = true)]
async fn lost_link_is_rediscovered_on_retry() {
    let rig = rig(QueueConfig::default(), TransportConfig::default());
    rig.link.script([WriteOutcome::Ok, WriteOutcome::Disconnect]);
    let payload: Vec<u8> = (0..100u8).collect();

    let id = rig.queue.add(payload.clone(), JobOptions::default()).unwrap();
    rig.queue.wait_idle().await;

    let job = rig.queue.get(id).unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.attempts, 2);
    assert_eq!(rig.link.connects(), 2);
    // The first attempt got one chunk out before the link dropped; the
    // retry sends the whole payload again.
    let written = rig.link.written();
    assert_eq!(&written[..20], &payload[..20]);
    assert_eq!(&written[20..], &payload[..]);
}

#[tokio::test(start_paused = true)]
async fn refused_connection_fails_the_job() {
    let rig = rig(
        QueueConfig {
            default_retries: 2,
            ..QueueConfig::default()
        },
        TransportConfig::default(),
    );
    rig.link.refuse_connections(true);

    let id = rig.queue.add(b"Hi".to_vec(), JobOptions::default()).unwrap();
    rig.queue.wait_idle().await;

    let job = rig.queue.get(id).unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.attempts, 2);
    assert_eq!(
        job.last_error.as_deref(),
        Some(LinkError::DeviceNotFound("printer".into()).to_string().as_str())
    );
}

#[tokio::test(start_paused = true)]
async fn large_payload_survives_flaky_link() {
    let rig = rig(QueueConfig::default(), TransportConfig::default());
    use WriteOutcome::*;
    rig.link.script([Ok, Fail, Ok, Ok, Fail, Fail, Ok, Hang, Ok]);

    let pixels: Vec<u8> = (0..64 * 32)
        .flat_map(|i| {
            let v = (i % 256) as u8;
            [v, v, v, 255]
        })
        .collect();
    let payload = PrintBuilder::new(TextEncoding::Cp437)
        .init()
        .line("Receipt #42")
        .unwrap()
        .image(&pixels, 64, 32)
        .unwrap()
        .qr("https://example.com/r/42", &QrOptions::default())
        .unwrap()
        .feed(3)
        .cut()
        .build();

    let id = rig.queue.add(payload.clone(), JobOptions::default()).unwrap();
    rig.queue.wait_idle().await;

    assert_eq!(rig.queue.get(id).unwrap().status, JobStatus::Completed);
    assert_eq!(rig.link.written(), payload);
    assert!(rig.link.writes().iter().all(|chunk| chunk.len() <= 256));
}

#[tokio::test(start_paused = true)]
async fn settings_drive_the_pipeline() {
    let settings = Settings::from_toml_str(
        r#"
        [transport]
        chunk_size = 8

        [queue]
        auto_process = false
        "#,
    )
    .unwrap();
    let rig = rig(settings.queue, settings.transport);

    rig.queue.add(vec![0xAA; 24], JobOptions::default()).unwrap();
    tokio::time::sleep(std::time::Duration::from_secs(1)).await;
    assert_eq!(rig.link.write_calls(), 0);

    rig.queue.process();
    rig.queue.wait_idle().await;
    let sizes: Vec<usize> = rig.link.writes().iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![8, 8, 8]);
}

#[tokio::test(start_paused = true)]
async fn clear_leaves_in_flight_job_alone() {
    let link = Arc::new(MemoryLink::with_latency(std::time::Duration::from_millis(50)));
    let executor = LinkExecutor::new(Arc::clone(&link), "printer", AdaptiveWriter::default());
    let queue = PrintQueue::new(QueueConfig::default(), executor);

    let running = queue.add(b"first".to_vec(), JobOptions::default()).unwrap();
    let queued = queue.add(b"second".to_vec(), JobOptions::default()).unwrap();
    assert_eq!(queue.clear(), 1);
    queue.wait_idle().await;

    assert_eq!(queue.get(running).unwrap().status, JobStatus::Completed);
    assert_eq!(queue.get(queued).unwrap().status, JobStatus::Cancelled);
    assert_eq!(link.written(), b"first".to_vec());
    let stats = queue.stats();
    assert_eq!((stats.completed, stats.cancelled), (1, 1));
}
