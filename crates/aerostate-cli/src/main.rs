//! `aerostate` – runs one vehicle's state estimator.
//!
//! ```text
//! aerostate [--config <path>]         run the estimator
//! aerostate init [--config <path>]    write the default configuration
//! ```
//!
//! The binary:
//!
//! 1. Loads `~/.aerostate/config.toml` (or `--config`), falling back to
//!    defaults, then applies `AEROSTATE_*` overrides.
//! 2. Reads inbound samples from **stdin**, one JSON [`Measurement`] per line,
//!    e.g. `{"kind":"odometry","data":{...}}`, and publishes them on the
//!    inbound bus topics the estimator is fed from.
//! 3. Writes every published transform and estimate to **stdout** as one JSON
//!    bus [`Event`] per line.  Logs go to stderr.
//! 4. Stops on Ctrl-C or when stdin closes.

mod config;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use aerostate_middleware::{BusPublisher, EventBus, Topic, TopicReceiver};
use aerostate_runtime::{EstimatorNode, init_tracing, spin_loop};
use aerostate_types::{Event, EventPayload, Measurement};
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

const SOURCE: &str = "aerostate";
const INPUT_SOURCE: &str = "aerostate::stdin";

// ─────────────────────────────────────────────────────────────────────────────
// Arguments
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Command {
    Run,
    Init,
}

#[derive(Debug, Clone, PartialEq)]
struct Args {
    command: Command,
    config: Option<PathBuf>,
}

fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<Args, String> {
    let mut parsed = Args {
        command: Command::Run,
        config: None,
    };
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "init" => parsed.command = Command::Init,
            "run" => parsed.command = Command::Run,
            "--config" | "-c" => {
                let path = args.next().ok_or("--config needs a path")?;
                parsed.config = Some(PathBuf::from(path));
            }
            other => return Err(format!("unknown argument '{other}'")),
        }
    }
    Ok(parsed)
}

// ─────────────────────────────────────────────────────────────────────────────
// Entry point
// ─────────────────────────────────────────────────────────────────────────────

fn main() -> ExitCode {
    let _guard = init_tracing(SOURCE);

    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("error: {e}");
            eprintln!("usage: aerostate [init] [--config <path>]");
            return ExitCode::from(2);
        }
    };
    let path = args.config.clone().unwrap_or_else(config::config_path);

    match args.command {
        Command::Init => match init(&path) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                error!(error = %e, "could not write configuration");
                ExitCode::FAILURE
            }
        },
        Command::Run => run(&path),
    }
}

fn init(path: &std::path::Path) -> Result<(), String> {
    config::save_to(&config::Config::default(), path)?;
    info!(path = %path.display(), "default configuration written");
    Ok(())
}

fn run(path: &std::path::Path) -> ExitCode {
    let cfg = match config::load_or_default(path) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(error = %e, "configuration error");
            return ExitCode::FAILURE;
        }
    };
    info!(path = %path.display(), namespace = %cfg.estimator.namespace, "configuration loaded");

    // ── Shared shutdown flag ──────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; graceful shutdown on Ctrl-C will not be available");
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "could not start async runtime");
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(serve(cfg, shutdown));
    // A pending stdin read cannot be cancelled; do not wait for it.
    runtime.shutdown_background();
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "estimator stopped with an error");
            ExitCode::FAILURE
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Wiring
// ─────────────────────────────────────────────────────────────────────────────

async fn serve(cfg: config::Config, shutdown: Arc<AtomicBool>) -> Result<(), String> {
    cfg.validate()?;
    let bus = EventBus::new(cfg.bus_capacity);

    let (line_tx, line_rx) = mpsc::channel(cfg.bus_capacity);
    let writer = tokio::spawn(write_lines(tokio::io::stdout(), line_rx));
    let printers: Vec<JoinHandle<()>> = Topic::OUTPUTS
        .iter()
        .map(|topic| tokio::spawn(print_topic(bus.subscribe_to(*topic), line_tx.clone())))
        .collect();
    drop(line_tx);

    let (tx, rx) = mpsc::channel(cfg.input_capacity);
    let lanes = Topic::INPUTS.map(|topic| bus.subscribe_to(topic));
    let (input_done_tx, input_done_rx) = oneshot::channel();
    let forwarder = tokio::spawn(forward_inbound(lanes, tx, input_done_rx));
    let reader = tokio::spawn(read_stdin(bus.clone(), input_done_tx));

    let mut node = EstimatorNode::new(cfg.estimator, BusPublisher::new(bus, SOURCE));
    let result = async {
        node.configure().map_err(|e| e.to_string())?;
        node.activate().map_err(|e| e.to_string())?;
        spin_loop(&mut node, rx, shutdown)
            .await
            .map_err(|e| e.to_string())
    }
    .await;

    if let Err(e) = node.shutdown() {
        warn!(error = %e, "shutdown transition failed");
    }
    reader.abort();
    forwarder.abort();
    // The reader holds a bus clone; wait until it is dropped.
    let _ = reader.await;
    let _ = forwarder.await;
    // Dropping the node drops the last bus senders, so the printers drain and
    // exit. The writer ends once every printer is gone.
    drop(node);
    for printer in printers {
        let _ = printer.await;
    }
    let _ = writer.await;
    result
}

/// Publish stdin JSON lines on the inbound topics until EOF, then signal
/// `done`.
async fn read_stdin(bus: EventBus, done: oneshot::Sender<()>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "stdin read failed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Measurement>(&line) {
            Ok(measurement) => {
                let event = Event::new(INPUT_SOURCE, EventPayload::Measurement(measurement));
                if let Err(e) = bus.publish(event) {
                    warn!(error = %e, "inbound sample dropped");
                }
            }
            Err(e) => warn!(error = %e, "skipping malformed input line"),
        }
    }
    info!("input closed");
    let _ = done.send(());
}

/// Move measurements from the inbound topics into the estimator queue.
///
/// Runs until `input_done` fires, then drains what the lanes still buffer and
/// drops `tx` so the spin loop sees the input close.
async fn forward_inbound(
    mut lanes: [TopicReceiver; 3],
    tx: mpsc::Sender<Measurement>,
    mut input_done: oneshot::Receiver<()>,
) {
    let [odom, pose, twist] = &mut lanes;
    loop {
        let received = tokio::select! {
            r = odom.recv() => r,
            r = pose.recv() => r,
            r = twist.recv() => r,
            _ = &mut input_done => break,
        };
        match received {
            Ok(event) => {
                if !forward(&tx, event).await {
                    return;
                }
            }
            Err(RecvError::Lagged(n)) => warn!(lagged_by = n, "inbound lane lagged"),
            Err(RecvError::Closed) => break,
        }
    }
    for lane in lanes.iter_mut() {
        loop {
            match lane.try_recv() {
                Ok(event) => {
                    if !forward(&tx, event).await {
                        return;
                    }
                }
                Err(TryRecvError::Lagged(n)) => {
                    warn!(topic = lane.topic().as_str(), lagged_by = n, "inbound lane lagged");
                }
                Err(_) => break,
            }
        }
    }
}

/// Returns `false` once the estimator queue is closed.
async fn forward(tx: &mpsc::Sender<Measurement>, event: Event) -> bool {
    match event.payload {
        EventPayload::Measurement(measurement) => tx.send(measurement).await.is_ok(),
        other => {
            warn!(source = %event.source, payload = ?other, "ignoring non-measurement on inbound lane");
            true
        }
    }
}

/// Encode every event of one output topic and hand it to the writer.
async fn print_topic(mut rx: TopicReceiver, out: mpsc::Sender<String>) {
    loop {
        match rx.recv().await {
            Ok(event) => {
                if let Some(line) = encode_line(&event) {
                    if out.send(line).await.is_err() {
                        break;
                    }
                }
            }
            Err(RecvError::Lagged(n)) => {
                warn!(topic = rx.topic().as_str(), lagged_by = n, "output lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

/// Sole owner of the output stream; writes each line whole.
async fn write_lines<W: AsyncWrite + Unpin>(mut out: W, mut lines: mpsc::Receiver<String>) -> W {
    while let Some(line) = lines.recv().await {
        if let Err(e) = out.write_all(line.as_bytes()).await {
            warn!(error = %e, "output write failed");
            break;
        }
        let _ = out.flush().await;
    }
    out
}

fn encode_line(event: &Event) -> Option<String> {
    match serde_json::to_string(event) {
        Ok(mut json) => {
            json.push('\n');
            Some(json)
        }
        Err(e) => {
            warn!(error = %e, "could not encode event");
            None
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use aerostate_types::{Header, Odometry, Pose, PoseStamped, Twist, TwistStamped};
    use chrono::Utc;

    fn args(list: &[&str]) -> Result<Args, String> {
        parse_args(list.iter().map(|s| s.to_string()))
    }

    #[test]
    fn no_arguments_runs_with_default_path() {
        let parsed = args(&[]).unwrap();
        assert_eq!(parsed.command, Command::Run);
        assert!(parsed.config.is_none());
    }

    #[test]
    fn init_with_explicit_config() {
        let parsed = args(&["init", "--config", "/tmp/a.toml"]).unwrap();
        assert_eq!(parsed.command, Command::Init);
        assert_eq!(parsed.config, Some(PathBuf::from("/tmp/a.toml")));
    }

    #[test]
    fn missing_config_value_is_an_error() {
        assert!(args(&["--config"]).is_err());
        assert!(args(&["--verbose"]).is_err());
    }

    #[test]
    fn init_writes_loadable_default() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("nested").join("config.toml");
        init(&path).unwrap();
        let loaded = config::load_from(&path).unwrap().unwrap();
        assert_eq!(loaded, config::Config::default());
    }

    #[test]
    fn measurement_lines_parse() {
        let line = r#"{"kind":"ground_truth_pose","data":{"header":{"stamp":"2024-01-01T00:00:00Z","frame_id":"drone0/map"},"pose":{"position":[5.0,0.0,0.0],"orientation":[0.0,0.0,0.0,1.0]}}}"#;
        let m: Measurement = serde_json::from_str(line).unwrap();
        match m {
            Measurement::GroundTruthPose(p) => assert_eq!(p.pose.position.x, 5.0),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn encoded_events_are_single_lines() {
        let event = Event::new(
            SOURCE,
            EventPayload::PoseEstimate(PoseStamped {
                header: Header::new(Utc::now(), "earth"),
                pose: Pose::default(),
            }),
        );
        let line = encode_line(&event).unwrap();
        assert!(line.ends_with('\n'));
        assert_eq!(line.matches('\n').count(), 1);
        assert!(line.contains("pose_estimate"));
    }

    fn odom_sample(x: f64) -> Measurement {
        let mut pose = Pose::default();
        pose.position.x = x;
        Measurement::Odometry(Odometry {
            header: Header::new(Utc::now(), "drone0/odom"),
            child_frame_id: "drone0/base_link".to_string(),
            pose,
            twist: Twist::default(),
        })
    }

    fn twist_sample() -> Measurement {
        Measurement::GroundTruthTwist(TwistStamped {
            header: Header::new(Utc::now(), "drone0/earth"),
            twist: Twist::default(),
        })
    }

    #[tokio::test]
    async fn inbound_topics_reach_the_estimator_queue() {
        let bus = EventBus::new(16);
        let lanes = Topic::INPUTS.map(|topic| bus.subscribe_to(topic));
        let (tx, mut rx) = mpsc::channel(16);
        let (done_tx, done_rx) = oneshot::channel();
        let forwarder = tokio::spawn(forward_inbound(lanes, tx, done_rx));

        bus.publish(Event::new(INPUT_SOURCE, EventPayload::Measurement(odom_sample(1.0))))
            .unwrap();
        bus.publish(Event::new(INPUT_SOURCE, EventPayload::Measurement(twist_sample())))
            .unwrap();
        bus.publish(Event::new(INPUT_SOURCE, EventPayload::Measurement(odom_sample(2.0))))
            .unwrap();
        done_tx.send(()).unwrap();
        forwarder.await.unwrap();

        let mut odom_x = Vec::new();
        let mut twists = 0;
        while let Some(m) = rx.recv().await {
            match m {
                Measurement::Odometry(o) => odom_x.push(o.pose.position.x),
                Measurement::GroundTruthTwist(_) => twists += 1,
                other => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!(odom_x, vec![1.0, 2.0]);
        assert_eq!(twists, 1);
    }

    #[tokio::test]
    async fn forwarder_stops_when_estimator_queue_closes() {
        let bus = EventBus::new(16);
        let lanes = Topic::INPUTS.map(|topic| bus.subscribe_to(topic));
        let (tx, rx) = mpsc::channel(1);
        let (_done_tx, done_rx) = oneshot::channel::<()>();
        drop(rx);
        let forwarder = tokio::spawn(forward_inbound(lanes, tx, done_rx));

        bus.publish(Event::new(INPUT_SOURCE, EventPayload::Measurement(odom_sample(1.0))))
            .unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(1), forwarder)
            .await
            .expect("forwarder exits")
            .unwrap();
    }

    #[tokio::test]
    async fn concurrent_printers_never_split_lines() {
        let (line_tx, line_rx) = mpsc::channel(4);
        let writer = tokio::spawn(write_lines(Vec::<u8>::new(), line_rx));

        let producers: Vec<_> = ["tf", "pose"]
            .into_iter()
            .map(|tag| {
                let tx = line_tx.clone();
                tokio::spawn(async move {
                    for i in 0..200 {
                        let line = format!("{{\"{tag}\":{i},\"pad\":\"{}\"}}\n", "x".repeat(64));
                        tx.send(line).await.unwrap();
                    }
                })
            })
            .collect();
        drop(line_tx);
        for producer in producers {
            producer.await.unwrap();
        }

        let out = String::from_utf8(writer.await.unwrap()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 400);
        for line in lines {
            let value: serde_json::Value = serde_json::from_str(line).unwrap();
            assert!(value.get("tf").is_some() || value.get("pose").is_some());
        }
    }
}
