//! Asset registry tests on a paused Tokio clock.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use lineside_core::{
    AssetRegistry, AutomaticSignal, ConstructionError, ControlledSignal, DetectionPolicy,
    DetectionTechnology, Environment, LampStatus, OperationRejected, Points, SignalIdentity,
    SignalType, TrainDetectionSection,
};
use lineside_proto::{
    Aspect, DetectionStatus, MovementAuthorityClass, PointsPosition, RouteExit, StatusReport,
};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tokio::{sync::mpsc, time::Instant};

#[derive(Clone)]
struct TestEnv {
    rng: Arc<Mutex<ChaCha8Rng>>,
}

impl TestEnv {
    fn new(seed: u64) -> Self {
        Self { rng: Arc::new(Mutex::new(ChaCha8Rng::seed_from_u64(seed))) }
    }
}

impl Environment for TestEnv {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        self.rng.lock().expect("rng mutex poisoned").fill_bytes(buffer);
    }
}

fn registry() -> (AssetRegistry<TestEnv>, mpsc::UnboundedReceiver<StatusReport>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let mut registry = AssetRegistry::new(TestEnv::new(7), tx);

    registry.add_points(Points::new("940", DetectionPolicy::Both).unwrap()).unwrap();
    registry.add_points(Points::new("941", DetectionPolicy::ReverseOnly).unwrap()).unwrap();
    registry
        .add_controlled_signal(
            ControlledSignal::new(
                SignalIdentity::new("CE", "110").unwrap(),
                SignalType::ColourLight4,
            )
            .unwrap(),
        )
        .unwrap();
    registry
        .add_automatic_signal(
            AutomaticSignal::new(
                SignalIdentity::new("CE", "112").unwrap(),
                SignalType::ColourLight3,
                None,
            )
            .unwrap(),
        )
        .unwrap();
    registry
        .add_section(TrainDetectionSection::new("T100", DetectionTechnology::TrackCircuit).unwrap())
        .unwrap();
    registry
        .add_section(TrainDetectionSection::new("A200", DetectionTechnology::AxleCounter).unwrap())
        .unwrap();

    (registry, rx)
}

fn drain(rx: &mut mpsc::UnboundedReceiver<StatusReport>) -> Vec<String> {
    let mut bodies = Vec::new();
    while let Ok(report) = rx.try_recv() {
        bodies.push(report.to_body());
    }
    bodies
}

#[tokio::test(start_paused = true)]
async fn points_move_end_to_end() {
    let (registry, mut rx) = registry();

    registry.move_points("940", PointsPosition::Reverse).await.unwrap();
    let points = registry.points("940").await.unwrap();
    assert_eq!(points.position(), PointsPosition::Unknown);
    assert!(!points.detected());
    assert_eq!(drain(&mut rx), ["POINTS.940.NORMAL.true", "POINTS.940.UNKNOWN.false"]);

    tokio::time::sleep(Duration::from_secs(4)).await;
    assert!(registry.points("940").await.unwrap().moving());

    tokio::time::sleep(Duration::from_secs(2)).await;
    let points = registry.points("940").await.unwrap();
    assert_eq!(points.position(), PointsPosition::Reverse);
    assert!(points.detected());
    assert_eq!(drain(&mut rx), ["POINTS.940.REVERSE.true"]);
}

#[tokio::test(start_paused = true)]
async fn move_while_moving_is_rejected() {
    let (registry, mut rx) = registry();

    registry.move_points("940", PointsPosition::Reverse).await.unwrap();
    assert_eq!(
        registry.move_points("940", PointsPosition::Normal).await,
        Err(OperationRejected::PointsMoving)
    );
    assert_eq!(drain(&mut rx).len(), 2);

    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(registry.points("940").await.unwrap().position(), PointsPosition::Reverse);
}

#[tokio::test(start_paused = true)]
async fn configured_interval_governs_traversal() {
    let (registry, _rx) = registry();
    registry.set_operation_interval("941", Duration::from_secs(20)).await.unwrap();

    registry.move_points("941", PointsPosition::Reverse).await.unwrap();
    tokio::time::sleep(Duration::from_secs(19)).await;
    assert!(registry.points("941").await.unwrap().moving());
    tokio::time::sleep(Duration::from_secs(2)).await;

    let points = registry.points("941").await.unwrap();
    assert_eq!(points.position(), PointsPosition::Reverse);
    assert!(points.detected());
}

#[tokio::test(start_paused = true)]
async fn completed_move_detection_follows_policy() {
    let (registry, _rx) = registry();

    registry.move_points("941", PointsPosition::Reverse).await.unwrap();
    tokio::time::sleep(Duration::from_secs(6)).await;
    registry.move_points("941", PointsPosition::Normal).await.unwrap();
    tokio::time::sleep(Duration::from_secs(6)).await;

    let points = registry.points("941").await.unwrap();
    assert_eq!(points.position(), PointsPosition::Normal);
    assert!(!points.detected());
}

#[tokio::test]
async fn unknown_assets_are_rejected() {
    let (registry, _rx) = registry();
    assert!(matches!(
        registry.move_points("999", PointsPosition::Normal).await,
        Err(OperationRejected::UnknownAsset { kind: "points", .. })
    ));
    assert!(matches!(
        registry.set_automatic_display("CE", "110", true).await,
        Err(OperationRejected::UnknownAsset { .. })
    ));
    assert!(matches!(
        registry
            .request_controlled_signal("X", "1", None, MovementAuthorityClass::SignalOn, None)
            .await,
        Err(OperationRejected::UnknownAsset { .. })
    ));
}

#[tokio::test]
async fn signal_requests_report_aspect_changes() {
    let (registry, mut rx) = registry();
    let exit = Some(RouteExit { prefix: "CE".into(), id: "114".into() });

    registry
        .request_controlled_signal("ce", "110", exit, MovementAuthorityClass::Main, None)
        .await
        .unwrap();
    registry.set_lamp_status_for("CE", "110", Aspect::Green, LampStatus::Blown).await.unwrap();
    registry.set_automatic_display("CE", "112", false).await.unwrap();
    registry.set_lamp_status("CE", "112", 2, LampStatus::Blown).await.unwrap();

    assert_eq!(
        drain(&mut rx),
        [
            "CONTROLLED_SIGNAL.CE.110.GREEN",
            "CONTROLLED_SIGNAL.CE.110.BLACK",
            "AUTOMATIC_SIGNAL.CE.112.GREEN",
            "AUTOMATIC_SIGNAL.CE.112.BLACK",
        ]
    );

    // Same aspect again: nothing to report.
    registry
        .request_controlled_signal("CE", "110", None, MovementAuthorityClass::SignalOn, None)
        .await
        .unwrap();
    registry
        .request_controlled_signal("CE", "110", None, MovementAuthorityClass::SignalOn, None)
        .await
        .unwrap();
    assert_eq!(drain(&mut rx), ["CONTROLLED_SIGNAL.CE.110.RED"]);
}

#[tokio::test]
async fn train_detection_operations() {
    let (registry, mut rx) = registry();

    registry.train_occupies("T100").await.unwrap();
    assert!(matches!(
        registry.tec_shunt("T100", true).await,
        Err(OperationRejected::Blocked { .. })
    ));
    registry.train_clears("T100").await.unwrap();
    registry.tec_shunt("T100", true).await.unwrap();
    assert_eq!(registry.set_intermittent("A200").await, Err(OperationRejected::NotTrackCircuit));

    assert_eq!(
        drain(&mut rx),
        ["TRAIN_DETECTION.T100.OCCUPIED", "TRAIN_DETECTION.T100.CLEAR", "TRAIN_DETECTION.T100.OCCUPIED"]
    );
}

#[tokio::test(start_paused = true)]
async fn intermittent_failure_flickers_until_restored() {
    let (registry, mut rx) = registry();

    registry.set_intermittent("T100").await.unwrap();
    tokio::time::sleep(Duration::from_secs(120)).await;
    let flickers = drain(&mut rx);
    assert!(!flickers.is_empty());
    for body in &flickers {
        assert!(body.starts_with("TRAIN_DETECTION.T100."), "{body}");
    }

    registry.restore_intermittent("T100").await.unwrap();
    let _ = drain(&mut rx);
    assert_eq!(registry.section("T100").await.unwrap().status(), DetectionStatus::Clear);

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test(start_paused = true)]
async fn intermittent_failure_never_clears_a_train() {
    let (registry, _rx) = registry();

    registry.set_intermittent("T100").await.unwrap();
    tokio::time::sleep(Duration::from_secs(15)).await;
    registry.train_occupies("T100").await.unwrap();

    for _ in 0..30 {
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(registry.section("T100").await.unwrap().status(), DetectionStatus::Occupied);
    }
}

#[tokio::test]
async fn snapshot_covers_every_asset() {
    let (registry, _rx) = registry();
    let bodies: Vec<String> = registry.snapshot().await.iter().map(StatusReport::to_body).collect();
    assert_eq!(
        bodies,
        [
            "POINTS.940.NORMAL.true",
            "POINTS.941.NORMAL.false",
            "CONTROLLED_SIGNAL.CE.110.RED",
            "AUTOMATIC_SIGNAL.CE.112.RED",
            "TRAIN_DETECTION.A200.CLEAR",
            "TRAIN_DETECTION.T100.CLEAR",
        ]
    );
    assert_eq!(registry.inventory().await.len(), registry.len());
}

#[test]
fn duplicates_are_refused() {
    let (tx, _rx) = mpsc::unbounded_channel();
    let mut registry = AssetRegistry::new(TestEnv::new(1), tx);
    registry.add_points(Points::new("101", DetectionPolicy::Both).unwrap()).unwrap();
    assert_eq!(
        registry.add_points(Points::new("101", DetectionPolicy::None).unwrap()),
        Err(ConstructionError::Duplicate("101".into()))
    );

    let identity = SignalIdentity::new("AB", "12").unwrap();
    registry
        .add_controlled_signal(ControlledSignal::new(identity.clone(), SignalType::ColourLight3).unwrap())
        .unwrap();
    assert_eq!(
        registry.add_automatic_signal(
            AutomaticSignal::new(identity, SignalType::ColourLight2, None).unwrap()
        ),
        Err(ConstructionError::Duplicate("AB12".into()))
    );
}
