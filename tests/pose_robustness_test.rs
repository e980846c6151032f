//! Noisy and degenerate geometry must never break pose extraction or the session


use hand_gesture_mouse::{
    config::Config,
    filters::create_filter,
    geometry::{Point2D, Resolution},
    hand_pose::{HandPoseExtractor, ThumbSelection},
    session::{CalibrationRequest, GestureSession},
    vision::{ConvexityDefect, FrameGeometry},
    Error,
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::time::{Duration, Instant};
use test_helpers::hand_geometry;

fn random_geometry(rng: &mut StdRng) -> FrameGeometry {
    let len = rng.gen_range(0..12);
    let contour: Vec<Point2D> = (0..len)
        .map(|_| Point2D::new(rng.gen_range(0.0..640.0), rng.gen_range(0.0..480.0)))
        .collect();
    // Indices may run past the contour on purpose
    let hull = (0..rng.gen_range(0..8)).map(|_| rng.gen_range(0..len + 3)).collect();
    let defects = (0..rng.gen_range(0..4))
        .map(|_| ConvexityDefect {
            start: rng.gen_range(0..len + 3),
            end: rng.gen_range(0..len + 3),
            far: rng.gen_range(0..len + 3),
            depth: rng.gen_range(0..100 * 256),
        })
        .collect();
    FrameGeometry { contour, hull, defects }
}

#[test]
fn test_random_geometry_never_panics() {
    let mut rng = StdRng::seed_from_u64(7);
    for selection in [ThumbSelection::LastWins, ThumbSelection::MaxDepth] {
        let extractor = HandPoseExtractor::new(10.0, selection);
        for _ in 0..2000 {
            match extractor.extract(&random_geometry(&mut rng)) {
                Ok(pose) => {
                    assert!(pose.index_tip.x.is_finite());
                    assert_eq!(pose.thumb_extended, pose.thumb_tip.is_some());
                }
                Err(Error::PoseUnavailable(_)) => {}
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
    }
}

#[test]
fn test_collinear_contour_is_unavailable() {
    let geometry = FrameGeometry {
        contour: (0..5).map(|i| Point2D::new(f64::from(i) * 10.0, 50.0)).collect(),
        hull: vec![0, 2, 4],
        defects: Vec::new(),
    };
    let extractor = HandPoseExtractor::new(10.0, ThumbSelection::LastWins);
    assert!(matches!(extractor.extract(&geometry), Err(Error::PoseUnavailable(_))));
}

#[test]
fn test_session_survives_noisy_stream() {
    let mut rng = StdRng::seed_from_u64(11);
    let t0 = Instant::now();
    let mut session = GestureSession::new(&Config::default(), t0).unwrap();
    let request = CalibrationRequest {
        camera: Resolution::new(640, 480),
        screen: Resolution::new(1920, 1080),
    };
    session.process_frame(Some(&hand_geometry(Point2D::new(320.0, 200.0), true)), Some(request), t0);

    for frame in 1..=1000u64 {
        let now = t0 + Duration::from_millis(frame * 33);
        let geometry = match rng.gen_range(0..4) {
            0 => None,
            1 => Some(random_geometry(&mut rng)),
            _ => Some(hand_geometry(
                Point2D::new(rng.gen_range(200.0..440.0), rng.gen_range(100.0..300.0)),
                rng.gen_bool(0.7),
            )),
        };
        let outcome = session.process_frame(geometry.as_ref(), None, now);
        assert!(outcome.commands.len() <= 3);
    }
    assert_eq!(session.frames(), 1001);
}

#[test]
fn test_smoothing_filter_tracks_steady_tip() {
    let t0 = Instant::now();
    let mut session = GestureSession::from_parts(
        HandPoseExtractor::new(10.0, ThumbSelection::LastWins),
        Default::default(),
        create_filter("moving_average:4").unwrap(),
        t0,
    );
    let mut rng = StdRng::seed_from_u64(3);
    let mut last = None;
    for _ in 0..50 {
        let tip = Point2D::new(300.0 + rng.gen_range(-2.0..2.0), 200.0 + rng.gen_range(-2.0..2.0));
        last = session.process_frame(Some(&hand_geometry(tip, true)), None, t0).pose;
    }
    let tip = last.unwrap().index_tip;
    assert!(tip.distance(&Point2D::new(300.0, 200.0)) < 3.0);
}
