//! Encounter integration tests.
//!
//! End-to-end runs through the public API: bands on a geometry with known
//! boundaries, M-of-N filtering of a closing encounter, polygon detection
//! and detectors built from parameter text.

use std::f64::consts::PI;

use daa_core::alerting::{AlertLevels, AlertingMofN};
use daa_core::bands::{BandsRegion, KinematicBandsParameters, KinematicMultiBands};
use daa_core::detection::{CDCylinder, Detection3D, DetectorRegistry};
use daa_core::params::ParameterData;
use daa_core::polygon::{CDPolyIter, DetectionPolygon, MovingPolygon3D, Poly2D, Poly3D, Polycarp3D};
use daa_core::traffic::TrafficState;
use daa_core::units::{DEG, FT, KN, NMI};
use daa_core::vect::{vect2, vect3, Vect3Ext};

/// Ownship northbound at 100 m/s toward a stationary intruder 10 km north,
/// protected by a 2 km cylinder.
fn stationary_intruder() -> KinematicMultiBands {
    let det = CDCylinder::with_dimensions(2000.0, 1000.0 * FT);
    let mut bands = KinematicMultiBands::new(
        KinematicBandsParameters::instantaneous(),
        AlertLevels::single(&det, 180.0, 180.0),
    );
    bands.set_ownship(TrafficState::from_trk_gs_vs(
        "own",
        vect3(0.0, 0.0, 5000.0 * FT),
        0.0,
        100.0,
        0.0,
    ));
    bands.add_traffic(TrafficState::new(
        "ac1",
        vect3(0.0, 10000.0, 5000.0 * FT),
        vect3(0.0, 0.0, 0.0),
    ));
    bands
}

#[test]
fn test_track_bands_tile_and_match_tangents() {
    let bands = stationary_intruder();
    let trk = bands.track();
    let ranges = trk.ranges();
    assert_eq!(ranges[0].interval.low, 0.0);
    assert_eq!(ranges[ranges.len() - 1].interval.up, 2.0 * PI);
    for w in ranges.windows(2) {
        assert!((w[0].interval.up - w[1].interval.low).abs() < 1e-9);
    }

    // Tracks within asin(D / R) of north hit the cylinder.
    let half = (2000.0f64 / 10000.0).asin();
    assert_eq!(trk.region_of(5.0 * DEG), BandsRegion::Near);
    assert_eq!(trk.region_of(2.0 * PI - 5.0 * DEG), BandsRegion::Near);
    assert_eq!(trk.region_of(PI), BandsRegion::None);

    let right = trk.range_of(5.0 * DEG).map(|i| trk.interval(i)).unwrap();
    assert!((right.up - half).abs() <= 1.0 * DEG + 1e-9);
    let left = trk.range_of(2.0 * PI - 5.0 * DEG).map(|i| trk.interval(i)).unwrap();
    assert!((left.low - (2.0 * PI - half)).abs() <= 1.0 * DEG + 1e-9);
}

#[test]
fn test_track_resolutions_leave_the_conflict_band() {
    let bands = stationary_intruder();
    let trk = bands.track();
    let right = trk.resolution(true);
    let left = trk.resolution(false);
    assert!(right.is_finite() && left.is_finite());
    assert_eq!(trk.region_of(right), BandsRegion::None);
    assert_eq!(trk.region_of(left), BandsRegion::None);
    assert!(right < PI && left > PI);
}

#[test]
fn test_mofn_smooths_closing_encounter() {
    let mut bands =
        KinematicMultiBands::new(KinematicBandsParameters::default(), AlertLevels::do_365());
    bands.set_ownship(TrafficState::from_trk_gs_vs(
        "own",
        vect3(0.0, 0.0, 5000.0 * FT),
        0.0,
        200.0 * KN,
        0.0,
    ));
    bands.add_traffic(TrafficState::from_trk_gs_vs(
        "ac1",
        vect3(0.0, 8.0 * NMI, 5000.0 * FT),
        PI,
        200.0 * KN,
        0.0,
    ));

    let mut filter = AlertingMofN::new(2, 3).unwrap();
    let mut raw = Vec::new();
    let mut filtered = Vec::new();
    for _ in 0..60 {
        let level = bands.alerting("ac1");
        raw.push(level);
        filtered.push(filter.push(level));
        bands.linear_projection(1.0);
    }

    assert!(raw.contains(&3));
    assert_eq!(filtered[0], 0);
    // While raw levels only rise, two of the last three samples agree on
    // the previous one.
    for i in 1..raw.len() {
        if raw[..=i].windows(2).all(|w| w[0] <= w[1]) {
            assert_eq!(filtered[i], raw[i - 1]);
        }
    }
}

#[test]
fn test_moving_polygon_conflict_midpoint_is_inside() {
    let square = Poly2D::new(vec![
        vect2(2500.0, -500.0),
        vect2(3500.0, -500.0),
        vect2(3500.0, 500.0),
        vect2(2500.0, 500.0),
    ]);
    let mp =
        MovingPolygon3D::translating(&Poly3D::new(square, 0.0, 1000.0), &vect3(-50.0, 0.0, 0.0));
    let so = vect3(0.0, 0.0, 500.0);
    let vo = vect3(50.0, 0.0, 0.0);

    let exact = Polycarp3D::default().conflict_detection(&so, &vo, &mp, 0.0, 100.0);
    assert_eq!(exact.len(), 1);
    assert!((exact[0].time_in - 25.0).abs() < 1e-6);
    assert!((exact[0].time_out - 35.0).abs() < 1e-6);
    let mid = (exact[0].time_in + exact[0].time_out) / 2.0;
    assert!(mp.position(mid).contains(&so.linear(&vo, mid)));
    assert!(Polycarp3D::default().violation(&so.linear(&vo, mid), &vo, &mp.position(mid)));

    let iter = CDPolyIter::default().conflict_detection(&so, &vo, &mp, 0.0, 100.0);
    assert_eq!(iter.len(), 1);
    assert!((iter[0].time_in - 25.0).abs() < 1e-2);
    assert!((iter[0].time_out - 35.0).abs() < 1e-2);
}

#[test]
fn test_detector_from_parameter_text() {
    let text = "alert_1_detector = CDCylinder\n\
                alert_1_detector_D = 2 [nmi]\n\
                alert_1_detector_H = 800 [ft]\n";
    let p = ParameterData::parse_text(text);
    let det = DetectorRegistry::with_defaults().make_from(&p, "alert_1_detector").unwrap();
    assert_eq!(det.canonical_class(), "CDCylinder");

    let reference = CDCylinder::with_dimensions(2.0 * NMI, 800.0 * FT);
    assert!(det.contains(&reference));
    assert!(reference.contains(det.as_ref()));
    assert!((det.parameters().value("D").unwrap() - 2.0 * NMI).abs() < 1e-9);
    assert_eq!(det.parameters().unit("H"), Some("ft"));
}
