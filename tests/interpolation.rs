use bldpop::{
    config::{MatchConfig, MatchMode, PointAssignment},
    interpolate::Interpolator,
    matcher::{nearest, SpatialMatcher},
    Building, Crs, GeometryAdapter, PipelineError, PopulationPoint, PopulationSource, Zone,
};
use geo::{polygon, MultiPolygon, Point};

// UTM zone 40 north, around 57E 57.7N.
const X0: f64 = 500_000.0;
const Y0: f64 = 6_400_000.0;

fn square(x0: f64, y0: f64, side: f64) -> MultiPolygon<f64> {
    MultiPolygon(vec![polygon![
        (x: x0, y: y0), (x: x0 + side, y: y0), (x: x0 + side, y: y0 + side), (x: x0, y: y0 + side),
    ]])
}

fn adapter() -> GeometryAdapter {
    GeometryAdapter::new(Crs::Utm { zone: 40, south: false }).unwrap()
}

const POPULATIONS: [f64; 5] = [5000.0, 7500.0, 10000.0, 3000.0, 6000.0];

/// Five adjacent 1 km zones, each holding a 20 x 10 grid of 10 m buildings.
fn five_zones() -> (PopulationSource, Vec<Building>) {
    let mut zones = Vec::new();
    let mut buildings = Vec::new();
    for (k, &population) in POPULATIONS.iter().enumerate() {
        let zx = X0 + 1000.0 * k as f64;
        zones.push(Zone::new(format!("zone{}", k + 1), population, square(zx, Y0, 1000.0)).unwrap());
        for row in 0..10 {
            for col in 0..20 {
                let id = format!("z{}_{row}_{col}", k + 1);
                buildings.push(Building::new(id, square(zx + 20.0 + 40.0 * col as f64, Y0 + 20.0 + 40.0 * row as f64, 10.0)));
            }
        }
    }
    (PopulationSource::Zones(zones), buildings)
}

#[test]
fn five_zone_scenario() {
    let (source, buildings) = five_zones();
    let config = MatchConfig::default();
    let matches = SpatialMatcher::new(config.clone()).run(&source, &buildings).unwrap();
    assert_eq!(matches.len(), 1000);

    let result = Interpolator::new(adapter(), config).run(&source, &buildings, &matches).unwrap();
    for p in result.populations().iter().filter(|p| p.building_id.starts_with("z1_")) {
        assert_eq!(p.population, 25.0, "{}", p.building_id);
    }
    let metrics = result.metrics();
    assert!((metrics.total_assigned_population - 31_500.0).abs() < 1e-6);
    assert_eq!(metrics.total_source_population, 31_500.0);
    assert_eq!(metrics.unmatched_targets, 0);
    assert_eq!(metrics.ambiguous_targets, 0);
}

#[test]
fn unmatched_building_gets_zero_and_is_counted() {
    let (source, mut buildings) = five_zones();
    buildings.push(Building::new("outside", square(X0 + 20_000.0, Y0, 10.0)));

    let config = MatchConfig::default();
    let matches = SpatialMatcher::new(config.clone()).run(&source, &buildings).unwrap();
    assert_eq!(matches.unmatched(&buildings), ["outside"]);

    let result = Interpolator::new(adapter(), config).run(&source, &buildings, &matches).unwrap();
    let outside = result.populations().iter().find(|p| p.building_id == "outside").unwrap();
    assert_eq!(outside.population, 0.0);
    assert!(!outside.matched);
    assert_eq!(result.metrics().unmatched_targets, 1);
    assert!(!result.labels().contains_key("outside"));
}

#[test]
fn zero_area_reference_assigns_zero_without_nan() {
    let source = PopulationSource::Points(vec![
        PopulationPoint::new("p1", 400.0, Point::new(X0 + 20.0, Y0 + 12.0)).unwrap(),
        PopulationPoint::new("p2", 100.0, Point::new(X0 + 215.0, Y0 + 15.0)).unwrap(),
    ]);
    // Collinear ring: a footprint with no area.
    let sliver = MultiPolygon(vec![polygon![(x: X0 + 10.0, y: Y0 + 10.0), (x: X0 + 20.0, y: Y0 + 10.0), (x: X0 + 30.0, y: Y0 + 10.0)]]);
    let buildings = vec![
        Building::new("sliver", sliver),
        Building::new("house", square(X0 + 210.0, Y0 + 10.0, 10.0)),
    ];

    let config = MatchConfig { mode: MatchMode::Proximity, point_assignment: PointAssignment::AreaSplit, ..Default::default() };
    let matches = SpatialMatcher::new(config.clone()).run(&source, &buildings).unwrap();
    assert_eq!(matches.references_of("sliver"), ["p1"]);

    let result = Interpolator::new(adapter(), config).run(&source, &buildings, &matches).unwrap();
    assert!(result.populations().iter().all(|p| p.population.is_finite()));
    assert_eq!(result.populations()[0].population, 0.0);
    assert_eq!(result.labels().get("house"), Some(&100.0));
    assert_eq!(result.metrics().zero_area_references, 1);
}

#[test]
fn escalation_terminates_at_max_radius() {
    let source = PopulationSource::Points(vec![PopulationPoint::new("p", 10.0, Point::new(X0 + 5_000.0, Y0)).unwrap()]);
    let buildings = vec![Building::new("b", square(X0, Y0, 10.0))];
    let config = MatchConfig { mode: MatchMode::Proximity, ..Default::default() };

    let err = SpatialMatcher::new(config).run(&source, &buildings).unwrap_err();
    assert_eq!(
        err.downcast_ref::<PipelineError>(),
        Some(&PipelineError::NoMatchFound { mode: "proximity".into(), last_radius_m: Some(1000.0) }),
    );
}

#[test]
fn escalation_reports_the_successful_radius() {
    let source = PopulationSource::Points(vec![PopulationPoint::new("p", 10.0, Point::new(X0 + 60.0, Y0)).unwrap()]);
    let buildings = vec![Building::new("b", square(X0, Y0, 10.0))];
    let config = MatchConfig { mode: MatchMode::Proximity, ..Default::default() };

    let matches = SpatialMatcher::new(config).run(&source, &buildings).unwrap();
    assert_eq!(matches.radius_m(), Some(100.0));
    assert_eq!(matches.references_of("b"), ["p"]);
}

#[test]
fn matching_is_deterministic() {
    let (source, buildings) = five_zones();
    let points = PopulationSource::Points(
        (0..25).map(|i| PopulationPoint::new(format!("p{i:02}"), 1.0, Point::new(X0 + 200.0 * i as f64, Y0 + 100.0)).unwrap()).collect(),
    );

    let first = nearest(&points, &buildings, 500.0);
    let second = nearest(&points, &buildings, 500.0);
    assert_eq!(first, second);
    assert!(first.windows(2).all(|w| w[0].target_id <= w[1].target_id));

    let config = MatchConfig::default();
    let a = SpatialMatcher::new(config.clone()).run(&source, &buildings).unwrap();
    let b = SpatialMatcher::new(config).run(&source, &buildings).unwrap();
    assert_eq!(a.matches(), b.matches());
}

#[test]
fn ladder_reaches_the_ceiling_from_an_odd_start() {
    let source = PopulationSource::Points(vec![PopulationPoint::new("p", 10.0, Point::new(X0, Y0)).unwrap()]);
    let buildings = vec![Building::new("b", square(X0 + 500.0, Y0, 10.0))];
    let config = MatchConfig { mode: MatchMode::Proximity, radius_m: 30.0, ..Default::default() };

    let matches = SpatialMatcher::new(config).run(&source, &buildings).unwrap();
    assert_eq!(matches.radius_m(), Some(1000.0));
}

#[test]
fn duplicate_ids_never_reach_interpolation() {
    let source = PopulationSource::Zones(vec![Zone::new("z", 100.0, square(X0, Y0, 100.0)).unwrap()]);
    let buildings = vec![
        Building::new("x", square(X0 + 10.0, Y0 + 10.0, 10.0)),
        Building::new("x", square(X0 + 50.0, Y0 + 50.0, 10.0)),
    ];
    let config = MatchConfig::default();
    let err = SpatialMatcher::new(config.clone()).run(&source, &buildings).unwrap_err();
    assert!(matches!(err.downcast_ref::<PipelineError>(), Some(PipelineError::InvalidInput(_))));

    // A match set built over unique ids is still refused for a duplicated building list.
    let unique = vec![Building::new("x", square(X0 + 10.0, Y0 + 10.0, 10.0))];
    let matches = SpatialMatcher::new(config.clone()).run(&source, &unique).unwrap();
    let err = Interpolator::new(adapter(), config).run(&source, &buildings, &matches).unwrap_err();
    assert!(matches!(err.downcast_ref::<PipelineError>(), Some(PipelineError::InvalidInput(_))));
}

#[test]
fn zone_without_buildings_is_not_conserved() {
    let source = PopulationSource::Zones(vec![
        Zone::new("full", 100.0, square(X0, Y0, 100.0)).unwrap(),
        Zone::new("empty", 40.0, square(X0 + 1000.0, Y0, 100.0)).unwrap(),
    ]);
    let buildings = vec![Building::new("b", square(X0 + 10.0, Y0 + 10.0, 10.0))];
    let config = MatchConfig::default();

    let matches = SpatialMatcher::new(config.clone()).run(&source, &buildings).unwrap();
    let metrics = Interpolator::new(adapter(), config).run(&source, &buildings, &matches).unwrap().metrics().clone();
    assert_eq!(metrics.references_without_targets, 1);
    assert_eq!(metrics.population_difference(), -40.0);
    assert!(!metrics.conserves_population);
}
