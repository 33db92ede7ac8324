use geoscene::algorithms::triangulation::{TriangulationObservation, TriangulationSession};
use geoscene::api::{HostEvent, StaticPose};
use geoscene::core::{BoundingBox, Coordinate};
use geoscene::placement::{AnchorPlacementEngine, LocationMarker, PassOutcome};
use geoscene::processing::{intersect_visible_places, CellType, GeoRaster, PoiFeed, Raster, ViewshedGrid};
use geoscene::renderer::{MockRenderer, ScalingMode, ScalingParams};
use geoscene::utils::SceneConfig;
use std::error::Error;

/// Grid resolution of the synthetic viewshed
const VIEWSHED_CELLS: usize = 64;

fn print_outcome(outcome: &PassOutcome) {
    match outcome {
        PassOutcome::Completed(report) => {
            for placement in &report.placements {
                let geometry = &placement.geometry;
                println!(
                    "  {}: distance {:.1} m, bearing {:.1}, relative {:.1}, offset ({:.2}, {:.2}, {:.2}), height {:.2}",
                    placement.marker,
                    geometry.true_distance_m,
                    geometry.bearing_deg,
                    geometry.relative_bearing_deg,
                    geometry.offset.x,
                    geometry.offset.y,
                    geometry.offset.z,
                    geometry.rendered_height
                );
            }
            for skipped in &report.skipped {
                println!("  {}: skipped ({:?})", skipped.marker, skipped.reason);
            }
            for failure in &report.failures {
                println!("  {}: failed ({})", failure.marker, failure.error);
            }
        }
        other => println!("  {:?}", other),
    }
}

fn placement_demo(config: &SceneConfig) {
    println!("=== Anchor placement ===");
    let device = Coordinate::new(31.7767, 35.2345);
    let mut engine = AnchorPlacementEngine::new(
        MockRenderer::new().with_camera_height(1.6),
        StaticPose::new(device, 20.0),
        &config.placement,
    );

    engine.add_marker(LocationMarker::new(31.7776, 35.2345).with_height(30.0).with_name("Tower"));
    engine.add_marker(
        LocationMarker::new(31.7900, 35.2500)
            .with_height(120.0)
            .with_scaling(ScalingParams::default().with_mode(ScalingMode::GradualToMaxRenderDistance))
            .with_name("Ridge"),
    );
    engine.add_marker(
        LocationMarker::new(31.7700, 35.2200)
            .only_render_within(500.0)
            .with_name("Gate"),
    );
    engine.start();

    println!("Device at {} heading 20.0", device);
    print_outcome(&engine.process_frame());

    println!("After turning east:");
    engine.pose_mut().set_heading(90.0);
    engine.request_refresh();
    print_outcome(&engine.process_frame());

    let state = engine.refresh_state();
    println!(
        "Refresh interval {:?}, calibration {}, anchors live {}",
        state.interval,
        state.calibration_iteration,
        engine.renderer().anchor_count()
    );
}

fn triangulation_demo(config: &SceneConfig) -> Result<(), Box<dyn Error>> {
    println!("=== Triangulation ===");
    let mut session = TriangulationSession::new(config);
    session.events_mut().register(Box::new(|event: &HostEvent| match event.to_json() {
        Ok(json) => println!("  event: {}", json),
        Err(err) => eprintln!("  event {} not serializable: {}", event.name(), err),
    }));

    session.set_observations(vec![
        TriangulationObservation::new(31.7600, 35.2000, 60.0),
        TriangulationObservation::new(31.8000, 35.2600, 200.0),
    ]);

    let observer = Coordinate::new(31.7767, 35.2345);
    for azimuth in [10.0, 10.004, 135.0] {
        match session.update_azimuth(observer, azimuth) {
            Some(update) => {
                println!(
                    "Azimuth {:.3}: {} intersections, map rotation {}, viewport {}",
                    update.azimuth,
                    update.intersections.len(),
                    update.map_rotation,
                    update.viewport
                );
                for point in &update.intersections {
                    println!(
                        "  observation {} meets at {} ({:.0} m away)",
                        point.observation, point.coordinate, point.distance_m
                    );
                }
            }
            None => println!("Azimuth {:.3}: change too small, ignored", azimuth),
        }
    }
    session.single_tap(31.78, 35.24);
    Ok(())
}

fn viewshed_demo(feed_path: &str) -> Result<(), Box<dyn Error>> {
    println!("=== Viewshed filter ===");
    let feed = PoiFeed::from_json(&std::fs::read_to_string(feed_path)?)?;
    let locations: Vec<Coordinate> = feed.places.iter().map(|place| place.location()).collect();
    let bounds = BoundingBox::enclosing(&locations).ok_or("places feed is empty")?;
    let center = bounds.center();
    let bounds = BoundingBox::new(
        bounds.north + 0.001,
        bounds.south - 0.001,
        bounds.east + 0.001,
        bounds.west - 0.001,
    );

    // Synthetic viewshed: everything within the inner half of the area is visible
    let raster = GeoRaster::new(bounds, VIEWSHED_CELLS, VIEWSHED_CELLS)?;
    let radius = center.distance_to(&Coordinate::new(bounds.north, center.lon)) / 2.0;
    let mut grid = ViewshedGrid::filled(raster.rows(), raster.cols(), CellType::Obstructed);
    for row in 0..raster.rows() {
        for col in 0..raster.cols() {
            if let Some(cell) = raster.cell_center(row, col) {
                if cell.distance_to(&center) <= radius {
                    grid.set(row, col, CellType::Viewshed)?;
                }
            }
        }
    }

    let visible = intersect_visible_places(&raster, &grid, &feed.places);
    println!("{} of {} places visible:", visible.len(), feed.len());
    for place in visible {
        println!("  {} at {}", place.name.as_deref().unwrap_or("(unnamed)"), place.coordinate);
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    pretty_env_logger::init();

    let mut args: Vec<String> = std::env::args().collect();
    let program = args.first().cloned().unwrap_or_else(|| "geoscene".to_string());

    let config = match args.iter().position(|arg| arg == "--config") {
        Some(index) => {
            let path = args.get(index + 1).ok_or("--config needs a file")?.clone();
            args.drain(index..=index + 1);
            SceneConfig::from_file(&path)?
        }
        None => SceneConfig::default(),
    };

    match args.get(1).map(String::as_str) {
        Some("--placement-demo") => placement_demo(&config),
        Some("--triangulation-demo") => triangulation_demo(&config)?,
        Some("--viewshed") => {
            let feed = args.get(2).ok_or("--viewshed needs a places feed")?;
            viewshed_demo(feed)?;
        }
        _ => {
            eprintln!("Usage: {} [--config <file>] --placement-demo", program);
            eprintln!("   or: {} [--config <file>] --triangulation-demo", program);
            eprintln!("   or: {} [--config <file>] --viewshed <places.json>", program);
            return Err("Invalid arguments".into());
        }
    }
    Ok(())
}
