use kalmanviz_app::{
    EngineKind, EngineSpec, HeadlessOptions, build_engine, create_command_bus,
    drain_pending_commands, make_command_submit, run_headless,
};
use kalmanviz_core::{
    ControlCommand, DriverConfig, Engine, ErrorModelShape, NullSurface, TickScheduler,
};
use kalmanviz_render::{CanvasPainter, PixelCanvas};
use kalmanviz_sim::KinematicUniverse;

fn kinematic_spec() -> EngineSpec {
    EngineSpec {
        kind: EngineKind::Kinematic,
        width: 30.0,
        height: 30.0,
        seed: Some(3),
        error_shape: ErrorModelShape::Channels,
    }
}

#[test]
fn full_queue_drops_newest_command() {
    let (sender, receiver) = create_command_bus(1);
    let submit = make_command_submit(sender);
    assert!(submit(ControlCommand::SetGoal { x: 2.0, y: 4.0 }));
    assert!(!submit(ControlCommand::SetGoal { x: 9.0, y: 9.0 }));

    let config = DriverConfig::default();
    let universe = KinematicUniverse::new(30.0, 30.0).expect("universe");
    let caps = universe.capabilities();
    let dims = universe.dimensions();
    let painter = CanvasPainter::for_engine(
        PixelCanvas::new(41, 41).expect("canvas"),
        caps,
        dims,
        &config,
    )
    .expect("painter");
    let mut scheduler =
        TickScheduler::new(universe, painter, NullSurface, config).expect("scheduler");

    assert_eq!(drain_pending_commands(&receiver, &mut scheduler), (1, 0));
    assert_eq!(drain_pending_commands(&receiver, &mut scheduler), (0, 0));
    assert_eq!(scheduler.engine().goal().map(|g| (g.x, g.y)), Some((2.0, 4.0)));
}

#[test]
fn queued_commands_apply_between_headless_cycles() {
    let (sender, receiver) = create_command_bus(8);
    let submit = make_command_submit(sender);
    assert!(submit(ControlCommand::SetGoal { x: 4.0, y: 6.0 }));
    assert!(submit(ControlCommand::SetRotation { theta: 0.5 }));

    let engine = build_engine(kinematic_spec()).expect("engine");
    let options = HeadlessOptions {
        frames: 3,
        ..HeadlessOptions::default()
    };
    let report =
        run_headless(engine, DriverConfig::default(), &options, Some(&receiver)).expect("run");
    assert_eq!(report.summary.frame_count, 3);
    assert_eq!((report.commits_applied, report.commits_rejected), (2, 0));
    assert_eq!(report.initial.step, 0);
    assert_eq!(report.frames.last().map(|f| f.step), Some(3));
}

#[test]
fn grid_engine_rejects_goal_commands() {
    let (sender, receiver) = create_command_bus(4);
    let submit = make_command_submit(sender);
    assert!(submit(ControlCommand::SetGoal { x: 1.0, y: 1.0 }));

    let engine = build_engine(EngineSpec {
        kind: EngineKind::Grid,
        width: 5.0,
        height: 5.0,
        ..kinematic_spec()
    })
    .expect("engine");
    let options = HeadlessOptions {
        frames: 2,
        ..HeadlessOptions::default()
    };
    let report =
        run_headless(engine, DriverConfig::default(), &options, Some(&receiver)).expect("run");
    assert_eq!((report.commits_applied, report.commits_rejected), (0, 1));
    assert!(report.telemetry.actual.is_empty());
    assert_eq!(report.summary.rendered, 2);
}
