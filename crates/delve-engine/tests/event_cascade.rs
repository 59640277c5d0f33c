//! Event cascades running against a full runtime.

use delve_engine::prelude::*;

#[derive(Debug, Clone)]
enum Signal {
    Turn,
    Step { actor: EntityId },
    Moved { actor: EntityId, to: Position },
    Fault,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum SignalKind {
    Turn,
    Step,
    Moved,
    Fault,
}

impl Event for Signal {
    type Kind = SignalKind;
    fn kind(&self) -> SignalKind {
        match self {
            Signal::Turn => SignalKind::Turn,
            Signal::Step { .. } => SignalKind::Step,
            Signal::Moved { .. } => SignalKind::Moved,
            Signal::Fault => SignalKind::Fault,
        }
    }
}

type Rt = Runtime<Signal>;

struct Walker;

/// Every event handled, in order, with the dispatch depth it arrived at.
#[derive(Default)]
struct Log(Vec<(String, usize)>);

fn record(rt: &mut Rt, line: String) -> Result<(), EngineError> {
    let depth = rt.event_bus().depth();
    let log = rt
        .world_mut()
        .get_component_mut::<Log>(EntityId::from_raw(1))
        .ok_or(EcsError::UnknownEntity(EntityId::from_raw(1)))?;
    log.0.push((line, depth));
    Ok(())
}

/// Turn -> Step for every walker.
struct Scheduler;

impl System<Rt, Signal> for Scheduler {
    fn process(&self, rt: &mut Rt, _event: &Signal) -> Result<(), EngineError> {
        record(rt, "turn".into())?;
        let walker = rt.world().component_id::<Walker>()?;
        let walkers: Vec<EntityId> = rt.world().all_with([walker]).collect();
        for actor in walkers {
            rt.emit(&Signal::Step { actor })?;
        }
        Ok(())
    }
}

/// Step -> move one cell east if walkable, then Moved.
struct Stepper;

impl System<Rt, Signal> for Stepper {
    fn process(&self, rt: &mut Rt, event: &Signal) -> Result<(), EngineError> {
        let Signal::Step { actor } = *event else {
            return Ok(());
        };
        record(rt, format!("step {actor}"))?;
        let to = rt.world().position_of(actor)?.offset(1, 0);
        if rt.is_walkable(to) {
            rt.world_mut().move_entity(actor, to)?;
            rt.emit(&Signal::Moved { actor, to })?;
        }
        Ok(())
    }
}

struct Witness;

impl System<Rt, Signal> for Witness {
    fn process(&self, rt: &mut Rt, event: &Signal) -> Result<(), EngineError> {
        if let Signal::Moved { actor, to } = event {
            record(rt, format!("moved {actor} {to}"))?;
        }
        Ok(())
    }
}

struct Faulty;

impl System<Rt, Signal> for Faulty {
    fn process(&self, _rt: &mut Rt, _event: &Signal) -> Result<(), EngineError> {
        Err(MapError::InvalidConfig("fault".into()).into())
    }
}

/// A 6x3 open room bordered by walls, with the log holder at id 1.
fn setup() -> Rt {
    let mut rt: Rt = Runtime::new(RuntimeConfig {
        width: 8,
        height: 5,
        ..Default::default()
    })
    .unwrap();
    rt.grid_mut()
        .fill_rect(
            Rect::new(Position::new(1, 1), Position::new(6, 3)),
            Tile::Floor,
        )
        .unwrap();
    let world = rt.world_mut();
    world.register_component::<Log>("log").unwrap();
    world.register_component::<Walker>("walker").unwrap();
    world
        .spawn_with_id(
            EntityId::from_raw(1),
            Position::new(0, 0),
            ComponentBundle::new().with(Log::default()),
        )
        .unwrap();

    let bus = rt.event_bus();
    let scheduler = bus.add_system(Scheduler);
    let stepper = bus.add_system(Stepper);
    let witness = bus.add_system(Witness);
    let faulty = bus.add_system(Faulty);
    bus.subscribe(scheduler, [SignalKind::Turn]).unwrap();
    bus.subscribe(stepper, [SignalKind::Step]).unwrap();
    bus.subscribe(witness, [SignalKind::Moved]).unwrap();
    bus.subscribe(faulty, [SignalKind::Fault]).unwrap();
    rt
}

fn log(rt: &Rt) -> Vec<(String, usize)> {
    rt.world()
        .get_component::<Log>(EntityId::from_raw(1))
        .unwrap()
        .0
        .clone()
}

#[test]
fn cascade_runs_depth_first() {
    let mut rt = setup();
    let a = rt
        .world_mut()
        .spawn(Position::new(1, 1), ComponentBundle::new().with(Walker))
        .unwrap();
    let b = rt
        .world_mut()
        .spawn(Position::new(1, 3), ComponentBundle::new().with(Walker))
        .unwrap();

    rt.emit(&Signal::Turn).unwrap();

    let expected = vec![
        ("turn".to_owned(), 1),
        (format!("step {a}"), 2),
        (format!("moved {a} (2, 1)"), 3),
        (format!("step {b}"), 2),
        (format!("moved {b} (2, 3)"), 3),
    ];
    assert_eq!(log(&rt), expected);
    assert_eq!(rt.event_bus().depth(), 0);
}

#[test]
fn walls_stop_the_cascade_early() {
    let mut rt = setup();
    let walker = rt
        .world_mut()
        .spawn(Position::new(6, 2), ComponentBundle::new().with(Walker))
        .unwrap();
    rt.emit(&Signal::Turn).unwrap();
    assert_eq!(rt.world().position_of(walker).unwrap(), Position::new(6, 2));
    assert!(log(&rt).iter().all(|(line, _)| !line.starts_with("moved")));
}

#[test]
fn repeated_turns_walk_to_the_wall() {
    let mut rt = setup();
    let walker = rt
        .world_mut()
        .spawn(Position::new(1, 2), ComponentBundle::new().with(Walker))
        .unwrap();
    for _ in 0..10 {
        rt.emit(&Signal::Turn).unwrap();
    }
    assert_eq!(rt.world().position_of(walker).unwrap(), Position::new(6, 2));
}

#[test]
fn system_errors_reach_the_emitter() {
    let mut rt = setup();
    let err = rt.emit(&Signal::Fault).unwrap_err();
    assert!(matches!(err, EngineError::Map(MapError::InvalidConfig(_))));
    assert_eq!(rt.event_bus().depth(), 0);
}

#[test]
fn unknown_system_is_an_ecs_error() {
    let mut rt = setup();
    let err: EngineError = rt
        .event_bus()
        .subscribe(SystemId(99), [SignalKind::Turn])
        .unwrap_err()
        .into();
    assert!(matches!(err, EngineError::Ecs(EcsError::UnknownSystem(_))));
}
