//! Headless dungeon demo -- generate a level, drop in a hero and some goblins,
//! and let a few turns play out through the event bus.
//!
//! Run with:
//!   cargo run --example descend -p delve-engine -- [seed] [turns]
//!
//! Set `RUST_LOG=delve=debug` (or `trace`) to watch the dispatch cascade.

use std::fmt::Write as _;

use anyhow::Context as _;
use delve_engine::prelude::*;
use rand::seq::SliceRandom;

// ---------------------------------------------------------------------------
// Components
// ---------------------------------------------------------------------------

struct Hero;

struct Goblin;

struct Health(i32);

/// How far an actor can see.
struct Sight(f64);

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum GameEvent {
    Turn { number: u32 },
    Act { actor: EntityId },
    Move { actor: EntityId, to: Position },
    Attack { attacker: EntityId, target: EntityId },
    Died { entity: EntityId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum GameEventKind {
    Turn,
    Act,
    Move,
    Attack,
    Died,
}

impl Event for GameEvent {
    type Kind = GameEventKind;

    fn kind(&self) -> GameEventKind {
        match self {
            GameEvent::Turn { .. } => GameEventKind::Turn,
            GameEvent::Act { .. } => GameEventKind::Act,
            GameEvent::Move { .. } => GameEventKind::Move,
            GameEvent::Attack { .. } => GameEventKind::Attack,
            GameEvent::Died { .. } => GameEventKind::Died,
        }
    }
}

type Game = Runtime<GameEvent>;

// ---------------------------------------------------------------------------
// Systems
// ---------------------------------------------------------------------------

/// Turn -> Act for every living actor, hero first.
struct TurnOrder;

impl System<Game, GameEvent> for TurnOrder {
    fn name(&self) -> &str {
        "turn_order"
    }

    fn process(&self, game: &mut Game, event: &GameEvent) -> Result<(), EngineError> {
        let GameEvent::Turn { number } = event else {
            return Ok(());
        };
        tracing::info!(turn = number, "turn begins");
        let hero = game.world().component_id::<Hero>()?;
        let goblin = game.world().component_id::<Goblin>()?;
        let mut actors: Vec<EntityId> = game.world().all_with([hero]).collect();
        actors.extend(game.world().all_with([goblin]));
        for actor in actors {
            // Earlier actors may have killed later ones.
            if game.world().is_alive(actor) {
                game.emit(&GameEvent::Act { actor })?;
            }
        }
        Ok(())
    }
}

/// Act -> Move or Attack. Goblins chase a hero they can see; everyone
/// else wanders.
struct Behaviour;

impl Behaviour {
    fn wander(game: &mut Game, actor: EntityId, from: Position) -> Result<(), EngineError> {
        let options: Vec<Position> = Delta::CARDINAL
            .iter()
            .map(|delta| delta.apply(from))
            .filter(|&cell| game.is_walkable(cell))
            .collect();
        if let Some(&to) = options.choose(game.rng()) {
            game.emit(&GameEvent::Move { actor, to })?;
        }
        Ok(())
    }
}

impl System<Game, GameEvent> for Behaviour {
    fn name(&self) -> &str {
        "behaviour"
    }

    fn process(&self, game: &mut Game, event: &GameEvent) -> Result<(), EngineError> {
        let GameEvent::Act { actor } = *event else {
            return Ok(());
        };
        let from = game.world().position_of(actor)?;
        if game.world().has_component::<Hero>(actor) {
            return Self::wander(game, actor, from);
        }

        let sight = game.world().get_component::<Sight>(actor).map_or(0.0, |s| s.0);
        let hero = match game.world().single_with::<Hero>() {
            Ok(hero) => hero,
            Err(EcsError::NotFound { .. }) => return Self::wander(game, actor, from),
            Err(err) => return Err(err.into()),
        };
        let target = game.world().position_of(hero)?;
        if euclidean(from, target) > sight || !game.can_see(from, target)? {
            return Self::wander(game, actor, from);
        }
        if are_adjacent(from, target) {
            return game.emit(&GameEvent::Attack {
                attacker: actor,
                target: hero,
            });
        }
        match game.path_between(from, target)? {
            Some(path) if path.cells.len() > 1 => game.emit(&GameEvent::Move {
                actor,
                to: path.cells[1],
            }),
            _ => Ok(()),
        }
    }
}

/// Move: step onto the target cell if it is walkable and unoccupied.
struct Movement;

impl System<Game, GameEvent> for Movement {
    fn name(&self) -> &str {
        "movement"
    }

    fn process(&self, game: &mut Game, event: &GameEvent) -> Result<(), EngineError> {
        let GameEvent::Move { actor, to } = *event else {
            return Ok(());
        };
        if game.is_walkable(to) && game.world().spatial().count_at(to) == 0 {
            game.world_mut().move_entity(actor, to)?;
        }
        Ok(())
    }
}

/// Attack -> Died when health runs out.
struct Combat;

impl System<Game, GameEvent> for Combat {
    fn name(&self) -> &str {
        "combat"
    }

    fn process(&self, game: &mut Game, event: &GameEvent) -> Result<(), EngineError> {
        let GameEvent::Attack { attacker, target } = *event else {
            return Ok(());
        };
        let Some(health) = game.world_mut().get_component_mut::<Health>(target) else {
            return Ok(());
        };
        health.0 -= 1;
        let remaining = health.0;
        tracing::info!(%attacker, %target, remaining, "attack");
        if remaining <= 0 {
            game.emit(&GameEvent::Died { entity: target })?;
        }
        Ok(())
    }
}

/// Died: remove the entity.
struct Cleanup;

impl System<Game, GameEvent> for Cleanup {
    fn name(&self) -> &str {
        "cleanup"
    }

    fn process(&self, game: &mut Game, event: &GameEvent) -> Result<(), EngineError> {
        let GameEvent::Died { entity } = *event else {
            return Ok(());
        };
        if game.world().is_alive(entity) {
            game.world_mut().despawn(entity)?;
            tracing::info!(%entity, "died");
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Setup and rendering
// ---------------------------------------------------------------------------

fn setup(seed: u64) -> Result<Game, EngineError> {
    let mut game = Game::new(RuntimeConfig {
        seed,
        ..Default::default()
    })?;
    let world = game.world_mut();
    world.register_component::<Hero>("hero")?;
    world.register_component::<Goblin>("goblin")?;
    world.register_component::<Health>("health")?;
    world.register_component::<Sight>("sight")?;

    let bus = game.event_bus();
    let systems = [
        (bus.add_system(TurnOrder), GameEventKind::Turn),
        (bus.add_system(Behaviour), GameEventKind::Act),
        (bus.add_system(Movement), GameEventKind::Move),
        (bus.add_system(Combat), GameEventKind::Attack),
        (bus.add_system(Cleanup), GameEventKind::Died),
    ];
    for (id, kind) in systems {
        bus.subscribe(id, [kind])?;
    }

    game.generate_level()?;
    game.spawn_on_random_floor(ComponentBundle::new().with(Hero).with(Health(5)))?;
    for _ in 0..4 {
        game.spawn_on_random_floor(
            ComponentBundle::new()
                .with(Goblin)
                .with(Health(2))
                .with(Sight(6.0)),
        )?;
    }
    Ok(game)
}

/// The grid with actors drawn over it.
fn render(game: &Game) -> String {
    let grid = game.grid();
    let world = game.world();
    let mut out = String::new();
    for y in 0..grid.height() {
        for x in 0..grid.width() {
            let cell = Position::new(x, y);
            let glyph = match world.entities_at(cell).next() {
                Some(e) if world.has_component::<Hero>(e) => '@',
                Some(_) => 'g',
                None => grid.get(cell).map_or(' ', Tile::glyph),
            };
            out.push(glyph);
        }
        out.push('\n');
    }
    out
}

fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let seed: u64 = match args.next() {
        Some(raw) => raw.parse().context("seed must be an unsigned integer")?,
        None => 7,
    };
    let turns: u32 = match args.next() {
        Some(raw) => raw.parse().context("turns must be an unsigned integer")?,
        None => 20,
    };

    let mut game = setup(seed).context("failed to set up the level")?;
    println!("seed {seed}, level {}\n{}", game.level(), render(&game));

    for number in 1..=turns {
        game.emit(&GameEvent::Turn { number })?;
        if game.world().single_with::<Hero>().is_err() {
            println!("the hero fell on turn {number}");
            break;
        }
    }

    let goblin = game.world().component_id::<Goblin>()?;
    let mut summary = String::new();
    writeln!(
        summary,
        "after {turns} turns: {} goblins left",
        game.world().all_with([goblin]).count()
    )?;
    writeln!(summary, "fingerprint {}", game.fingerprint())?;
    println!("{}\n{summary}", render(&game));
    Ok(())
}
