//! Entity lifecycle, slot recycling, and migration behavior.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};

use archetable::{register_component, World, WorldError};

#[derive(Clone, Copy, Debug, PartialEq)]
struct Position {
    x: f32,
    y: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Velocity {
    dx: f32,
    dy: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Health(u32);

#[derive(Clone, Debug, PartialEq)]
struct Name(String);

/// Drop-counting payload for teardown checks.
#[derive(Clone)]
struct Tracked(Arc<AtomicUsize>);

impl Drop for Tracked {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

static INIT: Once = Once::new();

/// Pins component ID order for the whole test binary: Position < Velocity <
/// Health < Name < Tracked. Tuples below list fields in this order.
fn init_registry() {
    INIT.call_once(|| {
        register_component::<Position>().unwrap();
        register_component::<Velocity>().unwrap();
        register_component::<Health>().unwrap();
        register_component::<Name>().unwrap();
        register_component::<Tracked>().unwrap();
    });
}

#[test]
fn spawn_then_lookup() {
    init_registry();
    let mut world = World::new();

    let id = world
        .spawn((Position { x: 1.0, y: 2.0 }, Velocity { dx: 3.0, dy: 4.0 }))
        .unwrap();

    assert!(world.is_alive(id));
    assert_eq!(world.len(), 1);
    assert!(world.has::<Position>(id));
    assert!(world.has::<Velocity>(id));
    assert!(!world.has::<Health>(id));

    assert_eq!(world.get::<Position>(id), Some(&Position { x: 1.0, y: 2.0 }));
    assert_eq!(world.get::<Velocity>(id), Some(&Velocity { dx: 3.0, dy: 4.0 }));
    assert_eq!(world.get::<Health>(id), None);

    let (position, velocity) = world.get_row::<(Position, Velocity)>(id).unwrap();
    assert_eq!(position, &Position { x: 1.0, y: 2.0 });
    assert_eq!(velocity, &Velocity { dx: 3.0, dy: 4.0 });

    let (position,) = world.get_many::<(Position,)>(id).unwrap();
    assert_eq!(position.x, 1.0);
}

#[test]
fn despawn_invalidates_handle() {
    init_registry();
    let mut world = World::new();

    let id = world
        .spawn((Position { x: 0.0, y: 0.0 }, Velocity { dx: 0.0, dy: 0.0 }))
        .unwrap();
    world.despawn(id);

    assert!(!world.is_alive(id));
    assert!(world.is_empty());
    assert_eq!(world.get::<Position>(id), None);
    assert!(!world.has::<Position>(id));
    assert_eq!(
        world.get_row::<(Position, Velocity)>(id).unwrap_err(),
        WorldError::EntityDead
    );
}

#[test]
fn double_despawn_is_a_noop() {
    init_registry();
    let mut world = World::new();

    let a = world
        .spawn((Position { x: 1.0, y: 1.0 }, Velocity { dx: 0.0, dy: 0.0 }))
        .unwrap();
    let b = world
        .spawn((Position { x: 2.0, y: 2.0 }, Velocity { dx: 0.0, dy: 0.0 }))
        .unwrap();

    world.despawn(a);
    world.despawn(a);
    world.despawn(a);

    assert_eq!(world.len(), 1);
    assert!(world.is_alive(b));
    assert_eq!(world.get::<Position>(b), Some(&Position { x: 2.0, y: 2.0 }));

    // The free list survived the repeats: both slots recycle cleanly.
    let c = world
        .spawn((Position { x: 3.0, y: 3.0 }, Velocity { dx: 0.0, dy: 0.0 }))
        .unwrap();
    assert_eq!(c.slot(), a.slot());
    assert!(world.is_alive(c));
}

#[test]
fn slot_reuse_bumps_generation_once_per_delete() {
    init_registry();
    let mut world = World::new();

    let id1 = world
        .spawn((Position { x: 1.0, y: 2.0 }, Velocity { dx: 3.0, dy: 4.0 }))
        .unwrap();
    world.despawn(id1);

    let id2 = world
        .spawn((Position { x: 5.0, y: 6.0 }, Velocity { dx: 7.0, dy: 8.0 }))
        .unwrap();

    assert_eq!(id2.slot(), id1.slot());
    assert_eq!(id2.generation(), id1.generation() + 1);
    assert!(!world.is_alive(id1));
    assert!(world.is_alive(id2));
    assert_eq!(world.get::<Position>(id2), Some(&Position { x: 5.0, y: 6.0 }));
    assert_eq!(world.slot_count(), 1);
}

#[test]
fn add_migrates_and_preserves_existing_components() {
    init_registry();
    let mut world = World::new();

    let id = world
        .spawn((Position { x: 1.0, y: 2.0 }, Velocity { dx: 3.0, dy: 4.0 }))
        .unwrap();
    world.add(id, Name("bob".to_string())).unwrap();

    assert!(world.is_alive(id));
    assert!(world.has::<Name>(id));
    assert_eq!(world.get::<Position>(id), Some(&Position { x: 1.0, y: 2.0 }));
    assert_eq!(world.get::<Velocity>(id), Some(&Velocity { dx: 3.0, dy: 4.0 }));
    assert_eq!(world.get::<Name>(id), Some(&Name("bob".to_string())));
}

#[test]
fn add_duplicate_component_fails_and_changes_nothing() {
    init_registry();
    let mut world = World::new();

    let id = world
        .spawn((Position { x: 9.0, y: 9.0 }, Velocity { dx: 1.0, dy: 1.0 }))
        .unwrap();

    let err = world.add(id, Position { x: 0.0, y: 0.0 }).unwrap_err();
    assert!(matches!(err, WorldError::ComponentAlreadyPresent { .. }));

    assert_eq!(world.get::<Position>(id), Some(&Position { x: 9.0, y: 9.0 }));
    assert_eq!(world.len(), 1);
}

#[test]
fn remove_then_re_add() {
    init_registry();
    let mut world = World::new();

    let id = world
        .spawn((Position { x: 1.0, y: 1.0 }, Velocity { dx: 2.0, dy: 2.0 }))
        .unwrap();

    world.add(id, Health(7)).unwrap();
    assert_eq!(world.get::<Health>(id), Some(&Health(7)));

    world.remove::<Health>(id).unwrap();
    assert!(!world.has::<Health>(id));
    assert_eq!(world.get::<Health>(id), None);
    assert_eq!(world.get::<Position>(id), Some(&Position { x: 1.0, y: 1.0 }));

    world.add(id, Health(9)).unwrap();
    assert_eq!(world.get::<Health>(id), Some(&Health(9)));
    assert_eq!(world.get::<Velocity>(id), Some(&Velocity { dx: 2.0, dy: 2.0 }));
}

#[test]
fn remove_absent_component_fails() {
    init_registry();
    let mut world = World::new();

    let id = world
        .spawn((Position { x: 0.0, y: 0.0 }, Velocity { dx: 0.0, dy: 0.0 }))
        .unwrap();

    let err = world.remove::<Health>(id).unwrap_err();
    assert!(matches!(err, WorldError::ComponentMissing { .. }));
    assert!(world.is_alive(id));
    assert_eq!(world.len(), 1);
}

#[test]
fn removing_last_component_despawns() {
    init_registry();
    let mut world = World::new();

    let id = world.spawn((Health(3),)).unwrap();
    world.remove::<Health>(id).unwrap();

    assert!(!world.is_alive(id));
    assert!(world.is_empty());
}

#[test]
fn operations_on_stale_handles_fail_cleanly() {
    init_registry();
    let mut world = World::new();

    let id = world
        .spawn((Position { x: 0.0, y: 0.0 }, Velocity { dx: 0.0, dy: 0.0 }))
        .unwrap();
    world.despawn(id);

    assert_eq!(
        world.add(id, Health(1)).unwrap_err(),
        WorldError::EntityDead
    );
    assert_eq!(world.remove::<Position>(id).unwrap_err(), WorldError::EntityDead);
    assert_eq!(world.get_mut::<Position>(id), None);
}

#[test]
fn swap_remove_patches_surviving_entities() {
    init_registry();
    let mut world = World::new();

    let a = world
        .spawn((Position { x: 1.0, y: 0.0 }, Velocity { dx: 10.0, dy: 0.0 }))
        .unwrap();
    let b = world
        .spawn((Position { x: 2.0, y: 0.0 }, Velocity { dx: 20.0, dy: 0.0 }))
        .unwrap();
    let c = world
        .spawn((Position { x: 3.0, y: 0.0 }, Velocity { dx: 30.0, dy: 0.0 }))
        .unwrap();

    // C is swapped into B's row; its handle must still resolve to its data.
    world.despawn(b);

    assert!(world.is_alive(a));
    assert!(world.is_alive(c));
    assert_eq!(world.get::<Position>(c), Some(&Position { x: 3.0, y: 0.0 }));
    assert_eq!(world.get::<Velocity>(c), Some(&Velocity { dx: 30.0, dy: 0.0 }));
    assert_eq!(world.get::<Position>(a), Some(&Position { x: 1.0, y: 0.0 }));
}

#[test]
fn migration_under_swap_remove_keeps_neighbors_intact() {
    init_registry();
    let mut world = World::new();

    let ids: Vec<_> = (0..10)
        .map(|i| {
            world
                .spawn((
                    Position {
                        x: i as f32,
                        y: 0.0,
                    },
                    Velocity { dx: 0.0, dy: 0.0 },
                ))
                .unwrap()
        })
        .collect();

    // Migrate entities out of the middle of the table; each migration
    // swap-removes a source row and must patch the moved neighbor.
    for (i, &id) in ids.iter().enumerate().step_by(2) {
        world.add(id, Health(i as u32)).unwrap();
    }

    for (i, &id) in ids.iter().enumerate() {
        assert!(world.is_alive(id));
        assert_eq!(
            world.get::<Position>(id),
            Some(&Position {
                x: i as f32,
                y: 0.0
            })
        );
        assert_eq!(world.has::<Health>(id), i % 2 == 0);
    }
}

#[test]
fn despawn_and_remove_run_destructors() {
    init_registry();
    let drops = Arc::new(AtomicUsize::new(0));
    let mut world = World::new();

    let a = world
        .spawn((Position { x: 0.0, y: 0.0 }, Tracked(drops.clone())))
        .unwrap();
    let b = world
        .spawn((Position { x: 0.0, y: 0.0 }, Tracked(drops.clone())))
        .unwrap();
    let c = world
        .spawn((Position { x: 0.0, y: 0.0 }, Tracked(drops.clone())))
        .unwrap();

    world.despawn(a);
    assert_eq!(drops.load(Ordering::SeqCst), 1);

    world.remove::<Tracked>(b).unwrap();
    assert_eq!(drops.load(Ordering::SeqCst), 2);

    // Migration moves the value without dropping it.
    world.add(c, Health(1)).unwrap();
    assert_eq!(drops.load(Ordering::SeqCst), 2);

    drop(world);
    assert_eq!(drops.load(Ordering::SeqCst), 3);
}

#[test]
fn handles_stay_valid_across_migration() {
    init_registry();
    let mut world = World::new();

    let id = world
        .spawn((Position { x: 4.0, y: 2.0 }, Velocity { dx: 0.0, dy: 0.0 }))
        .unwrap();
    let before = (id.slot(), id.generation());

    world.add(id, Health(1)).unwrap();
    world.remove::<Velocity>(id).unwrap();

    assert_eq!((id.slot(), id.generation()), before);
    assert!(world.is_alive(id));
    assert_eq!(world.get::<Position>(id), Some(&Position { x: 4.0, y: 2.0 }));
    assert!(world.has::<Health>(id));
    assert!(!world.has::<Velocity>(id));
}

#[test]
fn mutation_through_get_mut_sticks() {
    init_registry();
    let mut world = World::new();

    let id = world
        .spawn((Position { x: 0.0, y: 0.0 }, Velocity { dx: 1.0, dy: 2.0 }))
        .unwrap();

    {
        let position = world.get_mut::<Position>(id).unwrap();
        position.x = 42.0;
    }
    {
        let (position, velocity) = world.get_row_mut::<(Position, Velocity)>(id).unwrap();
        position.y = velocity.dy;
    }

    assert_eq!(world.get::<Position>(id), Some(&Position { x: 42.0, y: 2.0 }));
}

#[test]
fn churn_recycles_slots_without_corruption() {
    use rand::Rng;

    init_registry();
    let mut world = World::new();
    let mut rng = rand::thread_rng();
    let mut live: Vec<_> = Vec::new();

    for round in 0..2_000u32 {
        if live.is_empty() || rng.gen_bool(0.6) {
            let id = world
                .spawn((
                    Position {
                        x: round as f32,
                        y: 0.0,
                    },
                    Velocity { dx: 0.0, dy: 0.0 },
                ))
                .unwrap();
            live.push((id, round));
        } else {
            let index = rng.gen_range(0..live.len());
            let (id, _) = live.swap_remove(index);
            world.despawn(id);
            assert!(!world.is_alive(id));
        }
    }

    assert_eq!(world.len(), live.len());
    for (id, round) in live {
        assert!(world.is_alive(id));
        assert_eq!(world.get::<Position>(id).unwrap().x, round as f32);
    }
    // Slots were recycled: far fewer slots than spawns.
    assert!(world.slot_count() <= 2_000);
}
