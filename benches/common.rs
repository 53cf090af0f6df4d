#![allow(dead_code)]

use std::sync::Once;

use archetable::{register_component, World};

pub const ENTITIES_SMALL: usize = 1_000;
pub const ENTITIES_MED: usize = 100_000;

#[derive(Clone, Copy)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

#[derive(Clone, Copy)]
pub struct Velocity {
    pub dx: f32,
    pub dy: f32,
}

#[derive(Clone, Copy)]
pub struct Health {
    pub value: u32,
}

static INIT: Once = Once::new();

/// Pins component ID order: Position < Velocity < Health.
pub fn init_components() {
    INIT.call_once(|| {
        register_component::<Position>().unwrap();
        register_component::<Velocity>().unwrap();
        register_component::<Health>().unwrap();
    });
}

/// Fills a world with `count` movers and `count / 2` movers with health.
pub fn populate(world: &mut World, count: usize) {
    for i in 0..count {
        world
            .spawn((
                Position {
                    x: i as f32,
                    y: 0.0,
                },
                Velocity { dx: 1.0, dy: 0.5 },
            ))
            .unwrap();
    }
    for i in 0..count / 2 {
        world
            .spawn((
                Position {
                    x: i as f32,
                    y: 1.0,
                },
                Velocity { dx: 1.0, dy: 0.5 },
                Health { value: 100 },
            ))
            .unwrap();
    }
}
