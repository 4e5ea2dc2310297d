//! Benchmark profiles for the Hearth command pipeline.
//!
//! - [`reference_world`]: a world with a populated registry and occupied rooms
//! - [`populate`]: deterministic actor placement across a fixed set of rooms

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::sync::Arc;

use hearth_core::{ActorId, Input, ListenResult, Message, RoomKey};
use hearth_engine::{EngineConfig, FnListener, World};

/// Number of rooms actors are spread over.
pub const ROOMS: u64 = 16;

/// Build a world with `listeners` pass-through listeners on `Input`, one
/// on `Message`, one global listener, and `actors` present actors.
///
/// Queue capacities are raised so a benchmark iteration never drops.
pub fn reference_world(listeners: usize, actors: u64) -> World {
    let config = EngineConfig {
        system_queue_capacity: 4096,
        game_queue_capacity: 4096,
        input_queue_capacity: 4096,
        max_inputs_per_second: u32::MAX,
        max_requeues: 0,
        ..EngineConfig::default()
    };
    let world = World::new(config).unwrap();

    for i in 0..listeners {
        let priority = (i as i32 * 7) % 100;
        world
            .register(
                Arc::new(FnListener::new(format!("input.{i}"), priority, |_| {
                    ListenResult::Continue
                })),
                &[Input::NAME],
            )
            .unwrap();
    }
    world
        .register(
            Arc::new(FnListener::typed::<Message>("deliver", 100, |m, ctx| {
                ctx.set("len", m.text.len() as i64);
                ListenResult::Continue
            })),
            &[Message::NAME],
        )
        .unwrap();
    world
        .register_global(Arc::new(FnListener::new("audit", 0, |_| {
            ListenResult::Continue
        })))
        .unwrap();

    populate(&world, actors);
    world
}

/// Place `n` actors round-robin across [`ROOMS`] rooms.
pub fn populate(world: &World, n: u64) {
    for id in 1..=n {
        let room = RoomKey::new("bench", &format!("room{}", id % ROOMS));
        world.presence().join(ActorId(id), room);
    }
}
