//! Demo line server wiring the Hearth runtime end to end.
//!
//! Usage: `hearthd [engine.toml]`. Binds `HEARTH_BIND` (default
//! `127.0.0.1:4000`). Every connection becomes an actor standing in the
//! town square; whatever it types is echoed to the room, and `quit`
//! disconnects it. Set `RUST_LOG` to change the log filter.

use std::env;
use std::io::{self, Write};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::process::ExitCode;
use std::sync::{Arc, PoisonError, RwLock, Weak};
use std::thread;

use crossbeam_channel::{bounded, Receiver, Sender};
use indexmap::IndexMap;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use hearth::prelude::*;

const DEFAULT_BIND: &str = "127.0.0.1:4000";
const OUTBOX_CAPACITY: usize = 64;
const START_AREA: &str = "town";
const START_ROOM: &str = "square";

#[derive(Debug, Error)]
enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to register demo listener: {0}")]
    Listener(#[from] DispatchError),
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "hearthd failed");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), ServerError> {
    let config = match env::args_os().nth(1) {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    let bind = env::var("HEARTH_BIND").unwrap_or_else(|_| DEFAULT_BIND.into());

    let world = Arc::new(World::new(config)?);
    let outboxes = Outboxes::default();
    register_demo_listeners(&world, &outboxes)?;
    let _runtime = Runtime::start_with(Arc::clone(&world))?;

    let listener = TcpListener::bind(&bind)?;
    info!(%bind, "hearthd listening");

    let mut next_actor = 1;
    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                let actor = ActorId(next_actor);
                next_actor += 1;
                if let Err(e) = accept(actor, stream, &world, &outboxes) {
                    warn!(%actor, error = %e, "failed to set up connection");
                    world.presence().leave(actor);
                    outboxes.remove(actor);
                }
            }
            Err(e) => warn!(error = %e, "accept failed"),
        }
    }
    Ok(())
}

// ── Connections ──────────────────────────────────────────────────

fn accept(
    actor: ActorId,
    stream: TcpStream,
    world: &Arc<World>,
    outboxes: &Outboxes,
) -> io::Result<()> {
    let peer = stream.peer_addr()?;
    let writer = stream.try_clone()?;
    let (tx, rx) = bounded(OUTBOX_CAPACITY);
    outboxes.insert(actor, tx);
    world.presence().join(actor, RoomKey::new(START_AREA, START_ROOM));

    thread::Builder::new()
        .name(format!("hearth-out-{actor}"))
        .spawn(move || write_loop(writer, rx))?;

    let reader_world = Arc::clone(world);
    thread::Builder::new()
        .name(format!("hearth-conn-{actor}"))
        .spawn(move || {
            match ConnectionWorker::new(actor, reader_world).run_stream(stream) {
                Ok(reason) => info!(%actor, %reason, "connection closed"),
                Err(e) => warn!(%actor, error = %e, "connection setup failed"),
            }
        })?;

    info!(%actor, %peer, "connection accepted");
    world.queue_system(
        actor,
        Message::to_actor(actor, format!("Welcome to Hearth. You are actor {actor}.")),
    );
    world.queue_system(actor, SendPrompt { actor });
    Ok(())
}

/// Write queued lines until the outbox closes, then hang up.
fn write_loop(mut stream: TcpStream, rx: Receiver<String>) {
    for line in rx.iter() {
        if let Err(e) = stream.write_all(line.as_bytes()) {
            debug!(error = %e, "write failed");
            break;
        }
    }
    if let Err(e) = stream.shutdown(Shutdown::Both) {
        debug!(error = %e, "shutdown after close failed");
    }
}

// ── Outboxes ─────────────────────────────────────────────────────

/// Per-actor outbound line queues.
#[derive(Clone, Default)]
struct Outboxes(Arc<RwLock<IndexMap<ActorId, Sender<String>>>>);

impl Outboxes {
    fn insert(&self, actor: ActorId, tx: Sender<String>) {
        self.0
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(actor, tx);
    }

    /// Dropping the last sender ends the actor's writer thread.
    fn remove(&self, actor: ActorId) -> bool {
        self.0
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .shift_remove(&actor)
            .is_some()
    }

    fn send(&self, actor: ActorId, text: &str) {
        let boxes = self.0.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(tx) = boxes.get(&actor) {
            if tx.try_send(format!("{text}\r\n")).is_err() {
                debug!(%actor, "outbox full, line dropped");
            }
        }
    }
}

// ── Demo listeners ───────────────────────────────────────────────

fn register_demo_listeners(world: &Arc<World>, outboxes: &Outboxes) -> Result<(), DispatchError> {
    let handle = Arc::downgrade(world);
    world.register(
        Arc::new(FnListener::typed::<Input>("demo.commands", 10, move |input, _| {
            handle_input(&handle, input)
        })),
        &[Input::NAME],
    )?;

    let handle = Arc::downgrade(world);
    let boxes = outboxes.clone();
    world.register(
        Arc::new(FnListener::typed::<Message>("demo.deliver", 100, move |msg, _| {
            deliver(&handle, &boxes, msg);
            ListenResult::Continue
        })),
        &[Message::NAME],
    )?;

    let boxes = outboxes.clone();
    world.register(
        Arc::new(FnListener::typed::<SendPrompt>("demo.prompt", 100, move |p, _| {
            boxes.send(p.actor, "> ");
            ListenResult::Continue
        })),
        &[SendPrompt::NAME],
    )?;

    let boxes = outboxes.clone();
    world.register(
        Arc::new(FnListener::typed::<PlayerQuit>("demo.hangup", 50, move |q, _| {
            if boxes.remove(q.actor) {
                info!(actor = %q.actor, "actor left the world");
            }
            ListenResult::Continue
        })),
        &[PlayerQuit::NAME],
    )?;
    Ok(())
}

fn handle_input(world: &Weak<World>, input: &Input) -> ListenResult {
    let Some(world) = world.upgrade() else {
        return ListenResult::Cancel;
    };
    let actor = input.actor;
    let (verb, _) = input.verb_and_args();
    if verb == "quit" {
        world.queue_system(actor, Message::to_actor(actor, "Goodbye."));
        world.queue_system(actor, PlayerQuit { actor });
        return ListenResult::Cancel;
    }

    world.queue_system(actor, Message::to_actor(actor, format!("You: {}", input.text)));
    if let Some(room) = world.presence().room_of(actor) {
        world.queue_system(
            actor,
            Message::to_room(room, Some(actor), format!("[{actor}] {}", input.text))
                .as_communication(),
        );
    }
    world.queue_system(actor, SendPrompt { actor });
    ListenResult::Continue
}

fn deliver(world: &Weak<World>, outboxes: &Outboxes, msg: &Message) {
    match (&msg.room, msg.target) {
        (Some(room), _) => {
            let Some(world) = world.upgrade() else {
                return;
            };
            for occupant in world.presence().occupants(room) {
                if msg.reaches(occupant) {
                    outboxes.send(occupant, &msg.text);
                }
            }
        }
        (None, Some(target)) => outboxes.send(target, &msg.text),
        (None, None) => debug!("message with no recipient dropped"),
    }
}
