use cop_maze_core::{
    Direction, GameConfig, GameOutcome, Maze, Position, SessionEvent, SessionHandle,
    generator::Exit,
    pursuer::{PhaseWindow, Pursuer},
    session::{GameSession, SessionLayout, TickReport},
    sound::{SharedSoundLevel, SilentSource, SoundGate},
    spawn_session,
};
use tokio::time::{self, Duration};

/// A 5x1 open corridor with the character at the left end and the door at
/// the right end. No gems, so the key is visible from the start.
fn corridor(pursuers: Vec<Pursuer>) -> GameSession {
    let mut maze = Maze::new(5, 1);
    for (pos, direction) in maze.closed_interior_walls() {
        maze.open_wall(pos, direction).unwrap();
    }
    let exit = Exit {
        position: Position::new(4, 0),
        direction: Direction::Right,
    };
    maze.open_wall(exit.position, exit.direction).unwrap();
    GameSession::from_layout(SessionLayout {
        maze,
        exit,
        start: Position::new(0, 0),
        gems: vec![],
        key: Position::new(1, 0),
        pursuers,
        window: PhaseWindow::new(20, 10),
        require_key_pickup: false,
        character_name: "Bonnie".to_string(),
    })
    .unwrap()
}

fn silent_gate() -> SoundGate {
    SoundGate::new(Box::new(SilentSource), 100.0)
}

#[tokio::test]
async fn loss_by_tick_and_by_move_look_the_same() {
    let by_tick = SessionHandle::spawn(
        corridor(vec![Pursuer::new(Position::new(2, 0), 0)]),
        silent_gate(),
        None,
    );
    by_tick.tick().await.unwrap();
    by_tick.tick().await.unwrap();

    let by_move = SessionHandle::spawn(
        corridor(vec![Pursuer::new(Position::new(2, 0), 0)]),
        silent_gate(),
        None,
    );
    assert!(by_move.move_character(Direction::Right).await.unwrap());
    assert!(by_move.move_character(Direction::Right).await.unwrap());

    for handle in [&by_tick, &by_move] {
        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.outcome, GameOutcome::Lost);
        assert!(!handle.move_character(Direction::Left).await.unwrap());
        assert_eq!(handle.tick().await.unwrap(), TickReport::Skipped);
    }
}

#[tokio::test]
async fn events_reach_subscribers() {
    let handle = SessionHandle::spawn(corridor(vec![]), silent_gate(), None);
    let mut events = handle.subscribe();

    for _ in 0..4 {
        handle.move_character(Direction::Right).await.unwrap();
    }
    assert!(handle.apply_key().await.unwrap());

    let mut received = Vec::new();
    while let Ok(event) = events.try_recv() {
        received.push(event);
    }
    assert_eq!(
        received.first(),
        Some(&SessionEvent::CharacterMoved {
            from: Position::new(0, 0),
            to: Position::new(1, 0)
        })
    );
    assert!(received.contains(&SessionEvent::KeyPickedUp));
    assert!(received.contains(&SessionEvent::DoorOpened));
    assert_eq!(
        received.last(),
        Some(&SessionEvent::OutcomeChanged {
            outcome: GameOutcome::Won
        })
    );
}

#[tokio::test(start_paused = true)]
async fn scheduled_ticks_stop_after_capture() {
    let handle = SessionHandle::spawn(
        corridor(vec![Pursuer::new(Position::new(3, 0), 0)]),
        silent_gate(),
        Some(Duration::from_millis(100)),
    );
    let mut events = handle.subscribe();

    loop {
        let event = events.recv().await.unwrap();
        if event
            == (SessionEvent::OutcomeChanged {
                outcome: GameOutcome::Lost,
            })
        {
            break;
        }
    }
    let caught = handle.snapshot().await.unwrap();
    assert_eq!(caught.pursuers[0].move_turn(), 3);

    time::sleep(Duration::from_secs(2)).await;
    let later = handle.snapshot().await.unwrap();
    assert_eq!(later.pursuers, caught.pursuers);
    assert!(events.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn no_ticks_before_the_first_period() {
    let handle = SessionHandle::spawn(
        corridor(vec![Pursuer::new(Position::new(4, 0), 0)]),
        silent_gate(),
        Some(Duration::from_secs(1)),
    );
    time::sleep(Duration::from_millis(500)).await;
    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.pursuers[0].position(), Position::new(4, 0));

    time::sleep(Duration::from_millis(600)).await;
    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.pursuers[0].position(), Position::new(3, 0));
}

#[tokio::test]
async fn noise_freezes_pursuers() {
    let level = SharedSoundLevel::new();
    let handle = SessionHandle::spawn(
        corridor(vec![Pursuer::new(Position::new(4, 0), 0)]),
        SoundGate::new(Box::new(level.clone()), 100.0),
        None,
    );

    level.set(250.0);
    assert_eq!(
        handle.tick().await.unwrap(),
        TickReport::Scared { level: 250.0 }
    );
    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.pursuers[0].position(), Position::new(4, 0));

    level.set(0.0);
    assert!(matches!(
        handle.tick().await.unwrap(),
        TickReport::Advanced { .. }
    ));
}

#[tokio::test]
async fn shutdown_closes_the_session() {
    let handle = SessionHandle::spawn(corridor(vec![]), silent_gate(), None);
    let clone = handle.clone();
    handle.shutdown().await.unwrap();
    assert!(clone.move_character(Direction::Right).await.is_err());
    assert!(clone.snapshot().await.is_err());
}

#[tokio::test]
async fn spawned_sessions_share_their_maze() {
    let config = GameConfig {
        seed: Some(11),
        tick_interval_ms: 0,
        ..GameConfig::default()
    };
    let handle = spawn_session(&config, Box::new(SilentSource)).unwrap();
    let maze = handle.maze();
    assert_eq!((maze.width(), maze.height()), (config.width, config.height));
    assert_eq!(handle.exit(), handle.snapshot().await.unwrap().exit);

    let again = spawn_session(&config, Box::new(SilentSource)).unwrap();
    assert_eq!(maze.to_string(), again.maze().to_string());
}

#[tokio::test]
async fn invalid_config_is_rejected_before_spawning() {
    let config = GameConfig {
        width: 0,
        ..GameConfig::default()
    };
    assert!(spawn_session(&config, Box::new(SilentSource)).is_err());
}
