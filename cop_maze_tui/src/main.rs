use anyhow::Result;
use clap::Parser;
use cop_maze_core::{
    Difficulty, GameConfig, GameOutcome, Maze, SessionEvent, SessionHandle, SessionSnapshot,
    pursuer::PursuerPhase,
    sound::SharedSoundLevel,
    spawn_session,
};
use ratatui::{
    crossterm::{
        self,
        event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
        execute,
        terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
    },
    prelude::*,
    widgets::*,
};
use std::{
    collections::VecDeque,
    fs::File,
    io::{self, Stdout},
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const MESSAGE_LINES: usize = 6;
const SCREAM_DURATION: Duration = Duration::from_millis(1500);

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Difficulty preset: easy, hard or super-hard
    #[arg(short, long, default_value = "easy")]
    difficulty: Difficulty,

    /// Seed for a reproducible maze
    #[arg(short, long)]
    seed: Option<u64>,

    #[arg(long)]
    width: Option<usize>,

    #[arg(long)]
    height: Option<usize>,

    #[arg(long)]
    gems: Option<usize>,

    #[arg(long)]
    pursuers: Option<usize>,

    /// Milliseconds between pursuer moves (0 freezes them)
    #[arg(long, value_name = "MS")]
    tick_ms: Option<u64>,

    /// Character name shown in the status panel
    #[arg(long)]
    name: Option<String>,

    /// Write logs here; nothing is logged otherwise
    #[arg(short, long, value_name = "LOG_FILE")]
    log_file: Option<PathBuf>,
}

impl Args {
    /// Difficulty preset with the command line overrides applied.
    fn config(&self) -> GameConfig {
        let mut config = self.difficulty.config();
        if let Some(width) = self.width {
            config.width = width;
        }
        if let Some(height) = self.height {
            config.height = height;
        }
        if let Some(gems) = self.gems {
            config.gems = gems;
        }
        if let Some(pursuers) = self.pursuers {
            config.pursuers = pursuers;
        }
        if let Some(tick_ms) = self.tick_ms {
            config.tick_interval_ms = tick_ms;
        }
        if let Some(name) = &self.name {
            config.character_name = name.clone();
        }
        config.seed = self.seed;
        config
    }
}

struct App {
    /// Connection to the running session.
    handle: SessionHandle,
    /// Walls, fetched once.
    maze: Arc<Maze>,
    /// Latest state copy used for drawing.
    snapshot: SessionSnapshot,
    events: broadcast::Receiver<SessionEvent>,
    /// Most recent event descriptions, newest last.
    messages: VecDeque<String>,
    /// Noise fed to the pursuers' sound gate.
    sound: SharedSoundLevel,
    scream_level: f64,
    scream_until: Option<Instant>,
    /// Flag to control the main loop.
    should_quit: bool,
}

impl App {
    async fn new(config: &GameConfig) -> Result<Self> {
        let sound = SharedSoundLevel::new();
        let handle = spawn_session(config, Box::new(sound.clone()))?;
        let events = handle.subscribe();
        let snapshot = handle.snapshot().await?;
        info!(?config, "session started");

        Ok(App {
            maze: handle.maze(),
            handle,
            snapshot,
            events,
            messages: VecDeque::with_capacity(MESSAGE_LINES),
            sound,
            scream_level: config.scare_threshold * 2.0 + 1.0,
            scream_until: None,
            should_quit: false,
        })
    }

    /// Pulls pending events and a fresh snapshot from the session.
    async fn refresh(&mut self) -> Result<()> {
        loop {
            match self.events.try_recv() {
                Ok(event) => {
                    if let Some(message) = describe(&event) {
                        self.push_message(message);
                    }
                }
                Err(TryRecvError::Lagged(missed)) => {
                    self.push_message(format!("({missed} events skipped)"));
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }

        if self.scream_until.is_some_and(|until| Instant::now() >= until) {
            self.scream_until = None;
            self.sound.set(0.0);
        }

        self.snapshot = self.handle.snapshot().await?;
        Ok(())
    }

    async fn on_key(&mut self, code: KeyCode) -> Result<()> {
        use cop_maze_core::Direction as Heading;

        let heading = match code {
            KeyCode::Char('q') | KeyCode::Esc => {
                self.quit();
                return Ok(());
            }
            KeyCode::Char('k') => {
                if !self.handle.apply_key().await? {
                    self.push_message("The key is not usable yet.".to_string());
                }
                return Ok(());
            }
            KeyCode::Char(' ') => {
                self.scream();
                return Ok(());
            }
            KeyCode::Left | KeyCode::Char('a') => Heading::Left,
            KeyCode::Right | KeyCode::Char('d') => Heading::Right,
            KeyCode::Up | KeyCode::Char('w') => Heading::Up,
            KeyCode::Down | KeyCode::Char('s') => Heading::Down,
            _ => return Ok(()),
        };
        self.handle.move_character(heading).await?;
        Ok(())
    }

    fn scream(&mut self) {
        self.sound.set(self.scream_level);
        self.scream_until = Some(Instant::now() + SCREAM_DURATION);
    }

    fn push_message(&mut self, message: String) {
        if self.messages.len() == MESSAGE_LINES {
            self.messages.pop_front();
        }
        self.messages.push_back(message);
    }

    /// Sets the quit flag.
    fn quit(&mut self) {
        self.should_quit = true;
    }
}

/// Human readable line for the message panel. Pursuer steps are too
/// frequent to be worth showing.
fn describe(event: &SessionEvent) -> Option<String> {
    let message = match event {
        SessionEvent::CharacterMoved { .. } | SessionEvent::PursuerMoved { .. } => return None,
        SessionEvent::GemCollected { remaining: 0, .. } => "Last gem collected!".to_string(),
        SessionEvent::GemCollected { remaining, .. } => {
            format!("Gem collected, {remaining} to go.")
        }
        SessionEvent::KeyRevealed { position } => {
            format!("A key appeared at ({}, {}).", position.x, position.y)
        }
        SessionEvent::KeyPickedUp => "You picked up the key.".to_string(),
        SessionEvent::DoorOpened => "The door is open.".to_string(),
        SessionEvent::PursuersScared { level } => format!("The cops freeze ({level:.0})."),
        SessionEvent::OutcomeChanged { outcome } => match outcome {
            GameOutcome::Won => "You escaped!".to_string(),
            GameOutcome::Lost => "Caught!".to_string(),
            GameOutcome::InProgress => return None,
        },
    };
    Some(message)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();
    if let Some(path) = &args.log_file {
        setup_logging(path)?;
    }
    let config = args.config();
    config.validate()?;

    // Create the session before touching the terminal so errors print normally
    let mut app = App::new(&config).await?;

    let mut terminal = setup_terminal()?;
    let result = run_app(&mut terminal, &mut app).await;
    restore_terminal(&mut terminal)?;
    result?;

    match app.snapshot.outcome {
        GameOutcome::Won => println!("{} escaped the maze.", app.snapshot.character.name),
        GameOutcome::Lost => println!("{} was caught.", app.snapshot.character.name),
        GameOutcome::InProgress => {}
    }
    Ok(())
}

/// File-only logging; writing to stderr would corrupt the alternate screen.
fn setup_logging(path: &Path) -> Result<()> {
    let file = File::create(path)?;
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(Mutex::new(file))
        .with_ansi(false);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .init();
    info!(log_file = %path.display(), "logging initialized");
    Ok(())
}

/// Configures the terminal for TUI interaction.
fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    let mut stdout = io::stdout();
    enable_raw_mode()?;
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend).map_err(Into::into)
}

/// Restores the terminal to its original state.
fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}

/// Runs the main loop of the TUI application. Pursuers move on the
/// session's own ticker; this loop only draws and forwards keys.
async fn run_app(terminal: &mut Terminal<CrosstermBackend<Stdout>>, app: &mut App) -> Result<()> {
    let frame_rate = Duration::from_millis(50);

    loop {
        app.refresh().await?;
        terminal.draw(|f| ui(f, app))?;

        // Keep the runtime's other tasks scheduled while this thread waits.
        if tokio::task::block_in_place(|| crossterm::event::poll(frame_rate))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.on_key(key.code).await?;
                }
            }
        }

        if app.should_quit {
            break;
        }
    }
    app.handle.shutdown().await?;
    Ok(())
}

/// Renders the user interface.
fn ui(frame: &mut Frame, app: &App) {
    let main_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),                           // Map and status
            Constraint::Length(MESSAGE_LINES as u16 + 2), // Message log
            Constraint::Length(2),                        // Help
        ])
        .split(frame.area());
    let top = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(70), Constraint::Percentage(30)])
        .split(main_layout[0]);

    render_map(frame, top[0], &app.maze, &app.snapshot);
    render_status(frame, top[1], app);

    let messages: Vec<ListItem> = app
        .messages
        .iter()
        .map(|m| ListItem::new(m.as_str()))
        .collect();
    let log =
        List::new(messages).block(Block::default().borders(Borders::ALL).title("Messages"));
    frame.render_widget(log, main_layout[1]);

    let help_text = Paragraph::new(
        "Arrows/WASD move, 'k' use key, space scream, 'q' or 'Esc' quit.",
    )
    .alignment(Alignment::Center)
    .block(Block::default().borders(Borders::TOP));
    frame.render_widget(help_text, main_layout[2]);
}

/// Renders the character, gems, key and pursuer state.
fn render_status(frame: &mut Frame, area: Rect, app: &App) {
    let snapshot = &app.snapshot;
    let character = &snapshot.character;
    let key_state = if snapshot.key.collected {
        "used"
    } else if character.has_key {
        "carried"
    } else if snapshot.key.visible {
        "visible"
    } else {
        "hidden"
    };
    let outcome = match snapshot.outcome {
        GameOutcome::InProgress => Span::raw("running"),
        GameOutcome::Won => Span::styled("escaped", Style::default().fg(Color::Green).bold()),
        GameOutcome::Lost => Span::styled("caught", Style::default().fg(Color::Red).bold()),
    };

    let mut lines = vec![
        Line::from(format!("Name: {}", character.name)),
        Line::from(format!(
            "Pos: ({}, {})",
            character.position.x, character.position.y
        )),
        Line::from(format!(
            "Gems: {}/{}",
            character.owned_gems,
            snapshot.gems.len()
        )),
        Line::from(format!("Key: {key_state}")),
        Line::from(format!(
            "Door: {}",
            if snapshot.door.opened { "open" } else { "locked" }
        )),
        Line::from(vec![Span::raw("Status: "), outcome]),
        Line::from(format!("Noise: {:.0}", app.sound.get())),
    ];
    for (index, pursuer) in snapshot.pursuers.iter().enumerate() {
        let phase = match pursuer.phase(snapshot.window) {
            PursuerPhase::Chase => "chasing",
            PursuerPhase::Return => "returning",
        };
        lines.push(Line::from(format!("Cop {}: {phase}", index + 1)));
    }

    let status =
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Status"));
    frame.render_widget(status, area);
}

/// Renders the maze with each cell two columns wide.
fn render_map(frame: &mut Frame, area: Rect, maze: &Maze, snapshot: &SessionSnapshot) {
    use cop_maze_core::{Direction as Heading, Position as Cell};

    let wall = Style::default().fg(Color::DarkGray);
    let mut lines: Vec<Line> = Vec::with_capacity(maze.height() * 2 + 1);

    for y in 0..maze.height() {
        let mut top: Vec<Span> = Vec::with_capacity(maze.width() * 2 + 1);
        let mut middle: Vec<Span> = Vec::with_capacity(maze.width() * 2 + 1);
        for x in 0..maze.width() {
            let cell = Cell::new(x, y);
            top.push(Span::styled("+", wall));
            top.push(Span::styled(
                if maze.has_wall(cell, Heading::Up) { "--" } else { "  " },
                wall,
            ));
            middle.push(Span::styled(
                if maze.has_wall(cell, Heading::Left) { "|" } else { " " },
                wall,
            ));
            middle.push(cell_span(cell, snapshot));
        }
        top.push(Span::styled("+", wall));
        let last = Cell::new(maze.width() - 1, y);
        middle.push(Span::styled(
            if maze.has_wall(last, Heading::Right) { "|" } else { " " },
            wall,
        ));
        lines.push(Line::from(top));
        lines.push(Line::from(middle));
    }

    let mut bottom: Vec<Span> = Vec::with_capacity(maze.width() * 2 + 1);
    for x in 0..maze.width() {
        let cell = Cell::new(x, maze.height() - 1);
        bottom.push(Span::styled("+", wall));
        bottom.push(Span::styled(
            if maze.has_wall(cell, Heading::Down) { "--" } else { "  " },
            wall,
        ));
    }
    bottom.push(Span::styled("+", wall));
    lines.push(Line::from(bottom));

    let map_paragraph = Paragraph::new(lines)
        .block(Block::default().title("Cop Maze").borders(Borders::ALL))
        .alignment(Alignment::Center);

    frame.render_widget(map_paragraph, area);
}

/// The two-column glyph for whatever is drawn on top in `cell`.
fn cell_span(cell: cop_maze_core::Position, snapshot: &SessionSnapshot) -> Span<'static> {
    if snapshot.character.position == cell {
        return Span::styled("@ ", Style::default().fg(Color::Cyan).bold());
    }
    if snapshot.pursuers.iter().any(|p| p.position() == cell) {
        return Span::styled("C ", Style::default().fg(Color::Red).bold());
    }
    let key = &snapshot.key;
    if key.visible && !key.collected && !snapshot.character.has_key && key.position == cell {
        return Span::styled("k ", Style::default().fg(Color::Yellow));
    }
    if snapshot
        .gems
        .iter()
        .any(|g| !g.collected && g.position == cell)
    {
        return Span::styled("* ", Style::default().fg(Color::Magenta));
    }
    if snapshot.door.position == cell {
        let (glyph, color) = if snapshot.door.opened {
            ("O ", Color::Green)
        } else {
            ("D ", Color::Blue)
        };
        return Span::styled(glyph, Style::default().fg(color));
    }
    Span::raw("  ")
}
