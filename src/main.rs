use anyhow::{anyhow, bail, Context, Result};
use chrono::{TimeZone, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use ytsub::captions::youtube::{require_video_id, watch_url};
use ytsub::config::Config;
use ytsub::debounce::{Debouncer, EditKey};
use ytsub::playback::{Player, SegmentPlayer, SimulatedPlayer, SubtitleTracker};
use ytsub::session::{FileStorage, SessionStore};
use ytsub::subtitles::id::generate_session_id;
use ytsub::subtitles::import::import_file;
use ytsub::subtitles::{
    format_clock, format_time, parse_time_strict, CueField, CueList, CuePatch, Nudge, SubtitleExporter,
    SubtitleFormat, TimeField,
};
use ytsub::{CaptionClient, CaptionData};

#[derive(Parser)]
#[command(name = "ytsub")]
#[command(version, author = "TigreRoll")]
#[command(about = "Edit, preview and export YouTube subtitles")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to ytsub.toml or config/ytsub.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch captions for a video and open a new session
    Fetch {
        /// Video URL or 11 character id
        url: String,
        /// Caption language code (e.g. "ko")
        #[arg(short, long)]
        lang: Option<String>,
    },
    /// List sessions, newest first
    List,
    /// Print a session's cues
    Show {
        /// Session id or unique prefix
        session: String,
        /// Also print timing and text warnings
        #[arg(long)]
        check: bool,
    },
    /// Edit one cue of a session
    Edit {
        /// Session id or unique prefix
        session: String,
        #[command(subcommand)]
        action: EditAction,
    },
    /// Interactive line editor with debounced commits
    Interactive {
        /// Session id or unique prefix
        session: String,
    },
    /// Export a session to a subtitle file
    Export {
        /// Session id or unique prefix
        session: String,
        /// Output format: srt, vtt, sub, sbv, txt or json
        #[arg(short, long, default_value = "srt")]
        format: SubtitleFormat,
        /// Language used in the file name
        #[arg(short, long, default_value = "en")]
        lang: String,
        /// Output directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },
    /// Import an SRT or timedtext file as a session
    Import {
        /// Subtitle file
        file: PathBuf,
        /// Video URL or id the subtitles belong to
        #[arg(long)]
        video: String,
        /// Title for a new session
        #[arg(long)]
        title: Option<String>,
        /// Replace the cues of this session instead of creating one
        #[arg(long)]
        session: Option<String>,
    },
    /// Simulate playback and print cues as they become active
    Preview {
        /// Session id or unique prefix
        session: String,
        /// Only play this cue
        #[arg(long)]
        cue: Option<String>,
        /// Start position (HH:MM:SS.mmm)
        #[arg(long)]
        from: Option<String>,
        /// Loop the active cue
        #[arg(long)]
        repeat: bool,
        /// Stop after this many seconds
        #[arg(long)]
        limit: Option<u64>,
    },
    /// Remove sessions older than the configured maximum age
    Cleanup,
    /// Remove a session
    Remove {
        /// Session id or unique prefix
        session: String,
    },
    /// Show or write configuration
    Config {
        /// Write the effective configuration to this file
        #[arg(long)]
        init: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum EditAction {
    /// Change times and/or text of a cue
    Update {
        cue: String,
        /// New start time (HH:MM:SS.mmm)
        #[arg(long)]
        start: Option<String>,
        /// New end time (HH:MM:SS.mmm)
        #[arg(long)]
        end: Option<String>,
        #[arg(long)]
        text: Option<String>,
    },
    /// Insert an empty cue before another
    InsertBefore { cue: String },
    /// Insert an empty cue after another
    InsertAfter { cue: String },
    /// Copy a cue right after itself
    Duplicate { cue: String },
    /// Delete a cue
    Delete { cue: String },
    /// Shift a cue boundary by the nudge step
    Nudge {
        cue: String,
        #[arg(value_enum)]
        field: BoundaryArg,
        #[arg(value_enum)]
        direction: DirectionArg,
        /// Step in milliseconds (defaults to editor.nudge_step_ms)
        #[arg(long)]
        step: Option<u64>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum BoundaryArg {
    Start,
    End,
}

#[derive(Clone, Copy, ValueEnum)]
enum DirectionArg {
    Up,
    Down,
}

impl From<BoundaryArg> for TimeField {
    fn from(arg: BoundaryArg) -> Self {
        match arg {
            BoundaryArg::Start => TimeField::Start,
            BoundaryArg::End => TimeField::End,
        }
    }
}

impl From<DirectionArg> for Nudge {
    fn from(arg: DirectionArg) -> Self {
        match arg {
            DirectionArg::Up => Nudge::Up,
            DirectionArg::Down => Nudge::Down,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let default_filter = if cli.verbose { "ytsub=debug" } else { "ytsub=info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .init();

    let config = match &cli.config {
        Some(path) => Config::load_from(path).with_context(|| format!("Failed to load {}", path.display()))?,
        None => Config::load()?,
    };
    if let Err(e) = config.validate() {
        error!("❌ {}", e);
        std::process::exit(1);
    }
    debug!("{}", config.summary());

    let storage = FileStorage::new(&config.storage.data_dir);
    let key = config.storage.storage_key.as_str();
    let mut store = SessionStore::load_from(&storage, key, config.editor.session_max_age_ms()).await?;

    let expired = store.cleanup_expired();
    if expired > 0 {
        store.save_to(&storage, key).await?;
    }

    match cli.command {
        Commands::Fetch { url, lang } => {
            let client = CaptionClient::new(config.captions.clone())?;
            let data = match client.fetch_captions(&url, lang.as_deref()).await {
                Ok(data) => data,
                Err(e) => bail!(e.user_message()),
            };

            let session_id = generate_session_id();
            let session = store.add_session(session_id.clone(), data, url);
            info!("✅ Session {} - \"{}\" ({} cues)", session.id, session.title(), session.subtitles().len());
            store.save_to(&storage, key).await?;
            println!("{}", session_id);
        }

        Commands::List => {
            let sessions = store.list_sessions();
            if sessions.is_empty() {
                info!("📭 No sessions found");
                return Ok(());
            }

            info!("📚 Found {} sessions:", sessions.len());
            for session in sessions {
                let created = Utc
                    .timestamp_millis_opt(session.metadata.created_at)
                    .single()
                    .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| "unknown".to_string());
                println!(
                    "{}  {}  {:>4} cues  {}  {}",
                    session.id,
                    session.video_id(),
                    session.subtitles().len(),
                    created,
                    session.title()
                );
            }
        }

        Commands::Show { session, check } => {
            let session_id = resolve_session(&store, &session)?;
            let session = store
                .get_session(&session_id)
                .ok_or_else(|| anyhow!("Session {} not found", session_id))?;

            println!("{} ({})", session.title(), watch_url(session.video_id()));
            print_cues(session.subtitles());

            if check {
                let issues = session.subtitles().validate();
                if issues.is_empty() {
                    info!("✅ No timing or text issues");
                }
                for issue in issues {
                    warn!("⚠️ {}", issue);
                }
            }
        }

        Commands::Edit { session, action } => {
            let session_id = resolve_session(&store, &session)?;
            run_edit(&mut store, &session_id, action, config.editor.nudge_step_ms)?;
            store.save_to(&storage, key).await?;
        }

        Commands::Interactive { session } => {
            let session_id = resolve_session(&store, &session)?;
            run_interactive(&mut store, &storage, key, &session_id, &config).await?;
        }

        Commands::Export {
            session,
            format,
            lang,
            output,
        } => {
            let session_id = resolve_session(&store, &session)?;
            let session = store
                .get_session(&session_id)
                .ok_or_else(|| anyhow!("Session {} not found", session_id))?;

            let exporter = SubtitleExporter::new(&session.data);
            tokio::fs::create_dir_all(&output).await?;
            let path = output.join(exporter.file_name(format, &lang));
            exporter.save_to_file(&path, format).await?;
            info!("📄 Exported {} ({}) to {}", session.title(), format.description(), path.display());
        }

        Commands::Import {
            file,
            video,
            title,
            session,
        } => {
            let video_id = require_video_id(&video).map_err(|e| anyhow!(e.user_message()))?;
            let cues = import_file(&file).await?;

            match session {
                Some(session) => {
                    let session_id = resolve_session(&store, &session)?;
                    store.replace_subtitles(&session_id, cues);
                    info!("🔄 Replaced cues of session {}", session_id);
                }
                None => {
                    let title = title.unwrap_or_else(|| file_stem(&file));
                    let data = CaptionData {
                        video_id: video_id.clone(),
                        title,
                        duration: cues.total_duration_ms() as f64 / 1000.0,
                        thumbnail: String::new(),
                        subtitles: cues,
                    };
                    let session_id = generate_session_id();
                    store.add_session(session_id.clone(), data, watch_url(&video_id));
                    println!("{}", session_id);
                }
            }
            store.save_to(&storage, key).await?;
        }

        Commands::Preview {
            session,
            cue,
            from,
            repeat,
            limit,
        } => {
            let session_id = resolve_session(&store, &session)?;
            let session = store
                .get_session(&session_id)
                .ok_or_else(|| anyhow!("Session {} not found", session_id))?;
            let from_ms = from.as_deref().map(parse_time_strict).transpose()?;
            run_preview(
                &session.data,
                cue.as_deref(),
                from_ms,
                repeat,
                limit,
                Duration::from_millis(config.editor.frame_interval_ms),
            )
            .await?;
        }

        Commands::Cleanup => {
            // Expiry runs on every load; this just reports it
            let stats = store.stats(Utc::now().timestamp_millis());
            info!(
                "🧹 Removed {} expired sessions, {} remain ({} cues)",
                expired, stats.total_sessions, stats.total_cues
            );
        }

        Commands::Remove { session } => {
            let session_id = resolve_session(&store, &session)?;
            if store.remove_session(&session_id).is_some() {
                store.save_to(&storage, key).await?;
            }
        }

        Commands::Config { init } => {
            println!("{}", config.summary());
            if let Some(path) = init {
                config.save(&path)?;
            }
        }
    }

    Ok(())
}

/// Accept a full session id or an unambiguous prefix of one
fn resolve_session(store: &SessionStore, input: &str) -> Result<String> {
    if store.contains(input) {
        return Ok(input.to_string());
    }

    let matches: Vec<&str> = store
        .list_sessions()
        .into_iter()
        .map(|session| session.id.as_str())
        .filter(|id| id.starts_with(input))
        .collect();

    match matches.as_slice() {
        [id] => Ok(id.to_string()),
        [] => bail!("No session matches {}", input),
        _ => bail!("{} matches {} sessions, use a longer prefix", input, matches.len()),
    }
}

fn print_cues(cues: &CueList) {
    for cue in cues {
        println!(
            "{:>4}  {}  {} --> {}  {}",
            cue.index,
            cue.id,
            format_time(cue.start_time),
            format_time(cue.end_time),
            cue.text
        );
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "Imported subtitles".to_string())
}

fn run_edit(store: &mut SessionStore, session_id: &str, action: EditAction, default_step: u64) -> Result<()> {
    match action {
        EditAction::Update { cue, start, end, text } => {
            let patch = CuePatch {
                start_time: start.as_deref().map(parse_time_strict).transpose()?,
                end_time: end.as_deref().map(parse_time_strict).transpose()?,
                text,
            };
            if patch.is_empty() {
                bail!("Nothing to update, pass --start, --end or --text");
            }
            if !store.update_cue(session_id, &cue, patch) {
                bail!("Cue {} not found", cue);
            }
            info!("✏️ Updated cue {}", cue);
        }
        EditAction::InsertBefore { cue } => {
            let new_id = store
                .insert_before(session_id, &cue)
                .ok_or_else(|| anyhow!("Cue {} not found", cue))?;
            println!("{}", new_id);
        }
        EditAction::InsertAfter { cue } => {
            let new_id = store
                .insert_after(session_id, &cue)
                .ok_or_else(|| anyhow!("Cue {} not found", cue))?;
            println!("{}", new_id);
        }
        EditAction::Duplicate { cue } => {
            let new_id = store
                .duplicate_line(session_id, &cue)
                .ok_or_else(|| anyhow!("Cue {} not found", cue))?;
            println!("{}", new_id);
        }
        EditAction::Delete { cue } => {
            let removed = store
                .delete_line(session_id, &cue)
                .ok_or_else(|| anyhow!("Cue {} not found", cue))?;
            info!("🗑️ Deleted cue \"{}\"", removed.text);
        }
        EditAction::Nudge {
            cue,
            field,
            direction,
            step,
        } => {
            let value = store
                .nudge(session_id, &cue, field.into(), direction.into(), step.unwrap_or(default_step))
                .ok_or_else(|| anyhow!("Cue {} not found", cue))?;
            println!("{}", format_time(value));
        }
    }
    Ok(())
}

/// Apply a committed field edit. Invalid time text is reported and dropped.
fn apply_edit(store: &mut SessionStore, session_id: &str, (cue_id, field): EditKey, raw: String) {
    match CuePatch::parse_field(field, &raw) {
        Ok(patch) => {
            if store.update_cue(session_id, &cue_id, patch) {
                info!("✏️ Committed {:?} of {}", field, cue_id);
            }
        }
        Err(e) => warn!("⚠️ {}", e.user_message()),
    }
}

async fn run_interactive(
    store: &mut SessionStore,
    storage: &FileStorage,
    key: &str,
    session_id: &str,
    config: &Config,
) -> Result<()> {
    let (edits, mut edit_commits) =
        Debouncer::<EditKey, String>::new(Duration::from_millis(config.editor.commit_debounce_ms));
    let (search, mut search_commits) =
        Debouncer::<(), String>::new(Duration::from_millis(config.editor.search_debounce_ms));

    println!("Commands: <cue-id> start|end|text <value>, :find <text>, :before|:after|:dup|:del <cue-id>, :show, :save, :quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
                match command {
                    ":quit" | ":q" => break,
                    ":save" | ":w" => {
                        edits.flush();
                        while let Ok((edit_key, raw)) = edit_commits.try_recv() {
                            apply_edit(store, session_id, edit_key, raw);
                        }
                        store.save_to(storage, key).await?;
                        info!("💾 Saved");
                    }
                    ":show" => {
                        if let Some(session) = store.get_session(session_id) {
                            print_cues(session.subtitles());
                        }
                    }
                    ":find" => search.schedule((), rest.to_string()),
                    ":before" => report_new_cue(store.insert_before(session_id, rest.trim())),
                    ":after" => report_new_cue(store.insert_after(session_id, rest.trim())),
                    ":dup" => report_new_cue(store.duplicate_line(session_id, rest.trim())),
                    ":del" => {
                        if let Some(removed) = store.delete_line(session_id, rest.trim()) {
                            info!("🗑️ Deleted cue \"{}\"", removed.text);
                        }
                    }
                    cue_id => {
                        let Some((field, value)) = rest.split_once(' ').or(Some((rest, ""))).filter(|(f, _)| !f.is_empty()) else {
                            warn!("Expected: <cue-id> start|end|text <value>");
                            continue;
                        };
                        match field.parse::<CueField>() {
                            Ok(field) => edits.schedule((cue_id.to_string(), field), value.to_string()),
                            Err(e) => warn!("{}", e),
                        }
                    }
                }
            }
            Some((edit_key, raw)) = edit_commits.recv() => {
                apply_edit(store, session_id, edit_key, raw);
            }
            Some(((), query)) = search_commits.recv() => {
                if let Some(session) = store.get_session(session_id) {
                    let query = query.to_lowercase();
                    let matching: Vec<_> = session
                        .subtitles()
                        .iter()
                        .filter(|cue| cue.text.to_lowercase().contains(&query))
                        .collect();
                    info!("🔍 {} cues match \"{}\"", matching.len(), query);
                    for cue in matching {
                        println!("{:>4}  {}  {}  {}", cue.index, cue.id, format_time(cue.start_time), cue.text);
                    }
                }
            }
        }
    }

    // Commit whatever was still waiting on the idle timer
    edits.flush();
    search.cancel_all();
    while let Ok((edit_key, raw)) = edit_commits.try_recv() {
        apply_edit(store, session_id, edit_key, raw);
    }
    store.save_to(storage, key).await?;
    info!("💾 Session {} saved", session_id);
    Ok(())
}

fn report_new_cue(new_id: Option<String>) {
    if let Some(id) = new_id {
        println!("{}", id);
    }
}

async fn run_preview(
    data: &CaptionData,
    cue_id: Option<&str>,
    from_ms: Option<u64>,
    repeat: bool,
    limit_seconds: Option<u64>,
    frame_interval: Duration,
) -> Result<()> {
    let duration = if data.duration > 0.0 {
        data.duration
    } else {
        data.subtitles.total_duration_ms() as f64 / 1000.0
    };

    let player = Arc::new(SimulatedPlayer::new(duration));
    let (_cues_tx, cues_rx) = watch::channel(data.subtitles.clone());
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut tracker = SubtitleTracker::new(player.clone(), cues_rx, tx, frame_interval);
    let mut segment = SegmentPlayer::new(player.clone(), frame_interval);
    tracker.set_repeat(repeat);

    match cue_id {
        Some(cue_id) => {
            let cue = data
                .subtitles
                .find(cue_id)
                .cloned()
                .ok_or_else(|| anyhow!("Cue {} not found", cue_id))?;
            tracker.select(&cue);
            if repeat {
                tracker.play();
            } else {
                segment.play_segment(cue.start_time, cue.end_time);
                tracker.on_state_change(player.state());
            }
        }
        None => {
            if let Some(from_ms) = from_ms {
                player.seek_to(from_ms as f64 / 1000.0);
            }
            tracker.play();
        }
    }

    info!("▶️ Previewing \"{}\" ({})", data.title, format_clock((duration * 1000.0) as u64));
    let limit = async move {
        match limit_seconds {
            Some(seconds) => tokio::time::sleep(Duration::from_secs(seconds)).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(limit);

    loop {
        tokio::select! {
            biased;

            Some(cue) = rx.recv() => {
                println!("[{}] {}", format_clock(cue.start_time), cue.text);
            }
            _ = tracker.finished() => break,
            _ = &mut limit => {
                info!("⏹️ Preview limit reached");
                break;
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    segment.cancel();
    tracker.stop();
    Ok(())
}
