use anyhow::{Context, Result};
use avatar_stream::client::{ChannelHandler, ClientEvent, ClientSession};
use avatar_stream::engine::ConfiguredEngineFactory;
use avatar_stream::{AudioFile, Config};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "avatar-stream")]
#[command(about = "Stream speech audio to an avatar renderer and receive video frames")]
struct Cli {
    /// Config file, without extension
    #[arg(short, long, default_value = "config/avatar-stream")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the renderer server
    Serve {
        /// Bind address
        #[arg(long)]
        bind: Option<String>,

        /// Listen port
        #[arg(short, long)]
        port: Option<u16>,

        /// JPEG shown on every rendered frame
        #[arg(long)]
        image: Option<String>,

        /// Width of the image
        #[arg(long, requires = "image")]
        width: Option<u16>,

        /// Height of the image
        #[arg(long, requires = "image")]
        height: Option<u16>,
    },

    /// Stream a WAV file as one utterance and save the rendered frames
    Stream {
        /// WAV file to send
        wav: PathBuf,

        /// Server URL
        #[arg(long)]
        url: Option<String>,

        /// Where rendered JPEG frames are written
        #[arg(short, long, default_value = "./frames")]
        output_dir: String,

        /// Only count frames, do not write them
        #[arg(long)]
        no_save: bool,

        /// Send chunks as fast as possible instead of in real time
        #[arg(long)]
        no_pacing: bool,
    },

    /// Connect and send an interrupt
    Interrupt {
        /// Server URL
        #[arg(long)]
        url: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)?;

    info!("Avatar Stream v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Serve {
            bind,
            port,
            image,
            width,
            height,
        } => {
            let mut cfg = cfg;
            if let Some(bind) = bind {
                cfg.server.bind = bind;
            }
            if let Some(port) = port {
                cfg.server.port = port;
            }
            if let Some(image) = image {
                cfg.engine.image_path = Some(shellexpand::tilde(&image).into_owned());
            }
            if let Some(width) = width {
                cfg.engine.width = width;
            }
            if let Some(height) = height {
                cfg.engine.height = height;
            }
            serve(cfg).await
        }
        Command::Stream {
            wav,
            url,
            output_dir,
            no_save,
            no_pacing,
        } => {
            let output_dir = (!no_save).then(|| {
                let expanded = shellexpand::tilde(&output_dir);
                PathBuf::from(expanded.as_ref())
            });
            stream(cfg, &wav, url, output_dir, no_pacing).await
        }
        Command::Interrupt { url } => interrupt(cfg, url).await,
    }
}

async fn serve(cfg: Config) -> Result<()> {
    let engines = ConfiguredEngineFactory::new(cfg.engine.clone())
        .context("Failed to prepare render engine")?;
    info!("Render engine: {:?}", cfg.engine.kind);

    avatar_stream::http::serve(cfg.server, Arc::new(engines)).await
}

async fn stream(
    mut cfg: Config,
    wav: &Path,
    url: Option<String>,
    output_dir: Option<PathBuf>,
    no_pacing: bool,
) -> Result<()> {
    if let Some(url) = url {
        cfg.client.url = url;
    }
    if no_pacing {
        cfg.client.pacing = false;
    }

    let audio = AudioFile::open(wav)?;
    info!(
        "Loaded {}: {:.1}s, {} Hz, {} channel(s)",
        audio.path, audio.duration_seconds, audio.sample_rate, audio.channels
    );
    let pcm = audio.to_pcm16_mono(cfg.client.sample_rate)?;

    if let Some(dir) = &output_dir {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        info!("Saving frames to {}", dir.display());
    }

    let (handler, mut events) = ChannelHandler::new();
    let mut session = ClientSession::connect(&cfg.client.url, &cfg.client, handler).await?;

    if let Some(mut statuses) = session.take_status_events() {
        tokio::spawn(async move {
            while let Some(status) = statuses.recv().await {
                info!(
                    "Server status [{}]: {}",
                    status.kind,
                    status.message.as_deref().unwrap_or("")
                );
            }
        });
    }

    tokio::select! {
        result = session.stream(&pcm) => result?,
        _ = tokio::signal::ctrl_c() => {
            warn!("Ctrl-C, interrupting");
            session.interrupt().await?;
            session.close().await?;
            return Ok(());
        }
    }

    // Wait for the rest of the utterance to render
    let read_timeout = cfg.client.read_timeout();
    let mut video_frames = 0usize;
    let mut audio_bytes = 0usize;
    loop {
        let event = match tokio::time::timeout(read_timeout, events.recv()).await {
            Ok(Some(event)) => event,
            Ok(None) => break,
            Err(_) => {
                warn!("No end-of-speech within {:?}", read_timeout);
                break;
            }
        };

        match event {
            ClientEvent::Video(frame) => {
                if let Some(dir) = &output_dir {
                    let path = dir.join(format!("frame_{:06}.jpg", video_frames));
                    tokio::fs::write(&path, &frame.jpeg)
                        .await
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                }
                video_frames += 1;
                if video_frames % 25 == 0 {
                    info!(
                        "Received {} frames ({}x{} @ {:.1} fps)",
                        video_frames, frame.width, frame.height, frame.fps
                    );
                }
            }
            ClientEvent::Audio(chunk) => audio_bytes += chunk.pcm.len(),
            ClientEvent::EndOfSpeech => {
                info!("End of speech");
                break;
            }
        }
    }

    session.close().await?;
    let stats = session.join().await?;

    info!(
        "Done: {} video frames, {} bytes of audio, {} chunks sent",
        video_frames, audio_bytes, stats.audio_chunks_sent
    );
    if stats.decode_errors > 0 {
        warn!("{} messages could not be decoded", stats.decode_errors);
    }

    Ok(())
}

async fn interrupt(cfg: Config, url: Option<String>) -> Result<()> {
    let url = url.unwrap_or_else(|| cfg.client.url.clone());

    let (handler, _events) = ChannelHandler::new();
    let session = ClientSession::connect(&url, &cfg.client, handler).await?;
    session.interrupt().await?;
    session.close().await?;
    session.join().await?;

    Ok(())
}
