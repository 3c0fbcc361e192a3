//! Application entry point for the voice-trigger daemon.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load and validate [`AppConfig`] (defaults on first run).
//! 3. Create the [`tokio`] runtime.
//! 4. Load the Whisper model (fatal on failure).
//! 5. Load the command catalog (fatal when empty or unreadable).
//! 6. Connect the control bus and build the dispatcher.
//! 7. Start cpal capture into the frame queue.
//! 8. Run the pipeline worker until Ctrl-C or a stream error closes the queue.

use std::sync::Arc;

use anyhow::Context;
use voice_trigger::{
    audio::{Acknowledge, AudioCapture, BeepTone, FrameQueue, Silent},
    commands::{
        ActionDispatcher, ActionTable, CommandCatalog, CommandMatcher, ControlBus, LoggingBus,
        MqttBus, ProcessRunner,
    },
    config::{AppConfig, AppPaths},
    pipeline::{CommandProcessor, PipelineRunner},
    stt::{TranscribeParams, WhisperEngine},
};

fn main() -> anyhow::Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("voice-trigger starting up");

    // 2. Configuration
    let paths = AppPaths::new();
    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e:#}); using defaults");
        AppConfig::default()
    });
    config.validate().context("invalid configuration")?;

    // 3. Tokio runtime
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    // 4. Whisper: one model, two decoding setups
    let model_path = config.stt.resolve_model_path(&paths);
    let wake_engine = WhisperEngine::load(
        &model_path,
        config.stt.use_gpu,
        TranscribeParams::with_beam(config.stt.language.clone(), config.stt.wake_beam_size),
    )
    .with_context(|| format!("failed to load Whisper model {}", model_path.display()))?;
    let command_engine = wake_engine.with_params(TranscribeParams::with_beam(
        config.stt.language.clone(),
        config.stt.command_beam_size,
    ));

    // 5. Command catalog
    let catalog_path = config.commands.resolve_catalog_path(&paths);
    let catalog = CommandCatalog::load(&catalog_path)
        .with_context(|| format!("failed to load command catalog {}", catalog_path.display()))?;

    // 6. Control bus + dispatcher
    let bus: Arc<dyn ControlBus> = if config.bus.enabled {
        rt.block_on(async { Arc::new(MqttBus::connect(&config.bus)) as Arc<dyn ControlBus> })
    } else {
        log::info!("bus: disabled, actions will only be logged");
        Arc::new(LoggingBus)
    };
    let table = ActionTable::from_rules(&config.actions);
    log::info!("dispatch: {} local action(s) allow-listed", table.len());
    let dispatcher = ActionDispatcher::new(
        bus,
        Arc::new(ProcessRunner),
        table,
        config.bus.topic_prefix.clone(),
    );

    let processor = CommandProcessor::new(
        Arc::new(command_engine),
        CommandMatcher::new(Arc::new(catalog), config.commands.cutoff),
        dispatcher,
        config.wake.phrase.clone(),
    );

    let acknowledge: Arc<dyn Acknowledge> = if config.audio.acknowledge {
        Arc::new(BeepTone::default())
    } else {
        Arc::new(Silent)
    };

    let queue = Arc::new(FrameQueue::new(config.audio.queue_capacity));
    let runner = PipelineRunner::new(&config, Arc::clone(&queue), Arc::new(wake_engine), processor)
        .with_acknowledge(acknowledge);

    // 7. Audio capture
    let capture = AudioCapture::new(config.audio.input_device.as_deref())
        .context("audio capture unavailable")?;
    let _stream = capture
        .start(
            Arc::clone(&queue),
            config.audio.sample_rate,
            config.audio.frame_samples(),
        )
        .context("failed to start audio capture")?;

    // 8. Shutdown on Ctrl-C, then run the worker on this thread.
    let shutdown_queue = Arc::clone(&queue);
    rt.spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                log::info!("Ctrl-C received, shutting down");
                shutdown_queue.close();
            }
            Err(e) => log::error!("failed to listen for Ctrl-C: {e}"),
        }
    });

    rt.block_on(runner.run());
    log::info!("voice-trigger stopped");
    Ok(())
}
