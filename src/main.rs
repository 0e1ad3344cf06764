mod cli;

use clap::Parser;
use log::{info, warn};

use cli::{Cli, Command};
use text_to_video::config::{Config, LoggingConfig};
use text_to_video::inference::{InferenceError, API_KEY_ENV};
use text_to_video::library::VideoLibrary;
use text_to_video::logging;
use text_to_video::pipeline::{GenerationReport, Pipeline, VideoGenerationError};
use text_to_video::request::GenerationRequest;
use text_to_video::scratch::cleanup_directory;

/// Load .env file before reading configuration.
///
/// Does not override existing environment variables.
fn load_env() {
    // dotenv::dotenv() returns Err if .env doesn't exist, which is fine
    let _ = dotenv::dotenv();
}

/// Install the logger. `RUST_LOG` wins over `-v`, which wins over the config file.
fn init_logging(cli: &Cli, settings: &LoggingConfig) {
    let default_level = cli.verbosity_level().unwrap_or(settings.level.as_str());

    if let Err(e) = logging::init(default_level, settings.dir.as_deref()) {
        warn!("Could not open log file, logging to stderr only: {}", e);
    }
}

fn main() {
    load_env();

    let cli = Cli::parse();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&cli, &config.logging);

    let result = match cli.command {
        Command::Generate {
            ref prompt,
            duration,
            fps,
            json,
        } => run_generate(&config, GenerationRequest::new(prompt.clone(), duration, fps), json),
        Command::List => run_list(&config),
        Command::Locate { ref filename } => run_locate(&config, filename),
        Command::Clean => run_clean(&config),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Run the full pipeline for one prompt and print where the video went.
fn run_generate(config: &Config, request: GenerationRequest, json: bool) -> Result<(), String> {
    request.validate(&config.limits).map_err(|e| e.to_string())?;

    let pipeline = Pipeline::from_config(config).map_err(|e| match e {
        VideoGenerationError::Inference(InferenceError::MissingApiKey) => format!(
            "{API_KEY_ENV} is not set.\n\n\
            Add your API key to a .env file:\n    \
                echo '{API_KEY_ENV}=hf_your_key_here' >> .env\n\n\
            or set `api_key` under [inference] in the config file."
        ),
        other => other.to_string(),
    })?;

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| format!("Failed to create async runtime: {}", e))?;

    info!(
        "Received request to generate video for prompt: {}",
        request.prompt
    );
    let report = rt
        .block_on(pipeline.run(&request))
        .map_err(|e| e.to_string())?;

    print_report(&report, json)
}

fn print_report(report: &GenerationReport, json: bool) -> Result<(), String> {
    if report.is_degraded() {
        warn!(
            "Video was produced with losses: {} key frame(s) failed, {} transition(s) skipped, {} frame(s) unreadable",
            report.frame_failures.len(),
            report.transition_failures.len(),
            report.skipped_frames.len()
        );
    }

    if json {
        let body = serde_json::to_string_pretty(&report.response())
            .map_err(|e| format!("Failed to serialize response: {}", e))?;
        println!("{}", body);
    } else {
        println!("Video generated successfully");
        println!("  File:         {}", report.artifact.path.display());
        println!("  Download URL: {}", report.response().download_url);
        println!(
            "  Frames:       {} encoded from {} key frames",
            report.frames_encoded, report.key_frames_produced
        );
    }
    Ok(())
}

fn run_list(config: &Config) -> Result<(), String> {
    let library = VideoLibrary::new(&config.storage.videos_dir);
    let videos = library.list().map_err(|e| e.to_string())?;

    if videos.is_empty() {
        println!("No videos in {}", library.dir().display());
    } else {
        for video in videos {
            println!("{}", video);
        }
    }
    Ok(())
}

fn run_locate(config: &Config, filename: &str) -> Result<(), String> {
    let library = VideoLibrary::new(&config.storage.videos_dir);
    let path = library.resolve(filename).map_err(|e| e.to_string())?;
    println!("{}", path.display());
    Ok(())
}

fn run_clean(config: &Config) -> Result<(), String> {
    let frames_dir = &config.storage.frames_dir;
    let removed = cleanup_directory(frames_dir).map_err(|e| {
        format!(
            "Failed to clean scratch directory {}: {}",
            frames_dir.display(),
            e
        )
    })?;
    println!("Removed {} entries from {}", removed, frames_dir.display());
    Ok(())
}
