use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use log::debug;
use model_studio_lib::config::{
    load_engine_config, ConfigError, ConfigKey, ConfigStore, FileConfigStore,
};
use model_studio_lib::models::Lifecycle;
use model_studio_lib::stores::{ModelStore, ModelTask, RunOutcome, VisionMode, Voice};
use model_studio_lib::{AppContext, Error};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "model-studio")]
#[command(about = "Run remote vision, speech, image and transcription models", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List active and warming remote models
    Status,

    /// Start a remote model
    Start {
        /// Engine id
        id: String,
    },

    /// Shut down a remote model
    Stop {
        /// Engine id
        id: String,
    },

    /// List the model engines available to this account
    Engines,

    /// Show the signed-in user
    Whoami,

    /// List projects
    Projects,

    /// List open insights
    Insights,

    /// Send a raw pixel command, e.g. `GetUserInfo();`
    Pixel {
        expression: String,
    },

    /// Store engine settings in the config file
    Configure(ConfigureArgs),

    /// Describe an image with the vision model
    Caption {
        /// Image URL, data URL or local file (defaults to a sample image)
        image: Option<String>,

        /// Task: caption, detailed-caption, od, ocr, ...
        #[arg(short, long, default_value = "caption")]
        mode: VisionMode,

        /// Phrase for grounding and segmentation modes
        #[arg(short, long)]
        text: Option<String>,
    },

    /// Turn text into speech
    Speak {
        text: String,

        #[arg(short, long, default_value = "af_heart")]
        voice: Voice,

        #[arg(short, long, default_value = "1.0")]
        speed: f64,

        /// WAV file to write
        #[arg(short, long, default_value = "speech.wav")]
        output: PathBuf,
    },

    /// Generate an image from a prompt
    Imagine {
        prompt: String,

        #[arg(long)]
        negative_prompt: Option<String>,

        #[arg(long, default_value = "512")]
        width: u32,

        #[arg(long, default_value = "512")]
        height: u32,

        #[arg(long, default_value = "30")]
        steps: u32,

        #[arg(long, default_value = "7.5")]
        guidance: f64,

        #[arg(long, default_value = "1")]
        images: u32,

        #[arg(long, conflicts_with = "random_seed")]
        seed: Option<u32>,

        #[arg(long)]
        random_seed: bool,

        /// Image file to write
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Upload an audio file and transcribe it
    Transcribe {
        file: PathBuf,
    },
}

#[derive(Args)]
struct ConfigureArgs {
    #[arg(long)]
    base_url: Option<String>,

    #[arg(long)]
    insight_id: Option<String>,

    #[arg(long)]
    vision_engine: Option<String>,

    #[arg(long)]
    speech_engine: Option<String>,

    #[arg(long)]
    image_engine: Option<String>,

    #[arg(long)]
    transcription_engine: Option<String>,

    /// Forget every stored setting
    #[arg(long)]
    reset: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    model_studio_lib::log::init();

    let cli = Cli::parse();

    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            debug!("Command failed: {:?}", e);
            eprintln!("Error: {}", e.user_message());
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands) -> Result<(), Error> {
    let store = FileConfigStore::open_default()?;

    let command = match command {
        Commands::Configure(args) => return cmd_configure(&store, args),
        other => other,
    };

    let context = AppContext::from_config(&load_engine_config(&store));

    match command {
        Commands::Configure(_) => {}
        Commands::Status => cmd_status(&context).await?,
        Commands::Start { id } => {
            context.models.start_model(&id).await?;
            println!("Starting {}", id);
        }
        Commands::Stop { id } => {
            context.models.stop_model(&id).await?;
            println!("Shutting down {}", id);
        }
        Commands::Engines => print_json(&context.engine.available_engines().await?),
        Commands::Whoami => print_json(&context.engine.user_info().await?),
        Commands::Projects => print_json(&context.engine.project_list().await?),
        Commands::Insights => print_json(&context.engine.open_insights().await?),
        Commands::Pixel { expression } => {
            let command = model_studio_pixel::parse(&expression)?;
            print_json(&context.engine.execute(&command).await?);
        }
        Commands::Caption { image, mode, text } => {
            cmd_caption(&context, image, mode, text).await?
        }
        Commands::Speak {
            text,
            voice,
            speed,
            output,
        } => cmd_speak(&context, text, voice, speed, &output).await?,
        Commands::Imagine {
            prompt,
            negative_prompt,
            width,
            height,
            steps,
            guidance,
            images,
            seed,
            random_seed,
            output,
        } => {
            let image = &context.image;
            image.set_prompt(prompt);
            if let Some(negative_prompt) = negative_prompt {
                image.set_negative_prompt(negative_prompt);
            }
            image.set_width(width);
            image.set_height(height);
            image.set_num_inference_steps(steps);
            image.set_guidance_scale(guidance);
            image.set_num_images(images);
            if random_seed {
                println!("Seed: {}", image.generate_random_seed());
            } else {
                image.set_seed(seed);
            }
            cmd_imagine(&context, output).await?
        }
        Commands::Transcribe { file } => {
            context.transcription.upload_audio(&file).await?;
            let transcript = finish(&context.transcription, context.transcription.run().await)?;
            println!("{}", transcript);
        }
    }

    Ok(())
}

fn cmd_configure(store: &FileConfigStore, args: ConfigureArgs) -> Result<(), Error> {
    if args.reset {
        store.delete(&ConfigKey::ENGINE)?;
        println!("Settings cleared ({})", store.path().display());
        return Ok(());
    }

    let mut config = load_engine_config(store);
    if let Some(base_url) = args.base_url {
        config.base_url = base_url;
    }
    if args.insight_id.is_some() {
        config.insight_id = args.insight_id;
    }
    if let Some(id) = args.vision_engine {
        config.engines.vision = id;
    }
    if let Some(id) = args.speech_engine {
        config.engines.speech = id;
    }
    if let Some(id) = args.image_engine {
        config.engines.image = id;
    }
    if args.transcription_engine.is_some() {
        config.engines.transcription = args.transcription_engine;
    }

    let shown = serde_json::to_value(&config).map_err(ConfigError::from)?;
    store.set(&ConfigKey::ENGINE, config)?;
    println!("Saved to {}", store.path().display());
    print_json(&shown);
    Ok(())
}

async fn cmd_status(context: &AppContext) -> Result<(), Error> {
    context.models.fetch_model_statuses().await?;
    let snapshot = context.models.snapshot();

    for (heading, models) in [("Active", &snapshot.active), ("Warming", &snapshot.warming)] {
        println!("{} ({}):", heading, models.len());
        for model in models {
            println!("  {:<40} {}", model.id, model.name);
        }
    }

    let selected = &snapshot.selected;
    let lifecycle = context.models.lifecycle_of(&selected.id);
    println!("Selected: {} [{}]", selected.name, lifecycle);
    if lifecycle == Lifecycle::Cold {
        println!("  start it with: model-studio start {}", selected.id);
    }
    Ok(())
}

async fn cmd_caption(
    context: &AppContext,
    image: Option<String>,
    mode: VisionMode,
    text: Option<String>,
) -> Result<(), Error> {
    let vision = &context.vision;
    vision.set_mode(mode);
    if let Some(text) = text {
        vision.set_additional_text(text);
    }
    match image {
        Some(source) if source.starts_with("data:") => vision.set_image_data(source),
        Some(source) if source.starts_with("http://") || source.starts_with("https://") => {
            vision.set_image_url(source)
        }
        Some(path) => vision.set_image_from_file(Path::new(&path)).await?,
        None => {}
    }

    let caption = finish(vision, vision.run().await)?;
    println!("{}", caption);
    Ok(())
}

async fn cmd_speak(
    context: &AppContext,
    text: String,
    voice: Voice,
    speed: f64,
    output: &Path,
) -> Result<(), Error> {
    let speech = &context.speech;
    speech.set_text(text);
    speech.set_voice(voice);
    speech.set_speed(speed);

    let result = finish(speech, speech.run().await)?;
    result.save(output).await?;

    match (result.duration_secs, result.sample_rate) {
        (Some(duration), Some(rate)) => {
            println!("Wrote {} ({:.2}s at {} Hz)", output.display(), duration, rate)
        }
        _ => println!("Wrote {}", output.display()),
    }
    Ok(())
}

async fn cmd_imagine(context: &AppContext, output: Option<PathBuf>) -> Result<(), Error> {
    let image = &context.image;
    let result = finish(image, image.run().await)?;
    let duration = image.formatted_generation_duration().unwrap_or_default();

    let Some(generated) = result.image else {
        println!("No image returned after {}", duration);
        print_json(&result.response);
        return Ok(());
    };

    let path = output.unwrap_or_else(|| {
        PathBuf::from(format!(
            "stable-diffusion-{}.png",
            chrono::Utc::now().timestamp_millis()
        ))
    });
    generated.save(&path).await?;

    match generated.dimensions {
        Some((width, height)) => {
            println!("Wrote {} ({}x{}) in {}", path.display(), width, height, duration)
        }
        None => println!("Wrote {} in {}", path.display(), duration),
    }
    Ok(())
}

/// Output of a finished run, or its stored error
fn finish<T: ModelTask>(store: &ModelStore<T>, outcome: RunOutcome) -> Result<T::Output, Error> {
    match (outcome, store.output()) {
        (RunOutcome::Succeeded, Some(output)) => Ok(output),
        _ => Err(Error::Failed(
            store
                .error()
                .unwrap_or_else(|| format!("Run ended as {:?}", outcome)),
        )),
    }
}

fn print_json(value: &Value) {
    match value {
        Value::String(text) => println!("{}", text),
        other => println!(
            "{}",
            serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string())
        ),
    }
}
