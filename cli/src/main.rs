mod store;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use shaker_core::ai::{AiConfig, OpenAiTextClient};
use shaker_core::imaging::OpenAiImageClient;
use shaker_core::records;
use shaker_core::{
    CocktailPipeline, CreationContext, CreationOptions, CreationResponse, ImageRef,
    PipelineConfig, Services, SurveyAnswer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

use crate::store::{
    DirObjectStore, FileEventStore, FilePromptStore, FileRecordStore, FileSurveyStore,
};

#[derive(Parser)]
#[command(name = "shaker")]
#[command(about = "Create personalized cocktails", long_about = None)]
struct Cli {
    /// Directory for records, images, events, surveys and prompt templates
    #[arg(long, global = true, env = "SHAKER_DATA_DIR", default_value = "shaker-data")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a cocktail and print the result as JSON
    Create {
        /// Something that happened to you recently
        #[arg(long, default_value = "")]
        recent_event: String,
        #[arg(long, default_value = "")]
        career: String,
        #[arg(long, default_value = "")]
        hobby: String,
        /// Display name to store with the cocktail
        #[arg(long)]
        name: Option<String>,
        /// Image style hint, e.g. "watercolor"
        #[arg(long)]
        style: Option<String>,
        /// Event name; created on first use
        #[arg(long)]
        event: Option<String>,
        #[arg(long)]
        event_id: Option<Uuid>,
        /// Recipe prompt template id
        #[arg(long)]
        recipe_prompt: Option<Uuid>,
        /// Image prompt template id
        #[arg(long)]
        image_prompt: Option<Uuid>,
        /// JSON file with survey answers for the event's active survey
        #[arg(long)]
        answers_file: Option<PathBuf>,
        /// Do not keep personal context in the stored record
        #[arg(long)]
        forget_me: bool,
        /// Return the image inline instead of writing it to the data directory
        #[arg(long)]
        no_storage: bool,
        /// Also write the finished PNG here
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Show a stored cocktail by its order code
    Show { code: String },
    /// Confirm the copyright check for a cocktail
    ConfirmCopyright { id: Uuid },
    /// Show whether a cocktail's copyright check was confirmed
    CopyrightStatus { id: Uuid },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Create {
            recent_event,
            career,
            hobby,
            name,
            style,
            event,
            event_id,
            recipe_prompt,
            image_prompt,
            answers_file,
            forget_me,
            no_storage,
            out,
        } => {
            let survey_answers = match answers_file {
                Some(path) => read_json::<Vec<SurveyAnswer>>(&path)?,
                None => Vec::new(),
            };

            let ctx = CreationContext {
                recent_event,
                career,
                hobby,
                display_name: name,
                style_hint: style,
                recipe_prompt_id: recipe_prompt,
                image_prompt_id: image_prompt,
                event_id,
                event_name: event,
                survey_answers,
            };
            let options = CreationOptions {
                retain_personal_context: !forget_me,
                use_object_storage: !no_storage,
            };

            create(&cli.data_dir, ctx, options, out.as_deref()).await?;
        }
        Commands::Show { code } => {
            let records = FileRecordStore::open(&cli.data_dir.join("records"))?;
            match records::find_by_order_code(&records, &code).await? {
                Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
                None => bail!("No cocktail with order code {}", code.trim()),
            }
        }
        Commands::ConfirmCopyright { id } => {
            let records = FileRecordStore::open(&cli.data_dir.join("records"))?;
            let status = records::confirm_copyright(&records, id, Utc::now()).await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Commands::CopyrightStatus { id } => {
            let records = FileRecordStore::open(&cli.data_dir.join("records"))?;
            let status = records::copyright_status(&records, id).await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
    }

    Ok(())
}

async fn create(
    data_dir: &Path,
    ctx: CreationContext,
    options: CreationOptions,
    out: Option<&Path>,
) -> Result<()> {
    let config = PipelineConfig::from_env()?;
    let ai = AiConfig::from_env()?;

    let objects = Arc::new(DirObjectStore::open(&data_dir.join("objects"))?);

    let services = Services {
        records: Arc::new(FileRecordStore::open(&data_dir.join("records"))?),
        objects: objects.clone(),
        events: Arc::new(FileEventStore::open(data_dir)?),
        prompts: Arc::new(FilePromptStore::open(data_dir)?),
        surveys: Arc::new(FileSurveyStore::open(data_dir)?),
        text: Arc::new(OpenAiTextClient::new(&ai, config.text_timeout)?),
        images: Arc::new(OpenAiImageClient::new(&ai, config.image_timeout)?),
    };

    let pipeline = CocktailPipeline::from_config(services, config)
        .context("Failed to load pipeline data files")?;

    let result = pipeline.create(&ctx, options).await;
    println!(
        "{}",
        serde_json::to_string_pretty(&CreationResponse::from_result(&result))?
    );

    let created = result?;
    if let Some(out) = out {
        let png = match &created.image {
            ImageRef::Embedded { png } => png.clone(),
            ImageRef::Stored { .. } => {
                let key = shaker_core::imaging::image_key(created.id);
                std::fs::read(objects.path_for(&key))
                    .with_context(|| format!("Failed to read stored image {}", key))?
            }
        };
        std::fs::write(out, png)
            .with_context(|| format!("Failed to write {}", out.display()))?;
        tracing::info!(path = %out.display(), "Wrote cocktail image");
    }

    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}
