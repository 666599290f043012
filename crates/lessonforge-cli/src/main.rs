mod config;
mod generate_cmd;
mod normalize_cmd;
mod prompt_cmd;
#[cfg(test)]
mod test_util;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use lessonforge_core::orchestrator::Strategy;
use lessonforge_core::plan::{FunctionType, GenerationRequest};
use lessonforge_core::prompt::PromptPart;

use config::{CliOverrides, LessonforgeConfig};

#[derive(Parser)]
#[command(name = "lessonforge", about = "Bilingual lesson-plan generator")]
struct Cli {
    /// Model API base URL (overrides LESSONFORGE_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Model identifier (overrides LESSONFORGE_MODEL)
    #[arg(long, global = true)]
    model: Option<String>,

    /// Per-call timeout in seconds (overrides LESSONFORGE_TIMEOUT_SECS)
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Use the built-in fixture instead of calling the model
    #[arg(long, global = true)]
    offline: bool,

    /// Generation strategy: segmented or monolithic
    #[arg(long, global = true)]
    strategy: Option<Strategy>,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            api_url: self.api_url.clone(),
            model: self.model.clone(),
            timeout_secs: self.timeout,
            offline: self.offline,
            strategy: self.strategy,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Write a lessonforge config file from --api-url and --model
    Init {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Generate a lesson plan and print it as JSON
    Generate {
        #[command(flatten)]
        request: RequestArgs,
        /// Print response text to stderr as it arrives
        #[arg(long)]
        stream: bool,
        /// Write the plan to this file (or into this directory) instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Normalize a saved raw model response into a plan
    Normalize {
        /// File holding the raw response text
        file: PathBuf,
        /// Validate against the activity step window
        #[arg(long)]
        activity: bool,
        /// Accept partial plans
        #[arg(long)]
        relaxed: bool,
    },
    /// Print the prompt that would be sent to the model
    Prompt {
        #[command(flatten)]
        request: RequestArgs,
        /// Which prompt: full, meta, or procedures
        #[arg(long, default_value = "full")]
        segment: PromptPart,
    },
}

/// Request parameters shared by `generate` and `prompt`.
#[derive(Args, Debug, Clone)]
pub struct RequestArgs {
    /// Lesson topic
    #[arg(long)]
    topic: String,
    /// Grade level, e.g. "Grade 3"
    #[arg(long, default_value = "")]
    grade: String,
    /// Total duration in minutes
    #[arg(long, default_value_t = GenerationRequest::DEFAULT_DURATION)]
    duration: u32,
    /// Teaching method, e.g. "task-based"
    #[arg(long, default_value = "")]
    method: String,
    /// Vocabulary hint (repeatable)
    #[arg(long = "vocab")]
    vocabulary: Vec<String>,
    /// Sentence-pattern hint (repeatable)
    #[arg(long = "sentence")]
    sentences: Vec<String>,
    /// Grammar hint (repeatable)
    #[arg(long)]
    grammar: Vec<String>,
    /// Generate a short classroom activity instead of a full lesson
    #[arg(long)]
    activity: bool,
    /// Skip the step-count check
    #[arg(long)]
    allow_sparse: bool,
}

impl RequestArgs {
    pub fn to_request(&self) -> GenerationRequest {
        let function_type = if self.activity {
            FunctionType::Activity
        } else {
            FunctionType::Lesson
        };
        GenerationRequest {
            vocabulary: self.vocabulary.clone(),
            sentences: self.sentences.clone(),
            grammar: self.grammar.clone(),
            allow_sparse: self.allow_sparse,
            ..GenerationRequest::new(self.topic.clone())
                .with_grade(self.grade.clone())
                .with_duration(self.duration)
                .with_teaching_method(self.method.clone())
                .with_function_type(function_type)
        }
    }
}

/// Execute the `lessonforge init` command: write config file.
fn cmd_init(cli: &Cli, force: bool) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let cfg = config::ConfigFile {
        model: config::ModelSection {
            api_url: Some(
                cli.api_url
                    .clone()
                    .unwrap_or_else(|| config::DEFAULT_API_URL.to_string()),
            ),
            name: cli.model.clone(),
            timeout_secs: cli.timeout,
            offline: cli.offline.then_some(true),
            ..config::ModelSection::default()
        },
        generation: config::GenerationSection {
            strategy: cli.strategy,
        },
    };

    config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    println!(
        "  model.api_url = {}",
        cfg.model.api_url.as_deref().unwrap_or_default()
    );
    if let Some(name) = &cfg.model.name {
        println!("  model.name = {name}");
    }
    println!();
    println!(
        "Set {} (or add model.api_key to the file) before running `lessonforge generate`.",
        config::ENV_API_KEY
    );

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Init { force } => {
            cmd_init(&cli, *force)?;
        }
        Commands::Generate {
            request,
            stream,
            output,
        } => {
            let resolved = LessonforgeConfig::resolve(&cli.overrides())?;
            generate_cmd::run_generate(&resolved, &request.to_request(), *stream, output.as_deref())
                .await?;
        }
        Commands::Normalize {
            file,
            activity,
            relaxed,
        } => {
            normalize_cmd::run_normalize(file, *activity, *relaxed)?;
        }
        Commands::Prompt { request, segment } => {
            let resolved = LessonforgeConfig::resolve(&cli.overrides())?;
            prompt_cmd::run_prompt(&resolved, &request.to_request(), *segment);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn request_args_build_the_request() {
        let cli = Cli::try_parse_from([
            "lessonforge",
            "generate",
            "--topic",
            "Weather",
            "--grade",
            "Grade 3",
            "--vocab",
            "sunny",
            "--vocab",
            "rainy",
            "--activity",
            "--allow-sparse",
        ])
        .unwrap();
        let Commands::Generate { request, .. } = cli.command else {
            panic!("expected generate");
        };
        let req = request.to_request();
        assert_eq!(req.topic, "Weather");
        assert_eq!(req.grade, "Grade 3");
        assert_eq!(req.duration, GenerationRequest::DEFAULT_DURATION);
        assert_eq!(req.vocabulary, vec!["sunny", "rainy"]);
        assert_eq!(req.function_type, FunctionType::Activity);
        assert!(req.allow_sparse);
    }

    #[test]
    fn global_flags_reach_overrides() {
        let cli = Cli::try_parse_from([
            "lessonforge",
            "prompt",
            "--topic",
            "Food",
            "--segment",
            "meta",
            "--strategy",
            "monolithic",
            "--offline",
        ])
        .unwrap();
        let overrides = cli.overrides();
        assert!(overrides.offline);
        assert_eq!(overrides.strategy, Some(Strategy::Monolithic));
        assert!(matches!(
            cli.command,
            Commands::Prompt {
                segment: PromptPart::Meta,
                ..
            }
        ));
    }

    #[test]
    fn unknown_segment_is_rejected() {
        let result = Cli::try_parse_from(["lessonforge", "prompt", "--topic", "x", "--segment", "intro"]);
        assert!(result.is_err());
    }
}
