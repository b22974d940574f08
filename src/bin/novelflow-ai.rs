//! Operator CLI: inspect the configured providers and run one-off completions.

use std::collections::HashMap;
use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use futures_util::StreamExt;

use novelflow_ai::http::reqwest::default_dyn_transport;
use novelflow_ai::logging::init_logging;
use novelflow_ai::{
    AiError, AuthoringService, CompletionRequest, Output, ProviderManager, ResponseFormat,
    Settings, TemplateRegistry,
};

/// NovelFlow AI provider layer
#[derive(Parser)]
#[command(name = "novelflow-ai")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List registered providers; the first one is the default
    Providers,

    /// List built-in prompt templates and their variables
    Templates,

    /// Run a single completion
    Complete(CompleteArgs),

    /// Stream a completion to stdout
    Stream(GenerationArgs),

    /// Chat with an authoring role
    RoleChat {
        /// Role id, e.g. `plot_weaver` (default: inspiration_collector)
        #[arg(long)]
        role: Option<String>,
        message: String,
    },
}

#[derive(Args)]
struct GenerationArgs {
    /// Prompt text; ignored when --template is given
    prompt: Option<String>,

    /// Fill this built-in template instead of using a literal prompt
    #[arg(long)]
    template: Option<String>,

    /// Template variable as key=value; repeatable
    #[arg(long = "var", value_parser = parse_var)]
    vars: Vec<(String, String)>,

    #[arg(long)]
    provider: Option<String>,

    #[arg(long)]
    model: Option<String>,

    #[arg(long)]
    system: Option<String>,

    #[arg(long)]
    temperature: Option<f32>,

    #[arg(long)]
    max_tokens: Option<u32>,
}

#[derive(Args)]
struct CompleteArgs {
    #[command(flatten)]
    generation: GenerationArgs,

    /// Ask for JSON output and print the parsed payload
    #[arg(long)]
    json: bool,
}

fn parse_var(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(key, value)| (key.trim().to_string(), value.to_string()))
        .filter(|(key, _)| !key.is_empty())
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), AiError> {
    let settings = Settings::load()?;
    init_logging(&settings.logging());

    let templates = Arc::new(TemplateRegistry::builtin());

    match cli.command {
        Command::Templates => {
            for id in templates.template_ids() {
                println!("{id}: {}", templates.template_variables(id)?.join(", "));
            }
        }
        Command::Providers => {
            let manager = connect(&settings)?;
            for name in manager.providers() {
                let marker = if name == manager.default_provider() {
                    " (default)"
                } else {
                    ""
                };
                println!("{name}{marker}");
            }
        }
        Command::Complete(args) => {
            let format = if args.json {
                ResponseFormat::Json
            } else {
                ResponseFormat::Text
            };
            let generation = args.generation;
            let request = build_request(&generation, &templates)?.with_response_format(format);
            let result = connect(&settings)?
                .complete(generation.provider.as_deref(), request)
                .await?;
            match result.output() {
                Output::Parsed(value) => println!(
                    "{}",
                    serde_json::to_string_pretty(value).unwrap_or_else(|_| result.text.clone())
                ),
                Output::Raw(text) => println!("{text}"),
            }
            eprintln!(
                "[{} / {}] input={:?} output={:?}",
                result.metadata.provider,
                result.metadata.model,
                result.metadata.usage.input_tokens,
                result.metadata.usage.output_tokens
            );
        }
        Command::Stream(args) => {
            let request = build_request(&args, &templates)?;
            let mut stream = connect(&settings)?
                .stream(args.provider.as_deref(), request)
                .await?;
            let mut stdout = std::io::stdout();
            while let Some(chunk) = stream.next().await {
                print!("{}", chunk?);
                stdout.flush().ok();
            }
            println!();
        }
        Command::RoleChat { role, message } => {
            let service = AuthoringService::new(connect(&settings)?, templates);
            let reply = service.role_chat(role.as_deref(), &message).await?;
            println!("[{}] {}", reply.role, reply.result.text);
        }
    }

    Ok(())
}

/// Builds the HTTP client and the provider registry; only commands that call
/// a vendor need them.
fn connect(settings: &Settings) -> Result<Arc<ProviderManager>, AiError> {
    let transport =
        default_dyn_transport().map_err(|err| AiError::config("http_client", err.to_string()))?;
    Ok(Arc::new(ProviderManager::from_settings(settings, transport)?))
}

fn build_request(
    args: &GenerationArgs,
    templates: &TemplateRegistry,
) -> Result<CompletionRequest, AiError> {
    let prompt = match (&args.template, &args.prompt) {
        (Some(template_id), _) => {
            let variables: HashMap<String, String> = args.vars.iter().cloned().collect();
            templates.fill_template(template_id, &variables)?
        }
        (None, Some(prompt)) => prompt.clone(),
        (None, None) => {
            return Err(AiError::validation(
                "either a prompt or --template is required",
            ));
        }
    };

    let mut request = CompletionRequest::new(prompt);
    request.options.system_prompt = args.system.clone();
    request.options.model = args.model.clone();
    request.options.temperature = args.temperature;
    request.options.max_tokens = args.max_tokens;
    Ok(request)
}
