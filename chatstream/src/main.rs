#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

mod args;

use std::io::Write;

use anyhow::Context as _;
use args::Args;
use chatstream_config::Config;
use chatstream_llm::{
    CompletionRequest, LanguageModel, LanguageModelOption, Post, TextStreamEvent, TokenUsage, build_language_model,
    with_model, with_reasoning_disabled,
};
use clap::Parser;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = Config::load(&args.config)?;
    let _telemetry_guard = chatstream_telemetry::init(config.telemetry.as_ref(), &args.log)?;

    let (name, provider_config) = config
        .llm
        .provider(args.provider.as_deref())
        .with_context(|| format!("provider '{}' is not configured", args.provider.as_deref().unwrap_or("default")))?;

    tracing::info!(provider = %name, config_path = %args.config.display(), "starting chatstream");

    let model = build_language_model(name, provider_config).await?;

    if args.list_models {
        for info in model.list_models().await? {
            println!("{}\t{}", info.id, info.display_name);
        }
        return Ok(());
    }

    let shutdown = CancellationToken::new();
    let shutdown_clone = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, cancelling");
            shutdown_clone.cancel();
        }
    });

    stream_answer(model.as_ref(), &args, &shutdown).await
}

/// Stream the answer to stdout and reasoning to stderr
async fn stream_answer(model: &dyn LanguageModel, args: &Args, shutdown: &CancellationToken) -> anyhow::Result<()> {
    let mut posts = Vec::new();
    if let Some(system) = &args.system {
        posts.push(Post::system(system.as_str()));
    }
    posts.push(Post::user(args.prompt.join(" ")));

    let mut options: Vec<LanguageModelOption> = Vec::new();
    if let Some(model) = &args.model {
        options.push(with_model(model.as_str()));
    }
    if args.no_reasoning {
        options.push(with_reasoning_disabled());
    }

    let mut result = model.chat_completion(CompletionRequest::new(posts), options)?;
    let mut usage = TokenUsage::default();
    let mut stdout = std::io::stdout().lock();
    let mut interrupted = false;

    loop {
        let event = tokio::select! {
            () = shutdown.cancelled(), if !interrupted => {
                interrupted = true;
                result.cancel();
                continue;
            }
            event = result.recv() => event,
        };

        match event {
            Some(TextStreamEvent::Text(text)) => {
                write!(stdout, "{text}")?;
                stdout.flush()?;
            }
            Some(TextStreamEvent::Reasoning(text)) => eprint!("{text}"),
            Some(TextStreamEvent::ReasoningEnd(_)) => eprintln!(),
            Some(TextStreamEvent::ToolCalls(calls)) => {
                for call in calls {
                    eprintln!("[tool call] {}({})", call.name, call.arguments);
                }
            }
            Some(TextStreamEvent::Annotations(annotations)) => {
                for annotation in annotations {
                    eprintln!("[{}] {} <{}>", annotation.index, annotation.title, annotation.url);
                }
            }
            Some(TextStreamEvent::Usage(turn)) => {
                usage.input_tokens += turn.input_tokens;
                usage.output_tokens += turn.output_tokens;
            }
            Some(TextStreamEvent::Error(e)) => {
                writeln!(stdout)?;
                return Err(e.into());
            }
            Some(TextStreamEvent::End) | None => break,
        }
    }

    writeln!(stdout)?;
    if !usage.is_empty() {
        eprintln!("tokens: {} in, {} out", usage.input_tokens, usage.output_tokens);
    }

    Ok(())
}
