use std::{process, sync::Arc};

use chatlens::{
    application::{
        annotate::{self, Classifier},
        debugger::Debugger,
        error::AppError,
        preferences::{PreferenceStore, Preferences},
        remote::RemoteService,
        template_config,
    },
    config::{self, AnnotateArgs, ListArgs, ListTarget, RenderArgs, TemplateArgs, WatchArgs},
    domain::{segment::RenderResult, vocabulary::TokenVocabulary},
    infra::{
        http::HttpRemote,
        store::{JsonFileStore, MemoryStore},
        telemetry,
    },
    presentation::terminal::{TerminalView, format_segments},
};
use chatlens_api_types::RenderRequest;
use tokio::io::AsyncReadExt;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt()
        .with_max_level(Level::ERROR)
        .with_writer(std::io::stderr)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match cli_args.command {
        config::Command::Watch(args) => run_watch(settings, *args).await,
        config::Command::Render(args) => run_render(settings, args).await,
        config::Command::List(args) => run_list(settings, args).await,
        config::Command::Annotate(args) => run_annotate(args).await,
        config::Command::Template(args) => run_template(settings, args),
    }
}

fn connect(settings: &config::Settings) -> Result<HttpRemote, AppError> {
    let remote = HttpRemote::new(
        settings.remote.base_url.as_str(),
        settings.remote.request_timeout,
    )?;
    Ok(remote)
}

async fn run_watch(settings: config::Settings, args: WatchArgs) -> Result<(), AppError> {
    let remote = Arc::new(connect(&settings)?);

    let store: Box<dyn PreferenceStore> = if args.ephemeral {
        Box::new(MemoryStore::default())
    } else {
        Box::new(JsonFileStore::open(&settings.state.path)?)
    };
    let mut preferences = Preferences::new(store);
    if let Some(file) = args.file.as_deref() {
        preferences.save_current_file(Some(file));
    }
    if let Some(test_case) = args.test_case.as_deref() {
        preferences.save_test_case(test_case);
    }

    info!(
        target = "chatlens::watch",
        server = %remote.base(),
        state = %settings.state.path.display(),
        ephemeral = args.ephemeral,
        "watching templates"
    );

    let mut debugger = Debugger::new(remote, preferences, settings.remote.reconnect_delay);
    let mut view = TerminalView::new(std::io::stdout(), args.format);
    debugger.run(&mut view, shutdown_signal()).await;
    Ok(())
}

async fn run_render(settings: config::Settings, args: RenderArgs) -> Result<(), AppError> {
    let remote = connect(&settings)?;
    let request = RenderRequest {
        filepath: args.file,
        test_case: args.test_case,
        add_generation_prompt: args.add_generation_prompt,
        add_system_prompt: args.add_system_prompt,
    };

    let (update, vocabulary) = tokio::join!(remote.render(&request), remote.fetch_vocabulary());
    let vocabulary = match vocabulary {
        Ok(tokens) => TokenVocabulary::from(tokens),
        Err(err) => {
            warn!(
                target = "chatlens::render",
                error = %err,
                "vocabulary unavailable, annotating without tokens"
            );
            TokenVocabulary::new()
        }
    };

    match RenderResult::from(update?) {
        RenderResult::Success { content } => {
            let segments = annotate::classify(&content, &vocabulary);
            print_output(&format_segments(&segments, args.format));
            Ok(())
        }
        RenderResult::Failure { error } => Err(AppError::Render(error)),
    }
}

async fn run_list(settings: config::Settings, args: ListArgs) -> Result<(), AppError> {
    let remote = connect(&settings)?;
    let value = match args.target {
        ListTarget::Files => serde_json::to_value(remote.list_files().await?),
        ListTarget::TestCases => serde_json::to_value(remote.list_test_cases().await?),
        ListTarget::Tokens => serde_json::to_value(remote.fetch_vocabulary().await?),
    }
    .map_err(|err| AppError::unexpected(err.to_string()))?;

    let encoded =
        serde_json::to_string_pretty(&value).map_err(|err| AppError::unexpected(err.to_string()))?;
    print_output(&encoded);
    Ok(())
}

async fn run_annotate(args: AnnotateArgs) -> Result<(), AppError> {
    let content = match args.input.as_ref() {
        Some(path) => tokio::fs::read_to_string(path).await?,
        None => {
            let mut buffer = String::new();
            tokio::io::stdin().read_to_string(&mut buffer).await?;
            buffer
        }
    };

    let vocabulary = match args.vocabulary.as_ref() {
        Some(path) => {
            let raw = tokio::fs::read_to_string(path).await?;
            serde_json::from_str::<TokenVocabulary>(&raw).map_err(|err| {
                AppError::validation(format!("invalid vocabulary {}: {err}", path.display()))
            })?
        }
        None => TokenVocabulary::new(),
    };

    let mut classifier = Classifier::new(&vocabulary)?;
    for pattern in &args.markers {
        classifier = classifier.with_marker_pattern(pattern)?;
    }

    let segments = classifier.classify(&content);
    print_output(&format_segments(&segments, args.format));
    Ok(())
}

fn run_template(settings: config::Settings, args: TemplateArgs) -> Result<(), AppError> {
    match args.command {
        config::TemplateCommand::Extract(extract) => {
            let written = template_config::extract(
                &extract.config,
                extract.output.as_deref(),
                &settings.templates.directory,
            )?;
            println!("Template extracted to {}", written.display());
        }
        config::TemplateCommand::Inject(inject) => {
            template_config::inject(&inject.template, &inject.config)?;
            println!("Template injected into {}", inject.config.display());
        }
    }
    Ok(())
}

fn print_output(text: &str) {
    if text.ends_with('\n') {
        print!("{text}");
    } else {
        println!("{text}");
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(
            target = "chatlens::watch",
            error = %err,
            "failed to listen for ctrl-c; running until killed"
        );
        std::future::pending::<()>().await;
    }
}
