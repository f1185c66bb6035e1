//! guidance-session binary entry point.

use std::process::ExitCode;
use std::sync::Arc;

use guidance_session::api::{AssetResolver, ScriptedAssetResolver, ScriptedStepService, StepService};
use guidance_session::cli::{self, Args};
use guidance_session::{logging, Config, InvalidationBus, SessionController, TerminalDriver};
use tokio::io::BufReader;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> ExitCode {
    let args = match cli::parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("error: {}", e);
            eprintln!("Run with --help for usage.");
            return ExitCode::from(2);
        }
    };

    if args.help {
        cli::print_help();
        return ExitCode::SUCCESS;
    }
    if args.version {
        cli::print_version();
        return ExitCode::SUCCESS;
    }

    let config = match Config::load(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = logging::init_with_filter(config.log_filter()) {
        eprintln!("warning: logging not initialized: {}", e);
    }
    info!("guidance-session v{}", env!("CARGO_PKG_VERSION"));

    match run(&args, &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "session ended with an error");
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: &Args, config: &Config) -> guidance_session::Result<()> {
    let (service, resolver) = if args.demo {
        info!("using the built-in demo questionnaire");
        let service: Arc<dyn StepService> = Arc::new(ScriptedStepService::demo());
        let resolver: Arc<dyn AssetResolver> = Arc::new(ScriptedAssetResolver::new());
        (service, resolver)
    } else {
        let http = Arc::new(config.to_http_service()?);
        info!(api = %http.base_url(), "using remote step service");
        let service: Arc<dyn StepService> = http.clone();
        let resolver: Arc<dyn AssetResolver> = http;
        (service, resolver)
    };

    let bus = InvalidationBus::new();
    let mut events = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    info!(topic = ?event.topic, session = ?event.session_id, "views invalidated")
                }
                Err(RecvError::Lagged(missed)) => warn!(missed, "invalidation listener lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let controller =
        SessionController::new(service, config.build_prefetcher(resolver)).with_invalidation_bus(bus);
    let mut driver = TerminalDriver::new(
        controller,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
    );

    tokio::select! {
        result = driver.run() => result?,
        _ = tokio::signal::ctrl_c() => info!("interrupted"),
    }

    driver.finish();
    Ok(())
}
