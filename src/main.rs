use directory_client::app::SampleRunner;
use directory_client::config::cli::{Mode, AUTHENTICATE_BANNER, HELP_MSG, RUN_BANNER};
use directory_client::utils::error::DirectoryError;
use directory_client::utils::{logger, validation::Validate};
use directory_client::{CliConfig, DirectoryUserService, Settings};

#[tokio::main]
async fn main() {
    let config = match CliConfig::try_parse_args(std::env::args()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e.kind());
            println!("{}", HELP_MSG);
            std::process::exit(1);
        }
    };

    if config.mode() == Mode::Help {
        println!("{}", HELP_MSG);
        std::process::exit(1);
    }

    let settings = match Settings::load(config.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("❌ {}", e.user_friendly_message());
            std::process::exit(exit_code(&e));
        }
    };

    // 初始化日誌
    logger::init_cli_logger(config.verbose, settings.application.log_format);

    tracing::info!("Starting directory-samples");
    if config.verbose {
        tracing::debug!("CLI config: {:?}", config);
    }

    // 驗證配置
    if let Err(e) = settings.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(exit_code(&e));
    }

    let result = match config.mode() {
        Mode::Authenticate => authenticate(&settings).await,
        Mode::Run => run(&settings).await,
        Mode::Help => unreachable!("help handled before logger initialization"),
    };

    if let Err(e) = result {
        tracing::error!("❌ {} (Severity: {:?})", e, e.severity());
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 {}", e.recovery_suggestion());
        std::process::exit(exit_code(&e));
    }
}

async fn authenticate(settings: &Settings) -> Result<(), DirectoryError> {
    println!("{}", AUTHENTICATE_BANNER);
    settings.authorizer()?.authorize().await?;
    Ok(())
}

async fn run(settings: &Settings) -> Result<(), DirectoryError> {
    println!("{}", RUN_BANNER);

    let authorizer = settings.authorizer()?;
    let service = DirectoryUserService::connect(&authorizer, &settings.service_settings()).await?;

    let stdout = std::io::stdout();
    let mut runner = SampleRunner::new(&service, &settings.samples, stdout.lock());
    runner.run().await
}

fn exit_code(e: &DirectoryError) -> i32 {
    e.severity().exit_code()
}
