use amishell::{
    AppResult,
    cli::Cli,
    config::Config,
    console::ConsoleError,
    init_logging,
    shell::{self, InteractiveShell, LineReader, ShellSettings},
};
use colored::Colorize;

#[tokio::main]
async fn main() -> AppResult<()> {
    let cli = Cli::parse_args();

    let code = run(cli).await?;

    // Exit without joining the stdin reader, which may be parked in a blocking read.
    std::process::exit(code);
}

async fn run(cli: Cli) -> AppResult<i32> {
    // Load configuration, CLI flags win
    let (mut config, config_error) = match Config::load(&cli.config_file) {
        Ok(config) => (config, None),
        Err(err) => (Config::from_env(), Some(err)),
    };
    cli.apply_to(&mut config);

    // Initialize logging
    let _log_guard = init_logging(
        &cli.effective_log_level(&config),
        config.log.file_path.as_deref(),
    )?;

    if let Some(err) = config_error {
        tracing::warn!("Failed to load config: {:#}, using defaults", err);
    }
    tracing::debug!("CLI arguments: {:?}", cli);

    if let Err(err) = config.validate() {
        eprintln!("{} {:#}", "amishell:".red(), err);
        return Ok(1);
    }

    let mut session = shell::build_session(&config);

    let result = match cli.command_line() {
        Some(command_line) => {
            let mut stdout = tokio::io::stdout();
            shell::run_command(&mut session, &config, &command_line, &mut stdout)
                .await
                .map(|_| ())
        }
        None => {
            let shell = InteractiveShell::new(
                session,
                ShellSettings::from_config(&config),
                tokio::io::stdout(),
            );
            let lines = LineReader::stdin(shell.gate());
            shell.run(lines).await.map(|_| ())
        }
    };

    match result {
        Ok(()) => Ok(0),
        Err(err) => Ok(report_failure(&err)),
    }
}

fn report_failure(err: &ConsoleError) -> i32 {
    if err.is_connection_error() {
        eprintln!("{}", "[Communication with Amiga emulator failed]".red());
    }
    eprintln!("{}", err);
    1
}
