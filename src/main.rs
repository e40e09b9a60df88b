use clap::{Arg, ArgAction, Command};
use email_responder::clipboard::ClipboardAdapter;
use email_responder::config::Config;
use email_responder::controller::GenerationController;
use email_responder::feedback::CopyFeedback;
use email_responder::llm_generator::build_generator;
use email_responder::request::{GenerationRequest, Tone};
use email_responder::server::{self, RelayState};
use email_responder::validation::Validator;
use std::io::Read;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("email_responder=info,tower_http=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let matches = Command::new("responder")
        .about("Draft a reply to an email you received, in the tone you choose")
        .arg(Arg::new("name")
            .long("name")
            .help("Your name, used to sign the reply")
            .value_name("NAME"))
        .arg(Arg::new("sender")
            .long("sender")
            .help("Name of the person who sent the email")
            .value_name("NAME"))
        .arg(Arg::new("tone")
            .long("tone")
            .help("professional, friendly, formal or casual")
            .default_value("professional"))
        .arg(Arg::new("context")
            .long("context")
            .help("Extra context for the reply")
            .value_name("TEXT"))
        .arg(Arg::new("email-file")
            .long("email-file")
            .help("File holding the received email (reads stdin when absent)")
            .value_name("PATH"))
        .arg(Arg::new("relay")
            .long("relay")
            .help("Generate through a relay at this URL instead of calling the API directly")
            .value_name("URL"))
        .arg(Arg::new("copy")
            .long("copy")
            .help("Copy the generated reply to the clipboard")
            .action(ArgAction::SetTrue))
        .arg(Arg::new("serve")
            .long("serve")
            .help("Run the relay server")
            .action(ArgAction::SetTrue))
        .arg(Arg::new("port")
            .long("port")
            .help("Port for --serve")
            .value_parser(clap::value_parser!(u16)))
        .arg(Arg::new("set-api-key")
            .long("set-api-key")
            .help("Set the Anthropic API key")
            .value_name("API_KEY")
            .num_args(1))
        .arg(Arg::new("config")
            .long("config")
            .help("Show configuration information")
            .action(ArgAction::SetTrue))
        .get_matches();

    // Handle configuration commands
    if let Some(api_key) = matches.get_one::<String>("set-api-key") {
        let mut config = Config::load()?;
        config.set_api_key(api_key.clone())?;
        println!("✅ API key saved successfully");
        return Ok(());
    }

    if matches.get_flag("config") {
        Config::show_config_info()?;
        return Ok(());
    }

    let relay = matches.get_one::<String>("relay").map(String::as_str);
    let config = Config::load()?;
    let settings = match relay {
        Some(_) if !matches.get_flag("serve") => config.validate_for_relay()?,
        _ => config.validate()?,
    };
    let validator = Validator::new(settings.max_email_length);

    if matches.get_flag("serve") {
        let port = matches.get_one::<u16>("port").copied().unwrap_or(settings.port);
        let state = RelayState {
            generator: Arc::from(build_generator(&settings, None)),
            validator,
        };
        return server::serve(state, port).await;
    }

    let received_email = match matches.get_one::<String>("email-file") {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let mut buffer = String::new();
            std::io::stdin().read_to_string(&mut buffer)?;
            buffer
        }
    };

    let arg = |name: &str| matches.get_one::<String>(name).cloned().unwrap_or_default();
    let request = GenerationRequest::new(
        arg("name"),
        arg("sender"),
        received_email,
        Tone::parse_or_default(&arg("tone")),
    )
    .with_context(arg("context"));

    let generator = build_generator(&settings, relay);
    let mut controller = GenerationController::new(generator, validator);

    if let Err(errors) = controller.submit(request).await {
        for (field, message) in errors.iter() {
            eprintln!("❌ {}: {}", field.as_str(), message);
        }
        std::process::exit(2);
    }

    let state = controller.state();
    if let Some(err) = state.error {
        eprintln!("❌ {}", err.message);
        info!("Generation failed with kind {}", err.kind);
        std::process::exit(1);
    }

    println!("{}", state.response);

    if matches.get_flag("copy") {
        let mut feedback = CopyFeedback::new(Arc::new(ClipboardAdapter::for_exiting_process()));
        feedback.copy_to_clipboard(&state.response).await;
        match feedback.error() {
            Some(error) => eprintln!("⚠️  {}", error),
            None => eprintln!("📋 Copied to clipboard"),
        }
    }

    Ok(())
}
