use receiver::{
    ReceiverConfig, ReceiverRuntime, serve_http_with_axum,
    transport::{
        CLEAR_MESSAGES_PATH, COLLECTIONS_BATCH_PATH, COMPONENTS_PATH, RECEIVED_BATCH_MESSAGES_PATH,
        RECEIVED_MESSAGES_PATH, UP_PATH,
    },
};
use tracing_subscriber::EnvFilter;

fn main() {
    init_tracing();

    let config = match ReceiverConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            println!("{err}");
            std::process::exit(1);
        }
    };

    let bind_addr = config.bind_addr();
    tracing::info!(
        op = "receiver.start",
        port = config.port,
        users = config.tokens.user_count(),
        message_limit = config.message_limit.get(),
        "starting telemetry receiver"
    );
    for path in [
        COMPONENTS_PATH,
        COLLECTIONS_BATCH_PATH,
        RECEIVED_MESSAGES_PATH,
        RECEIVED_BATCH_MESSAGES_PATH,
        CLEAR_MESSAGES_PATH,
        UP_PATH,
    ] {
        tracing::info!(op = "receiver.start.route", path, "serving endpoint");
    }

    let runtime = ReceiverRuntime::from_config(&config);
    if let Err(err) = serve_http_with_axum(runtime, bind_addr, config.http_workers) {
        println!("{err}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
