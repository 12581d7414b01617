use std::net::SocketAddr;

use tokio::net::TcpListener;

use coedit::config::Config;
use coedit::state::AppState;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "coedit=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env();
    print_banner(&config);

    let (state, dispatcher) = AppState::new(&config);
    tokio::spawn(dispatcher.run());

    let app = coedit::routes::router(state);

    let listener = TcpListener::bind(("0.0.0.0", config.port))
        .await
        .expect("failed to bind");

    let actual_port = listener
        .local_addr()
        .expect("failed to get local address")
        .port();
    eprintln!("  \x1b[32m→ listening on 0.0.0.0:{actual_port}\x1b[0m");
    eprintln!();

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("server error");
}

fn print_banner(config: &Config) {
    let version = env!("CARGO_PKG_VERSION");
    let session = &config.session;
    let heartbeat = match (session.heartbeat_interval, session.idle_timeout) {
        (Some(ping), Some(idle)) => format!("ping {}s, idle {}s", ping.as_secs(), idle.as_secs()),
        (Some(ping), None) => format!("ping {}s, no idle timeout", ping.as_secs()),
        (None, Some(idle)) => format!("no ping, idle {}s", idle.as_secs()),
        (None, None) => "off".to_string(),
    };

    eprintln!();
    eprintln!("  \x1b[1;36mcoedit\x1b[0m \x1b[2mv{version}\x1b[0m");
    eprintln!();
    eprintln!("  \x1b[2mport\x1b[0m         {}", config.port);
    eprintln!("  \x1b[2mstatic\x1b[0m       {}", config.static_dir.display());
    eprintln!("  \x1b[2mqueue\x1b[0m        {}", session.queue_capacity);
    eprintln!("  \x1b[2mdispatch\x1b[0m     {}", config.dispatch_capacity);
    eprintln!("  \x1b[2mpacing\x1b[0m       {}ms", session.write_pacing.as_millis());
    eprintln!("  \x1b[2mheartbeat\x1b[0m    {heartbeat}");
    eprintln!();
}
