use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("translation_session_lib=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = translation_session_lib::run().await {
        tracing::error!(error = %e, "translation session exited with error");
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
