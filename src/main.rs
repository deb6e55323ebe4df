#[tokio::main]
async fn main() {
    if let Err(err) = restgate::mcp::server::run_stdio().await {
        eprintln!("restgate: {}", err);
        std::process::exit(1);
    }
}
