#[tokio::main]
async fn main() {
    std::process::exit(flowmcp_cli::run().await);
}
