#[tokio::main]
async fn main() {
    if let Err(e) = chorus::cli::run().await {
        eprintln!("{e}");
        std::process::exit(1);
    }
}
