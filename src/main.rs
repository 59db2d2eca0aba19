#[tokio::main]
async fn main() {
    if let Err(e) = tabbycare_lib::run().await {
        eprintln!("tabbycare: {e}");
        std::process::exit(1);
    }
}
