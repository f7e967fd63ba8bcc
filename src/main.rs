#[tokio::main]
async fn main() {
    marketplace_notifier::boot::boot().await;
}
