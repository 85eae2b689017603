use collector::runtime::{boot, serve};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    boot::init_logging();
    let (source, logs, config, root) = boot::boot().await?;
    serve::serve(source, logs, config, root).await
}
