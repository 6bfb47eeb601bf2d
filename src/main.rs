use clap::Parser;

use yield_router::config::Env;
use yield_router::setup_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let ctx = Env::parse().into_ctx()?;
    setup_tracing(&ctx.log_level);

    yield_router::launch(ctx).await
}
