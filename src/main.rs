use std::time::Duration;

use clap::Parser;
use questline::{config::Policy, db::Db, generator::OpenAiGenerator, names, router, AppState};

#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// SQLite database URL.
    #[arg(long, env, default_value = "sqlite://questline.db")]
    database_url: String,

    /// The address to bind to.
    #[arg(short, long, env, default_value = "127.0.0.1:1414")]
    address: String,

    /// OpenAI API key used for roadmap generation.
    #[arg(long, env, hide_env_values = true)]
    openai_api_key: String,

    #[arg(long, env, default_value = "gpt-4o-mini")]
    openai_model: String,

    /// Fraction of correct answers needed to pass a quiz.
    #[arg(long, env, default_value_t = names::DEFAULT_PASS_THRESHOLD)]
    pass_threshold: f64,

    /// XP for levels whose roadmap does not set one.
    #[arg(long, env, default_value_t = names::DEFAULT_XP_REWARD)]
    default_xp_reward: i64,

    /// How long leaderboard reads may be cached; 0 disables the cache.
    #[arg(long, env, default_value_t = names::DEFAULT_LEADERBOARD_TTL_SECS)]
    leaderboard_ttl_secs: u64,

    #[arg(long, env, default_value_t = names::DEFAULT_LEADERBOARD_SIZE)]
    leaderboard_size: i64,
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "tracing=info,tower_http=info,questline=debug".to_owned());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_span_events(tracing_subscriber::fmt::format::FmtSpan::CLOSE)
        .init();

    let args = Args::parse();

    let policy = Policy::new(
        args.pass_threshold,
        args.default_xp_reward,
        Duration::from_secs(args.leaderboard_ttl_secs),
        args.leaderboard_size,
    )?;

    let db = Db::new(&args.database_url).await?;
    let generator = OpenAiGenerator::new(args.openai_api_key, args.openai_model);
    let app = router(AppState::new(db, generator, policy));

    let address = args.address.parse::<std::net::SocketAddr>()?;
    let listener = tokio::net::TcpListener::bind(address).await?;
    tracing::info!("questline {} listening on {address}", names::VERSION);
    axum::serve(listener, app).await?;

    Ok(())
}
