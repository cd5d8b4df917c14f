//! invitel - referral ranks, milestone rewards and signup from the terminal.

use anyhow::Context;
use clap::{Parser, Subcommand};
use invitel::config::Config;
use invitel::ledger::SharedLedger;
use invitel::referral::{ReferralOutcome, Registrar};
use invitel::session::{Session, Settlement};
use invitel::store::{JsonFileStore, SnapshotStore};
use invitel_core::account::{NewAccount, UserAccount};
use invitel_core::leaderboard::{sample_board, Standings, Trend};
use invitel_core::milestones::{
    self, reward_status, RewardId, RewardKind, RewardStatus, CATALOG,
};
use invitel_core::rank::{self, PROFILE_LADDER};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "invitel")]
#[command(about = "Invitel referral network CLI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(flatten)]
    config: Config,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account and make it the active profile
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        /// Referral code of the account that invited you
        #[arg(long = "ref")]
        referral: Option<String>,
    },
    /// Show the active profile with its rank and impact
    Profile,
    /// Show which profile rank a friend count earns
    Rank {
        friends: u64,
    },
    /// List milestone rewards and their status
    Milestones,
    /// Claim an unlocked reward
    Redeem {
        reward: u32,
    },
    /// Show the current standings
    Leaderboard {
        #[arg(long)]
        json: bool,
    },
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(&cli.config.log_filter)?;

    match cli.command {
        Commands::Register {
            name,
            email,
            password,
            referral,
        } => register_cmd(
            &cli.config,
            NewAccount {
                name,
                email,
                password,
            },
            referral.as_deref(),
        ),
        Commands::Profile => profile_cmd(&cli.config),
        Commands::Rank { friends } => {
            rank_cmd(friends);
            Ok(())
        }
        Commands::Milestones => milestones_cmd(&cli.config),
        Commands::Redeem { reward } => redeem_cmd(&cli.config, RewardId(reward)),
        Commands::Leaderboard { json } => leaderboard_cmd(&cli.config, json),
    }
}

fn init_tracing(filter: &str) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_new(filter)
        .with_context(|| format!("invalid log filter {filter:?}"))?;
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()?;
    Ok(())
}

fn open_ledger(config: &Config) -> anyhow::Result<SharedLedger> {
    let state = config
        .ledger_file()
        .load()
        .context("loading account ledger")?;
    Ok(SharedLedger::new(state))
}

fn active_profile(
    profiles: &JsonFileStore,
    ledger: &SharedLedger,
) -> anyhow::Result<UserAccount> {
    Session::new(profiles, ledger)
        .active_profile()
        .context("loading active profile")
}

fn register_cmd(config: &Config, input: NewAccount, referral: Option<&str>) -> anyhow::Result<()> {
    let ledger = open_ledger(config)?;
    let referral_config = config.referral();
    let registration = Registrar::new(&referral_config, &ledger).register(
        &input,
        referral,
        &mut rand::thread_rng(),
        chrono::Local::now().date_naive(),
    )?;

    config.ledger_file().save(&ledger.snapshot())?;
    config.profile_store().save(&registration.account)?;

    let account = &registration.account;
    println!("Welcome, {}!", account.name);
    println!("  account:        {}", account.id);
    println!("  referral code:  {}", account.referral_code);
    println!("  joined:         {}", account.joined_label());
    match &registration.referral {
        ReferralOutcome::NotRequested => {}
        ReferralOutcome::Credited { .. } => println!(
            "  invitation accepted: your inviter earns {} XP",
            referral_config.bonus_xp
        ),
        ReferralOutcome::Ignored { code } => {
            println!("  referral code {code} was not recognised; signup completed anyway")
        }
    }
    Ok(())
}

fn profile_cmd(config: &Config) -> anyhow::Result<()> {
    let ledger = open_ledger(config)?;
    let account = active_profile(&config.profile_store(), &ledger)?;
    let tier = account.rank();

    println!("{} ({})", account.name, account.email);
    println!("  {} · joined {}", account.location, account.joined_label());
    println!("  rank:        {} {}", tier.name, tier.color);
    println!("  multiplier:  {}x", tier.multiplier());
    println!("  perk:        {}", tier.perk);
    if let Some(next) = PROFILE_LADDER.next_tier(account.friends_invited) {
        println!(
            "  next rank:   {} in {} more invite(s)",
            next.tier.name, next.remaining
        );
    }
    println!("  invited:     {}", account.friends_invited);
    println!("  donated:     ₹{}", account.total_donations);
    println!("  ad spend saved: ₹{}", account.ad_spend_saved());
    println!("  verified receipts: {}", account.verified_receipts());
    println!("  XP:          {}", account.xp);
    println!("  referral code: {}", account.referral_code);

    let vault = account.vault();
    println!("SECURE VAULT ({} item(s))", vault.len());
    for reward in vault {
        let kind = match reward.kind {
            RewardKind::QrCode => "qr",
            RewardKind::PointsGrant { .. } => "points",
            RewardKind::Certificate => "certificate",
            RewardKind::LockedPhysical => "physical",
        };
        println!("  {:>3}  {:<30} {kind}", reward.id.0, reward.title);
    }
    Ok(())
}

fn rank_cmd(friends: u64) {
    let tier = rank::rank_for(friends);
    println!(
        "{friends} friend(s) → {} ({}x, {})",
        tier.name,
        tier.multiplier(),
        tier.perk
    );
}

fn milestones_cmd(config: &Config) -> anyhow::Result<()> {
    let ledger = open_ledger(config)?;
    let account = active_profile(&config.profile_store(), &ledger)?;
    println!("YOU HAVE: {} XP", account.xp);
    for view in reward_status(&CATALOG, account.xp, &account.redeemed) {
        let status = match view.status {
            RewardStatus::Locked => format!("locked ({} XP needed)", view.xp_needed),
            RewardStatus::Unlocked => "unlocked".to_string(),
            RewardStatus::Claimed => "claimed".to_string(),
        };
        println!(
            "  {:>3}  {:<30} {:>5} XP  {}",
            view.reward.id.0, view.reward.title, view.reward.target, status
        );
    }
    Ok(())
}

fn redeem_cmd(config: &Config, reward_id: RewardId) -> anyhow::Result<()> {
    let reward = milestones::find(&CATALOG, reward_id)?;
    let ledger = open_ledger(config)?;
    let profiles = config.profile_store();
    let claim = Session::new(&profiles, &ledger).redeem(reward)?;
    if claim.settled == Settlement::Ledger {
        config.ledger_file().save(&ledger.snapshot())?;
    }
    let (account, redemption) = (&claim.account, &claim.redemption);

    println!("Redeemed {}", reward.title);
    if redemption.xp_after != redemption.xp_before {
        println!(
            "  +{} XP ({} → {})",
            redemption.xp_after - redemption.xp_before,
            redemption.xp_before,
            redemption.xp_after
        );
    }
    if let Some(voucher) = redemption.voucher(account.referral_code.as_str()) {
        println!("  voucher: {voucher}");
    }
    Ok(())
}

fn leaderboard_cmd(config: &Config, json: bool) -> anyhow::Result<()> {
    let ledger = open_ledger(config)?;
    let account = active_profile(&config.profile_store(), &ledger)?;
    let mut entries = sample_board();
    for entry in entries.iter_mut().filter(|e| e.is_current_user) {
        entry.points = account.xp;
    }
    let standings = Standings::from_entries(entries);

    if json {
        println!("{}", serde_json::to_string_pretty(&standings)?);
        return Ok(());
    }
    for row in standings.rows() {
        let trend = match row.entry.trend {
            Trend::Up => "▲",
            Trend::Down => "▼",
            Trend::Same => "=",
        };
        let marker = if row.entry.is_current_user { "*" } else { " " };
        println!(
            "{marker}#{:<2} {:<22} {:>6}  {:<10} {trend}",
            row.position, row.entry.name, row.entry.points, row.tier
        );
    }
    Ok(())
}
