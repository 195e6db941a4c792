//! Compute the AND, XOR and OR of two private inputs.
//!
//! Run both parties in separate processes
//! ```text
//! cargo run --example two_party -- --role first --input 11
//! cargo run --example two_party -- --role second --input 6
//! ```
//! or within a single process by omitting `--role`. Both parties learn the outputs.
use anyhow::{Context, Result};
use bea91::channel::tcp::{self, TcpConfig};
use bea91::channel::{in_memory, Channel};
use bea91::config::{MtProviderKind, PartyConfig};
use bea91::{Bea91Party, BitVector, Role};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::{info, instrument};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
struct Args {
    /// Role of this party. If not provided, both parties will be run within this process.
    #[arg(long)]
    role: Option<Role>,

    /// Address the first party listens on and the second party connects to.
    #[arg(long, default_value = "127.0.0.1:7744")]
    address: SocketAddr,

    /// Party config in TOML format. The role is overwritten by `--role`.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Performs insecure setup by generating MTs from a fixed seed (no OTs)
    #[arg(long)]
    insecure_setup: bool,

    /// Private input of this party. The second party uses `input + 1` when both parties run
    /// in this process.
    #[arg(long, default_value = "11")]
    input: u64,

    #[arg(long, default_value = "4", value_parser = clap::value_parser!(u32).range(1..=64))]
    bits: u32,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => PartyConfig::load(path).context("failed to load party config")?,
        None => PartyConfig::default(),
    };
    if args.insecure_setup {
        config.mt_provider = MtProviderKind::Insecure;
    }

    match args.role {
        Some(role) => {
            config.role = role;
            let tcp_config = TcpConfig {
                own: role.party_id(),
                address: args.address,
                connect_timeout_secs: 30,
            };
            let channel = tcp::establish(&tcp_config)
                .await
                .context("failed to establish connection")?;
            run(&config, channel, args.input, args.bits).await?;
        }
        None => {
            let (ch1, ch2) = in_memory::new_pair();
            let second = PartyConfig {
                role: Role::Second,
                ..config.clone()
            };
            let first = PartyConfig {
                role: Role::First,
                ..config
            };
            tokio::try_join!(
                run(&first, ch1, args.input, args.bits),
                run(&second, ch2, args.input + 1, args.bits)
            )?;
        }
    }
    Ok(())
}

#[instrument(skip_all, fields(role = %config.role))]
async fn run(config: &PartyConfig, channel: Channel, input: u64, bits: u32) -> Result<()> {
    let bit_num = bits as usize;
    let mut party = Bea91Party::from_config(config, channel).context("failed to create party")?;
    party.init().await.context("failed to initialize party")?;

    let own_input = BitVector::from_bytes(
        bit_num,
        &(input & mask(bits)).to_le_bytes()[..bit_num.div_ceil(8)],
    )?;
    // the first party's input is shared first
    let (x, y) = if config.role.is_first() {
        let x = party.share_own(&own_input).await?;
        let y = party.share_other(bit_num).await?;
        (x, y)
    } else {
        let x = party.share_other(bit_num).await?;
        let y = party.share_own(&own_input).await?;
        (x, y)
    };

    let and = party.and(&x, &y).await?;
    let xor = party.xor(&x, &y)?;
    let or = party.or(&x, &y).await?;
    for (name, share) in [("and", and), ("xor", xor), ("or", or)] {
        let output = party.reveal_all(&share).await?;
        info!(?output, "Output of {name}");
        println!("{name}: {}", to_u64(&output));
    }
    info!(stats = ?party.channel().stats().snapshot(), "Communication");
    Ok(())
}

fn mask(bits: u32) -> u64 {
    u64::MAX >> (64 - bits)
}

fn to_u64(bits: &BitVector) -> u64 {
    (0..bits.len())
        .filter(|&idx| bits.get(idx))
        .fold(0, |acc, idx| acc | 1 << idx)
}
