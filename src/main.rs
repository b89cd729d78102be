use log::{info, warn};

use pow_ledger::blockchain::{verify_chain, KeyPair, Ledger, Transaction};
use pow_ledger::config::{load_config, GenesisAllocation};

const DEFAULT_CONFIG_PATH: &str = "ledger.toml";
const DEVELOPER_ALLOCATION: f64 = 1000.0;

fn main() -> anyhow::Result<()> {
    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let mut config = load_config(&config_path)?;

    // Without a configured allocation, mint the genesis funds to a fresh developer key
    let developer = KeyPair::generate();
    let developer_funded = config.default_genesis(GenesisAllocation {
        address: developer.address().clone(),
        amount: DEVELOPER_ALLOCATION,
    });
    let genesis_holder = config.genesis.as_ref().map(|allocation| allocation.address.clone());

    let mut ledger = Ledger::new(config)?;
    info!(
        "Ledger started (difficulty {}, reward {})",
        ledger.difficulty(),
        ledger.mining_reward()
    );

    let miner = KeyPair::generate();
    let alice = KeyPair::generate();

    ledger.mine_pending_transactions(miner.address())?;

    let mut transfer = Transaction::new(miner.address().clone(), alice.address().clone(), 10.0)
        .with_memo("First transfer");
    transfer.sign(&miner)?;
    ledger.add_transaction(transfer)?;

    ledger.mine_pending_transactions(miner.address())?;

    if developer_funded {
        println!("Balance of developer: {}", ledger.balance_of(developer.address()));
    } else if let Some(holder) = &genesis_holder {
        println!("Balance of genesis holder {}: {}", holder, ledger.balance_of(holder));
    }
    println!("Balance of miner: {}", ledger.balance_of(miner.address()));
    println!("Balance of alice: {}", ledger.balance_of(alice.address()));

    // Spending an entire balance is refused
    let mut all_in = Transaction::new(
        alice.address().clone(),
        miner.address().clone(),
        ledger.balance_of(alice.address()),
    );
    all_in.sign(&alice)?;
    if let Err(err) = ledger.add_transaction(all_in) {
        warn!("Transfer refused: {}", err);
    }

    println!("Chain valid: {}", ledger.is_chain_valid());
    println!("{}", ledger.to_json_pretty()?);

    // Rewrite history on a copy and show that verification catches it
    let mut forged = ledger.chain().to_vec();
    if let Some(transaction) = forged.get_mut(2).and_then(|block| block.transactions.first_mut()) {
        transaction.amount = 1_000_000.0;
    }
    match verify_chain(&forged) {
        Ok(()) => println!("Forged chain valid: true"),
        Err(violation) => println!("Forged chain rejected: {}", violation),
    }

    Ok(())
}
