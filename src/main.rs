use std::error::Error;

use dotenvy::dotenv;
use log::info;

use pow_ledger::{Block, Config, Ledger, MineLimit, StartsWithZeros};

fn main() -> Result<(), Box<dyn Error>> {
    let _ = dotenv();
    env_logger::init();

    let config = Config::from_env();
    info!("starting demo ledger with {config:?}");

    let mut ledger = Ledger::new(StartsWithZeros::new(config.difficulty));
    let mut result = false;

    for (index, payload) in [(0u64, "Hello world"), (1, "second")] {
        let mut block =
            Block::with_time_format(index, payload, ledger.last_hash(), &config.time_format)?;

        let limit = MineLimit {
            max_attempts: config.max_attempts,
            cancel: None,
        };
        let attempts = ledger.mine_with(&mut block, limit)?;
        info!("block #{index} mined after {attempts} attempts");

        println!("{}", block.dump());
        println!("{}", block.hash());
        result = ledger.append(block);
    }

    println!("{result}");
    info!("chain length={} valid={}", ledger.len(), ledger.check_valid());
    Ok(())
}
