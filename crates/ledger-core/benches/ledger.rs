use criterion::{criterion_group, criterion_main, Criterion};
use ledger_core::{Account, Ledger, PeerAddress, Transaction};
use rand::{rngs::StdRng, Rng, SeedableRng};

fn funded_ledger(blocks: usize, txs_per_block: usize) -> Ledger {
    let mut rng = StdRng::seed_from_u64(42);
    let miner = Account::Peer(PeerAddress::new("127.0.0.1", 4000));
    let mut ledger = Ledger::with_genesis();
    for _ in 0..blocks {
        for i in 0..txs_per_block {
            let recipient = Account::Peer(PeerAddress::new("127.0.0.1", 5000 + i as u16));
            let amount: u64 = rng.gen_range(1..3);
            // early blocks have too little balance; skip what does not fit
            let _ = ledger.new_transaction(Transaction::new(miner.clone(), recipient, amount));
        }
        ledger
            .add_block(&miner)
            .expect("ledger has a genesis block");
    }
    ledger
}

fn bench_ledger(c: &mut Criterion) {
    let ledger = funded_ledger(200, 10);

    c.bench_function("validate_chain_200_blocks", |b| {
        b.iter(|| Ledger::is_valid(ledger.chain()));
    });

    c.bench_function("balance_200_blocks", |b| {
        let miner = Account::Peer(PeerAddress::new("127.0.0.1", 4000));
        b.iter(|| ledger.get_balance(&miner));
    });

    c.bench_function("mine_block_10_txs", |b| {
        b.iter_batched(
            || funded_ledger(5, 10),
            |mut ledger| {
                let miner = Account::Peer(PeerAddress::new("127.0.0.1", 4000));
                ledger.add_block(&miner).map(|block| block.index)
            },
            criterion::BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, bench_ledger);
criterion_main!(benches);
