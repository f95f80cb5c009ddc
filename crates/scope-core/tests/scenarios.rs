//! End-to-end scenarios over a full feed.

use scope_adapters::implementations::aggregator_v1::AggregatorV1Account;
use scope_adapters::implementations::live_aggregator::LiveAggregatorAccount;
use scope_adapters::implementations::vault_share::{MintAccount, TokenAccount};
use scope_config::ConfigBuilder;
use scope_core::{
	FeedStore, ManualClock, RefreshOutcome, ScopeContext, ScopeError, ScopeProgram, VaultShareOutcome,
};
use scope_storage::implementations::file::FileStorage;
use scope_storage::StorageService;
use scope_types::{AccountInfo, AccountRef, CrankEvent, ProviderKind, VaultShareAccounts, MAX_BATCH_SIZE, MAX_ENTRIES};
use std::cmp::Ordering;
use std::sync::Arc;

const ADMIN: AccountRef = AccountRef([1; 32]);
const MINT: AccountRef = AccountRef([0xa0; 32]);
const UNDERLYING: AccountRef = AccountRef([0xa1; 32]);

fn live_account(key: AccountRef, price: i64) -> AccountInfo {
	AccountInfo::new(key, LiveAggregatorAccount::trading(price, -8, 0).pack())
}

#[test]
fn live_aggregator_slot_follows_its_provider() {
	let program = ScopeProgram::new();
	let feed = program.initialize("hubble", ADMIN, None).unwrap();
	assert_eq!(feed.capacity(), MAX_ENTRIES);

	let provider = AccountRef::new([3; 32]);
	let account = live_account(provider, 22_841_550_900);
	program
		.update_mapping("hubble", &ADMIN, 3, ProviderKind::LiveAggregator, &account)
		.unwrap();

	program.refresh_one("hubble", 3, &account, 100).unwrap();
	assert_eq!(feed.prices().get(3).unwrap().price.to_string(), "228.41550900");

	// The provider moves; nothing changes until the slot is refreshed.
	let moved = live_account(provider, 22_891_550_900);
	assert_eq!(feed.prices().get(3).unwrap().price.to_string(), "228.41550900");

	let outcome = program.refresh_one("hubble", 3, &moved, 101).unwrap();
	assert!(matches!(outcome, RefreshOutcome::Updated(_)));
	let stored = feed.prices().get(3).unwrap();
	assert_eq!(stored.price.to_string(), "228.91550900");
	assert_eq!(stored.last_updated_marker, 101);
}

#[test]
fn full_batch_updates_every_slot() {
	let program = ScopeProgram::new();
	let feed = program.initialize("hubble", ADMIN, None).unwrap();

	let mut slots = Vec::new();
	let mut accounts = Vec::new();
	for i in 0..MAX_BATCH_SIZE as u16 {
		let slot = i * 10;
		let account = AccountInfo::new(
			AccountRef::new([i as u8 + 10; 32]),
			AggregatorV1Account::new(1_000 + i64::from(i), 2).pack(),
		);
		feed.update_mapping(&ADMIN, slot, ProviderKind::AggregatorV1, &account)
			.unwrap();
		slots.push(slot);
		accounts.push(account);
	}

	let report = feed.refresh_many(&slots, &accounts, 42).unwrap();
	assert!(report.all_updated());
	assert_eq!(report.results.len(), MAX_BATCH_SIZE);
	for (i, slot) in slots.iter().enumerate() {
		let stored = feed.prices().get(*slot).unwrap();
		assert_eq!(stored.last_updated_marker, 42);
		assert_eq!(stored.price.significand, 1_000 + i as u128);
	}
}

#[test]
fn vault_share_price_tracks_underlying() {
	let program = ScopeProgram::new();
	let feed = program
		.initialize(
			"hubble",
			ADMIN,
			Some(VaultShareAccounts {
				mint: MINT,
				underlying: UNDERLYING,
			}),
		)
		.unwrap();
	let mint = AccountInfo::new(MINT, MintAccount::new(2_000_000, 6).pack());
	feed.update_mapping(&ADMIN, 11, ProviderKind::VaultShare, &mint)
		.unwrap();

	let underlying = |amount| {
		AccountInfo::new(
			UNDERLYING,
			TokenAccount::new(AccountRef::new([4; 32]), AccountRef::new([5; 32]), amount).pack(),
		)
	};

	feed.refresh_vault_share(11, &mint, &underlying(2_000_000), 1)
		.unwrap();
	let before = feed.prices().get(11).unwrap().price;

	let outcome = feed
		.refresh_vault_share(11, &mint, &underlying(2_100_000), 2)
		.unwrap();
	assert!(matches!(outcome, VaultShareOutcome::Updated { .. }));
	let after = feed.prices().get(11).unwrap().price;
	assert_eq!(after.checked_cmp(&before).unwrap(), Ordering::Greater);
	assert_eq!(after.to_string(), "1.05000000");

	assert!(matches!(
		feed.refresh_one(11, &mint, 3),
		Err(ScopeError::KindMismatch(_))
	));
	assert_eq!(feed.prices().get(11).unwrap().price, after);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn disjoint_slots_refresh_concurrently() {
	let program = Arc::new(ScopeProgram::new());
	let feed = program.initialize("hubble", ADMIN, None).unwrap();

	let mut tasks = Vec::new();
	for slot in 0..64u16 {
		let account = live_account(AccountRef::new([slot as u8; 32]), 100_000_000 + i64::from(slot));
		feed.update_mapping(&ADMIN, slot, ProviderKind::LiveAggregator, &account)
			.unwrap();
		let feed = feed.clone();
		tasks.push(tokio::spawn(async move {
			for marker in 1..=10 {
				feed.refresh_one(slot, &account, marker).unwrap();
			}
		}));
	}
	for task in tasks {
		task.await.unwrap();
	}

	for slot in 0..64u16 {
		let stored = feed.prices().get(slot).unwrap();
		assert_eq!(stored.last_updated_marker, 10);
		assert_eq!(stored.price.significand, 100_000_000 + u128::from(slot));
	}
}

#[tokio::test]
async fn crank_cycle_persists_prices() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().to_string_lossy().to_string();
	let provider = AccountRef::new([7; 32]);
	let config = ConfigBuilder::new()
		.admin(ADMIN)
		.file_storage(path.clone())
		.vault_share(MINT, UNDERLYING)
		.token(3, ProviderKind::LiveAggregator, provider)
		.token(4, ProviderKind::VaultShare, MINT)
		.build();

	let store = FeedStore::new(Arc::new(StorageService::new(Box::new(FileStorage::new(
		dir.path().to_path_buf(),
	)))));
	store
		.store_account(&live_account(provider, 22_841_550_900))
		.await
		.unwrap();
	store
		.store_account(&AccountInfo::new(MINT, MintAccount::new(1_000, 0).pack()))
		.await
		.unwrap();
	store
		.store_account(&AccountInfo::new(
			UNDERLYING,
			TokenAccount::new(AccountRef::new([8; 32]), ADMIN, 1_500).pack(),
		))
		.await
		.unwrap();

	let context = ScopeContext::new(config.clone(), Arc::new(ScopeProgram::new()), store.clone());
	context.init_feed().await.unwrap();
	assert_eq!(context.upload_mappings(&ADMIN).await.unwrap(), vec![3, 4]);

	let clock = Arc::new(ManualClock::new(5_000, 400));
	let engine = context.crank_engine(clock).await.unwrap();
	let mut events = engine.event_bus().subscribe();
	let summary = engine.run_cycle().await.unwrap();
	assert_eq!(summary.succeeded, 2);
	assert_eq!(summary.failed, 0);

	let mut vault_updates = 0;
	while let Ok(event) = events.try_recv() {
		if matches!(event, CrankEvent::VaultShareUpdated { slot_index: 4, .. }) {
			vault_updates += 1;
		}
	}
	assert_eq!(vault_updates, 1);

	// A second process sees the refreshed prices.
	let reopened = ScopeContext::new(config, Arc::new(ScopeProgram::new()), store);
	let rows = reopened.price_rows().await.unwrap();
	assert_eq!(rows.len(), 2);
	assert_eq!(rows[0].value.as_deref(), Some("228.41550900"));
	assert_eq!(rows[0].last_updated_marker, 5_000);
	assert_eq!(rows[1].value.as_deref(), Some("1.50000000"));
}
