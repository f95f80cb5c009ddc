//! The crank: a loop that keeps every mapped slot of one feed fresh.
//!
//! Each cycle reads the mapping table through the transport, selects the
//! slots that are due, refreshes generic slots in batches and vault-share
//! slots one by one, then reports stale prices. Between cycles the crank
//! sleeps for `refresh_interval_slots` ledger slots. Stopping is only
//! observed at sleep points, so a batch in flight always completes.

pub mod clock;
pub mod event_bus;
pub mod lifecycle;
pub mod retry;

use crate::handlers::{BatchReport, SlotResult, VaultShareOutcome};
use crate::transport::{RefreshTransport, TransportError};
use clock::Clock;
use event_bus::EventBus;
use retry::RetryState;
use scope_config::Config;
use scope_types::{CrankEvent, DatedPrice, MappingEntry, ProviderKind, MAX_BATCH_SIZE};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;

#[derive(Debug, Error)]
pub enum EngineError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Transport error: {0}")]
	Transport(#[from] TransportError),
}

/// Counts of one crank cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleSummary {
	pub cycle: u64,
	pub mapped: usize,
	pub due: usize,
	pub succeeded: usize,
	pub skipped: usize,
	pub failed: usize,
}

pub struct CrankEngine {
	config: Config,
	transport: Arc<dyn RefreshTransport>,
	clock: Arc<dyn Clock>,
	event_bus: EventBus,
	shutdown: watch::Sender<bool>,
	cycles: AtomicU64,
}

impl CrankEngine {
	pub fn new(
		config: Config,
		transport: Arc<dyn RefreshTransport>,
		clock: Arc<dyn Clock>,
		event_bus: EventBus,
	) -> Self {
		let (shutdown, _) = watch::channel(false);
		Self {
			config,
			transport,
			clock,
			event_bus,
			shutdown,
			cycles: AtomicU64::new(0),
		}
	}

	/// Runs cycles until [`CrankEngine::shutdown`] is called.
	pub async fn run(&self) -> Result<(), EngineError> {
		let crank = &self.config.crank;
		if crank.batch_limit == 0 {
			return Err(EngineError::Config("batch_limit must be at least 1".into()));
		}
		let interval = Duration::from_millis(
			crank
				.refresh_interval_slots
				.saturating_mul(crank.ms_per_slot),
		);

		let mut ready = false;
		while !self.is_stopped() {
			match self.run_cycle().await {
				Ok(summary) if !ready => {
					ready = true;
					tracing::info!(
						feed = %self.config.feed.id,
						mapped_slots = summary.mapped,
						interval_ms = interval.as_millis() as u64,
						"Crank ready"
					);
					self.event_bus.publish(CrankEvent::Ready {
						feed_id: self.config.feed.id.clone(),
						mapped_slots: summary.mapped,
					});
				},
				Ok(_) => {},
				Err(e) => tracing::error!(error = %e, "Cycle failed"),
			}

			if self.sleep_or_stop(interval).await {
				break;
			}
		}

		tracing::info!(feed = %self.config.feed.id, cycles = self.cycles.load(Ordering::SeqCst), "Crank stopped");
		Ok(())
	}

	/// Runs a single refresh cycle.
	pub async fn run_cycle(&self) -> Result<CycleSummary, EngineError> {
		let cycle = self.cycles.fetch_add(1, Ordering::SeqCst) + 1;
		let slot = self.clock.current_slot();
		let mapped = self.transport.mapped_slots().await?;
		let prices = self.transport.prices().await?;

		let due: Vec<(u16, MappingEntry)> = mapped
			.iter()
			.filter(|(index, _)| self.is_due(*index, prices.get(usize::from(*index)), slot))
			.copied()
			.collect();

		let mut summary = CycleSummary {
			cycle,
			mapped: mapped.len(),
			due: due.len(),
			..Default::default()
		};
		tracing::debug!(cycle, slot, mapped = summary.mapped, due = summary.due, "Cycle started");
		self.event_bus.publish(CrankEvent::CycleStarted {
			cycle,
			slot,
			due_slots: summary.due,
		});

		let (vaults, generic): (Vec<_>, Vec<_>) = due
			.into_iter()
			.partition(|(_, entry)| entry.provider_kind == ProviderKind::VaultShare);

		let batch_limit = self.config.crank.batch_limit.clamp(1, MAX_BATCH_SIZE);
		for chunk in generic.chunks(batch_limit) {
			if self.is_stopped() {
				break;
			}
			self.refresh_batch(chunk, &mut summary).await;
		}

		for (index, _) in vaults {
			if self.is_stopped() {
				break;
			}
			self.refresh_vault(index, &mut summary).await;
		}

		self.report_stale(&mapped).await;

		tracing::debug!(
			cycle,
			succeeded = summary.succeeded,
			skipped = summary.skipped,
			failed = summary.failed,
			"Cycle completed"
		);
		self.event_bus.publish(CrankEvent::CycleCompleted {
			cycle,
			succeeded: summary.succeeded,
			skipped: summary.skipped,
			failed: summary.failed,
		});
		Ok(summary)
	}

	async fn refresh_batch(&self, chunk: &[(u16, MappingEntry)], summary: &mut CycleSummary) {
		let slots: Vec<u16> = chunk.iter().map(|(index, _)| *index).collect();
		let accounts: Vec<_> = chunk.iter().map(|(_, entry)| entry.provider_account).collect();

		match self
			.with_retry(|| self.transport.refresh_many(&slots, &accounts))
			.await
		{
			Ok(report) => self.record_batch(&report, summary),
			Err(e) => {
				tracing::error!(slots = ?slots, error = %e, "Refresh failed");
				summary.failed += slots.len();
				self.event_bus.publish(CrankEvent::RefreshFailed {
					slot_indices: slots,
					error: e.to_string(),
				});
			},
		}
	}

	fn record_batch(&self, report: &BatchReport, summary: &mut CycleSummary) {
		for (index, result) in &report.results {
			let token = self.token_name(*index);
			match result {
				SlotResult::Updated(dated) => {
					summary.succeeded += 1;
					tracing::info!(token = %token, slot = index, price = %dated.price, marker = dated.last_updated_marker, "Refresh succeeded");
					if let Some(kind) = dated.source_kind {
						self.event_bus.publish(CrankEvent::RefreshSucceeded {
							slot_index: *index,
							kind,
							price: dated.price,
							marker: dated.last_updated_marker,
						});
					}
				},
				SlotResult::Skipped(reason) => {
					summary.skipped += 1;
					tracing::info!(token = %token, slot = index, reason = %reason, "Refresh skipped");
					self.event_bus.publish(CrankEvent::RefreshSkipped {
						slot_index: *index,
						reason: reason.clone(),
					});
				},
				SlotResult::Failed(e) => {
					summary.failed += 1;
					tracing::warn!(token = %token, slot = index, error = %e, "Refresh failed");
					self.event_bus.publish(CrankEvent::RefreshFailed {
						slot_indices: vec![*index],
						error: e.to_string(),
					});
				},
			}
		}
	}

	async fn refresh_vault(&self, index: u16, summary: &mut CycleSummary) {
		let token = self.token_name(index);
		match self
			.with_retry(|| self.transport.refresh_vault_share(index))
			.await
		{
			Ok(VaultShareOutcome::Unchanged(price)) => {
				summary.succeeded += 1;
				tracing::info!(token = %token, slot = index, price = %price, "Vault share unchanged");
				self.event_bus.publish(CrankEvent::VaultShareUnchanged {
					slot_index: index,
					price,
				});
			},
			Ok(VaultShareOutcome::Updated { previous, price }) => {
				summary.succeeded += 1;
				tracing::info!(token = %token, slot = index, previous = %previous, price = %price, "Vault share updated");
				self.event_bus.publish(CrankEvent::VaultShareUpdated {
					slot_index: index,
					previous,
					price,
				});
			},
			Ok(VaultShareOutcome::Skipped(reason)) => {
				summary.skipped += 1;
				tracing::info!(token = %token, slot = index, reason = %reason, "Refresh skipped");
				self.event_bus.publish(CrankEvent::RefreshSkipped {
					slot_index: index,
					reason,
				});
			},
			Err(e) => {
				summary.failed += 1;
				tracing::error!(token = %token, slot = index, error = %e, "Refresh failed");
				self.event_bus.publish(CrankEvent::RefreshFailed {
					slot_indices: vec![index],
					error: e.to_string(),
				});
			},
		}
	}

	/// Repeats `call` on retryable errors, sleeping between attempts.
	async fn with_retry<T, F, Fut>(&self, mut call: F) -> Result<T, TransportError>
	where
		F: FnMut() -> Fut,
		Fut: Future<Output = Result<T, TransportError>>,
	{
		let crank = &self.config.crank;
		let mut retry = RetryState::new(
			crank.max_retries,
			Duration::from_millis(crank.retry_delay_ms),
			Duration::from_millis(crank.max_retry_delay_ms),
		);
		loop {
			let error = match call().await {
				Ok(value) => return Ok(value),
				Err(e) if !e.is_retryable() => return Err(e),
				Err(e) => e,
			};
			let Some(delay) = retry.next_delay() else {
				return Err(error);
			};
			tracing::warn!(
				attempt = retry.attempts(),
				max_retries = crank.max_retries,
				delay_ms = delay.as_millis() as u64,
				error = %error,
				"Refresh call failed, retrying"
			);
			if self.sleep_or_stop(delay).await {
				return Err(error);
			}
		}
	}

	fn is_due(&self, index: u16, stored: Option<&DatedPrice>, current_slot: u64) -> bool {
		let Some(stored) = stored.filter(|price| price.is_set()) else {
			return true;
		};
		match self.config.max_age(index) {
			Some(max_age) => stored.age(current_slot) >= max_age,
			None => true,
		}
	}

	async fn report_stale(&self, mapped: &[(u16, MappingEntry)]) {
		let threshold = self.config.crank.stale_warning_slots;
		if threshold == 0 || mapped.is_empty() {
			return;
		}
		let prices = match self.transport.prices().await {
			Ok(prices) => prices,
			Err(e) => {
				tracing::debug!(error = %e, "Could not read prices for staleness check");
				return;
			},
		};
		let current = self.clock.current_slot();
		let stale: Vec<String> = mapped
			.iter()
			.filter(|(index, _)| {
				prices
					.get(usize::from(*index))
					.is_some_and(|price| price.age(current) > threshold)
			})
			.map(|(index, _)| self.token_name(*index))
			.collect();
		if stale.is_empty() {
			return;
		}
		if self.config.crank.stale_is_error {
			tracing::error!(count = stale.len(), threshold_slots = threshold, tokens = ?stale, "Prices are stale");
		} else {
			tracing::warn!(count = stale.len(), threshold_slots = threshold, tokens = ?stale, "Prices are stale");
		}
	}

	fn token_name(&self, index: u16) -> String {
		self.config
			.tokens
			.get(&index)
			.map(|token| token.display_name(index))
			.unwrap_or_else(|| format!("slot-{}", index))
	}

	fn is_stopped(&self) -> bool {
		*self.shutdown.borrow()
	}

	/// Sleeps on the clock; returns `true` if a stop was requested instead.
	async fn sleep_or_stop(&self, duration: Duration) -> bool {
		let mut stop = self.shutdown.subscribe();
		if *stop.borrow_and_update() {
			return true;
		}
		tokio::select! {
			_ = self.clock.sleep(duration) => self.is_stopped(),
			_ = stop.changed() => true,
		}
	}

	pub fn event_bus(&self) -> &EventBus {
		&self.event_bus
	}

	pub fn config(&self) -> &Config {
		&self.config
	}

	pub fn clock(&self) -> &Arc<dyn Clock> {
		&self.clock
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::engine::clock::ManualClock;
	use crate::handlers::RefreshOutcome;
	use crate::ScopeError;
	use async_trait::async_trait;
	use scope_config::{ConfigBuilder, CrankConfig};
	use scope_types::{AccountRef, Price, MAX_ENTRIES};
	use std::sync::atomic::AtomicUsize;
	use std::sync::Mutex;

	/// Serves a fixed mapping and records calls.
	struct ScriptedTransport {
		mapped: Vec<(u16, MappingEntry)>,
		prices: Mutex<Vec<DatedPrice>>,
		fail_batches: bool,
		batch_calls: AtomicUsize,
		batches: Mutex<Vec<Vec<u16>>>,
		vault_calls: AtomicUsize,
	}

	impl ScriptedTransport {
		fn new(mapped: Vec<(u16, MappingEntry)>) -> Self {
			Self {
				mapped,
				prices: Mutex::new(vec![DatedPrice::default(); MAX_ENTRIES]),
				fail_batches: false,
				batch_calls: AtomicUsize::new(0),
				batches: Mutex::new(Vec::new()),
				vault_calls: AtomicUsize::new(0),
			}
		}
	}

	#[async_trait]
	impl RefreshTransport for ScriptedTransport {
		async fn mapped_slots(&self) -> Result<Vec<(u16, MappingEntry)>, TransportError> {
			Ok(self.mapped.clone())
		}

		async fn prices(&self) -> Result<Vec<DatedPrice>, TransportError> {
			Ok(self.prices.lock().unwrap().clone())
		}

		async fn refresh_many(
			&self,
			slots: &[u16],
			_accounts: &[AccountRef],
		) -> Result<BatchReport, TransportError> {
			self.batch_calls.fetch_add(1, Ordering::SeqCst);
			if self.fail_batches {
				return Err(TransportError::Storage("backend unavailable".into()));
			}
			self.batches.lock().unwrap().push(slots.to_vec());
			let results = slots
				.iter()
				.map(|&slot| {
					let dated = DatedPrice {
						price: Price::new(1, 0).unwrap(),
						last_updated_marker: 1,
						unix_timestamp: 0,
						source_kind: Some(ProviderKind::AggregatorV1),
					};
					self.prices.lock().unwrap()[usize::from(slot)] = dated;
					(slot, SlotResult::from(Ok::<_, ScopeError>(RefreshOutcome::Updated(dated))))
				})
				.collect();
			Ok(BatchReport { results })
		}

		async fn refresh_vault_share(&self, _slot: u16) -> Result<VaultShareOutcome, TransportError> {
			self.vault_calls.fetch_add(1, Ordering::SeqCst);
			Ok(VaultShareOutcome::Unchanged(Price::new(1, 0).unwrap()))
		}
	}

	fn entry(kind: ProviderKind) -> MappingEntry {
		MappingEntry::new(kind, AccountRef::new([2; 32]))
	}

	fn engine(crank: CrankConfig, transport: Arc<ScriptedTransport>) -> CrankEngine {
		CrankEngine::new(
			ConfigBuilder::new().crank(crank).build(),
			transport,
			Arc::new(ManualClock::new(1_000, 400)),
			EventBus::new(1024),
		)
	}

	#[tokio::test]
	async fn test_cycle_splits_batches_and_vaults() {
		let mut mapped: Vec<_> = (0..30u16).map(|slot| (slot, entry(ProviderKind::AggregatorV1))).collect();
		mapped.push((40, entry(ProviderKind::VaultShare)));
		let transport = Arc::new(ScriptedTransport::new(mapped));
		let engine = engine(CrankConfig::default(), transport.clone());

		let summary = engine.run_cycle().await.unwrap();
		assert_eq!(summary.mapped, 31);
		assert_eq!(summary.succeeded, 31);
		let batches = transport.batches.lock().unwrap().clone();
		assert_eq!(batches.len(), 2);
		assert_eq!(batches[0].len(), MAX_BATCH_SIZE);
		assert_eq!(batches[1], vec![27, 28, 29]);
		assert_eq!(transport.vault_calls.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn test_failing_batch_is_retried_to_the_bound() {
		let mut transport = ScriptedTransport::new(vec![
			(0, entry(ProviderKind::AggregatorV1)),
			(1, entry(ProviderKind::VaultShare)),
		]);
		transport.fail_batches = true;
		let transport = Arc::new(transport);
		let engine = engine(
			CrankConfig {
				max_retries: 2,
				..Default::default()
			},
			transport.clone(),
		);
		let mut events = engine.event_bus().subscribe();

		let summary = engine.run_cycle().await.unwrap();
		assert_eq!(transport.batch_calls.load(Ordering::SeqCst), 3);
		assert_eq!(summary.failed, 1);
		// The cycle went on to the vault slot.
		assert_eq!(transport.vault_calls.load(Ordering::SeqCst), 1);
		assert_eq!(summary.succeeded, 1);

		let mut failed = Vec::new();
		while let Ok(event) = events.try_recv() {
			if let CrankEvent::RefreshFailed { slot_indices, .. } = event {
				failed.push(slot_indices);
			}
		}
		assert_eq!(failed, vec![vec![0]]);
	}

	#[tokio::test]
	async fn test_bad_slots_do_not_hold_back_their_batch() {
		use crate::program::{FeedStore, ScopeProgram};
		use crate::transport::LocalTransport;
		use scope_adapters::implementations::aggregator_v1::AggregatorV1Account;
		use scope_storage::implementations::memory::MemoryStorage;
		use scope_storage::StorageService;
		use scope_types::AccountInfo;

		let admin = AccountRef::new([1; 32]);
		let store = FeedStore::new(Arc::new(StorageService::new(Box::new(MemoryStorage::new()))));
		let feed = ScopeProgram::new().initialize("hubble", admin, None).unwrap();
		let accounts: Vec<AccountInfo> = (0..4u8)
			.map(|i| {
				AccountInfo::new(
					AccountRef::new([10 + i; 32]),
					AggregatorV1Account::new(100 + i64::from(i), 2).pack(),
				)
			})
			.collect();
		for (slot, account) in accounts.iter().enumerate() {
			feed.update_mapping(&admin, slot as u16, ProviderKind::AggregatorV1, account)
				.unwrap();
		}
		// Slot 1 has no stored account and slot 2 holds a truncated one.
		store.store_account(&accounts[0]).await.unwrap();
		store
			.store_account(&AccountInfo::new(accounts[2].key, vec![0u8; 3]))
			.await
			.unwrap();
		store.store_account(&accounts[3]).await.unwrap();
		store.save(&feed).await.unwrap();

		let clock = Arc::new(ManualClock::new(1_000, 400));
		let transport = Arc::new(LocalTransport::new(feed.clone(), store, clock.clone()));
		let engine = CrankEngine::new(
			ConfigBuilder::new()
				.crank(CrankConfig {
					max_retries: 1,
					..Default::default()
				})
				.build(),
			transport,
			clock,
			EventBus::new(1024),
		);

		let summary = engine.run_cycle().await.unwrap();
		assert_eq!(summary.due, 4);
		assert_eq!(summary.succeeded, 2);
		assert_eq!(summary.failed, 2);
		assert_eq!(feed.prices().get(0).unwrap().price.to_string(), "1.00");
		assert_eq!(feed.prices().get(3).unwrap().price.to_string(), "1.03");
		assert!(!feed.prices().get(1).unwrap().is_set());
		assert!(!feed.prices().get(2).unwrap().is_set());
	}

	/// Collects formatted log lines written while the guard is alive.
	#[derive(Clone, Default)]
	struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

	impl std::io::Write for CapturedLogs {
		fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
			self.0.lock().unwrap().extend_from_slice(buf);
			Ok(buf.len())
		}

		fn flush(&mut self) -> std::io::Result<()> {
			Ok(())
		}
	}

	impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CapturedLogs {
		type Writer = CapturedLogs;

		fn make_writer(&'a self) -> Self::Writer {
			self.clone()
		}
	}

	impl CapturedLogs {
		fn stale_lines(&self) -> Vec<String> {
			String::from_utf8_lossy(&self.0.lock().unwrap())
				.lines()
				.filter(|line| line.contains("Prices are stale"))
				.map(str::to_string)
				.collect()
		}
	}

	async fn stale_log_lines(stale_is_error: bool) -> Vec<String> {
		let logs = CapturedLogs::default();
		let subscriber = tracing_subscriber::fmt()
			.with_writer(logs.clone())
			.with_ansi(false)
			.with_max_level(tracing::Level::WARN)
			.finish();
		let _guard = tracing::subscriber::set_default(subscriber);

		// Refreshed entries carry marker 1 while the clock is at 1000.
		let transport = Arc::new(ScriptedTransport::new(vec![(0, entry(ProviderKind::AggregatorV1))]));
		let engine = engine(
			CrankConfig {
				stale_warning_slots: 5,
				stale_is_error,
				..Default::default()
			},
			transport,
		);
		engine.run_cycle().await.unwrap();
		logs.stale_lines()
	}

	#[tokio::test]
	async fn test_stale_prices_log_level() {
		let warned = stale_log_lines(false).await;
		assert_eq!(warned.len(), 1);
		assert!(warned[0].contains("WARN"));

		let errored = stale_log_lines(true).await;
		assert_eq!(errored.len(), 1);
		assert!(errored[0].contains("ERROR"));
	}

	#[tokio::test]
	async fn test_max_age_filters_fresh_slots() {
		let transport = Arc::new(ScriptedTransport::new(vec![(0, entry(ProviderKind::AggregatorV1))]));
		let engine = engine(
			CrankConfig {
				default_max_age: Some(50),
				..Default::default()
			},
			transport.clone(),
		);
		transport.prices.lock().unwrap()[0] = DatedPrice {
			price: Price::new(1, 0).unwrap(),
			last_updated_marker: 990,
			unix_timestamp: 0,
			source_kind: Some(ProviderKind::AggregatorV1),
		};

		assert_eq!(engine.run_cycle().await.unwrap().due, 0);
		transport.prices.lock().unwrap()[0].last_updated_marker = 900;
		assert_eq!(engine.run_cycle().await.unwrap().due, 1);
	}

	#[tokio::test]
	async fn test_ready_once_and_stop() {
		let transport = Arc::new(ScriptedTransport::new(vec![(0, entry(ProviderKind::AggregatorV1))]));
		let engine = Arc::new(engine(CrankConfig::default(), transport));
		let mut events = engine.event_bus().subscribe();

		let runner = tokio::spawn({
			let engine = engine.clone();
			async move { engine.run().await }
		});

		let mut ready = 0;
		loop {
			match events.recv().await {
				Ok(CrankEvent::Ready { mapped_slots, .. }) => {
					assert_eq!(mapped_slots, 1);
					ready += 1;
				},
				Ok(CrankEvent::CycleCompleted { cycle: 3, .. }) => break,
				Ok(_) => {},
				Err(e) => panic!("event stream closed: {}", e),
			}
		}
		engine.shutdown().await.unwrap();
		runner.await.unwrap().unwrap();
		assert_eq!(ready, 1);
	}
}
