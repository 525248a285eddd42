use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use std::time::Instant;

use crate::contracts::{
    Clock, FolioError, GeneratorDefinition, GeneratorError, InvoiceIndex, LockBackend, LockResultExt,
    SequenceNumber, StateStore, StorageError, LAST_INVOICE_NUMBER_KEY,
};
use crate::metrics::NumberingMetrics;
use crate::numbering::{GeneratorRegistry, InvoiceNumberFormatter, NumberingConfig, SystemClock};
use crate::storage::LockGuard;

/// Name of the lock serializing every generation.
pub const GENERATOR_LOCK_NAME: &str = "invoice-number-generator";

/// Issues invoice numbers.
///
/// # Invariants
/// - Two successful calls never return the same number
/// - The last issued state is written exactly once per successful call and
///   only after the returned number is known to be unused
/// - The generator lock is released on every exit path
pub struct NumberGenerationService<S, I, L>
where
    S: StateStore,
    I: InvoiceIndex,
    L: LockBackend,
{
    state: Arc<S>,
    index: Arc<I>,
    lock: Arc<L>,
    clock: Arc<dyn Clock>,
    registry: GeneratorRegistry,
    settings: RwLock<NumberingConfig>,
    metrics: Arc<NumberingMetrics>,
}

impl<S, I, L> NumberGenerationService<S, I, L>
where
    S: StateStore,
    I: InvoiceIndex,
    L: LockBackend,
{
    /// Creates a service reading the period from the system clock.
    pub fn new(
        state: Arc<S>,
        index: Arc<I>,
        lock: Arc<L>,
        registry: GeneratorRegistry,
        settings: NumberingConfig,
    ) -> Self {
        settings.warn_if_suspicious();
        Self {
            state,
            index,
            lock,
            clock: Arc::new(SystemClock),
            registry,
            settings: RwLock::new(settings),
            metrics: Arc::new(NumberingMetrics::new()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<NumberingMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &Arc<NumberingMetrics> {
        &self.metrics
    }

    /// Returns a copy of the current settings.
    pub fn settings(&self) -> Result<NumberingConfig, FolioError> {
        Ok(self.settings.read().map_lock_err()?.clone())
    }

    /// Issues the next invoice number using the current settings.
    pub fn generate_and_set(&self) -> Result<String, FolioError> {
        let settings = self.settings()?;
        self.generate_and_set_with(&settings)
    }

    /// Issues the next invoice number using `settings`.
    pub fn generate_and_set_with(&self, settings: &NumberingConfig) -> Result<String, FolioError> {
        let started = Instant::now();
        let result = self.issue(settings);
        match &result {
            Ok((invoice_number, collisions)) => {
                let elapsed_us = started.elapsed().as_micros() as u64;
                self.metrics.record_generated(*collisions, elapsed_us);
                tracing::info!(
                    invoice_number = %invoice_number,
                    generator = %settings.generator,
                    collisions,
                    elapsed_us,
                    "Issued invoice number"
                );
            }
            Err(e) => {
                self.metrics.record_error();
                tracing::error!(error = %e, generator = %settings.generator, "Invoice number generation failed");
            }
        }
        result.map(|(invoice_number, _)| invoice_number)
    }

    fn issue(&self, settings: &NumberingConfig) -> Result<(String, u64), FolioError> {
        settings.validate()?;
        let generator = self.registry.create_instance(&settings.generator)?;
        let formatter = InvoiceNumberFormatter::from_config(settings);

        let guard = LockGuard::acquire(self.lock.as_ref(), GENERATOR_LOCK_NAME)?;
        if guard.waits() > 0 {
            self.metrics.record_lock_waits(guard.waits());
        }

        // Read once so the whole retry loop stays inside one period
        let period = self.clock.current_period();
        let last = self.load_last()?;

        let mut candidate = generator.generate(last.as_ref(), period);
        // A carried counter that was already at the top saturates in place
        if candidate.is_exhausted() && last.as_ref().is_some_and(SequenceNumber::is_exhausted) {
            return Err(exhausted(settings, &candidate).into());
        }
        let mut formatted = formatter.render(&candidate);
        candidate.set_value(formatted.clone());

        let mut collisions = 0;
        while self.index.contains(&formatted)? {
            if !settings.pattern_has_number() {
                return Err(GeneratorError::PatternWithoutNumber {
                    pattern: settings.pattern.clone(),
                    rendered: formatted,
                }
                .into());
            }
            collisions += 1;
            tracing::debug!(
                invoice_number = %formatted,
                collisions,
                "Invoice number already taken, trying the next one"
            );
            if !candidate.try_increment() {
                return Err(exhausted(settings, &candidate).into());
            }
            formatted = formatter.render(&candidate);
            candidate.set_value(formatted.clone());
        }
        if collisions > 0 {
            tracing::warn!(
                invoice_number = %formatted,
                collisions,
                "Skipped invoice numbers already used by existing invoices"
            );
        }

        self.state.set(LAST_INVOICE_NUMBER_KEY, &candidate)?;
        guard.release()?;

        Ok((formatted, collisions))
    }

    /// Loads the last issued counter. An unreadable record counts as absent.
    fn load_last(&self) -> Result<Option<SequenceNumber>, FolioError> {
        match self.state.get(LAST_INVOICE_NUMBER_KEY) {
            Ok(last) => Ok(last),
            Err(StorageError::CorruptState { key, reason }) => {
                self.metrics.record_corrupt_state();
                tracing::warn!(
                    key = %key,
                    reason = %reason,
                    "Last issued invoice number is unreadable, starting from scratch"
                );
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Returns the last issued counter, if any is stored and readable.
    pub fn last_issued(&self) -> Result<Option<SequenceNumber>, FolioError> {
        match self.state.get(LAST_INVOICE_NUMBER_KEY) {
            Ok(last) => Ok(last),
            Err(StorageError::CorruptState { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Formats `number` without touching any state. Unset overrides fall
    /// back to the current settings.
    pub fn format(
        &self,
        number: &SequenceNumber,
        padding: Option<usize>,
        pattern: Option<&str>,
    ) -> Result<String, FolioError> {
        if let Some(padding) = padding {
            NumberingConfig {
                padding,
                ..NumberingConfig::default()
            }
            .validate()?;
        }
        let settings = self.settings.read().map_lock_err()?;
        Ok(InvoiceNumberFormatter::from_config(&settings).format(number, padding, pattern))
    }

    /// Lists the registered generators keyed by id.
    pub fn generator_definitions(&self) -> BTreeMap<String, GeneratorDefinition> {
        self.registry.definitions()
    }

    /// Replaces the settings.
    ///
    /// The generator id must be registered. When `start` is set and no
    /// invoice has been recorded yet, the last issued state is seeded with it
    /// so the first number issued is `start + 1`.
    pub fn apply_settings(&self, settings: NumberingConfig) -> Result<(), FolioError> {
        if !self.registry.contains(&settings.generator) {
            return Err(GeneratorError::NotFound(settings.generator).into());
        }
        settings.validate()?;
        settings.warn_if_suspicious();

        if let Some(start) = settings.start {
            self.seed_start(start)?;
        }

        tracing::info!(
            generator = %settings.generator,
            padding = settings.padding,
            pattern = %settings.pattern,
            "Invoice numbering settings updated"
        );
        *self.settings.write().map_lock_err()? = settings;
        Ok(())
    }

    /// Seeds the last issued counter while no invoice exists. The counter
    /// only ever moves forward: a seed at or below the stored counter is
    /// ignored. Returns whether the seed was written.
    pub fn seed_start(&self, start: u64) -> Result<bool, FolioError> {
        let guard = LockGuard::acquire(self.lock.as_ref(), GENERATOR_LOCK_NAME)?;
        if self.index.has_any()? {
            tracing::debug!(start, "Invoices exist, ignoring initial invoice number");
            guard.release()?;
            return Ok(false);
        }
        if let Some(last) = self.load_last()? {
            if last.increment_number() >= start {
                tracing::debug!(
                    start,
                    last = last.increment_number(),
                    "Counter already past initial invoice number, ignoring it"
                );
                guard.release()?;
                return Ok(false);
            }
        }

        let period = self.clock.current_period();
        let seed = SequenceNumber::new(start, period.year, period.month);
        self.state.set(LAST_INVOICE_NUMBER_KEY, &seed)?;
        guard.release()?;

        tracing::info!(start, "Seeded last issued invoice number");
        Ok(true)
    }
}

fn exhausted(settings: &NumberingConfig, candidate: &SequenceNumber) -> GeneratorError {
    GeneratorError::Exhausted {
        generator: settings.generator.clone(),
        period: candidate.period().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Mutex;

    use super::*;
    use crate::contracts::{InvoiceRecord, LockError};
    use crate::numbering::{FixedClock, MAX_PADDING};
    use crate::storage::{LocalLockBackend, MemoryStorage};

    type TestService = NumberGenerationService<MemoryStorage, MemoryStorage, LocalLockBackend>;

    fn settings(generator: &str, padding: usize, pattern: &str) -> NumberingConfig {
        NumberingConfig {
            generator: generator.into(),
            padding,
            pattern: pattern.into(),
            start: None,
        }
    }

    fn create_service(config: NumberingConfig) -> (TestService, Arc<MemoryStorage>, Arc<FixedClock>) {
        let storage = Arc::new(MemoryStorage::new());
        let clock = Arc::new(FixedClock::new(2024, 1));
        let service = NumberGenerationService::new(
            Arc::clone(&storage),
            Arc::clone(&storage),
            Arc::new(LocalLockBackend::default()),
            GeneratorRegistry::builtin(),
            config,
        )
        .with_clock(clock.clone());
        (service, storage, clock)
    }

    #[test]
    fn issues_consecutive_numbers() {
        let (service, storage, _) = create_service(settings("infinite", 4, "INV-{invoice_number}"));

        assert_eq!(service.generate_and_set().unwrap(), "INV-0001");
        assert_eq!(service.generate_and_set().unwrap(), "INV-0002");
        assert_eq!(service.generate_and_set().unwrap(), "INV-0003");

        let last = storage.get(LAST_INVOICE_NUMBER_KEY).unwrap().unwrap();
        assert_eq!(last.increment_number(), 3);
        assert_eq!(last.value(), Some("INV-0003"));
    }

    #[test]
    fn monthly_resets_when_the_clock_moves() {
        let (service, _, clock) =
            create_service(settings("monthly", 3, "{year}/{month}/{invoice_number}"));

        assert_eq!(service.generate_and_set().unwrap(), "2024/1/001");
        assert_eq!(service.generate_and_set().unwrap(), "2024/1/002");
        clock.set(2024, 2);
        assert_eq!(service.generate_and_set().unwrap(), "2024/2/001");
    }

    #[test]
    fn collision_skips_to_next_free_number_and_persists_it() {
        let (service, storage, _) = create_service(settings("infinite", 6, "INV-{invoice_number}"));
        storage.record(&InvoiceRecord::new("INV-000001", None)).unwrap();
        storage.record(&InvoiceRecord::new("INV-000002", None)).unwrap();

        assert_eq!(service.generate_and_set().unwrap(), "INV-000003");

        let last = storage.get(LAST_INVOICE_NUMBER_KEY).unwrap().unwrap();
        assert_eq!(last, {
            let mut expected = SequenceNumber::new(3, 2024, 1);
            expected.set_value("INV-000003");
            expected
        });
        assert_eq!(service.metrics().snapshot().collisions_total, 2);
    }

    #[test]
    fn collision_keeps_the_period_fields() {
        let (service, storage, _) = create_service(settings("yearly", 0, "{year}-{invoice_number}"));
        storage.record(&InvoiceRecord::new("2024-1", None)).unwrap();

        assert_eq!(service.generate_and_set().unwrap(), "2024-2");
        let last = storage.get(LAST_INVOICE_NUMBER_KEY).unwrap().unwrap();
        assert_eq!(last.year(), 2024);
        assert_eq!(last.month(), 1);
    }

    #[test]
    fn corrupt_state_is_treated_as_absent() {
        let (service, storage, _) = create_service(settings("infinite", 0, "{invoice_number}"));
        storage.put_raw_state(LAST_INVOICE_NUMBER_KEY, b"not a sequence number");

        assert_eq!(service.generate_and_set().unwrap(), "1");
        assert_eq!(service.metrics().snapshot().corrupt_state_total, 1);
        assert_eq!(service.last_issued().unwrap().unwrap().increment_number(), 1);
    }

    #[test]
    fn unknown_generator_fails_and_leaves_state_alone() {
        let (service, storage, _) = create_service(settings("weekly", 0, "{invoice_number}"));

        let err = service.generate_and_set().unwrap_err();
        assert!(matches!(
            err,
            FolioError::Generator(GeneratorError::NotFound(ref id)) if id == "weekly"
        ));
        assert_eq!(storage.get(LAST_INVOICE_NUMBER_KEY).unwrap(), None);
        assert_eq!(service.metrics().snapshot().errors_total, 1);
    }

    #[test]
    fn preview_does_not_touch_state() {
        let (service, storage, _) = create_service(settings("infinite", 6, "INV-{invoice_number}"));
        let number = SequenceNumber::new(52, 2024, 1);

        assert_eq!(service.format(&number, None, None).unwrap(), "INV-000052");
        assert_eq!(
            service.format(&number, Some(2), Some("{year}.{invoice_number}")).unwrap(),
            "2024.52"
        );
        assert_eq!(storage.get(LAST_INVOICE_NUMBER_KEY).unwrap(), None);
    }

    #[test]
    fn start_seeds_first_number() {
        let (service, _, _) = create_service(settings("infinite", 0, "{invoice_number}"));

        let mut config = settings("infinite", 0, "F{invoice_number}");
        config.start = Some(1000);
        service.apply_settings(config).unwrap();

        assert_eq!(service.generate_and_set().unwrap(), "F1001");
    }

    #[test]
    fn start_is_ignored_once_invoices_exist() {
        let (service, storage, _) = create_service(settings("infinite", 0, "{invoice_number}"));
        let first = service.generate_and_set().unwrap();
        storage.record(&InvoiceRecord::new(first, None)).unwrap();

        assert!(!service.seed_start(500).unwrap());
        assert_eq!(service.generate_and_set().unwrap(), "2");
    }

    #[test]
    fn reseeding_never_rewinds_unrecorded_numbers() {
        let (service, storage, _) = create_service(settings("infinite", 0, "{invoice_number}"));
        assert!(service.seed_start(1000).unwrap());

        let issued: Vec<String> = (0..3).map(|_| service.generate_and_set().unwrap()).collect();
        assert_eq!(issued, ["1001", "1002", "1003"]);

        // Same start again, as on every boot with the setting present
        assert!(!service.seed_start(1000).unwrap());
        let last = storage.get(LAST_INVOICE_NUMBER_KEY).unwrap().unwrap();
        assert_eq!(last.increment_number(), 1003);
        assert_eq!(service.generate_and_set().unwrap(), "1004");
    }

    #[test]
    fn seed_above_the_counter_moves_it_forward() {
        let (service, _, _) = create_service(settings("infinite", 0, "{invoice_number}"));
        service.generate_and_set().unwrap();
        service.generate_and_set().unwrap();

        assert!(service.seed_start(50).unwrap());
        assert_eq!(service.generate_and_set().unwrap(), "51");
    }

    #[test]
    fn reapplying_settings_with_start_keeps_counting() {
        let (service, _, _) = create_service(settings("infinite", 0, "{invoice_number}"));
        let mut config = settings("infinite", 0, "{invoice_number}");
        config.start = Some(10);

        service.apply_settings(config.clone()).unwrap();
        assert_eq!(service.generate_and_set().unwrap(), "11");
        service.apply_settings(config).unwrap();
        assert_eq!(service.generate_and_set().unwrap(), "12");
    }

    #[test]
    fn apply_settings_rejects_oversized_padding() {
        let (service, _, _) = create_service(settings("infinite", 4, "{invoice_number}"));
        let err = service
            .apply_settings(settings("infinite", 70_000, "{invoice_number}"))
            .unwrap_err();
        assert!(matches!(
            err,
            FolioError::Generator(GeneratorError::InvalidSetting { .. })
        ));
        assert_eq!(service.settings().unwrap().padding, 4);
        assert_eq!(service.generate_and_set().unwrap(), "0001");
    }

    #[test]
    fn oversized_padding_is_rejected_before_touching_state() {
        let (service, storage, _) = create_service(settings("infinite", 0, "{invoice_number}"));

        let err = service
            .generate_and_set_with(&settings("infinite", 70_000, "{invoice_number}"))
            .unwrap_err();
        assert!(matches!(
            err,
            FolioError::Generator(GeneratorError::InvalidSetting { .. })
        ));
        assert_eq!(storage.get(LAST_INVOICE_NUMBER_KEY).unwrap(), None);

        let number = SequenceNumber::new(1, 2024, 1);
        assert!(service.format(&number, Some(70_000), None).is_err());
        assert_eq!(service.format(&number, Some(MAX_PADDING), None).unwrap().len(), 20);
    }

    #[test]
    fn exhausted_counter_fails_instead_of_wrapping() {
        let (service, storage, clock) = create_service(settings("monthly", 0, "{invoice_number}"));
        assert!(service.seed_start(u64::MAX - 1).unwrap());

        assert_eq!(service.generate_and_set().unwrap(), u64::MAX.to_string());
        let err = service.generate_and_set().unwrap_err();
        assert!(matches!(err, FolioError::Generator(GeneratorError::Exhausted { .. })));
        let last = storage.get(LAST_INVOICE_NUMBER_KEY).unwrap().unwrap();
        assert_eq!(last.increment_number(), u64::MAX);

        // A new month resets the counter and frees it again
        clock.set(2024, 2);
        assert_eq!(service.generate_and_set().unwrap(), "1");
    }

    #[test]
    fn exhausted_counter_stops_collision_skipping() {
        let (service, storage, _) = create_service(settings("infinite", 0, "{invoice_number}"));
        assert!(service.seed_start(u64::MAX - 1).unwrap());
        storage
            .record(&InvoiceRecord::new(u64::MAX.to_string(), None))
            .unwrap();

        let err = service.generate_and_set().unwrap_err();
        assert!(matches!(err, FolioError::Generator(GeneratorError::Exhausted { .. })));
    }

    #[test]
    fn apply_settings_rejects_unknown_generator() {
        let (service, _, _) = create_service(NumberingConfig::default());
        let err = service
            .apply_settings(settings("weekly", 0, "{invoice_number}"))
            .unwrap_err();
        assert!(matches!(err, FolioError::Generator(GeneratorError::NotFound(_))));
        assert_eq!(service.settings().unwrap().generator, "infinite");
    }

    #[test]
    fn generator_definitions_lists_builtin() {
        let (service, _, _) = create_service(NumberingConfig::default());
        let definitions = service.generator_definitions();
        assert_eq!(definitions.len(), 4);
        assert_eq!(definitions["monthly_no_reset"].label, "Monthly no reset");
    }

    /// Index whose lookups fail after a number of successful calls.
    struct FailingIndex {
        remaining_ok: Mutex<u32>,
    }

    impl InvoiceIndex for FailingIndex {
        fn contains(&self, _invoice_number: &str) -> Result<bool, StorageError> {
            let mut remaining = self.remaining_ok.lock().unwrap();
            if *remaining == 0 {
                return Err(StorageError::Io("index offline".into()));
            }
            *remaining -= 1;
            Ok(true)
        }

        fn has_any(&self) -> Result<bool, StorageError> {
            Ok(true)
        }

        fn record(&self, _record: &InvoiceRecord) -> Result<(), StorageError> {
            Ok(())
        }

        fn find(&self, _invoice_number: &str) -> Result<Option<InvoiceRecord>, StorageError> {
            Ok(None)
        }
    }

    #[test]
    fn failure_inside_critical_section_releases_lock_and_persists_nothing() {
        let state = Arc::new(MemoryStorage::new());
        let lock = Arc::new(LocalLockBackend::default());
        let service = NumberGenerationService::new(
            Arc::clone(&state),
            Arc::new(FailingIndex {
                remaining_ok: Mutex::new(2),
            }),
            Arc::clone(&lock),
            GeneratorRegistry::builtin(),
            NumberingConfig::default(),
        );

        let err = service.generate_and_set().unwrap_err();
        assert!(matches!(err, FolioError::Storage(StorageError::Io(_))));
        assert!(!lock.is_held(GENERATOR_LOCK_NAME).unwrap());
        assert_eq!(state.get(LAST_INVOICE_NUMBER_KEY).unwrap(), None);
    }

    #[test]
    fn pattern_without_number_fails_instead_of_spinning() {
        let (service, storage, _) = create_service(settings("infinite", 0, "INV-{year}"));

        let first = service.generate_and_set().unwrap();
        assert_eq!(first, "INV-2024");
        storage.record(&InvoiceRecord::new(first, None)).unwrap();

        let err = service.generate_and_set().unwrap_err();
        assert!(matches!(
            err,
            FolioError::Generator(GeneratorError::PatternWithoutNumber { ref rendered, .. })
                if rendered == "INV-2024"
        ));
        assert_eq!(
            storage.get(LAST_INVOICE_NUMBER_KEY).unwrap().unwrap().increment_number(),
            1
        );
    }

    /// Lock backend that reports itself broken.
    struct BrokenLock;

    impl LockBackend for BrokenLock {
        fn acquire(&self, _name: &str) -> Result<bool, LockError> {
            Err(LockError::Unavailable("backend down".into()))
        }

        fn wait(&self, _name: &str) -> Result<(), LockError> {
            Ok(())
        }

        fn release(&self, _name: &str) -> Result<(), LockError> {
            Ok(())
        }
    }

    #[test]
    fn lock_backend_failure_is_surfaced() {
        let storage = Arc::new(MemoryStorage::new());
        let service = NumberGenerationService::new(
            Arc::clone(&storage),
            Arc::clone(&storage),
            Arc::new(BrokenLock),
            GeneratorRegistry::builtin(),
            NumberingConfig::default(),
        );

        let err = service.generate_and_set().unwrap_err();
        assert!(matches!(err, FolioError::Lock(LockError::Unavailable(_))));
    }

    #[test]
    fn numbers_are_unique_across_many_calls() {
        let (service, storage, clock) =
            create_service(settings("monthly", 0, "{year}{month}-{invoice_number}"));
        let mut seen = HashSet::new();
        for i in 0..60 {
            if i % 20 == 0 {
                clock.set(2024, 1 + i / 20);
            }
            let number = service.generate_and_set().unwrap();
            storage.record(&InvoiceRecord::new(number.clone(), None)).unwrap();
            assert!(seen.insert(number));
        }
        assert_eq!(seen.len(), 60);
    }
}
