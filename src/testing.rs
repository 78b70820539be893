//! In-memory [`RecordSource`] and progress recorder for unit tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use crate::Identifier;
use crate::error::LookupError;
use crate::pipeline::Stage;
use crate::progress::Report;
use crate::source::{Filters, RecordSource, Row};

struct Entry {
    field: String,
    value: String,
    rows: Vec<Row>,
}

#[derive(Default)]
pub(crate) struct FakeSource {
    /// Keyed by table and whether the lookup is pinned to the side version.
    tables: HashMap<(String, bool), Vec<Entry>>,
    files: HashMap<Identifier, Vec<String>>,
    failing: Vec<(String, Option<String>)>,
    failing_classify: bool,
    delay: Option<Duration>,
    jitter: Option<u64>,
    calls: Mutex<Vec<(String, Filters)>>,
    file_calls: Mutex<Vec<Identifier>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn row(fields: &[(&str, Identifier)]) -> Row {
        let map: Map<String, Value> = fields
            .iter()
            .map(|(field, value)| (field.to_string(), json!(value)))
            .collect();
        Row(map)
    }

    fn insert(
        mut self,
        side: bool,
        table: &str,
        field: &str,
        value: String,
        rows: Vec<Row>,
    ) -> Self {
        self.tables
            .entry((table.to_string(), side))
            .or_default()
            .push(Entry {
                field: field.to_string(),
                value,
                rows,
            });
        self
    }

    pub fn with_rows(self, table: &str, field: &str, value: impl ToString, rows: Vec<Row>) -> Self {
        self.insert(false, table, field, value.to_string(), rows)
    }

    pub fn with_side_rows(
        self,
        table: &str,
        field: &str,
        value: impl ToString,
        rows: Vec<Row>,
    ) -> Self {
        self.insert(true, table, field, value.to_string(), rows)
    }

    pub fn with_named(self, id: Identifier, name: &str) -> Self {
        let mut row = Map::new();
        row.insert("ID".into(), json!(id));
        row.insert("Name_lang".into(), json!(name));
        let row = Row(row);

        self.with_rows("SpellName", "ID", id, vec![row.clone()])
            .with_rows("SpellName", "Name_lang", name, vec![row])
    }

    pub fn with_file(mut self, id: Identifier, name: &str) -> Self {
        self.files.entry(id).or_default().push(name.to_string());
        self
    }

    pub fn failing_on(mut self, table: &str) -> Self {
        self.failing.push((table.to_string(), None));
        self
    }

    /// Fails lookups in `table` filtered on `id`.
    pub fn failing_on_id(mut self, table: &str, id: Identifier) -> Self {
        self.failing.push((table.to_string(), Some(format!("exact:{id}"))));
        self
    }

    pub fn failing_classify(mut self) -> Self {
        self.failing_classify = true;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Varies the delay per request so completion order differs from issue
    /// order. Different seeds give different orders.
    pub fn with_jitter(mut self, seed: u64) -> Self {
        self.jitter = Some(seed);
        self
    }

    /// A full chain for `root`: two visuals, model files on the primary side
    /// and texture files on the side chain. Intermediate ids are derived from
    /// `root`, so several chains can share one source.
    pub fn with_chain(
        self,
        root: Identifier,
        models: &[(Identifier, &str)],
        textures: &[(Identifier, &str)],
    ) -> Self {
        let base = root * 1000;
        let row = Self::row;

        // (side, table, key field, key, output field, output), relative to `base`
        let links = [
            (false, "SpellVisualEvent", "SpellVisualID", 100, "SpellVisualKitID", 200),
            (false, "SpellVisualEvent", "SpellVisualID", 101, "SpellVisualKitID", 201),
            (false, "SpellVisualKitEffect", "ParentSpellVisualKitID", 200, "Effect", 400),
            (false, "SpellVisualKitEffect", "ParentSpellVisualKitID", 201, "Effect", 401),
            (false, "SpellVisualKitModelAttach", "ID", 400, "SpellVisualEffectNameID", 600),
            (false, "SpellVisualKitModelAttach", "ID", 401, "SpellVisualEffectNameID", 601),
            (true, "SpellVisualEvent", "SpellVisualID", 100, "SpellVisualKitID", 300),
            (true, "SpellVisualKitEffect", "ParentSpellVisualKitID", 300, "Effect", 500),
            (true, "SpellProceduralEffect", "ID", 500, "Value_0", 700),
        ];

        let visuals = vec![
            row(&[("SpellVisualID", base + 100)]),
            row(&[("SpellVisualID", base + 101)]),
        ];
        let mut source = self
            .with_named(root, &format!("Spell {root}"))
            .with_rows("SpellXSpellVisual", "SpellID", root, visuals);

        for (side, table, key, from, field, to) in links {
            let rows = vec![row(&[(field, base + to)])];
            source = source.insert(side, table, key, (base + from).to_string(), rows);
        }

        let model_rows = |count: usize| {
            models
                .iter()
                .take(count)
                .map(|(id, _)| row(&[("ModelFileDataID", *id)]))
                .collect::<Vec<_>>()
        };
        const TEXTURE_FIELDS: [&str; 3] = [
            "TextureFileDataID_0",
            "TextureFileDataID_1",
            "TextureFileDataID_2",
        ];
        let texture_rows: Vec<Row> = textures
            .chunks(3)
            .map(|chunk| {
                let fields: Vec<_> = chunk
                    .iter()
                    .zip(TEXTURE_FIELDS)
                    .map(|((id, _), field)| (field, *id))
                    .collect();
                row(&fields)
            })
            .collect();

        source = source
            .with_rows("SpellVisualEffectName", "ID", base + 600, model_rows(models.len()))
            .with_rows("SpellVisualEffectName", "ID", base + 601, model_rows(1))
            .with_side_rows("SpellChainEffects", "ID", base + 700, texture_rows);

        for (id, name) in models.iter().chain(textures) {
            source = source.with_file(*id, name);
        }

        source
    }

    pub fn calls(&self) -> Vec<(String, Filters)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn file_calls(&self) -> Vec<Identifier> {
        self.file_calls.lock().unwrap().clone()
    }

    /// Highest number of requests observed in flight at once.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::Acquire)
    }

    async fn busy(&self, seed: u64) {
        let now = self.in_flight.fetch_add(1, Ordering::AcqRel) + 1;
        self.peak.fetch_max(now, Ordering::AcqRel);

        if let Some(delay) = self.delay {
            let delay = match self.jitter {
                Some(jitter) => delay * (1 + (seed ^ jitter).wrapping_mul(31) % 5) as u32,
                None => delay,
            };
            tokio::time::sleep(delay).await;
        } else {
            tokio::task::yield_now().await;
        }

        self.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Runs `future` to completion on a fresh current-thread runtime with a
/// paused clock, for property tests that can't use `#[tokio::test]`.
pub(crate) fn block_on_paused<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .unwrap()
        .block_on(future)
}

/// Same as `FakeSource::new().with_chain(..)`.
pub(crate) fn chain_source(
    root: Identifier,
    models: &[(Identifier, &str)],
    textures: &[(Identifier, &str)],
) -> FakeSource {
    FakeSource::new().with_chain(root, models, textures)
}

#[async_trait]
impl RecordSource for FakeSource {
    async fn lookup(&self, table: &str, filters: &Filters) -> Result<Vec<Row>, LookupError> {
        self.calls
            .lock()
            .unwrap()
            .push((table.to_string(), filters.clone()));

        let seed = filters.values().map(|value| value.len() as u64 * 7).sum::<u64>()
            + filters
                .values()
                .filter_map(|value| value.strip_prefix("exact:"))
                .filter_map(|value| value.parse::<u64>().ok())
                .sum::<u64>();
        self.busy(seed).await;

        let failing = self.failing.iter().any(|(name, value)| {
            name == table
                && value
                    .as_ref()
                    .is_none_or(|value| filters.values().any(|v| v == value))
        });
        if failing {
            return Err(LookupError::Status {
                url: format!("fake://{table}"),
                status: 500,
            });
        }

        let side = filters.contains_key("build");
        let rows = self
            .tables
            .get(&(table.to_string(), side))
            .into_iter()
            .flatten()
            .filter(|entry| {
                filters.get(&format!("filter[{}]", entry.field))
                    == Some(&format!("exact:{}", entry.value))
            })
            .flat_map(|entry| entry.rows.iter().cloned())
            .collect();

        Ok(rows)
    }

    async fn file_search(&self, id: Identifier) -> Result<Vec<String>, LookupError> {
        self.file_calls.lock().unwrap().push(id);
        self.busy(id).await;
        Ok(self.files.get(&id).cloned().unwrap_or_default())
    }

    async fn classify(&self, _id: Identifier) -> Result<String, LookupError> {
        if self.failing_classify {
            return Err(LookupError::Other("classify failed".into()));
        }
        Ok("Mage".to_string())
    }
}

/// [`Report`] that keeps every reported stage.
#[derive(Debug, Default)]
pub(crate) struct Recorder {
    pub stages: Vec<Stage>,
    pub label: Option<String>,
    pub failed: bool,
}

impl Report for Recorder {
    fn report(&mut self, stage: Stage) {
        if self.stages.last() != Some(&stage) {
            self.stages.push(stage);
        }
    }

    fn stage(&self) -> Stage {
        self.stages.last().copied().unwrap_or_default()
    }

    fn label(&mut self, label: &str) {
        self.label = Some(label.to_string());
    }

    fn fail(&mut self) {
        self.failed = true;
    }
}
