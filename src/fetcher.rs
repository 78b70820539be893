use std::sync::Arc;

use crate::Identifier;
use crate::config::Settings;
use crate::error::LookupError;
use crate::limiter::RateLimiter;
use crate::schema::{FIELD_ID, FIELD_NAME, FilterValue, Hop, SPELL_NAME, Table};
use crate::source::{Filters, RecordSource, Row, exact};

/// Which data version a lookup reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    /// Whatever the remote side serves by default.
    Latest,
    /// The fixed alternate version used by the side chain.
    Side,
}

/// Issues single lookups against a [`RecordSource`], each one holding a
/// [`RateLimiter`] permit for its whole duration.
#[derive(Clone)]
pub struct RecordFetcher {
    source: Arc<dyn RecordSource>,
    limiter: RateLimiter,
    side_build: String,
    side_target_type: String,
}

impl RecordFetcher {
    pub fn new(source: Arc<dyn RecordSource>, settings: &Settings) -> Self {
        Self {
            source,
            limiter: RateLimiter::new(settings.max_in_flight),
            side_build: settings.side_build.clone(),
            side_target_type: settings.side_target_type.clone(),
        }
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub async fn fetch(&self, table: &str, filters: &Filters) -> Result<Vec<Row>, LookupError> {
        let _permit = self.limiter.acquire().await;
        tracing::debug!(table, ?filters, "lookup");
        self.source.lookup(table, filters).await
    }

    /// Same as [`fetch`](Self::fetch), pinned to the side-chain data version.
    pub async fn fetch_versioned(
        &self,
        table: &str,
        filters: &Filters,
    ) -> Result<Vec<Row>, LookupError> {
        let mut filters = filters.clone();
        filters.insert("build".to_string(), self.side_build.clone());
        self.fetch(table, &filters).await
    }

    pub async fn file_search(&self, id: Identifier) -> Result<Vec<String>, LookupError> {
        let _permit = self.limiter.acquire().await;
        tracing::debug!(id, "file search");
        self.source.file_search(id).await
    }

    pub async fn classify(&self, id: Identifier) -> Result<String, LookupError> {
        let _permit = self.limiter.acquire().await;
        self.source.classify(id).await
    }

    /// Name of the record `id` in `table`, read from the table's declared
    /// display field.
    pub async fn display_name(
        &self,
        table: Table,
        id: Identifier,
    ) -> Result<Option<String>, LookupError> {
        let Some(field) = table.display else {
            return Ok(None);
        };

        let rows = self.fetch(table.name, &by_key(FIELD_ID, id)).await?;
        Ok(rows
            .first()
            .and_then(|row| row.text(field))
            .map(str::to_string))
    }

    /// Spell ids whose name matches `name` exactly.
    pub async fn spells_named(&self, name: &str) -> Result<Vec<Identifier>, LookupError> {
        let rows = self.fetch(SPELL_NAME.name, &by_key(FIELD_NAME, name)).await?;

        let mut ids = Vec::new();
        for id in rows.iter().filter_map(|row| row.id(FIELD_ID)) {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }

        Ok(ids)
    }

    /// Runs one hop for a single input id and returns every output id found.
    pub async fn hop(
        &self,
        hop: &Hop,
        id: Identifier,
        version: Version,
    ) -> Result<Vec<Identifier>, LookupError> {
        let mut filters = by_key(hop.key, id);
        for (field, value) in hop.filters {
            let value = match value {
                FilterValue::Fixed(value) => *value,
                FilterValue::TargetType => self.side_target_type.as_str(),
            };
            let (key, value) = exact(field, value);
            filters.insert(key, value);
        }

        let rows = match version {
            Version::Latest => self.fetch(hop.table.name, &filters).await?,
            Version::Side => self.fetch_versioned(hop.table.name, &filters).await?,
        };

        Ok(rows
            .iter()
            .flat_map(|row| hop.outputs.iter().filter_map(|field| row.id(field)))
            .collect())
    }
}

fn by_key(field: &str, value: impl ToString) -> Filters {
    let mut filters = Filters::new();
    let (key, value) = exact(field, value);
    filters.insert(key, value);
    filters.insert("page".to_string(), "1".to_string());
    filters
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::schema::{PRIMARY, SIDE};
    use crate::testing::FakeSource;

    fn fetcher(source: FakeSource) -> (Arc<FakeSource>, RecordFetcher) {
        let source = Arc::new(source);
        let fetcher = RecordFetcher::new(source.clone(), &Settings::default());
        (source, fetcher)
    }

    #[tokio::test]
    async fn test_hop_collects_all_output_fields() {
        let (_, fetcher) = fetcher(FakeSource::new().with_side_rows(
            "SpellChainEffects",
            "ID",
            9,
            vec![FakeSource::row(&[
                ("TextureFileDataID_0", 1),
                ("TextureFileDataID_1", 0),
                ("TextureFileDataID_2", 3),
            ])],
        ));

        let ids = fetcher.hop(&SIDE[3], 9, Version::Side).await.unwrap();
        assert_eq!(ids, vec![1, 3]);
    }

    #[tokio::test]
    async fn test_hop_filters() {
        let (source, fetcher) = fetcher(FakeSource::new());

        fetcher.hop(&PRIMARY[1], 5, Version::Latest).await.unwrap();
        fetcher.hop(&SIDE[0], 6, Version::Side).await.unwrap();

        let calls = source.calls();
        let attach = calls
            .iter()
            .find(|(table, _)| table == "SpellVisualKitEffect")
            .unwrap();
        assert_eq!(attach.1["filter[ParentSpellVisualKitID]"], "exact:5");
        assert_eq!(attach.1["filter[EffectType]"], "exact:2");
        assert!(!attach.1.contains_key("build"));

        let side = calls
            .iter()
            .find(|(table, _)| table == "SpellVisualEvent")
            .unwrap();
        assert_eq!(side.1["filter[TargetType]"], "exact:2");
        assert_eq!(side.1["build"], Settings::default().side_build);
    }

    #[tokio::test]
    async fn test_display_name() {
        let (_, fetcher) = fetcher(FakeSource::new().with_named(133, "Fireball"));

        let name = fetcher.display_name(SPELL_NAME, 133).await.unwrap();
        assert_eq!(name.as_deref(), Some("Fireball"));

        let missing = fetcher.display_name(SPELL_NAME, 134).await.unwrap();
        assert_eq!(missing, None);
    }

    #[tokio::test]
    async fn test_spells_named_dedups() {
        let (_, fetcher) = fetcher(
            FakeSource::new()
                .with_named(100, "Fireball")
                .with_named(200, "Fireball")
                .with_named(100, "Fireball"),
        );

        let ids = fetcher.spells_named("Fireball").await.unwrap();
        assert_eq!(ids, vec![100, 200]);
        assert!(fetcher.spells_named("Frostbolt").await.unwrap().is_empty());
    }
}
